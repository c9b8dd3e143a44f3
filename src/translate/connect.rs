//! Connect-clause builder - nested `connect` input to conditional MERGE statements

use serde_json::Value;
use tracing::{debug, trace};

use super::auth::{AuthGuardEmitter, Quoting, AUTH_FORBIDDEN_ERROR};
use super::context::Context;
use super::params::{ParamScope, Params};
use super::where_clause::WhereCompiler;
use crate::error::{Error, Result};
use crate::schema::{AuthOperation, Node, RelationField};

/// Where a connect is happening in the enclosing mutation
#[derive(Debug, Clone, Copy)]
pub struct ConnectArgs<'a> {
    /// Base name for the variables bound per connected element
    pub var_name: &'a str,

    /// The relationship being connected through
    pub relation_field: &'a RelationField,

    /// Variable of the node the edges start from
    pub parent_var: &'a str,

    /// Node type being connected to
    pub ref_node: &'a Node,

    /// Node type of `parent_var`
    pub parent_node: &'a Node,

    /// Variables to carry across each `WITH`
    pub with_vars: &'a [String],

    /// Label matched instead of the relation target (union members)
    pub label_override: Option<&'a str>,

    /// The parent is being created in the same statement and has no auth to check yet
    pub from_create: bool,

    pub quoting: Quoting,
}

/// Ordered statement lines plus their parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statements {
    pub lines: Vec<String>,
    pub params: Params,
}

impl Statements {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    fn extend(&mut self, other: Statements) {
        self.lines.extend(other.lines);
        self.params.extend(other.params);
    }
}

/// Compiles connect inputs for one relationship field
pub struct ConnectBuilder<'a> {
    ctx: &'a Context<'a>,
}

impl<'a> ConnectBuilder<'a> {
    pub fn new(ctx: &'a Context<'a>) -> Self {
        ConnectBuilder { ctx }
    }

    /// Compile `value` (one connect object, or an array for to-many relations)
    pub fn compile(&self, value: &Value, args: &ConnectArgs<'_>) -> Result<(String, Params)> {
        debug!(
            var = args.var_name,
            field = args.relation_field.name.as_str(),
            parent = args.parent_var,
            from_create = args.from_create,
            "connect.compile"
        );

        let statements = self.build(value, args, 0)?;
        Ok((statements.text(), statements.params))
    }

    fn build(&self, value: &Value, args: &ConnectArgs<'_>, depth: usize) -> Result<Statements> {
        self.ctx.check_depth(depth)?;

        let elements: Vec<&Value> = match (args.relation_field.array, value.as_array()) {
            (true, Some(items)) => items.iter().collect(),
            _ => vec![value],
        };

        let mut acc = Statements::default();
        for (index, element) in elements.into_iter().enumerate() {
            let var = format!("{}{}", args.var_name, index);
            acc.extend(self.build_element(element, &var, args, depth)?);
        }

        Ok(acc)
    }

    fn build_element(
        &self,
        element: &Value,
        var: &str,
        args: &ConnectArgs<'_>,
        depth: usize,
    ) -> Result<Statements> {
        let field = args.relation_field;
        let connect = element
            .as_object()
            .ok_or_else(|| Error::shape(&field.name, "a connect object"))?;

        trace!(var, "connect.element");

        let mut out = Statements::default();

        out.lines.push(format!("WITH {}", args.with_vars.join(", ")));
        out.lines.push(format!(
            "OPTIONAL MATCH ({}:{})",
            var,
            args.label_override.unwrap_or(&field.target)
        ));

        if let Some(filter) = connect.get("where") {
            let filter = filter
                .as_object()
                .ok_or_else(|| Error::shape("where", "a filter object"))?;
            let fragment = WhereCompiler::new(self.ctx).compile_filter(
                filter,
                var,
                &ParamScope::flat(var),
                args.ref_node,
                false,
                depth + 1,
            )?;

            if !fragment.is_empty() {
                out.lines.push(fragment.render(true));
                out.params.extend(fragment.params);
            }
        }

        // The parent only has rules worth checking once it exists on its own
        let mut subjects: Vec<(&Node, &str)> = Vec::with_capacity(2);
        if !args.from_create {
            subjects.push((args.parent_node, args.parent_var));
        }
        subjects.push((args.ref_node, var));

        let emitter = AuthGuardEmitter::new(self.ctx);
        let mut guards = Vec::new();

        for (i, (node, guard_var)) in subjects.into_iter().enumerate() {
            let chain = format!("{}{}{}_allow", var, node.name, i);
            if let Some(guard) = emitter.compile(
                node,
                AuthOperation::Connect,
                guard_var,
                &chain,
                args.quoting,
                depth + 1,
            )? {
                guards.extend(guard.predicates.iter().map(|p| p.to_string()));
                out.params.extend(guard.params);
            }
        }

        if !guards.is_empty() {
            let q = args.quoting.quote();
            out.lines.push(format!("WITH {}", with_vars_plus(args.with_vars, var).join(", ")));
            out.lines.push(format!(
                "CALL apoc.util.validate(NOT({}), {}{}{}, [0])",
                guards.join(" AND "),
                q,
                AUTH_FORBIDDEN_ERROR,
                q
            ));
        }

        out.lines.push(format!(
            "FOREACH(_ IN CASE {} WHEN NULL THEN [] ELSE [1] END | ",
            var
        ));
        out.lines.push(format!("MERGE {}", field.pattern(args.parent_var, None, var)));
        out.lines.push(")".to_string());

        if let Some(nested) = connect.get("connect") {
            out.extend(self.build_nested(nested, var, args, depth)?);
        }

        Ok(out)
    }

    /// Recurse into `connect: { <relField>: ... }` below a connected node
    fn build_nested(
        &self,
        nested: &Value,
        var: &str,
        args: &ConnectArgs<'_>,
        depth: usize,
    ) -> Result<Statements> {
        let items: Vec<&Value> = match nested.as_array() {
            Some(items) => items.iter().collect(),
            None => vec![nested],
        };

        let with_vars = with_vars_plus(args.with_vars, var);
        let mut out = Statements::default();

        for item in items {
            let map = item
                .as_object()
                .ok_or_else(|| Error::shape("connect", "a connect object"))?;

            for (key, value) in map {
                let rel_field = args
                    .ref_node
                    .relation_fields
                    .iter()
                    .find(|f| key.starts_with(f.name.as_str()))
                    .ok_or_else(|| Error::unknown_field(key))?;

                // Union connects are keyed <field>_<Member>
                let union_member = rel_field.is_union().then(|| {
                    let rest = key
                        .strip_prefix(rel_field.name.as_str())
                        .and_then(|r| r.strip_prefix('_'))
                        .unwrap_or(key);
                    rest.split('_').next().unwrap_or(rest)
                });

                let target = union_member.unwrap_or(&rel_field.target);
                let ref_node = self.ctx.schema.require_node(target)?;
                let var_name = format!("{}_{}", var, key);

                let nested_args = ConnectArgs {
                    var_name: &var_name,
                    relation_field: rel_field,
                    parent_var: var,
                    ref_node,
                    parent_node: args.ref_node,
                    with_vars: &with_vars,
                    label_override: union_member,
                    from_create: false,
                    quoting: args.quoting,
                };

                out.extend(self.build(value, &nested_args, depth + 1)?);
            }
        }

        Ok(out)
    }
}

fn with_vars_plus(with_vars: &[String], var: &str) -> Vec<String> {
    let mut vars = with_vars.to_vec();
    vars.push(var.to_string());
    vars
}
