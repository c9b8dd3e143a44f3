//! Aggregate filters on relationships (`actorsAggregate: { count_GT: 2 }`)

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::trace;

use super::context::Context;
use super::params::{ParamScope, Params};
use super::predicate::{Fragment, LogicalOp, Predicate};
use crate::error::{Error, Result};
use crate::schema::{Entity, RelationField};

lazy_static! {
    // name_EQUAL, name_SHORTEST_LT, screenTime_AVERAGE_GTE, ...
    static ref AGGREGATION_KEY_RE: Regex = Regex::new(
        r"^(?P<field>[_A-Za-z]\w*?)(?:_(?P<function>AVERAGE|SHORTEST|LONGEST|MIN|MAX|SUM))?_(?P<comparator>EQUAL|GT|GTE|LT|LTE)$"
    ).unwrap();
}

/// Functions applied over the collected property values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Aggregation {
    Average,
    Shortest,
    Longest,
    Min,
    Max,
    Sum,
}

impl Aggregation {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "AVERAGE" => Some(Aggregation::Average),
            "SHORTEST" => Some(Aggregation::Shortest),
            "LONGEST" => Some(Aggregation::Longest),
            "MIN" => Some(Aggregation::Min),
            "MAX" => Some(Aggregation::Max),
            "SUM" => Some(Aggregation::Sum),
            _ => None,
        }
    }
}

fn comparator(s: &str) -> Option<&'static str> {
    match s {
        "EQUAL" => Some("="),
        "GT" => Some(">"),
        "GTE" => Some(">="),
        "LT" => Some("<"),
        "LTE" => Some("<="),
        _ => None,
    }
}

/// Everything one aggregation input is compiled against
struct Target<'e> {
    pattern: String,
    node_var: String,
    edge_var: String,
    node: &'e dyn Entity,
    edge: Option<&'e dyn Entity>,
}

/// Compiles the value of a `<relationship>Aggregate` key
pub struct AggregateCompiler<'a> {
    ctx: &'a Context<'a>,
}

impl<'a> AggregateCompiler<'a> {
    pub fn new(ctx: &'a Context<'a>) -> Self {
        AggregateCompiler { ctx }
    }

    pub fn compile(
        &self,
        key: &str,
        value: &Value,
        var: &str,
        param: &ParamScope,
        field: &RelationField,
        depth: usize,
    ) -> Result<Fragment> {
        self.ctx.check_depth(depth)?;

        let input = value
            .as_object()
            .ok_or_else(|| Error::shape(key, "an aggregation filter object"))?;

        let schema = self.ctx.schema;
        let ref_node = schema.require_node(&field.target)?;
        let relationship = match &field.properties {
            Some(name) => Some(
                schema
                    .relationship(name)
                    .ok_or_else(|| Error::unknown_relationship(name))?,
            ),
            None => None,
        };

        let base = param.variable();
        let node_var = format!("{}_node", base);
        let edge_var = format!("{}_edge", base);
        let pattern = field.pattern(
            var,
            Some(&edge_var),
            &format!("{}{}", node_var, ref_node.label_string(self.ctx)),
        );

        let target = Target {
            pattern,
            node_var,
            edge_var,
            node: ref_node,
            edge: relationship.map(|r| r as &dyn Entity),
        };

        self.compile_input(input, &target, param, depth)
    }

    fn compile_input(
        &self,
        input: &Map<String, Value>,
        target: &Target<'_>,
        scope: &ParamScope,
        depth: usize,
    ) -> Result<Fragment> {
        let mut acc = Fragment::default();

        for (key, value) in input {
            let param = scope.child(key);
            trace!(key = key.as_str(), param = param.as_str(), "aggregate.key");

            if let Some(op) = LogicalOp::from_key(key) {
                acc.push(self.compile_logical(op, key, value, &param, depth, |item, branch| {
                    self.compile_input(item, target, branch, depth + 1)
                })?);
                continue;
            }

            let fragment = match key.as_str() {
                "count" | "count_LT" | "count_LTE" | "count_GT" | "count_GTE" => {
                    let op = match key.strip_prefix("count_") {
                        Some(suffix) => comparator(suffix).unwrap_or("="),
                        None => "=",
                    };
                    let text = format!(
                        "size([{} | {}]) {} {}",
                        target.pattern,
                        target.node_var,
                        op,
                        param.reference()
                    );
                    bound(text, &param, value)
                }
                "node" => {
                    let nested = value
                        .as_object()
                        .ok_or_else(|| Error::shape(key, "a node aggregation object"))?;
                    self.compile_properties(nested, target, &target.node_var, target.node, &param, depth + 1)?
                }
                "edge" => {
                    let edge = target.edge.ok_or_else(|| Error::unknown_relationship(key))?;
                    let nested = value
                        .as_object()
                        .ok_or_else(|| Error::shape(key, "an edge aggregation object"))?;
                    self.compile_properties(nested, target, &target.edge_var, edge, &param, depth + 1)?
                }
                _ => return Err(Error::InvalidKey { key: key.clone() }),
            };

            acc.push(fragment);
        }

        Ok(acc)
    }

    /// `node` / `edge` aggregation: comparisons over the collected property values
    fn compile_properties(
        &self,
        input: &Map<String, Value>,
        target: &Target<'_>,
        item_var: &str,
        entity: &dyn Entity,
        scope: &ParamScope,
        depth: usize,
    ) -> Result<Fragment> {
        self.ctx.check_depth(depth)?;

        let mut acc = Fragment::default();

        for (key, value) in input {
            let param = scope.child(key);

            if let Some(op) = LogicalOp::from_key(key) {
                acc.push(self.compile_logical(op, key, value, &param, depth, |item, branch| {
                    self.compile_properties(item, target, item_var, entity, branch, depth + 1)
                })?);
                continue;
            }

            let caps = AGGREGATION_KEY_RE
                .captures(key)
                .ok_or_else(|| Error::InvalidKey { key: key.clone() })?;

            let field_name = caps.name("field").map_or("", |m| m.as_str());
            let field = entity
                .fields()
                .get(field_name)
                .ok_or_else(|| Error::unknown_field(field_name))?;
            let function = caps
                .name("function")
                .and_then(|m| Aggregation::parse(m.as_str()));
            let op = caps
                .name("comparator")
                .and_then(|m| comparator(m.as_str()))
                .unwrap_or("=");

            let prop = format!("{}.{}", item_var, field.db_property());
            let length = format!("size({})", prop);
            let collect = |expr: &str| format!("[{} | {}]", target.pattern, expr);
            let reference = param.reference();

            let text = match function {
                None => {
                    // Plain comparisons on strings compare lengths, except equality
                    let expr = if field.kind.is_string() && op != "=" {
                        &length
                    } else {
                        &prop
                    };
                    let item = param.variable();
                    format!(
                        "ANY({} IN {} WHERE {} {} {})",
                        item,
                        collect(expr),
                        item,
                        op,
                        reference
                    )
                }
                Some(Aggregation::Shortest) => {
                    format!("apoc.coll.min({}) {} {}", collect(&length), op, reference)
                }
                Some(Aggregation::Longest) => {
                    format!("apoc.coll.max({}) {} {}", collect(&length), op, reference)
                }
                Some(Aggregation::Average) => {
                    let expr = if field.kind.is_string() { &length } else { &prop };
                    format!("apoc.coll.avg({}) {} {}", collect(expr), op, reference)
                }
                Some(Aggregation::Min) => {
                    format!("apoc.coll.min({}) {} {}", collect(&prop), op, reference)
                }
                Some(Aggregation::Max) => {
                    format!("apoc.coll.max({}) {} {}", collect(&prop), op, reference)
                }
                Some(Aggregation::Sum) => {
                    format!("apoc.coll.sum({}) {} {}", collect(&prop), op, reference)
                }
            };

            acc.push(bound(text, &param, value));
        }

        Ok(acc)
    }

    fn compile_logical<F>(
        &self,
        op: LogicalOp,
        key: &str,
        value: &Value,
        param: &ParamScope,
        depth: usize,
        mut compile_item: F,
    ) -> Result<Fragment>
    where
        F: FnMut(&Map<String, Value>, &ParamScope) -> Result<Fragment>,
    {
        self.ctx.check_depth(depth + 1)?;

        let items = value
            .as_array()
            .ok_or_else(|| Error::shape(key, "an array of aggregation filters"))?;

        let mut operands = Vec::new();
        let mut params = Params::new();

        for (i, item) in items.iter().enumerate() {
            let item = item
                .as_object()
                .ok_or_else(|| Error::shape(key, "an array of aggregation filters"))?;
            let (predicate, inner_params) = compile_item(item, &param.branch(i))?.into_parts();

            if let Some(predicate) = predicate {
                operands.push(predicate);
                params.extend(inner_params);
            }
        }

        if operands.is_empty() {
            return Ok(Fragment::default());
        }

        Ok(Fragment::new(Predicate::Logical { op, operands }, params))
    }
}

fn bound(text: String, param: &ParamScope, value: &Value) -> Fragment {
    let mut params = Params::new();
    param.bind(&mut params, value.clone());
    Fragment::new(Predicate::Comparison(text), params)
}
