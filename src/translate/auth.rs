//! Auth-guard emitter - turns a node's auth rules into a guard predicate

use serde_json::Value;
use tracing::debug;

use super::context::Context;
use super::params::{ParamScope, Params};
use super::predicate::{Fragment, LogicalOp, Predicate};
use super::where_clause::WhereCompiler;
use crate::error::Result;
use crate::schema::{Allow, AuthOperation, AuthRule, Node};

/// Error name the database raises when a guard fails
pub const AUTH_FORBIDDEN_ERROR: &str = "@neo4j/graphql/FORBIDDEN";

/// How string literals in guard text are quoted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Quoting {
    /// Text is used as-is
    #[default]
    Plain,
    /// Text is embedded inside an already double-quoted string
    Escaped,
}

impl Quoting {
    pub fn quote(self) -> &'static str {
        match self {
            Quoting::Plain => "\"",
            Quoting::Escaped => "\\\"",
        }
    }
}

/// Builds guard predicates from node auth rules
pub struct AuthGuardEmitter<'a> {
    ctx: &'a Context<'a>,
}

impl<'a> AuthGuardEmitter<'a> {
    pub fn new(ctx: &'a Context<'a>) -> Self {
        AuthGuardEmitter { ctx }
    }

    /// Guard for `operation` on `node` bound to `var`, or `None` when no rule applies.
    ///
    /// Parts of one rule must all hold; any one rule is enough.
    pub fn compile(
        &self,
        node: &Node,
        operation: AuthOperation,
        var: &str,
        chain: &str,
        quoting: Quoting,
        depth: usize,
    ) -> Result<Option<Fragment>> {
        let Some(auth) = &node.auth else {
            return Ok(None);
        };

        let mut rules = Vec::new();
        let mut params = Params::new();

        for (i, rule) in auth.rules.iter().enumerate() {
            if !rule.applies_to(operation) {
                continue;
            }

            let scope = ParamScope::flat(format!("{}_auth_allow{}", chain, i));
            let (parts, rule_params) = self.compile_rule(rule, node, var, &scope, quoting, depth)?;

            if let Some(predicate) = Predicate::all(parts) {
                rules.push(predicate);
                params.extend(rule_params);
            }
        }

        debug!(node = node.name.as_str(), var, rules = rules.len(), "auth.guard");

        let predicate = match rules.len() {
            0 => return Ok(None),
            1 => rules.remove(0),
            _ => Predicate::Logical {
                op: LogicalOp::Or,
                operands: rules,
            },
        };

        Ok(Some(Fragment::new(predicate, params)))
    }

    fn compile_rule(
        &self,
        rule: &AuthRule,
        node: &Node,
        var: &str,
        scope: &ParamScope,
        quoting: Quoting,
        depth: usize,
    ) -> Result<(Vec<Predicate>, Params)> {
        let mut parts = Vec::new();
        let mut params = Params::new();

        if rule.is_authenticated == Some(true) {
            parts.push(Predicate::comparison("$auth.isAuthenticated = true"));
        }

        if let Some(roles) = rule.roles.as_ref().filter(|r| !r.is_empty()) {
            let q = quoting.quote();
            let list = roles
                .iter()
                .map(|r| format!("{}{}{}", q, r, q))
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(Predicate::comparison(format!(
                "ANY(r IN [{}] WHERE ANY(rr IN $auth.roles WHERE r = rr))",
                list
            )));
        }

        match &rule.allow {
            // A claim the request does not carry can never satisfy the rule
            Some(Allow::Where(filter)) if self.ctx.has_unresolved(&Value::Object(filter.clone())) => {
                parts.push(Predicate::comparison("false"));
            }
            Some(Allow::Where(filter)) => {
                let resolved = self.ctx.resolve_placeholders(&Value::Object(filter.clone()));
                if let Value::Object(resolved) = resolved {
                    let inner = WhereCompiler::new(self.ctx)
                        .compile_filter(&resolved, var, scope, node, true, depth + 1)?;
                    parts.extend(inner.predicates);
                    params.extend(inner.params);
                }
            }
            Some(Allow::Any(_)) if parts.is_empty() => {
                parts.push(Predicate::comparison("true"));
            }
            _ => {}
        }

        Ok((parts, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::test_fixtures::{movie_schema_with, ACTOR_AUTH};
    use serde_json::json;

    #[test]
    fn test_no_auth_no_guard() {
        let schema = movie_schema_with("");
        let ctx = Context::new(&schema);
        let actor = schema.node("Actor").unwrap();

        let guard = AuthGuardEmitter::new(&ctx)
            .compile(actor, AuthOperation::Connect, "a", "a", Quoting::Plain, 0)
            .unwrap();

        assert!(guard.is_none());
    }

    #[test]
    fn test_allow_and_roles_rules() {
        let schema = movie_schema_with(ACTOR_AUTH);
        let ctx = Context::new(&schema).with_jwt(json!({ "sub": "u1" }).as_object().unwrap().clone());
        let actor = schema.node("Actor").unwrap();

        let guard = AuthGuardEmitter::new(&ctx)
            .compile(actor, AuthOperation::Connect, "a0", "a0Actor1_allow", Quoting::Plain, 0)
            .unwrap()
            .unwrap();

        assert_eq!(
            guard.render(false),
            "(a0.id = $a0Actor1_allow_auth_allow0_id OR ANY(r IN [\"admin\"] WHERE ANY(rr IN $auth.roles WHERE r = rr)))"
        );
        assert_eq!(guard.params.get("a0Actor1_allow_auth_allow0_id"), Some(&json!("u1")));
        assert_eq!(guard.params.len(), 1);
    }

    #[test]
    fn test_escaped_quoting() {
        let schema = movie_schema_with(ACTOR_AUTH);
        let ctx = Context::new(&schema);
        let actor = schema.node("Actor").unwrap();

        let guard = AuthGuardEmitter::new(&ctx)
            .compile(actor, AuthOperation::Connect, "a", "a", Quoting::Escaped, 0)
            .unwrap()
            .unwrap();

        assert!(guard.render(false).contains("[\\\"admin\\\"]"));
    }

    #[test]
    fn test_missing_claim_never_matches() {
        let schema = movie_schema_with(ACTOR_AUTH);
        let ctx = Context::new(&schema);
        let actor = schema.node("Actor").unwrap();

        let guard = AuthGuardEmitter::new(&ctx)
            .compile(actor, AuthOperation::Connect, "a", "a", Quoting::Plain, 0)
            .unwrap()
            .unwrap();

        assert!(guard.render(false).starts_with("(false OR ANY("));
        assert!(guard.params.is_empty());
    }

    #[test]
    fn test_rules_for_other_operations_are_skipped() {
        let schema = movie_schema_with(ACTOR_AUTH);
        let ctx = Context::new(&schema);
        let actor = schema.node("Actor").unwrap();

        let guard = AuthGuardEmitter::new(&ctx)
            .compile(actor, AuthOperation::Delete, "a", "a", Quoting::Plain, 0)
            .unwrap()
            .unwrap();

        // Only the rule without an operations list applies to DELETE
        assert_eq!(
            guard.render(false),
            "ANY(r IN [\"admin\"] WHERE ANY(rr IN $auth.roles WHERE r = rr))"
        );
    }
}
