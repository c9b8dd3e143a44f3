//! Connection filters - `{ node: {...}, edge: {...} }` over a relationship's edges

use serde_json::{Map, Value};
use tracing::trace;

use super::context::Context;
use super::params::{ParamScope, Params};
use super::predicate::{Fragment, LogicalOp, Predicate};
use super::where_clause::WhereCompiler;
use crate::error::{Error, Result};
use crate::schema::{Node, Relationship};

/// Compiles the per-target body of a connection filter.
///
/// Parameter references are paths into one structured parameter, so the
/// scope handed in is always nested.
pub struct ConnectionWhereCompiler<'a> {
    ctx: &'a Context<'a>,
}

impl<'a> ConnectionWhereCompiler<'a> {
    pub fn new(ctx: &'a Context<'a>) -> Self {
        ConnectionWhereCompiler { ctx }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn compile(
        &self,
        input: &Map<String, Value>,
        node: &Node,
        node_var: &str,
        relationship: Option<&Relationship>,
        relationship_var: &str,
        prefix: &ParamScope,
        depth: usize,
    ) -> Result<Fragment> {
        self.ctx.check_depth(depth)?;

        let where_compiler = WhereCompiler::new(self.ctx);
        let mut acc = Fragment::default();

        for (key, value) in input {
            let param = prefix.child(key);
            trace!(key = key.as_str(), param = param.as_str(), "connection.key");

            if let Some(op) = LogicalOp::from_key(key) {
                let items = value
                    .as_array()
                    .ok_or_else(|| Error::shape(key, "an array of connection filters"))?;

                let mut operands = Vec::new();
                let mut params = Params::new();

                for (i, item) in items.iter().enumerate() {
                    let item = item
                        .as_object()
                        .ok_or_else(|| Error::shape(key, "an array of connection filters"))?;
                    let inner = self.compile(
                        item,
                        node,
                        node_var,
                        relationship,
                        relationship_var,
                        &param.branch(i),
                        depth + 1,
                    )?;
                    let (predicate, inner_params) = inner.into_parts();

                    if let Some(predicate) = predicate {
                        operands.push(predicate);
                        params.extend(inner_params);
                    }
                }

                if !operands.is_empty() {
                    acc.push(Fragment::new(Predicate::Logical { op, operands }, params));
                }
                continue;
            }

            let (target, negate) = match key.as_str() {
                "node" => ("node", false),
                "node_NOT" => ("node", true),
                "edge" => ("edge", false),
                "edge_NOT" => ("edge", true),
                _ => return Err(Error::InvalidKey { key: key.clone() }),
            };

            let filter = value
                .as_object()
                .ok_or_else(|| Error::shape(key, "a filter object"))?;

            let inner = if target == "node" {
                where_compiler.compile_filter(filter, node_var, &param, node, true, depth + 1)?
            } else {
                let relationship = relationship.ok_or_else(|| Error::unknown_relationship(key))?;
                where_compiler.compile_filter(
                    filter,
                    relationship_var,
                    &param,
                    relationship,
                    true,
                    depth + 1,
                )?
            };

            let (predicate, params) = inner.into_parts();
            if let Some(predicate) = predicate {
                acc.push(Fragment::new(predicate.negate_if(negate), params));
            }
        }

        Ok(acc)
    }
}
