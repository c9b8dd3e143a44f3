//! Request context shared by one compilation

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::schema::Schema;

/// Default recursion limit for nested filter and connect inputs
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// The selected field and its arguments, as seen by the resolver
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolveTree {
    pub name: String,

    #[serde(default)]
    pub args: Map<String, Value>,
}

/// Everything a compilation reads besides its input
#[derive(Debug, Clone)]
pub struct Context<'a> {
    pub schema: &'a Schema,

    pub resolve_tree: ResolveTree,

    /// Decoded JWT claims, addressed as `$jwt.<path>`
    pub jwt: Map<String, Value>,

    /// Request values, addressed as `$context.<path>`
    pub values: Map<String, Value>,

    pub max_depth: usize,
}

impl<'a> Context<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Context {
            schema,
            resolve_tree: ResolveTree::default(),
            jwt: Map::new(),
            values: Map::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_resolve_tree(mut self, resolve_tree: ResolveTree) -> Self {
        self.resolve_tree = resolve_tree;
        self
    }

    pub fn with_jwt(mut self, jwt: Map<String, Value>) -> Self {
        self.jwt = jwt;
        self
    }

    pub fn with_values(mut self, values: Map<String, Value>) -> Self {
        self.values = values;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub(crate) fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(Error::DepthLimitExceeded {
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    /// Look up `$jwt.a.b` or `$context.a.b`; anything else is not a placeholder
    pub fn resolve_placeholder(&self, s: &str) -> Option<&Value> {
        let (root, path) = if let Some(path) = s.strip_prefix("$jwt.") {
            (&self.jwt, path)
        } else if let Some(path) = s.strip_prefix("$context.") {
            (&self.values, path)
        } else {
            return None;
        };

        let mut segments = path.split('.');
        let first = root.get(segments.next()?)?;
        segments.try_fold(first, |value, segment| value.get(segment))
    }

    /// Replace every placeholder string inside `value`; unresolvable ones become null
    pub fn resolve_placeholders(&self, value: &Value) -> Value {
        match value {
            Value::String(s) if is_placeholder(s) => {
                self.resolve_placeholder(s).cloned().unwrap_or(Value::Null)
            }
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.resolve_placeholders(v)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve_placeholders(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Whether `value` holds a placeholder this request cannot resolve
    pub fn has_unresolved(&self, value: &Value) -> bool {
        match value {
            Value::String(s) => is_placeholder(s) && self.resolve_placeholder(s).is_none(),
            Value::Array(items) => items.iter().any(|v| self.has_unresolved(v)),
            Value::Object(map) => map.values().any(|v| self.has_unresolved(v)),
            _ => false,
        }
    }
}

fn is_placeholder(s: &str) -> bool {
    s.starts_with("$jwt.") || s.starts_with("$context.")
}
