//! Predicate tree built by the compilers and rendered to Cypher at the end

use serde_json::Value;
use std::fmt;

use super::params::Params;

/// AND / OR grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "AND" => Some(LogicalOp::And),
            "OR" => Some(LogicalOp::Or),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        }
    }
}

/// List predicate over a traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    Any,
    None,
}

impl Quantifier {
    /// `NONE` for the `_NOT` form of a relationship filter
    pub fn for_not(is_not: bool) -> Self {
        if is_not {
            Quantifier::None
        } else {
            Quantifier::Any
        }
    }
}

impl fmt::Display for Quantifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantifier::Any => f.write_str("ANY"),
            Quantifier::None => f.write_str("NONE"),
        }
    }
}

/// A boolean Cypher expression
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// A leaf comparison, e.g. `this.title = $this_title`
    Comparison(String),

    /// `(NOT inner)`
    Not(Box<Predicate>),

    /// `(a OR b ...)`
    Logical { op: LogicalOp, operands: Vec<Predicate> },

    /// `EXISTS(pattern)` / `NOT EXISTS(pattern)`
    Exists { pattern: String, negated: bool },

    /// `ANY(var IN list WHERE body)`
    Quantified {
        quantifier: Quantifier,
        variable: String,
        list: String,
        body: Box<Predicate>,
    },

    /// Sibling predicates joined with AND, no parentheses
    All(Vec<Predicate>),
}

impl Predicate {
    pub fn comparison(text: impl Into<String>) -> Self {
        Predicate::Comparison(text.into())
    }

    /// Wrap in `(NOT ...)` when `negate` is set
    pub fn negate_if(self, negate: bool) -> Self {
        if negate {
            Predicate::Not(Box::new(self))
        } else {
            self
        }
    }

    /// Collapse a list of siblings into one predicate
    pub fn all(mut predicates: Vec<Predicate>) -> Option<Self> {
        match predicates.len() {
            0 => None,
            1 => predicates.pop(),
            _ => Some(Predicate::All(predicates)),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Comparison(text) => f.write_str(text),
            Predicate::Not(inner) => match inner.as_ref() {
                Predicate::All(items) if items.len() > 1 => write!(f, "(NOT ({}))", inner),
                _ => write!(f, "(NOT {})", inner),
            },
            Predicate::Logical { op, operands } => {
                f.write_str("(")?;
                write_joined(f, operands, op.as_str())?;
                f.write_str(")")
            }
            Predicate::Exists { pattern, negated } => {
                if *negated {
                    f.write_str("NOT ")?;
                }
                write!(f, "EXISTS({})", pattern)
            }
            Predicate::Quantified {
                quantifier,
                variable,
                list,
                body,
            } => write!(f, "{}({} IN {} WHERE {})", quantifier, variable, list, body),
            Predicate::All(items) => write_joined(f, items, "AND"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Predicate], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", sep)?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Clause pieces and their parameters, kept apart until rendering
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub predicates: Vec<Predicate>,
    pub params: Params,
}

impl Fragment {
    pub fn new(predicate: Predicate, params: Params) -> Self {
        Fragment {
            predicates: vec![predicate],
            params,
        }
    }

    /// A predicate that binds nothing
    pub fn bare(predicate: Predicate) -> Self {
        Self::new(predicate, Params::new())
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn push(&mut self, other: Fragment) {
        self.predicates.extend(other.predicates);
        self.params.extend(other.params);
    }

    pub fn into_parts(self) -> (Option<Predicate>, Params) {
        (Predicate::all(self.predicates), self.params)
    }

    /// Render as clause text, with a leading `WHERE ` when `top_level`
    pub fn render(&self, top_level: bool) -> String {
        if self.predicates.is_empty() {
            return String::new();
        }

        let body = self
            .predicates
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(" AND ");

        if top_level {
            format!("WHERE {}", body)
        } else {
            body
        }
    }
}

/// Render a JSON value as a Cypher literal (used for coalesce defaults)
pub fn cypher_literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(cypher_literal).collect::<Vec<_>>().join(", ")
        ),
        Value::Object(map) => format!(
            "{{{}}}",
            map.iter()
                .map(|(k, v)| format!("{}: {}", k, cypher_literal(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}
