//! Parameter naming and the parameter table

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Parameters bound alongside a generated clause
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, Value>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        merge_into(&mut self.0, name.into(), value);
    }

    /// Bind `value` at a path such as `this_movies.where.actorsConnection.OR[1].node.name`
    pub fn insert_path(&mut self, path: &str, value: Value) {
        let mut segments = parse_path(path);
        if segments.is_empty() {
            return;
        }

        let root = match segments.remove(0) {
            Segment::Key(k) => k,
            Segment::Index(i) => i.to_string(),
        };

        let nested = segments.into_iter().rev().fold(value, |inner, seg| match seg {
            Segment::Key(k) => {
                let mut map = Map::new();
                map.insert(k, inner);
                Value::Object(map)
            }
            Segment::Index(i) => {
                let mut items = vec![Value::Null; i];
                items.push(inner);
                Value::Array(items)
            }
        });

        merge_into(&mut self.0, root, nested);
    }

    /// Merge another table into this one; object values merge key by key
    pub fn extend(&mut self, other: Params) {
        for (name, value) in other.0 {
            merge_into(&mut self.0, name, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

fn merge_into(map: &mut BTreeMap<String, Value>, name: String, value: Value) {
    match map.get_mut(&name) {
        Some(existing) => merge_value(existing, value),
        None => {
            map.insert(name, value);
        }
    }
}

fn merge_value(target: &mut Value, value: Value) {
    match (target, value) {
        (Value::Object(target), Value::Object(source)) => {
            for (k, v) in source {
                match target.get_mut(&k) {
                    Some(existing) => merge_value(existing, v),
                    None => {
                        target.insert(k, v);
                    }
                }
            }
        }
        (Value::Array(target), Value::Array(source)) => {
            for (i, v) in source.into_iter().enumerate() {
                if i < target.len() {
                    // Nulls here are padding from insert_path
                    if !v.is_null() {
                        merge_value(&mut target[i], v);
                    }
                } else {
                    target.push(v);
                }
            }
        }
        (target, value) => *target = value,
    }
}

#[derive(Debug, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
}

fn parse_path(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();

    for part in path.split('.') {
        let (key, mut rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };

        if !key.is_empty() {
            segments.push(Segment::Key(key.to_string()));
        }

        // Trailing [n][m] indexes
        while let Some(end) = rest.find(']') {
            if let Ok(i) = rest[1..end].parse::<usize>() {
                segments.push(Segment::Index(i));
            }
            rest = &rest[end + 1..];
        }
    }

    segments
}

/// Parameter namer.
///
/// A scope is the prefix every parameter below it is named from. Flat scopes
/// produce `scope_key` names bound individually; nested scopes produce
/// `scope.key` paths into one structured parameter.
///
/// A flat scope also tracks `path`, the same position written the nested way
/// (`this_movies.where.OR[1].actorsConnection`). Filters that bind structured
/// parameters below a flat scope start from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamScope {
    Flat { name: String, path: String },
    Nested(String),
}

impl ParamScope {
    /// Flat scope whose nested path starts at its own name
    pub fn flat(name: impl Into<String>) -> Self {
        let name = name.into();
        ParamScope::Flat {
            path: name.clone(),
            name,
        }
    }

    /// Flat scope with an explicit nested path root
    pub fn flat_at(name: impl Into<String>, path: impl Into<String>) -> Self {
        ParamScope::Flat {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ParamScope::Flat { name, .. } => name,
            ParamScope::Nested(s) => s,
        }
    }

    pub fn is_nested(&self) -> bool {
        matches!(self, ParamScope::Nested(_))
    }

    /// Scope for an input key below this one
    pub fn child(&self, key: &str) -> Self {
        match self {
            ParamScope::Flat { name, path } => ParamScope::Flat {
                name: format!("{}_{}", name, key),
                path: format!("{}.{}", path, key),
            },
            ParamScope::Nested(s) => ParamScope::Nested(format!("{}.{}", s, key)),
        }
    }

    /// Scope for element `index` of an AND/OR array.
    ///
    /// Flat names leave the first element unsuffixed so a single-element
    /// array names its parameters the same as a bare filter would.
    pub fn branch(&self, index: usize) -> Self {
        match self {
            ParamScope::Flat { name, path } => ParamScope::Flat {
                name: match index {
                    0 => name.clone(),
                    _ => format!("{}{}", name, index),
                },
                path: format!("{}[{}]", path, index),
            },
            ParamScope::Nested(s) => ParamScope::Nested(format!("{}[{}]", s, index)),
        }
    }

    /// The nested scope at the same position
    pub fn nested(&self) -> Self {
        match self {
            ParamScope::Flat { path, .. } => ParamScope::Nested(path.clone()),
            ParamScope::Nested(_) => self.clone(),
        }
    }

    /// `$name` reference used in query text
    pub fn reference(&self) -> String {
        format!("${}", self.as_str())
    }

    /// A Cypher identifier derived from this scope
    pub fn variable(&self) -> String {
        match self {
            ParamScope::Flat { name, .. } => name.clone(),
            ParamScope::Nested(s) => s
                .chars()
                .filter(|&c| c != ']')
                .map(|c| if c == '.' || c == '[' { '_' } else { c })
                .collect(),
        }
    }

    pub fn bind(&self, params: &mut Params, value: Value) {
        match self {
            ParamScope::Flat { name, .. } => params.insert(name.clone(), value),
            ParamScope::Nested(s) => params.insert_path(s, value),
        }
    }
}
