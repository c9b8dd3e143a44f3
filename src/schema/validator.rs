//! Schema validator - checks cross references and naming in a loaded schema

use std::collections::HashSet;

use super::{Allow, Node, Schema};

/// How serious a validation finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Validation finding with context
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub node: String,
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}: {}", self.node, self.field, self.message)
    }
}

/// Validate every node of a schema
pub fn validate_schema(schema: &Schema) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for node in schema.nodes() {
        validate_node(node, schema, &mut errors);
    }

    errors
}

fn validate_node(node: &Node, schema: &Schema, errors: &mut Vec<ValidationError>) {
    let mut push = |field: &str, message: String, severity: Severity| {
        errors.push(ValidationError {
            node: node.name.clone(),
            field: field.to_string(),
            message,
            severity,
        });
    };

    // Field names must be unique across all groups so classification is unambiguous
    let mut seen = HashSet::new();
    let names = node
        .fields
        .iter()
        .map(|f| f.name.as_str())
        .chain(node.relation_fields.iter().map(|f| f.name.as_str()))
        .chain(node.connection_fields.iter().map(|f| f.name.as_str()));
    for name in names {
        if !seen.insert(name) {
            push(name, "Field name is declared more than once".to_string(), Severity::Error);
        }
    }

    for rel in &node.relation_fields {
        match &rel.union {
            Some(members) => {
                for member in members {
                    if schema.node(member).is_none() {
                        push(&rel.name, format!("Unknown union member '{}'", member), Severity::Error);
                    }
                }
            }
            None => {
                if schema.node(&rel.target).is_none() {
                    push(&rel.name, format!("Unknown target node '{}'", rel.target), Severity::Error);
                }
            }
        }

        if let Some(props) = &rel.properties {
            if schema.relationship(props).is_none() {
                push(&rel.name, format!("Unknown relationship properties '{}'", props), Severity::Error);
            }
        }
    }

    for conn in &node.connection_fields {
        // Connections without edge properties are fine, they just cannot filter on edges
        if schema.relationship(&conn.relationship_type_name).is_none() {
            push(
                &conn.name,
                format!("No relationship '{}', edge filters unavailable", conn.relationship_type_name),
                Severity::Warning,
            );
        }
    }

    if let Some(auth) = &node.auth {
        for (i, rule) in auth.rules.iter().enumerate() {
            if let Some(Allow::Any(s)) = &rule.allow {
                if s != "*" {
                    push("auth", format!("Rule {}: allow must be \"*\" or a map", i), Severity::Error);
                }
            }
        }
    }
}
