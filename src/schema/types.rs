//! Schema type definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::translate::Context;

/// Raw schema description as written in schema.yaml
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaDefinition {
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,

    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

/// Raw node description; connection fields refer to relationship fields by name
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeDefinition {
    pub name: String,

    /// Labels used instead of the node name (may contain `$jwt.` / `$context.` placeholders)
    #[serde(default)]
    pub labels: Vec<String>,

    #[serde(default)]
    pub fields: Vec<ScalarField>,

    #[serde(default)]
    pub relationships: Vec<RelationField>,

    #[serde(default)]
    pub connections: Vec<ConnectionDefinition>,

    #[serde(default)]
    pub auth: Option<Auth>,
}

/// A connection field as written in schema.yaml
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionDefinition {
    pub name: String,

    /// Name of the relationship field on the same node this connection pages over
    pub relationship: String,
}

/// The complete, indexed schema.
///
/// Built once and read-only afterwards; lookups by name are hash lookups.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    nodes: Vec<Node>,
    relationships: Vec<Relationship>,
    node_index: HashMap<String, usize>,
    relationship_index: HashMap<String, usize>,
}

impl Schema {
    pub fn new(nodes: Vec<Node>, relationships: Vec<Relationship>) -> Self {
        let node_index = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.name.clone(), i))
            .collect();
        let relationship_index = relationships
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.clone(), i))
            .collect();

        Schema {
            nodes,
            relationships,
            node_index,
            relationship_index,
        }
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.node_index.get(name).map(|&i| &self.nodes[i])
    }

    /// Like [`Schema::node`] but a missing node is a reference error
    pub fn require_node(&self, name: &str) -> Result<&Node> {
        self.node(name).ok_or_else(|| Error::unknown_node(name))
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationship_index
            .get(name)
            .map(|&i| &self.relationships[i])
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }
}

impl TryFrom<SchemaDefinition> for Schema {
    type Error = Error;

    fn try_from(def: SchemaDefinition) -> Result<Self> {
        let nodes = def
            .nodes
            .into_iter()
            .map(Node::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Schema::new(nodes, def.relationships))
    }
}

/// Anything filters can be compiled against: nodes and relationship property sets
pub trait Entity {
    fn name(&self) -> &str;

    fn fields(&self) -> &FieldSet;

    fn relation_fields(&self) -> &[RelationField] {
        &[]
    }

    fn connection_fields(&self) -> &[ConnectionField] {
        &[]
    }
}

/// A node type (Movie, Actor, ...)
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub name: String,
    pub labels: Vec<String>,
    pub fields: FieldSet,
    pub relation_fields: Vec<RelationField>,
    pub connection_fields: Vec<ConnectionField>,
    pub auth: Option<Auth>,
}

impl Node {
    /// Label string for patterns, e.g. `:Movie` or `:Movie:Tenant42`
    pub fn label_string(&self, ctx: &Context) -> String {
        if self.labels.is_empty() {
            return format!(":{}", self.name);
        }

        self.labels
            .iter()
            .map(|label| {
                let resolved = ctx
                    .resolve_placeholder(label)
                    .and_then(|v| v.as_str().map(String::from))
                    .unwrap_or_else(|| label.clone());
                format!(":{}", resolved)
            })
            .collect()
    }

    pub fn relation_field(&self, name: &str) -> Option<&RelationField> {
        self.relation_fields.iter().find(|f| f.name == name)
    }
}

impl Entity for Node {
    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> &FieldSet {
        &self.fields
    }

    fn relation_fields(&self) -> &[RelationField] {
        &self.relation_fields
    }

    fn connection_fields(&self) -> &[ConnectionField] {
        &self.connection_fields
    }
}

impl TryFrom<NodeDefinition> for Node {
    type Error = Error;

    fn try_from(def: NodeDefinition) -> Result<Self> {
        let mut connection_fields = Vec::with_capacity(def.connections.len());

        for conn in &def.connections {
            let relationship = def
                .relationships
                .iter()
                .find(|r| r.name == conn.relationship)
                .ok_or_else(|| Error::unknown_field(&conn.relationship))?;

            // Edge properties type, or the conventional <Node><Field>Relationship name
            let relationship_type_name = relationship
                .properties
                .clone()
                .unwrap_or_else(|| format!("{}{}Relationship", def.name, upper_first(&relationship.name)));

            connection_fields.push(ConnectionField {
                name: conn.name.clone(),
                relationship: relationship.clone(),
                relationship_type_name,
            });
        }

        Ok(Node {
            name: def.name,
            labels: def.labels,
            fields: FieldSet::from(def.fields),
            relation_fields: def.relationships,
            connection_fields,
            auth: def.auth,
        })
    }
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Scalar fields of an entity, grouped the way the compiler dispatches on them
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "Vec<ScalarField>")]
pub struct FieldSet {
    pub primitive: Vec<ScalarField>,
    pub temporal: Vec<ScalarField>,
    pub point: Vec<ScalarField>,
}

impl FieldSet {
    pub fn primitive(&self, name: &str) -> Option<&ScalarField> {
        self.primitive.iter().find(|f| f.name == name)
    }

    pub fn temporal(&self, name: &str) -> Option<&ScalarField> {
        self.temporal.iter().find(|f| f.name == name)
    }

    pub fn point(&self, name: &str) -> Option<&ScalarField> {
        self.point.iter().find(|f| f.name == name)
    }

    /// Any scalar field by name, primitive first
    pub fn get(&self, name: &str) -> Option<&ScalarField> {
        self.iter().find(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScalarField> {
        self.primitive
            .iter()
            .chain(self.temporal.iter())
            .chain(self.point.iter())
    }
}

impl From<Vec<ScalarField>> for FieldSet {
    fn from(fields: Vec<ScalarField>) -> Self {
        let mut set = FieldSet::default();

        for field in fields {
            match field.kind.group() {
                FieldGroup::Primitive => set.primitive.push(field),
                FieldGroup::Temporal => set.temporal.push(field),
                FieldGroup::Point => set.point.push(field),
            }
        }

        set
    }
}

/// Definition of a scalar field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalarField {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: ScalarKind,

    #[serde(default)]
    pub array: bool,

    /// Database property name when it differs from the field name
    #[serde(default)]
    pub alias: Option<String>,

    /// Value substituted for a missing property when filtering
    #[serde(default)]
    pub default: Option<Value>,
}

impl ScalarField {
    pub fn db_property(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Scalar types supported by the schema
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScalarKind {
    #[serde(rename = "ID")]
    Id,
    String,
    Int,
    Float,
    BigInt,
    Boolean,
    DateTime,
    Date,
    Time,
    LocalTime,
    LocalDateTime,
    Duration,
    Point,
    CartesianPoint,
}

/// Which field group a scalar kind lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldGroup {
    Primitive,
    Temporal,
    Point,
}

impl ScalarKind {
    pub fn group(self) -> FieldGroup {
        match self {
            ScalarKind::DateTime
            | ScalarKind::Date
            | ScalarKind::Time
            | ScalarKind::LocalTime
            | ScalarKind::LocalDateTime => FieldGroup::Temporal,
            ScalarKind::Point | ScalarKind::CartesianPoint => FieldGroup::Point,
            _ => FieldGroup::Primitive,
        }
    }

    pub fn is_string(self) -> bool {
        matches!(self, ScalarKind::String | ScalarKind::Id)
    }
}

/// Edge direction relative to the owning node
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    In,
    Out,
    #[default]
    Undirected,
}

impl Direction {
    /// Arrow pieces placed before and after the relationship brackets
    pub fn arrows(self) -> (&'static str, &'static str) {
        match self {
            Direction::In => ("<-", "-"),
            Direction::Out => ("-", "->"),
            Direction::Undirected => ("-", "-"),
        }
    }
}

/// A field that traverses a relationship to another node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationField {
    pub name: String,

    /// Relationship type token, e.g. ACTED_IN
    #[serde(rename = "type")]
    pub rel_type: String,

    #[serde(default)]
    pub direction: Direction,

    /// Target node name (or union name)
    pub target: String,

    /// Member node names when the target is a union
    #[serde(default)]
    pub union: Option<Vec<String>>,

    #[serde(default)]
    pub array: bool,

    /// Name of the Relationship carrying edge properties
    #[serde(default)]
    pub properties: Option<String>,
}

impl RelationField {
    pub fn is_union(&self) -> bool {
        self.union.is_some()
    }

    /// `(var)-[:TYPE]->(rest)` with an optional relationship variable
    pub fn pattern(&self, from: &str, rel_var: Option<&str>, to: &str) -> String {
        let (in_str, out_str) = self.direction.arrows();
        format!(
            "({}){}[{}:{}]{}({})",
            from,
            in_str,
            rel_var.unwrap_or(""),
            self.rel_type,
            out_str,
            to
        )
    }
}

/// A paginated view over a relationship, including edge properties
#[derive(Debug, Clone)]
pub struct ConnectionField {
    pub name: String,
    pub relationship: RelationField,

    /// Name of the Relationship used for edge-property filtering
    pub relationship_type_name: String,
}

/// Edge property set of a relationship
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Relationship {
    pub name: String,

    #[serde(default)]
    pub fields: FieldSet,
}

impl Entity for Relationship {
    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> &FieldSet {
        &self.fields
    }
}

/// Authorization rules on a node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Auth {
    #[serde(default)]
    pub rules: Vec<AuthRule>,
}

/// A single authorization rule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRule {
    /// Operations the rule applies to; all operations when absent
    #[serde(default)]
    pub operations: Option<Vec<AuthOperation>>,

    #[serde(default)]
    pub is_authenticated: Option<bool>,

    #[serde(default)]
    pub roles: Option<Vec<String>>,

    #[serde(default)]
    pub allow: Option<Allow>,
}

impl AuthRule {
    pub fn applies_to(&self, op: AuthOperation) -> bool {
        self.operations.as_ref().map_or(true, |ops| ops.contains(&op))
    }
}

/// Operations an auth rule can guard
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthOperation {
    Create,
    Read,
    Update,
    Delete,
    Connect,
    Disconnect,
}

/// `allow` part of a rule: `"*"` or a where-like map
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Allow {
    Any(String),
    Where(serde_json::Map<String, Value>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_set_groups_by_kind() {
        let fields: FieldSet = serde_yaml::from_str(
            r#"
- { name: title, type: String }
- { name: released, type: DateTime }
- { name: location, type: Point }
- { name: runtime, type: Duration }
"#,
        )
        .unwrap();

        assert_eq!(fields.primitive.len(), 2);
        assert_eq!(fields.temporal.len(), 1);
        assert_eq!(fields.point.len(), 1);
        assert_eq!(fields.get("runtime").unwrap().kind, ScalarKind::Duration);
    }

    #[test]
    fn test_relation_pattern() {
        let field = RelationField {
            name: "actors".to_string(),
            rel_type: "ACTED_IN".to_string(),
            direction: Direction::In,
            target: "Actor".to_string(),
            union: None,
            array: true,
            properties: None,
        };

        assert_eq!(
            field.pattern("this", None, ":Actor"),
            "(this)<-[:ACTED_IN]-(:Actor)"
        );
        assert_eq!(
            field.pattern("this", Some("r"), "a:Actor"),
            "(this)<-[r:ACTED_IN]-(a:Actor)"
        );
    }

    #[test]
    fn test_connection_relationship_type_name() {
        let def = NodeDefinition {
            name: "Movie".to_string(),
            relationships: vec![RelationField {
                name: "actors".to_string(),
                rel_type: "ACTED_IN".to_string(),
                direction: Direction::In,
                target: "Actor".to_string(),
                union: None,
                array: true,
                properties: None,
            }],
            connections: vec![ConnectionDefinition {
                name: "actorsConnection".to_string(),
                relationship: "actors".to_string(),
            }],
            ..Default::default()
        };

        let node = Node::try_from(def).unwrap();
        assert_eq!(
            node.connection_fields[0].relationship_type_name,
            "MovieActorsRelationship"
        );
    }

    #[test]
    fn test_connection_to_missing_relationship() {
        let def = NodeDefinition {
            name: "Movie".to_string(),
            connections: vec![ConnectionDefinition {
                name: "actorsConnection".to_string(),
                relationship: "actors".to_string(),
            }],
            ..Default::default()
        };

        assert!(matches!(
            Node::try_from(def),
            Err(Error::SchemaReference { kind: "field", .. })
        ));
    }
}
