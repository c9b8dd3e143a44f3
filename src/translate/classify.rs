//! Field classifier - decides how a filter key is compiled

use crate::error::{Error, Result};
use crate::parser::FieldKey;
use crate::schema::{ConnectionField, Entity, RelationField, ScalarField, ScalarKind};

/// What a filter key addresses on the current entity
#[derive(Debug, Clone, Copy)]
pub enum FieldCategory<'e> {
    /// `<relationship>Aggregate`
    Aggregate(&'e RelationField),
    Relationship(&'e RelationField),
    Connection(&'e ConnectionField),
    Point(&'e ScalarField),
    Duration(&'e ScalarField),
    /// Any other field; `None` when the schema does not declare it
    Scalar(Option<&'e ScalarField>),
}

/// Classify a parsed key against an entity.
///
/// Checked in priority order: aggregate, relationship, connection, point,
/// duration, scalar. Field names are unique across groups so at most one
/// category can match.
pub fn classify<'e>(key: &FieldKey<'_>, entity: &'e dyn Entity) -> Result<FieldCategory<'e>> {
    let name = key.field_name;
    let relation = entity.relation_fields().iter().find(|f| f.name == name);

    if key.is_aggregate {
        return relation
            .map(FieldCategory::Aggregate)
            .ok_or_else(|| Error::SchemaMisuse {
                field: name.to_string(),
            });
    }

    if let Some(rel) = relation {
        return Ok(FieldCategory::Relationship(rel));
    }

    if let Some(conn) = entity.connection_fields().iter().find(|f| f.name == name) {
        return Ok(FieldCategory::Connection(conn));
    }

    let fields = entity.fields();

    if let Some(point) = fields.point(name) {
        return Ok(FieldCategory::Point(point));
    }

    let scalar = fields.primitive(name).or_else(|| fields.temporal(name));

    match scalar {
        Some(f) if f.kind == ScalarKind::Duration => Ok(FieldCategory::Duration(f)),
        other => Ok(FieldCategory::Scalar(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_field_key;
    use crate::translate::test_fixtures::movie_schema;

    fn category(key: &str) -> Result<&'static str> {
        let schema = movie_schema();
        let movie = schema.node("Movie").unwrap();
        let key = parse_field_key(key).unwrap();

        classify(&key, movie).map(|c| match c {
            FieldCategory::Aggregate(_) => "aggregate",
            FieldCategory::Relationship(_) => "relationship",
            FieldCategory::Connection(_) => "connection",
            FieldCategory::Point(_) => "point",
            FieldCategory::Duration(_) => "duration",
            FieldCategory::Scalar(Some(_)) => "scalar",
            FieldCategory::Scalar(None) => "undeclared",
        })
    }

    #[test]
    fn test_categories() {
        assert_eq!(category("actorsAggregate").unwrap(), "aggregate");
        assert_eq!(category("actors_NOT").unwrap(), "relationship");
        assert_eq!(category("actorsConnection").unwrap(), "connection");
        assert_eq!(category("location_DISTANCE").unwrap(), "point");
        assert_eq!(category("runtime_GT").unwrap(), "duration");
        assert_eq!(category("title_CONTAINS").unwrap(), "scalar");
        assert_eq!(category("released").unwrap(), "scalar");
        assert_eq!(category("budget").unwrap(), "undeclared");
    }

    #[test]
    fn test_aggregate_on_scalar_is_misuse() {
        assert!(matches!(
            category("titleAggregate"),
            Err(Error::SchemaMisuse { .. })
        ));
    }
}
