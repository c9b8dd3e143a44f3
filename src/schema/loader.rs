//! Schema loader - parses schema.yaml

use anyhow::{Context, Result};
use std::path::Path;

use super::{Schema, SchemaDefinition};
use crate::error::Error;

/// Load and index a schema from a YAML file
pub fn load_schema(schema_path: &Path) -> Result<Schema> {
    let contents = std::fs::read_to_string(schema_path)
        .with_context(|| format!("Failed to read schema file: {}", schema_path.display()))?;

    let schema = parse_schema(&contents)
        .with_context(|| format!("Failed to parse schema file: {}", schema_path.display()))?;

    Ok(schema)
}

/// Parse a schema description from YAML text
pub fn parse_schema(contents: &str) -> crate::Result<Schema> {
    let def: SchemaDefinition =
        serde_yaml::from_str(contents).map_err(|e| Error::Schema(e.to_string()))?;

    Schema::try_from(def)
}

/// Create an example schema.yaml file
pub fn create_default_schema(dir: &Path) -> Result<()> {
    let schema_path = dir.join("schema.yaml");

    let default_schema = r#"# Schema description for cyt
# Nodes list their scalar fields, relationship fields and connection fields.

nodes:
  - name: Movie
    fields:
      - { name: title, type: String }
      - { name: released, type: DateTime }
      - { name: runtime, type: Duration }
      - { name: rating, type: Float, default: 0 }
    relationships:
      - { name: actors, type: ACTED_IN, direction: IN, target: Actor, array: true, properties: ActedIn }
    connections:
      - { name: actorsConnection, relationship: actors }

  - name: Actor
    fields:
      - { name: id, type: ID }
      - { name: name, type: String }
      - { name: location, type: Point }
    relationships:
      - { name: movies, type: ACTED_IN, direction: OUT, target: Movie, array: true, properties: ActedIn }
    auth:
      rules:
        - operations: [CONNECT]
          allow: { id: "$jwt.sub" }

relationships:
  - name: ActedIn
    fields:
      - { name: screenTime, type: Int }
"#;

    std::fs::write(&schema_path, default_schema)
        .with_context(|| format!("Failed to write schema file: {}", schema_path.display()))?;

    Ok(())
}
