//! Translate module - filter and connect inputs to parameterized Cypher

mod aggregate;
mod auth;
mod classify;
mod connect;
mod connection_where;
mod context;
mod params;
mod predicate;
mod where_clause;

pub use aggregate::AggregateCompiler;
pub use auth::{AuthGuardEmitter, Quoting, AUTH_FORBIDDEN_ERROR};
pub use classify::{classify, FieldCategory};
pub use connect::{ConnectArgs, ConnectBuilder, Statements};
pub use connection_where::ConnectionWhereCompiler;
pub use context::{Context, ResolveTree, DEFAULT_MAX_DEPTH};
pub use params::{ParamScope, Params};
pub use predicate::{cypher_literal, Fragment, LogicalOp, Predicate, Quantifier};
pub use where_clause::WhereCompiler;

#[cfg(test)]
pub(crate) mod test_fixtures {
    use crate::schema::{parse_schema, Schema};

    /// Auth block for the Actor node: connect needs the caller's own id, admins may do anything
    pub const ACTOR_AUTH: &str = r#"
    auth:
      rules:
        - operations: [CONNECT]
          allow: { id: "$jwt.sub" }
        - roles: [admin]
"#;

    pub fn movie_schema() -> Schema {
        movie_schema_with("")
    }

    /// The movie schema with `actor_auth` spliced into the Actor node
    pub fn movie_schema_with(actor_auth: &str) -> Schema {
        let yaml = format!(
            r#"
nodes:
  - name: Movie
    fields:
      - {{ name: name, type: String }}
      - {{ name: title, type: String }}
      - {{ name: tags, type: String, array: true }}
      - {{ name: released, type: DateTime }}
      - {{ name: runtime, type: Duration }}
      - {{ name: rating, type: Float, default: 0 }}
      - {{ name: location, type: Point }}
      - {{ name: locations, type: Point, array: true }}
    relationships:
      - {{ name: actors, type: ACTED_IN, direction: IN, target: Actor, array: true, properties: ActedIn }}
      - {{ name: genres, type: IN_GENRE, direction: OUT, target: Genre, array: true }}
      - {{ name: search, type: SEARCH, direction: OUT, target: Search, union: [Actor, Genre], array: true }}
    connections:
      - {{ name: actorsConnection, relationship: actors }}
      - {{ name: searchConnection, relationship: search }}

  - name: Actor
    fields:
      - {{ name: id, type: ID }}
      - {{ name: name, type: String }}
    relationships:
      - {{ name: movies, type: ACTED_IN, direction: OUT, target: Movie, array: true, properties: ActedIn }}
    connections:
      - {{ name: moviesConnection, relationship: movies }}
{}
  - name: Genre
    fields:
      - {{ name: name, type: String }}

relationships:
  - name: ActedIn
    fields:
      - {{ name: screenTime, type: Int }}
      - {{ name: role, type: String }}
"#,
            actor_auth.trim_end()
        );

        parse_schema(&yaml).unwrap()
    }
}
