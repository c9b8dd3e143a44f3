//! Where-clause compiler - filter input to a Cypher predicate and parameters

use serde_json::{Map, Value};
use tracing::{debug, trace};

use super::aggregate::AggregateCompiler;
use super::classify::{classify, FieldCategory};
use super::connection_where::ConnectionWhereCompiler;
use super::context::Context;
use super::params::{ParamScope, Params};
use super::predicate::{cypher_literal, Fragment, LogicalOp, Predicate, Quantifier};
use crate::error::{Error, Result};
use crate::parser::{parse_field_key, FieldKey, Operator};
use crate::schema::{ConnectionField, Entity, FieldGroup, RelationField, ScalarField};

/// Compiles filter inputs (`{ title_CONTAINS: "x", actors: {...} }`) into predicates
pub struct WhereCompiler<'a> {
    ctx: &'a Context<'a>,
}

impl<'a> WhereCompiler<'a> {
    pub fn new(ctx: &'a Context<'a>) -> Self {
        WhereCompiler { ctx }
    }

    /// Compile `input` for the entity bound to `var_name`.
    ///
    /// Parameters are named from `chain` when given, otherwise from
    /// `var_name`. A top-level call (`recursing == false`) prefixes the
    /// clause with `WHERE `. Empty input gives an empty clause.
    pub fn compile(
        &self,
        input: &Map<String, Value>,
        var_name: &str,
        entity: &dyn Entity,
        chain: Option<&str>,
        recursing: bool,
    ) -> Result<(String, Params)> {
        debug!(
            var = var_name,
            entity = entity.name(),
            keys = input.len(),
            recursing,
            "where.compile"
        );

        // Connection filters bind below `<var>_<field>.where`, the resolver's own argument shape
        let scope = ParamScope::flat_at(
            chain.unwrap_or(var_name),
            format!("{}_{}.where", var_name, self.ctx.resolve_tree.name),
        );
        let fragment = self.compile_filter(input, var_name, &scope, entity, recursing, 0)?;
        let clause = fragment.render(!recursing);

        Ok((clause, fragment.params))
    }

    /// Compile one filter object; every key contributes at most one predicate
    pub(crate) fn compile_filter(
        &self,
        input: &Map<String, Value>,
        var: &str,
        scope: &ParamScope,
        entity: &dyn Entity,
        recursing: bool,
        depth: usize,
    ) -> Result<Fragment> {
        self.ctx.check_depth(depth)?;

        let mut acc = Fragment::default();

        for (key, value) in input {
            let param = scope.child(key);
            trace!(key = key.as_str(), param = param.as_str(), "where.key");

            let fragment = match LogicalOp::from_key(key) {
                Some(op) => self.compile_logical(op, key, value, var, &param, entity, depth)?,
                None => self.compile_field(key, value, var, &param, entity, recursing, depth)?,
            };
            acc.push(fragment);
        }

        Ok(acc)
    }

    #[allow(clippy::too_many_arguments)]
    fn compile_logical(
        &self,
        op: LogicalOp,
        key: &str,
        value: &Value,
        var: &str,
        param: &ParamScope,
        entity: &dyn Entity,
        depth: usize,
    ) -> Result<Fragment> {
        let items = value
            .as_array()
            .ok_or_else(|| Error::shape(key, "an array of filters"))?;

        let mut operands = Vec::new();
        let mut params = Params::new();

        for (i, item) in items.iter().enumerate() {
            let item = item
                .as_object()
                .ok_or_else(|| Error::shape(key, "an array of filters"))?;

            let inner = self.compile_filter(item, var, &param.branch(i), entity, true, depth + 1)?;
            let (predicate, inner_params) = inner.into_parts();

            // Empty branches vanish without shifting their siblings' names
            if let Some(predicate) = predicate {
                operands.push(predicate);
                params.extend(inner_params);
            }
        }

        if operands.is_empty() {
            return Ok(Fragment::default());
        }

        Ok(Fragment::new(Predicate::Logical { op, operands }, params))
    }

    #[allow(clippy::too_many_arguments)]
    fn compile_field(
        &self,
        key: &str,
        value: &Value,
        var: &str,
        param: &ParamScope,
        entity: &dyn Entity,
        recursing: bool,
        depth: usize,
    ) -> Result<Fragment> {
        let field_key = parse_field_key(key)?;

        match classify(&field_key, entity)? {
            FieldCategory::Aggregate(rel) => {
                AggregateCompiler::new(self.ctx).compile(key, value, var, param, rel, depth + 1)
            }
            FieldCategory::Relationship(rel) => {
                self.compile_relationship(key, &field_key, value, var, param, rel, depth)
            }
            FieldCategory::Connection(conn) => {
                self.compile_connection(key, &field_key, value, var, param, conn, recursing, depth)
            }
            _ if value.is_null() => Ok(null_check(&field_key, var, entity)),
            FieldCategory::Point(field) => Ok(point_comparison(&field_key, value, var, param, field)),
            FieldCategory::Duration(field) if is_duration_comparison(&field_key) => {
                Ok(duration_comparison(&field_key, value, var, param, field))
            }
            FieldCategory::Duration(field) => {
                Ok(scalar_comparison(&field_key, value, var, param, Some(field)))
            }
            FieldCategory::Scalar(field) => {
                Ok(scalar_comparison(&field_key, value, var, param, field))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn compile_relationship(
        &self,
        key: &str,
        field_key: &FieldKey<'_>,
        value: &Value,
        var: &str,
        param: &ParamScope,
        rel: &RelationField,
        depth: usize,
    ) -> Result<Fragment> {
        let ref_node = self.ctx.schema.require_node(&rel.target)?;
        let labels = ref_node.label_string(self.ctx);

        if value.is_null() {
            // `actors: null` means no related node; `actors_NOT: null` means at least one
            return Ok(Fragment::bare(Predicate::Exists {
                pattern: rel.pattern(var, None, &labels),
                negated: !field_key.is_not(),
            }));
        }

        let nested = value
            .as_object()
            .ok_or_else(|| Error::shape(key, "a filter object or null"))?;

        let hop = param.variable();
        let inner = self.compile_filter(nested, &hop, param, ref_node, true, depth + 1)?;
        let (body, params) = inner.into_parts();

        let Some(body) = body else {
            return Ok(Fragment::default());
        };

        let list = format!(
            "[{} | {}]",
            rel.pattern(var, None, &format!("{}{}", hop, labels)),
            hop
        );

        let predicate = Predicate::All(vec![
            Predicate::Exists {
                pattern: rel.pattern(var, None, &labels),
                negated: false,
            },
            Predicate::Quantified {
                quantifier: Quantifier::for_not(field_key.is_not()),
                variable: hop,
                list,
                body: Box::new(body),
            },
        ]);

        Ok(Fragment::new(predicate, params))
    }

    #[allow(clippy::too_many_arguments)]
    fn compile_connection(
        &self,
        key: &str,
        field_key: &FieldKey<'_>,
        value: &Value,
        var: &str,
        param: &ParamScope,
        conn: &ConnectionField,
        recursing: bool,
        depth: usize,
    ) -> Result<Fragment> {
        let rel = &conn.relationship;

        if value.is_null() {
            let labels = match rel.is_union() {
                true => String::new(),
                false => self.ctx.schema.require_node(&rel.target)?.label_string(self.ctx),
            };
            return Ok(Fragment::bare(Predicate::Exists {
                pattern: rel.pattern(var, None, &labels),
                negated: !field_key.is_not(),
            }));
        }

        let input = value
            .as_object()
            .ok_or_else(|| Error::shape(key, "a connection filter object or null"))?;

        // A union connection is keyed by member type; anything else filters its one target
        let entries: Vec<(&str, &Value)> = if rel.is_union() {
            input.iter().map(|(k, v)| (k.as_str(), v)).collect()
        } else {
            vec![(rel.target.as_str(), value)]
        };

        // Follows the input structure, so repeated keys in AND/OR branches stay apart
        let base = param.nested();

        let relationship = self.ctx.schema.relationship(&conn.relationship_type_name);
        let compiler = ConnectionWhereCompiler::new(self.ctx);
        let mut acc = Fragment::default();

        for (type_name, entry) in entries {
            let ref_node = self.ctx.schema.require_node(type_name)?;
            let labels = ref_node.label_string(self.ctx);

            let entry = entry
                .as_object()
                .ok_or_else(|| Error::shape(key, "a connection filter object"))?;

            let this_param = format!("{}_{}", param.variable(), ref_node.name);
            let rel_var = format!("{}_{}", this_param, conn.relationship_type_name);
            let collected = format!("{}_map", this_param);
            let prefix = match rel.is_union() {
                true => base.child(type_name),
                false => base.clone(),
            };

            let inner = compiler.compile(
                entry,
                ref_node,
                &format!("{}.node", collected),
                relationship,
                &format!("{}.relationship", collected),
                &prefix,
                depth + 1,
            )?;
            let (body, params) = inner.into_parts();

            let pattern = rel.pattern(var, None, &labels);

            let predicate = match body {
                Some(body) => Predicate::All(vec![
                    Predicate::Exists {
                        pattern,
                        negated: false,
                    },
                    Predicate::Quantified {
                        quantifier: Quantifier::for_not(field_key.is_not()),
                        variable: collected,
                        list: format!(
                            "[{} | {{ node: {}, relationship: {} }}]",
                            rel.pattern(var, Some(&rel_var), &format!("{}{}", this_param, labels)),
                            this_param,
                            rel_var
                        ),
                        body: Box::new(body),
                    },
                ]),
                // Nothing to match on: only existence remains
                None => Predicate::Exists {
                    pattern,
                    negated: field_key.is_not(),
                },
            };

            acc.push(Fragment::new(predicate, params));
        }

        // Top-level filters snapshot the resolver arguments for later re-filtering
        if !recursing && !param.is_nested() {
            let root = base.as_str().split('.').next().unwrap_or_default();
            let mut snapshot = Params::new();
            snapshot.insert(root, Value::Object(self.ctx.resolve_tree.args.clone()));
            snapshot.extend(std::mem::take(&mut acc.params));
            acc.params = snapshot;
        }

        Ok(acc)
    }
}

fn is_duration_comparison(key: &FieldKey<'_>) -> bool {
    key.operator
        .map_or(false, |op| op.is_ordering() || op == Operator::Not)
}

/// Property access, wrapped in `coalesce` when the field declares a default
fn property(var: &str, key: &FieldKey<'_>, field: Option<&ScalarField>) -> String {
    match field {
        Some(f) => {
            let access = format!("{}.{}", var, f.db_property());
            match &f.default {
                Some(default) if f.kind.group() != FieldGroup::Point => {
                    format!("coalesce({}, {})", access, cypher_literal(default))
                }
                _ => access,
            }
        }
        None => format!("{}.{}", var, key.field_name),
    }
}

fn null_check(key: &FieldKey<'_>, var: &str, entity: &dyn Entity) -> Fragment {
    let db_name = entity
        .fields()
        .get(key.field_name)
        .map_or(key.field_name, |f| f.db_property());
    let not = if key.is_not() { "NOT " } else { "" };

    Fragment::bare(Predicate::comparison(format!(
        "{}.{} IS {}NULL",
        var, db_name, not
    )))
}

fn point_comparison(
    key: &FieldKey<'_>,
    value: &Value,
    var: &str,
    param: &ParamScope,
    field: &ScalarField,
) -> Fragment {
    let prop = property(var, key, Some(field));
    let reference = param.reference();
    let point = format!("point({})", reference);
    let point_array = format!("[p in {} | point(p)]", reference);

    let text = match key.operator {
        Some(op @ (Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte | Operator::Distance)) => {
            format!(
                "distance({}, point({}.point)) {} {}.distance",
                prop,
                reference,
                op.comparison(),
                reference
            )
        }
        Some(Operator::In | Operator::NotIn) => format!("{} IN {}", prop, point_array),
        Some(Operator::Includes | Operator::NotIncludes) => format!("{} IN {}", point, prop),
        _ if field.array => format!("{} = {}", prop, point_array),
        _ => format!("{} = {}", prop, point),
    };

    let mut params = Params::new();
    param.bind(&mut params, value.clone());

    Fragment::new(Predicate::comparison(text).negate_if(key.is_negated()), params)
}

fn duration_comparison(
    key: &FieldKey<'_>,
    value: &Value,
    var: &str,
    param: &ParamScope,
    field: &ScalarField,
) -> Fragment {
    // Durations only order correctly once anchored to an instant
    let comparison = key.operator.map_or("=", Operator::comparison);
    let text = format!(
        "datetime() + {} {} datetime() + {}",
        property(var, key, Some(field)),
        comparison,
        param.reference()
    );

    let mut params = Params::new();
    param.bind(&mut params, value.clone());

    Fragment::new(Predicate::comparison(text).negate_if(key.is_negated()), params)
}

fn scalar_comparison(
    key: &FieldKey<'_>,
    value: &Value,
    var: &str,
    param: &ParamScope,
    field: Option<&ScalarField>,
) -> Fragment {
    let prop = property(var, key, field);
    let comparison = key.operator.map_or("=", Operator::comparison);

    let text = match key.operator {
        Some(Operator::Includes | Operator::NotIncludes) => {
            format!("{} {} {}", param.reference(), comparison, prop)
        }
        _ => format!("{} {} {}", prop, comparison, param.reference()),
    };

    let mut params = Params::new();
    param.bind(&mut params, value.clone());

    Fragment::new(Predicate::comparison(text).negate_if(key.is_negated()), params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::context::ResolveTree;
    use crate::translate::test_fixtures::movie_schema;
    use proptest::prelude::*;
    use serde_json::json;

    fn compile_with(ctx: &Context<'_>, var: &str, input: Value) -> Result<(String, Params)> {
        let movie = ctx.schema.node("Movie").unwrap();
        let input = input.as_object().unwrap().clone();
        WhereCompiler::new(ctx).compile(&input, var, movie, None, false)
    }

    fn compile(var: &str, input: Value) -> Result<(String, Params)> {
        let schema = movie_schema();
        let ctx = Context::new(&schema);
        compile_with(&ctx, var, input)
    }

    #[test]
    fn test_equality() {
        let (clause, params) = compile("movie", json!({ "name": "Keanu" })).unwrap();

        assert_eq!(clause, "WHERE movie.name = $movie_name");
        assert_eq!(params.get("movie_name"), Some(&json!("Keanu")));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_not() {
        let (clause, params) = compile("movie", json!({ "name_NOT": "Keanu" })).unwrap();

        assert_eq!(clause, "WHERE (NOT movie.name = $movie_name_NOT)");
        assert_eq!(params.get("movie_name_NOT"), Some(&json!("Keanu")));
    }

    #[test]
    fn test_or_branches_get_distinct_names() {
        let (clause, params) = compile(
            "movie",
            json!({ "OR": [{ "name": "Keanu" }, { "name": "Carrie" }] }),
        )
        .unwrap();

        assert_eq!(
            clause,
            "WHERE (movie.name = $movie_OR_name OR movie.name = $movie_OR1_name)"
        );
        assert_eq!(params.get("movie_OR_name"), Some(&json!("Keanu")));
        assert_eq!(params.get("movie_OR1_name"), Some(&json!("Carrie")));
    }

    #[test]
    fn test_empty_input() {
        let (clause, params) = compile("movie", json!({})).unwrap();

        assert_eq!(clause, "");
        assert!(params.is_empty());
    }

    #[test]
    fn test_nested_logical_naming() {
        let (clause, params) = compile(
            "this",
            json!({ "OR": [
                { "title": "a" },
                { "AND": [{ "title": "b" }, { "rating_GT": 1 }] }
            ] }),
        )
        .unwrap();

        assert_eq!(
            clause,
            "WHERE (this.title = $this_OR_title OR (this.title = $this_OR1_AND_title AND coalesce(this.rating, 0) > $this_OR1_AND1_rating_GT))"
        );
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_empty_branch_is_dropped() {
        let (clause, params) = compile("this", json!({ "OR": [{}, { "title": "a" }] })).unwrap();

        assert_eq!(clause, "WHERE (this.title = $this_OR1_title)");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_recursing_with_chain() {
        let schema = movie_schema();
        let ctx = Context::new(&schema);
        let movie = schema.node("Movie").unwrap();
        let input = json!({ "title_CONTAINS": "Matrix" }).as_object().unwrap().clone();

        let (clause, params) = WhereCompiler::new(&ctx)
            .compile(&input, "this", movie, Some("outer"), true)
            .unwrap();

        assert_eq!(clause, "this.title CONTAINS $outer_title_CONTAINS");
        assert!(params.get("outer_title_CONTAINS").is_some());
    }

    #[test]
    fn test_string_operators() {
        let (clause, _) = compile(
            "this",
            json!({
                "title_STARTS_WITH": "The",
                "title_NOT_ENDS_WITH": "II",
                "title_MATCHES": "(?i).*matrix.*",
                "title_IN": ["a", "b"],
            }),
        )
        .unwrap();

        assert_eq!(
            clause,
            "WHERE this.title STARTS WITH $this_title_STARTS_WITH \
             AND (NOT this.title ENDS WITH $this_title_NOT_ENDS_WITH) \
             AND this.title =~ $this_title_MATCHES \
             AND this.title IN $this_title_IN"
        );
    }

    #[test]
    fn test_includes_reverses_operands() {
        let (clause, _) = compile(
            "this",
            json!({ "tags_INCLUDES": "noir", "tags_NOT_INCLUDES": "comedy" }),
        )
        .unwrap();

        assert_eq!(
            clause,
            "WHERE $this_tags_INCLUDES IN this.tags AND (NOT $this_tags_NOT_INCLUDES IN this.tags)"
        );
    }

    #[test]
    fn test_null_checks() {
        let (clause, params) =
            compile("this", json!({ "title": null, "released_NOT": null })).unwrap();

        assert_eq!(clause, "WHERE this.title IS NULL AND this.released IS NOT NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn test_null_check_before_point_and_duration() {
        let (clause, _) =
            compile("this", json!({ "location": null, "runtime_NOT": null })).unwrap();

        assert_eq!(clause, "WHERE this.location IS NULL AND this.runtime IS NOT NULL");
    }

    #[test]
    fn test_default_uses_coalesce() {
        let (clause, _) = compile("this", json!({ "rating_GTE": 4.5 })).unwrap();
        assert_eq!(clause, "WHERE coalesce(this.rating, 0) >= $this_rating_GTE");
    }

    #[test]
    fn test_undeclared_field_is_compiled_verbatim() {
        let (clause, _) = compile("this", json!({ "budget_LT": 100 })).unwrap();
        assert_eq!(clause, "WHERE this.budget < $this_budget_LT");
    }

    #[test]
    fn test_point_filters() {
        let (clause, params) = compile(
            "this",
            json!({
                "location_DISTANCE": { "point": { "latitude": 1, "longitude": 2 }, "distance": 5 },
                "location_LT": { "point": { "latitude": 1, "longitude": 2 }, "distance": 10 },
                "locations_INCLUDES": { "latitude": 1, "longitude": 2 },
                "location_NOT": { "latitude": 3, "longitude": 4 },
            }),
        )
        .unwrap();

        assert_eq!(
            clause,
            "WHERE distance(this.location, point($this_location_DISTANCE.point)) = $this_location_DISTANCE.distance \
             AND distance(this.location, point($this_location_LT.point)) < $this_location_LT.distance \
             AND point($this_locations_INCLUDES) IN this.locations \
             AND (NOT this.location = point($this_location_NOT))"
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_point_array_equality() {
        let (clause, _) = compile("this", json!({ "locations": [{ "x": 1, "y": 2 }] })).unwrap();
        assert_eq!(clause, "WHERE this.locations = [p in $this_locations | point(p)]");
    }

    #[test]
    fn test_duration_filters() {
        let (clause, _) = compile(
            "this",
            json!({ "runtime_GT": "PT2H", "runtime_NOT": "PT1H", "runtime": "PT3H" }),
        )
        .unwrap();

        assert_eq!(
            clause,
            "WHERE datetime() + this.runtime > datetime() + $this_runtime_GT \
             AND (NOT datetime() + this.runtime = datetime() + $this_runtime_NOT) \
             AND this.runtime = $this_runtime"
        );
    }

    #[test]
    fn test_relationship_filter() {
        let (clause, params) = compile("this", json!({ "actors": { "name": "Tom" } })).unwrap();

        assert_eq!(
            clause,
            "WHERE EXISTS((this)<-[:ACTED_IN]-(:Actor)) \
             AND ANY(this_actors IN [(this)<-[:ACTED_IN]-(this_actors:Actor) | this_actors] \
             WHERE this_actors.name = $this_actors_name)"
        );
        assert_eq!(params.get("this_actors_name"), Some(&json!("Tom")));
    }

    #[test]
    fn test_relationship_not_filter() {
        let (clause, _) = compile("this", json!({ "genres_NOT": { "name": "Horror" } })).unwrap();

        assert_eq!(
            clause,
            "WHERE EXISTS((this)-[:IN_GENRE]->(:Genre)) \
             AND NONE(this_genres_NOT IN [(this)-[:IN_GENRE]->(this_genres_NOT:Genre) | this_genres_NOT] \
             WHERE this_genres_NOT.name = $this_genres_NOT_name)"
        );
    }

    #[test]
    fn test_relationship_null() {
        let (none, _) = compile("this", json!({ "actors": null })).unwrap();
        assert_eq!(none, "WHERE NOT EXISTS((this)<-[:ACTED_IN]-(:Actor))");

        let (some, _) = compile("this", json!({ "actors_NOT": null })).unwrap();
        assert_eq!(some, "WHERE EXISTS((this)<-[:ACTED_IN]-(:Actor))");
    }

    #[test]
    fn test_connection_filter() {
        let schema = movie_schema();
        let ctx = Context::new(&schema).with_resolve_tree(ResolveTree {
            name: "movies".to_string(),
            args: json!({ "first": 5 }).as_object().unwrap().clone(),
        });

        let (clause, params) = compile_with(
            &ctx,
            "this",
            json!({ "actorsConnection": {
                "node": { "name": "Tom" },
                "edge": { "screenTime_GT": 10 }
            } }),
        )
        .unwrap();

        assert_eq!(
            clause,
            "WHERE EXISTS((this)<-[:ACTED_IN]-(:Actor)) \
             AND ANY(this_actorsConnection_Actor_map IN \
             [(this)<-[this_actorsConnection_Actor_ActedIn:ACTED_IN]-(this_actorsConnection_Actor:Actor) \
             | { node: this_actorsConnection_Actor, relationship: this_actorsConnection_Actor_ActedIn }] \
             WHERE this_actorsConnection_Actor_map.node.name = $this_movies.where.actorsConnection.node.name \
             AND this_actorsConnection_Actor_map.relationship.screenTime > $this_movies.where.actorsConnection.edge.screenTime_GT)"
        );

        // Resolver arguments and the filter values share one structured parameter
        assert_eq!(params.len(), 1);
        assert_eq!(
            params.get("this_movies"),
            Some(&json!({
                "first": 5,
                "where": { "actorsConnection": {
                    "node": { "name": "Tom" },
                    "edge": { "screenTime_GT": 10 }
                } }
            }))
        );
    }

    #[test]
    fn test_connection_not_and_empty_body() {
        let (clause, _) = compile(
            "this",
            json!({ "actorsConnection_NOT": { "node": { "name": "Tom" } } }),
        )
        .unwrap();
        assert!(clause.contains("NONE(this_actorsConnection_NOT_Actor_map IN"));

        let (clause, _) = compile("this", json!({ "actorsConnection_NOT": {} })).unwrap();
        assert_eq!(clause, "WHERE NOT EXISTS((this)<-[:ACTED_IN]-(:Actor))");
    }

    #[test]
    fn test_connection_null() {
        let (clause, _) = compile("this", json!({ "searchConnection": null })).unwrap();
        assert_eq!(clause, "WHERE NOT EXISTS((this)-[:SEARCH]->())");
    }

    #[test]
    fn test_union_connection_filter() {
        let (clause, params) = compile(
            "this",
            json!({ "searchConnection": {
                "Actor": { "node": { "name": "Tom" } },
                "Genre": { "node": { "name": "Drama" } }
            } }),
        )
        .unwrap();

        assert!(clause.starts_with("WHERE EXISTS((this)-[:SEARCH]->(:Actor)) AND ANY(this_searchConnection_Actor_map IN"));
        assert!(clause.contains("$this_.where.searchConnection.Actor.node.name"));
        assert!(clause.contains("this_searchConnection_Genre_map.node.name = $this_.where.searchConnection.Genre.node.name"));
        assert_eq!(
            params.get("this_"),
            Some(&json!({ "where": { "searchConnection": {
                "Actor": { "node": { "name": "Tom" } },
                "Genre": { "node": { "name": "Drama" } }
            } } }))
        );
    }

    #[test]
    fn test_aggregate_dispatch() {
        let (clause, params) = compile("this", json!({ "actorsAggregate": { "count_GT": 1 } })).unwrap();

        assert_eq!(
            clause,
            "WHERE size([(this)<-[this_actorsAggregate_edge:ACTED_IN]-(this_actorsAggregate_node:Actor) | this_actorsAggregate_node]) > $this_actorsAggregate_count_GT"
        );
        assert_eq!(params.get("this_actorsAggregate_count_GT"), Some(&json!(1)));
    }

    #[test]
    fn test_aggregate_on_scalar_fails() {
        let err = compile("this", json!({ "titleAggregate": { "count": 1 } })).unwrap_err();
        assert!(matches!(err, Error::SchemaMisuse { field } if field == "title"));
    }

    #[test]
    fn test_invalid_key() {
        let err = compile("this", json!({ "9lives": 1 })).unwrap_err();
        assert_eq!(err, Error::InvalidKey { key: "9lives".to_string() });
    }

    #[test]
    fn test_logical_needs_array() {
        let err = compile("this", json!({ "OR": { "title": "a" } })).unwrap_err();
        assert!(matches!(err, Error::ArgumentShape { field, .. } if field == "OR"));
    }

    #[test]
    fn test_depth_limit() {
        let schema = movie_schema();
        let ctx = Context::new(&schema).with_max_depth(1);

        let err = compile_with(
            &ctx,
            "this",
            json!({ "actors": { "movies": { "title": "x" } } }),
        )
        .unwrap_err();

        assert_eq!(err, Error::DepthLimitExceeded { limit: 1 });
    }

    #[test]
    fn test_repeated_connection_in_or_branches() {
        let schema = movie_schema();
        let ctx = Context::new(&schema).with_resolve_tree(ResolveTree {
            name: "movies".to_string(),
            args: Map::new(),
        });

        let (clause, params) = compile_with(
            &ctx,
            "this",
            json!({ "OR": [
                { "actorsConnection": { "node": { "name": "Keanu" } } },
                { "actorsConnection": { "node": { "name": "Carrie" } } }
            ] }),
        )
        .unwrap();

        assert!(clause.contains(
            "this_OR_actorsConnection_Actor_map.node.name = $this_movies.where.OR[0].actorsConnection.node.name"
        ));
        assert!(clause.contains(
            "this_OR1_actorsConnection_Actor_map.node.name = $this_movies.where.OR[1].actorsConnection.node.name"
        ));
        assert_eq!(
            params.get("this_movies"),
            Some(&json!({ "where": { "OR": [
                { "actorsConnection": { "node": { "name": "Keanu" } } },
                { "actorsConnection": { "node": { "name": "Carrie" } } }
            ] } }))
        );
    }

    #[test]
    fn test_connection_below_relationship_follows_input_shape() {
        let (clause, params) = compile(
            "this",
            json!({ "actors": { "moviesConnection": { "node": { "title": "Heat" } } } }),
        )
        .unwrap();

        assert!(clause.contains("$this_.where.actors.moviesConnection.node.title"));
        assert_eq!(
            params.get("this_"),
            Some(&json!({ "where": { "actors": { "moviesConnection": { "node": { "title": "Heat" } } } } }))
        );
    }

    #[test]
    fn test_point_in_filters() {
        let points = json!([{ "latitude": 1, "longitude": 2 }, { "latitude": 3, "longitude": 4 }]);
        let (clause, params) = compile(
            "this",
            json!({ "location_IN": points.clone(), "location_NOT_IN": points.clone() }),
        )
        .unwrap();

        assert_eq!(
            clause,
            "WHERE this.location IN [p in $this_location_IN | point(p)] \
             AND (NOT this.location IN [p in $this_location_NOT_IN | point(p)])"
        );
        assert_eq!(params.get("this_location_IN"), Some(&points));
        assert_eq!(params.get("this_location_NOT_IN"), Some(&points));
    }

    #[test]
    fn test_duration_in_stays_plain() {
        let (clause, _) = compile("this", json!({ "runtime_IN": ["PT1H", "PT2H"] })).unwrap();
        assert_eq!(clause, "WHERE this.runtime IN $this_runtime_IN");
    }

    /// Every string leaf bound anywhere in `params`
    fn leaves(params: &Params) -> Vec<String> {
        fn walk(value: &Value, out: &mut Vec<String>) {
            match value {
                Value::String(s) => out.push(s.clone()),
                Value::Array(items) => items.iter().for_each(|v| walk(v, out)),
                Value::Object(map) => map.values().for_each(|v| walk(v, out)),
                _ => {}
            }
        }

        let mut out = Vec::new();
        for (_, value) in params.iter() {
            walk(value, &mut out);
        }
        out.sort();
        out
    }

    const NEGATABLE: [(&str, &str); 6] = [
        ("title", "title_NOT"),
        ("title_CONTAINS", "title_NOT_CONTAINS"),
        ("title_STARTS_WITH", "title_NOT_STARTS_WITH"),
        ("title_ENDS_WITH", "title_NOT_ENDS_WITH"),
        ("title_IN", "title_NOT_IN"),
        ("tags_INCLUDES", "tags_NOT_INCLUDES"),
    ];

    proptest! {
        #[test]
        fn prop_not_negates_positive_form(pair in 0..NEGATABLE.len(), value in ".*") {
            let (positive, negative) = NEGATABLE[pair];

            let (pos_clause, pos_params) = compile("this", json!({ positive: value })).unwrap();
            let (neg_clause, neg_params) = compile("this", json!({ negative: value })).unwrap();

            let pos_body = pos_clause.strip_prefix("WHERE ").unwrap().replace(
                &format!("$this_{}", positive),
                &format!("$this_{}", negative),
            );
            prop_assert_eq!(neg_clause, format!("WHERE (NOT {})", pos_body));

            prop_assert_eq!(pos_params.len(), 1);
            prop_assert_eq!(neg_params.len(), 1);
            prop_assert_eq!(
                pos_params.get(&format!("this_{}", positive)),
                neg_params.get(&format!("this_{}", negative))
            );
        }

        #[test]
        fn prop_nested_params_are_unique(kinds in prop::collection::vec(0..3usize, 1..6), wrap in any::<bool>()) {
            let branches: Vec<Value> = kinds
                .iter()
                .enumerate()
                .map(|(i, kind)| {
                    let v = format!("v{}", i);
                    match kind {
                        0 => json!({ "title": v }),
                        1 => json!({ "actors": { "name": v } }),
                        _ => json!({ "actorsConnection": { "node": { "name": v } } }),
                    }
                })
                .collect();

            let input = match wrap {
                true => json!({ "AND": [{ "OR": branches }, { "OR": branches }] }),
                false => json!({ "OR": branches }),
            };
            let copies = if wrap { 2 } else { 1 };

            let (clause, params) = compile("this", input).unwrap();

            // Every bound value survives the merge
            let mut expected: Vec<String> = (0..kinds.len())
                .flat_map(|i| std::iter::repeat(format!("v{}", i)).take(copies))
                .collect();
            expected.sort();
            prop_assert_eq!(leaves(&params), expected);

            // No two predicates read the same parameter
            let mut references: Vec<&str> = clause
                .split(|c: char| c.is_whitespace() || c == ')')
                .filter(|t| t.starts_with('$'))
                .collect();
            let total = references.len();
            references.sort();
            references.dedup();
            prop_assert_eq!(references.len(), total);
            prop_assert_eq!(total, kinds.len() * copies);
        }

        #[test]
        fn prop_or_names_are_unique(titles in prop::collection::vec(".*", 1..8)) {
            let branches: Vec<Value> = titles.iter().map(|t| json!({ "title": t })).collect();
            let input = json!({ "OR": branches });

            let (clause, params) = compile("this", input.clone()).unwrap();
            prop_assert_eq!(params.len(), titles.len());
            prop_assert_eq!(clause.matches(" OR ").count(), titles.len() - 1);

            // Same input, same output
            let (again, again_params) = compile("this", input).unwrap();
            prop_assert_eq!(clause, again);
            prop_assert_eq!(params, again_params);
        }
    }
}
