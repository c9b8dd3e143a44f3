//! Filter key parsing (`name_NOT_IN`, `actorsAggregate`, ...)

use lazy_static::lazy_static;
use regex::Regex;

use super::operators::Operator;
use crate::error::{Error, Result};

lazy_static! {
    // The lazy field group makes the longest operator suffix win, so
    // `title_NOT_IN` is (title, NOT_IN) and never (title_NOT, IN)
    static ref FIELD_KEY_RE: Regex = Regex::new(
        r"^(?P<field>[_A-Za-z]\w*?)(?P<aggregate>Aggregate)?(?:_(?P<operator>NOT|NOT_IN|IN|NOT_INCLUDES|INCLUDES|MATCHES|NOT_CONTAINS|CONTAINS|NOT_STARTS_WITH|STARTS_WITH|NOT_ENDS_WITH|ENDS_WITH|LT|LTE|GT|GTE|DISTANCE))?$"
    ).unwrap();
}

/// A parsed filter key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldKey<'a> {
    /// The field the key filters on
    pub field_name: &'a str,

    /// Whether the key addresses `<field>Aggregate`
    pub is_aggregate: bool,

    pub operator: Option<Operator>,
}

impl FieldKey<'_> {
    pub fn is_negated(&self) -> bool {
        self.operator.map_or(false, Operator::is_negated)
    }

    pub fn is_not(&self) -> bool {
        self.operator == Some(Operator::Not)
    }
}

/// Split a filter key into field name, aggregate marker and operator
pub fn parse_field_key(key: &str) -> Result<FieldKey<'_>> {
    let caps = FIELD_KEY_RE
        .captures(key)
        .ok_or_else(|| Error::InvalidKey { key: key.to_string() })?;

    let field_name = caps.name("field").map_or("", |m| m.as_str());
    if field_name.is_empty() {
        return Err(Error::InvalidKey { key: key.to_string() });
    }

    let operator = caps
        .name("operator")
        .and_then(|m| m.as_str().parse::<Operator>().ok());

    Ok(FieldKey {
        field_name,
        is_aggregate: caps.name("aggregate").is_some(),
        operator,
    })
}
