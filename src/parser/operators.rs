//! Operator table - filter key suffixes and the Cypher comparisons they map to

use std::fmt;
use std::str::FromStr;

/// A trailing operator on a filter key, e.g. the `GT` in `rating_GT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Not,
    NotIn,
    In,
    NotIncludes,
    Includes,
    Matches,
    NotContains,
    Contains,
    NotStartsWith,
    StartsWith,
    NotEndsWith,
    EndsWith,
    Lt,
    Lte,
    Gt,
    Gte,
    Distance,
}

impl Operator {
    pub const ALL: [Operator; 17] = [
        Operator::Not,
        Operator::NotIn,
        Operator::In,
        Operator::NotIncludes,
        Operator::Includes,
        Operator::Matches,
        Operator::NotContains,
        Operator::Contains,
        Operator::NotStartsWith,
        Operator::StartsWith,
        Operator::NotEndsWith,
        Operator::EndsWith,
        Operator::Lt,
        Operator::Lte,
        Operator::Gt,
        Operator::Gte,
        Operator::Distance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Not => "NOT",
            Operator::NotIn => "NOT_IN",
            Operator::In => "IN",
            Operator::NotIncludes => "NOT_INCLUDES",
            Operator::Includes => "INCLUDES",
            Operator::Matches => "MATCHES",
            Operator::NotContains => "NOT_CONTAINS",
            Operator::Contains => "CONTAINS",
            Operator::NotStartsWith => "NOT_STARTS_WITH",
            Operator::StartsWith => "STARTS_WITH",
            Operator::NotEndsWith => "NOT_ENDS_WITH",
            Operator::EndsWith => "ENDS_WITH",
            Operator::Lt => "LT",
            Operator::Lte => "LTE",
            Operator::Gt => "GT",
            Operator::Gte => "GTE",
            Operator::Distance => "DISTANCE",
        }
    }

    /// The Cypher comparison token. `NOT` variants share the token of
    /// their positive form; negation is applied around the predicate.
    pub fn comparison(self) -> &'static str {
        match self {
            Operator::Not | Operator::Distance => "=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::NotContains | Operator::Contains => "CONTAINS",
            Operator::NotStartsWith | Operator::StartsWith => "STARTS WITH",
            Operator::NotEndsWith | Operator::EndsWith => "ENDS WITH",
            Operator::Matches => "=~",
            Operator::NotIn | Operator::In | Operator::NotIncludes | Operator::Includes => "IN",
        }
    }

    pub fn is_negated(self) -> bool {
        matches!(
            self,
            Operator::Not
                | Operator::NotIn
                | Operator::NotIncludes
                | Operator::NotContains
                | Operator::NotStartsWith
                | Operator::NotEndsWith
        )
    }

    /// Ordering comparisons, the only ones meaningful on durations
    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or(())
    }
}
