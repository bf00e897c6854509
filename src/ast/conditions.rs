use serde::{Deserialize, Serialize};

use crate::ast::{Comparator, DatePart, SearchAnchor, Value};

/// A column compared against a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    #[serde(rename = "name")]
    pub column: String,
    #[serde(default)]
    pub comparer: Comparator,
    #[serde(default)]
    pub value: Value,
}

/// A single node of a predicate list.
///
/// Lists are joined with AND; the nested list of an `Or` node is joined with OR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Predicate {
    Where(Comparison),
    Or {
        value: Vec<Predicate>,
    },
    In {
        #[serde(rename = "name")]
        column: String,
        #[serde(default)]
        value: Value,
    },
    NotIn {
        #[serde(rename = "name")]
        column: String,
        #[serde(default)]
        value: Value,
    },
    /// Trusted raw boolean SQL, inserted verbatim.
    Query {
        value: String,
    },
    Contains {
        #[serde(rename = "name")]
        column: String,
    },
    Empty {
        #[serde(rename = "name")]
        column: String,
    },
    Between {
        #[serde(rename = "name")]
        column: String,
        a: Value,
        b: Value,
    },
    Search {
        #[serde(rename = "name")]
        column: String,
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        operator: SearchAnchor,
    },
    Month(Comparison),
    Year(Comparison),
    Day(Comparison),
    Hour(Comparison),
    Minute(Comparison),
}

impl Predicate {
    /// The column this node refers to, if it has one.
    pub fn column(&self) -> Option<&str> {
        match self {
            Predicate::Where(c)
            | Predicate::Month(c)
            | Predicate::Year(c)
            | Predicate::Day(c)
            | Predicate::Hour(c)
            | Predicate::Minute(c) => Some(&c.column),
            Predicate::In { column, .. }
            | Predicate::NotIn { column, .. }
            | Predicate::Contains { column }
            | Predicate::Empty { column }
            | Predicate::Between { column, .. }
            | Predicate::Search { column, .. } => Some(column),
            Predicate::Or { .. } | Predicate::Query { .. } => None,
        }
    }

    /// Short kind name, as used in the JSON `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Predicate::Where(_) => "where",
            Predicate::Or { .. } => "or",
            Predicate::In { .. } => "in",
            Predicate::NotIn { .. } => "notin",
            Predicate::Query { .. } => "query",
            Predicate::Contains { .. } => "contains",
            Predicate::Empty { .. } => "empty",
            Predicate::Between { .. } => "between",
            Predicate::Search { .. } => "search",
            Predicate::Month(_) => "month",
            Predicate::Year(_) => "year",
            Predicate::Day(_) => "day",
            Predicate::Hour(_) => "hour",
            Predicate::Minute(_) => "minute",
        }
    }
}

fn comparison(column: &str, comparer: Comparator, value: Value) -> Comparison {
    Comparison {
        column: column.to_string(),
        comparer,
        value,
    }
}

fn compare(column: &str, comparer: Comparator, value: impl Into<Value>) -> Predicate {
    Predicate::Where(comparison(column, comparer, value.into()))
}

/// column = value (`IS NULL` for a null value)
pub fn eq(column: &str, value: impl Into<Value>) -> Predicate {
    compare(column, Comparator::Eq, value)
}

/// column <> value (`IS NOT NULL` for a null value)
pub fn ne(column: &str, value: impl Into<Value>) -> Predicate {
    compare(column, Comparator::NotEq, value)
}

pub fn gt(column: &str, value: impl Into<Value>) -> Predicate {
    compare(column, Comparator::Gt, value)
}

pub fn gte(column: &str, value: impl Into<Value>) -> Predicate {
    compare(column, Comparator::Gte, value)
}

pub fn lt(column: &str, value: impl Into<Value>) -> Predicate {
    compare(column, Comparator::Lt, value)
}

pub fn lte(column: &str, value: impl Into<Value>) -> Predicate {
    compare(column, Comparator::Lte, value)
}

/// column IN (values)
pub fn is_in<V: Into<Value>>(column: &str, values: impl IntoIterator<Item = V>) -> Predicate {
    Predicate::In {
        column: column.to_string(),
        value: Value::Array(values.into_iter().map(Into::into).collect()),
    }
}

/// column NOT IN (values)
pub fn not_in<V: Into<Value>>(column: &str, values: impl IntoIterator<Item = V>) -> Predicate {
    Predicate::NotIn {
        column: column.to_string(),
        value: Value::Array(values.into_iter().map(Into::into).collect()),
    }
}

/// Parenthesized OR group.
pub fn or(predicates: Vec<Predicate>) -> Predicate {
    Predicate::Or { value: predicates }
}

/// Raw boolean SQL. Not escaped.
pub fn raw(sql: &str) -> Predicate {
    Predicate::Query {
        value: sql.to_string(),
    }
}

/// Column holds a non-empty value.
pub fn contains(column: &str) -> Predicate {
    Predicate::Contains {
        column: column.to_string(),
    }
}

/// Column is NULL or empty.
pub fn empty(column: &str) -> Predicate {
    Predicate::Empty {
        column: column.to_string(),
    }
}

pub fn between(column: &str, a: impl Into<Value>, b: impl Into<Value>) -> Predicate {
    Predicate::Between {
        column: column.to_string(),
        a: a.into(),
        b: b.into(),
    }
}

pub fn search(column: &str, value: &str, anchor: SearchAnchor) -> Predicate {
    Predicate::Search {
        column: column.to_string(),
        value: Some(value.to_string()),
        operator: anchor,
    }
}

/// Compare an extracted date part of a column.
pub fn date_part(
    part: DatePart,
    column: &str,
    comparer: Comparator,
    value: impl Into<Value>,
) -> Predicate {
    let c = comparison(column, comparer, value.into());
    match part {
        DatePart::Year => Predicate::Year(c),
        DatePart::Month => Predicate::Month(c),
        DatePart::Day => Predicate::Day(c),
        DatePart::Hour => Predicate::Hour(c),
        DatePart::Minute => Predicate::Minute(c),
    }
}
