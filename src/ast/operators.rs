use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FilterError;

/// The operation a descriptor compiles to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// SELECT rows
    #[default]
    #[serde(alias = "read")]
    Find,
    /// SELECT a page of rows plus the total count
    List,
    /// SELECT COUNT(1)
    Count,
    /// INSERT INTO
    Insert,
    /// UPDATE
    Update,
    /// DELETE FROM
    Remove,
    /// Existence probe
    Check,
    /// DROP TABLE
    Drop,
    /// TRUNCATE TABLE
    Truncate,
    /// Aggregate or grouped aggregate
    Scalar,
    /// Caller-supplied SQL
    #[serde(alias = "rawquery")]
    Query,
}

impl Operation {
    /// Operations that accept ORDER BY and paging.
    pub fn is_paged(&self) -> bool {
        matches!(
            self,
            Operation::Find | Operation::List | Operation::Check | Operation::Query
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Find => "find",
            Operation::List => "list",
            Operation::Count => "count",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Remove => "remove",
            Operation::Check => "check",
            Operation::Drop => "drop",
            Operation::Truncate => "truncate",
            Operation::Scalar => "scalar",
            Operation::Query => "query",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "find" | "read" => Ok(Operation::Find),
            "list" => Ok(Operation::List),
            "count" => Ok(Operation::Count),
            "insert" => Ok(Operation::Insert),
            "update" => Ok(Operation::Update),
            "remove" => Ok(Operation::Remove),
            "check" => Ok(Operation::Check),
            "drop" => Ok(Operation::Drop),
            "truncate" => Ok(Operation::Truncate),
            "scalar" => Ok(Operation::Scalar),
            "query" | "rawquery" => Ok(Operation::Query),
            _ => Err(FilterError::UnsupportedOperation(s.to_string())),
        }
    }
}

/// Comparison operator of a `where` or date-part predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Comparator {
    #[default]
    #[serde(rename = "=", alias = "==")]
    Eq,
    #[serde(rename = "<>", alias = "!=")]
    NotEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
}

impl Comparator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::NotEq => "<>",
            Comparator::Gt => ">",
            Comparator::Gte => ">=",
            Comparator::Lt => "<",
            Comparator::Lte => "<=",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Where the wildcard goes in a `search` predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchAnchor {
    /// Value at the beginning: `LIKE 'v%'`
    Beg,
    /// Value at the end: `LIKE '%v'`
    End,
    /// Value anywhere: `LIKE '%v%'`
    #[default]
    #[serde(other)]
    Contains,
}

/// Date/time component extracted by the date-part predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Year,
    Month,
    Day,
    Hour,
    Minute,
}

impl DatePart {
    /// The extraction expression applied to `column`.
    pub fn extract(&self, column: &str) -> String {
        match self {
            DatePart::Year => format!("YEAR({})", column),
            DatePart::Month => format!("MONTH({})", column),
            DatePart::Day => format!("DAY({})", column),
            DatePart::Hour => format!("DATEPART(HOUR, {})", column),
            DatePart::Minute => format!("DATEPART(MINUTE, {})", column),
        }
    }
}

/// Update operator selected by the first character of a payload key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateOp {
    /// `+col`
    Increment,
    /// `-col`
    Decrement,
    /// `*col`
    Multiply,
    /// `/col`
    Divide,
    /// `>col`: keep the greater of stored and new value
    Max,
    /// `<col`: keep the lesser of stored and new value
    Min,
    /// `!col`: flip a 0/1 column
    Toggle,
    /// `=col`: raw SQL value, insert only
    RawInsertOnly,
    /// `#col`: raw SQL value, update only
    RawUpdateOnly,
    #[default]
    Plain,
}

impl UpdateOp {
    /// Split a payload key into its operator and column name.
    pub fn split_key(key: &str) -> (UpdateOp, &str) {
        let op = match key.chars().next() {
            Some('+') => UpdateOp::Increment,
            Some('-') => UpdateOp::Decrement,
            Some('*') => UpdateOp::Multiply,
            Some('/') => UpdateOp::Divide,
            Some('>') => UpdateOp::Max,
            Some('<') => UpdateOp::Min,
            Some('!') => UpdateOp::Toggle,
            Some('=') => UpdateOp::RawInsertOnly,
            Some('#') => UpdateOp::RawUpdateOnly,
            _ => return (UpdateOp::Plain, key),
        };
        (op, &key[1..])
    }

    /// The key prefix character, if any.
    pub fn prefix(&self) -> Option<char> {
        match self {
            UpdateOp::Increment => Some('+'),
            UpdateOp::Decrement => Some('-'),
            UpdateOp::Multiply => Some('*'),
            UpdateOp::Divide => Some('/'),
            UpdateOp::Max => Some('>'),
            UpdateOp::Min => Some('<'),
            UpdateOp::Toggle => Some('!'),
            UpdateOp::RawInsertOnly => Some('='),
            UpdateOp::RawUpdateOnly => Some('#'),
            UpdateOp::Plain => None,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}
