use serde::{Deserialize, Serialize};

use crate::ast::{Operation, Payload, Predicate, Value};

/// Aggregate requested by a `scalar` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScalarSpec {
    Avg {
        key: String,
    },
    Min {
        key: String,
    },
    Max {
        key: String,
    },
    Sum {
        key: String,
    },
    Count {
        #[serde(default)]
        key: Option<String>,
    },
    /// Rows of `(key, value)`: `SUM(key2)` per key, or the row count without `key2`.
    Group {
        key: String,
        #[serde(default)]
        key2: Option<String>,
    },
}

/// A named value bound to an `@name` placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: Value,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Declarative description of one database operation.
///
/// Which fields matter depends on `exec`; the compiler reports missing ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterDescriptor {
    /// Target table
    pub table: String,
    /// Optional schema, prefixed to the table as `schema.table`
    pub schema: Option<String>,
    /// Operation to compile
    pub exec: Operation,
    /// Projection; `*` when absent
    pub fields: Option<Vec<String>>,
    /// Sort entries such as `name_asc` or `created_desc`
    pub sort: Option<Vec<String>>,
    /// Predicate list, joined with AND
    pub filter: Vec<Predicate>,
    pub skip: Option<u64>,
    pub take: Option<u64>,
    /// Language code substituted for the `§` column marker
    pub language: Option<String>,
    /// Insert/update payload
    pub payload: Option<Payload>,
    /// Columns returned through OUTPUT
    pub returning: Option<Vec<String>>,
    #[serde(rename = "primarykey")]
    pub primary_key: Option<String>,
    pub scalar: Option<ScalarSpec>,
    /// Raw SQL for `query` operations; `{where}` marks where the predicate goes
    pub query: Option<String>,
    /// Parameters for raw SQL
    pub params: Vec<Parameter>,
    /// Shape update/remove results as a single row
    pub first: bool,
    /// Log the compiled SQL
    pub debug: bool,
}

impl FilterDescriptor {
    pub fn new(table: &str, exec: Operation) -> Self {
        Self {
            table: table.to_string(),
            exec,
            ..Self::default()
        }
    }

    /// Table name, schema-qualified when a schema is set.
    pub fn table_name(&self) -> String {
        match &self.schema {
            Some(schema) if !schema.is_empty() => format!("{}.{}", schema, self.table),
            _ => self.table.clone(),
        }
    }

    /// Language code, empty when unset.
    pub fn language_code(&self) -> &str {
        self.language.as_deref().unwrap_or("")
    }

    pub fn schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.to_string());
        self
    }

    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn sort(mut self, sort: &[&str]) -> Self {
        self.sort = Some(sort.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Append a predicate (AND).
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter.push(predicate);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn take(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }

    pub fn language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn returning(mut self, columns: &[&str]) -> Self {
        self.returning = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn primary_key(mut self, column: &str) -> Self {
        self.primary_key = Some(column.to_string());
        self
    }

    pub fn scalar(mut self, scalar: ScalarSpec) -> Self {
        self.scalar = Some(scalar);
        self
    }

    /// Raw SQL with its parameters.
    pub fn raw_query(mut self, sql: &str, params: Vec<Parameter>) -> Self {
        self.query = Some(sql.to_string());
        self.params = params;
        self
    }

    pub fn first(mut self) -> Self {
        self.first = true;
        self
    }

    pub fn debug(mut self) -> Self {
        self.debug = true;
        self
    }
}
