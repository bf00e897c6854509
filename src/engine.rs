//! Execution engine for filter descriptors.
//!
//! The engine compiles descriptors and hands the statements to an
//! [`Executor`], which owns the actual SQL Server connection. Results come
//! back shaped per operation as an [`Output`].

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::ast::{FilterDescriptor, Operation, ScalarSpec};
use crate::cache::FragmentCache;
use crate::config::Config;
use crate::error::{ExecutorError, FilterError, FilterResult};
use crate::transpiler::{CompiledQuery, Compiler};

/// One result row keyed by column name.
pub type Row = serde_json::Map<String, JsonValue>;

/// Logged query text is cut to this many characters.
const LOG_QUERY_CHARS: usize = 100;

/// Raw response of one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// First record set
    pub rows: Vec<Row>,
    /// Affected row counts, one per statement
    pub rows_affected: Vec<u64>,
}

impl QueryResult {
    pub fn rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            rows_affected: Vec::new(),
        }
    }

    pub fn affected(count: u64) -> Self {
        Self {
            rows: Vec::new(),
            rows_affected: vec![count],
        }
    }

    fn first_row(&self) -> Option<&Row> {
        self.rows.first()
    }

    fn first_affected(&self) -> u64 {
        self.rows_affected.first().copied().unwrap_or(0)
    }

    /// Column of the first row, `null` when absent.
    fn first_value(&self, column: &str) -> JsonValue {
        self.first_row()
            .and_then(|row| row.get(column))
            .cloned()
            .unwrap_or(JsonValue::Null)
    }
}

/// Runs compiled statements against a database.
///
/// Implementations bind `query.params` to the `@name` placeholders in list order.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, query: &CompiledQuery) -> Result<QueryResult, ExecutorError>;
}

/// Operation-specific result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Output {
    /// Record set
    Rows(Vec<Row>),
    /// Single row (`first`, or insert with `returning`)
    Row(Option<Row>),
    /// Single column value (primary key, scalar aggregate)
    Value(JsonValue),
    /// Affected rows of a write
    Affected(u64),
    /// Result of `count`
    Count(u64),
    /// Result of `check`
    Exists(bool),
    /// Page plus total count of a `list`
    List { items: Vec<Row>, count: u64 },
}

/// Read/write counters fed by each statement's classification.
#[derive(Debug, Default)]
pub struct QueryStats {
    reads: AtomicU64,
    writes: AtomicU64,
}

impl QueryStats {
    pub fn record(&self, is_read: bool) {
        let counter = if is_read { &self.reads } else { &self.writes };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

/// A database handle: compiler, executor and default schema.
///
/// # Example
///
/// ```rust,ignore
/// let db = Database::new(executor).with_schema("dbo");
/// let users = db
///     .exec(&FilterDescriptor::new("users", Operation::Find).filter(eq("active", true)))
///     .await?;
/// ```
pub struct Database<E> {
    executor: E,
    compiler: Compiler,
    schema: Option<String>,
    stats: QueryStats,
}

impl<E: Executor> Database<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            compiler: Compiler::new(),
            schema: None,
            stats: QueryStats::default(),
        }
    }

    /// Build from configuration: default schema and cache clear period.
    pub fn from_config(executor: E, config: &Config) -> Self {
        Self {
            executor,
            compiler: Compiler::with_cache(FragmentCache::new(config.mssql.cache_clear_every)),
            schema: config.default_schema(),
            stats: QueryStats::default(),
        }
    }

    /// Schema applied to descriptors that do not name one.
    pub fn with_schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.to_string()).filter(|s| !s.is_empty());
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    pub fn stats(&self) -> &QueryStats {
        &self.stats
    }

    /// Periodic signal; clears the fragment cache every N ticks.
    pub fn on_tick(&self, counter: u64) {
        self.compiler.on_tick(counter);
    }

    /// Compile every statement the descriptor's operation runs, in order.
    pub fn prepare(&self, filter: &FilterDescriptor) -> FilterResult<Vec<CompiledQuery>> {
        let filter = self.scoped(filter);
        if filter.exec == Operation::List {
            let (page, count) = self.compiler.compile_list(&filter)?;
            return Ok(vec![page, count]);
        }
        Ok(vec![self.compiler.compile(&filter)?])
    }

    /// Compile, execute and shape the result.
    ///
    /// Compilation errors are returned before the executor is called.
    pub async fn exec(&self, filter: &FilterDescriptor) -> FilterResult<Output> {
        let queries = self.prepare(filter)?;

        if filter.exec == Operation::List {
            let mut results = Vec::with_capacity(queries.len());
            for query in &queries {
                results.push(self.run(query, filter.debug).await?);
            }
            let count = results
                .get(1)
                .map(|r| as_u64(&r.first_value("count")))
                .unwrap_or(0);
            let items = results.into_iter().next().map(|r| r.rows).unwrap_or_default();
            return Ok(Output::List { items, count });
        }

        let mut result = QueryResult::default();
        for query in &queries {
            result = self.run(query, filter.debug).await?;
        }
        Ok(shape(filter, result))
    }

    fn scoped<'a>(&self, filter: &'a FilterDescriptor) -> Cow<'a, FilterDescriptor> {
        match (&filter.schema, &self.schema) {
            (None, Some(schema)) => {
                let mut scoped = filter.clone();
                scoped.schema = Some(schema.clone());
                Cow::Owned(scoped)
            }
            _ => Cow::Borrowed(filter),
        }
    }

    async fn run(&self, query: &CompiledQuery, debug: bool) -> FilterResult<QueryResult> {
        if debug {
            tracing::debug!(sql = %query.sql, params = ?query.params, "mssql");
        } else {
            tracing::trace!(sql = %query.sql, "mssql");
        }

        self.stats.record(query.is_read);

        self.executor.execute(query).await.map_err(|e| {
            tracing::error!(
                query = %truncate(&query.sql, LOG_QUERY_CHARS),
                "mssql query failed: {}",
                e
            );
            FilterError::execution(query.sql.clone(), e)
        })
    }
}

/// Shape a raw response according to the descriptor's operation.
pub fn shape(filter: &FilterDescriptor, result: QueryResult) -> Output {
    let returning = filter.returning.as_ref().is_some_and(|r| !r.is_empty());
    let primary_key = filter.primary_key.as_deref().filter(|pk| !pk.is_empty());

    match filter.exec {
        Operation::Insert => {
            if returning {
                Output::Row(result.rows.into_iter().next())
            } else if let Some(pk) = primary_key {
                Output::Value(result.first_value(pk))
            } else {
                Output::Affected(result.first_affected())
            }
        }
        Operation::Update => {
            if returning {
                rows_or_first(filter.first, result.rows)
            } else {
                Output::Affected(result.first_affected())
            }
        }
        Operation::Remove => {
            if returning {
                rows_or_first(filter.first, result.rows)
            } else if let Some(pk) = primary_key {
                Output::Value(result.first_value(pk))
            } else {
                Output::Affected(result.first_affected())
            }
        }
        Operation::Check => Output::Exists(as_u64(&result.first_value("count")) > 0),
        Operation::Count => Output::Count(as_u64(&result.first_value("count"))),
        Operation::Scalar => match filter.scalar {
            Some(ScalarSpec::Group { .. }) => Output::Rows(result.rows),
            _ => Output::Value(result.first_value("value")),
        },
        Operation::List => Output::List {
            count: result.rows.len() as u64,
            items: result.rows,
        },
        Operation::Find | Operation::Query | Operation::Drop | Operation::Truncate => {
            rows_or_first(filter.first, result.rows)
        }
    }
}

fn rows_or_first(first: bool, rows: Vec<Row>) -> Output {
    if first {
        Output::Row(rows.into_iter().next())
    } else {
        Output::Rows(rows)
    }
}

/// Numeric column value; drivers may hand counts back as strings.
fn as_u64(value: &JsonValue) -> u64 {
    match value {
        JsonValue::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        JsonValue::String(s) => s.trim().parse().unwrap_or(0),
        JsonValue::Bool(b) => u64::from(*b),
        _ => 0,
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: JsonValue) -> Row {
        match value {
            JsonValue::Object(map) => map,
            _ => Row::new(),
        }
    }

    #[test]
    fn test_shape_insert() {
        let rows = vec![row(json!({"id": 7, "name": "Ann"}))];

        let f = FilterDescriptor::new("t", Operation::Insert).returning(&["id", "name"]);
        assert_eq!(
            shape(&f, QueryResult::rows(rows.clone())),
            Output::Row(Some(rows[0].clone()))
        );

        let f = FilterDescriptor::new("t", Operation::Insert).primary_key("id");
        assert_eq!(
            shape(&f, QueryResult::rows(rows)),
            Output::Value(json!(7))
        );

        let f = FilterDescriptor::new("t", Operation::Insert);
        assert_eq!(shape(&f, QueryResult::affected(1)), Output::Affected(1));
    }

    #[test]
    fn test_shape_update_and_remove() {
        let rows = vec![row(json!({"id": 1})), row(json!({"id": 2}))];

        let f = FilterDescriptor::new("t", Operation::Update).returning(&["id"]);
        assert_eq!(
            shape(&f, QueryResult::rows(rows.clone())),
            Output::Rows(rows.clone())
        );
        let f = f.first();
        assert_eq!(
            shape(&f, QueryResult::rows(rows.clone())),
            Output::Row(Some(rows[0].clone()))
        );

        let f = FilterDescriptor::new("t", Operation::Update);
        assert_eq!(shape(&f, QueryResult::default()), Output::Affected(0));

        let f = FilterDescriptor::new("t", Operation::Remove).primary_key("id");
        assert_eq!(shape(&f, QueryResult::rows(rows)), Output::Value(json!(1)));

        let f = FilterDescriptor::new("t", Operation::Remove);
        assert_eq!(shape(&f, QueryResult::affected(4)), Output::Affected(4));
    }

    #[test]
    fn test_shape_reads() {
        let f = FilterDescriptor::new("t", Operation::Check);
        assert_eq!(
            shape(&f, QueryResult::rows(vec![row(json!({"count": 1}))])),
            Output::Exists(true)
        );
        assert_eq!(shape(&f, QueryResult::default()), Output::Exists(false));

        let f = FilterDescriptor::new("t", Operation::Count);
        assert_eq!(
            shape(&f, QueryResult::rows(vec![row(json!({"count": "12"}))])),
            Output::Count(12)
        );

        let f = FilterDescriptor::new("t", Operation::Scalar)
            .scalar(ScalarSpec::Sum { key: "x".into() });
        assert_eq!(
            shape(&f, QueryResult::rows(vec![row(json!({"value": 3.5}))])),
            Output::Value(json!(3.5))
        );
        assert_eq!(shape(&f, QueryResult::default()), Output::Value(JsonValue::Null));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate("abc", 100), "abc");
        assert_eq!(truncate("ääää", 2), "ää");
    }

    #[test]
    fn test_stats() {
        let stats = QueryStats::default();
        stats.record(true);
        stats.record(true);
        stats.record(false);
        assert_eq!(stats.reads(), 2);
        assert_eq!(stats.writes(), 1);
    }
}
