//! T-SQL Transpiler for filter descriptors.
//!
//! Converts a [`FilterDescriptor`] into a [`CompiledQuery`]: SQL text, the
//! parameters bound to its `@name` placeholders, and a read/write flag.

pub mod columns;
pub mod conditions;
pub mod escape;
pub mod payload;

#[cfg(test)]
mod tests;

use serde::Serialize;

use crate::ast::{FilterDescriptor, Operation, Parameter, ScalarSpec};
use crate::cache::FragmentCache;
use crate::error::{FilterError, FilterResult};

use self::payload::{PayloadMode, compile_payload};

/// Leading verbs that mark a raw statement as a write.
const WRITE_VERBS: [&str; 4] = ["INSERT", "UPDATE", "DELETE", "DROP"];
/// Statement keywords that may follow a common table expression.
const CTE_VERBS: [&str; 5] = ["SELECT", "INSERT", "UPDATE", "DELETE", "MERGE"];

/// Token in raw SQL replaced by the compiled WHERE clause.
pub const WHERE_TOKEN: &str = "{where}";

/// A compiled statement ready for an executor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    /// Operation this statement was compiled for
    pub operation: Operation,
    /// T-SQL text
    pub sql: String,
    /// Parameters for the `@name` placeholders, in binding order
    pub params: Vec<Parameter>,
    /// Read (true) or write (false), for telemetry
    pub is_read: bool,
}

/// Trait for compiling a descriptor with a throwaway cache.
pub trait ToSql {
    fn to_sql(&self) -> FilterResult<CompiledQuery>;
}

impl ToSql for FilterDescriptor {
    fn to_sql(&self) -> FilterResult<CompiledQuery> {
        Compiler::new().compile(self)
    }
}

/// Descriptor compiler owning a fragment cache.
#[derive(Debug, Default)]
pub struct Compiler {
    cache: FragmentCache,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(cache: FragmentCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &FragmentCache {
        &self.cache
    }

    /// Periodic signal forwarded to the cache.
    pub fn on_tick(&self, counter: u64) {
        self.cache.on_tick(counter);
    }

    pub fn invalidate(&self) {
        self.cache.invalidate();
    }

    /// Compile the descriptor's own operation.
    pub fn compile(&self, filter: &FilterDescriptor) -> FilterResult<CompiledQuery> {
        self.compile_as(filter, filter.exec)
    }

    /// Row count for the descriptor's predicate, ignoring sort and paging.
    pub fn compile_count(&self, filter: &FilterDescriptor) -> FilterResult<CompiledQuery> {
        self.compile_as(filter, Operation::Count)
    }

    /// Page query and total-count query of a `list` call.
    pub fn compile_list(
        &self,
        filter: &FilterDescriptor,
    ) -> FilterResult<(CompiledQuery, CompiledQuery)> {
        Ok((
            self.compile_as(filter, Operation::List)?,
            self.compile_count(filter)?,
        ))
    }

    /// Compile the descriptor as `operation`.
    pub fn compile_as(
        &self,
        filter: &FilterDescriptor,
        operation: Operation,
    ) -> FilterResult<CompiledQuery> {
        let language = filter.language_code();
        let table = filter.table_name();

        if filter.table.is_empty() && operation != Operation::Query {
            return Err(FilterError::missing(operation, "table"));
        }

        let where_sql = self
            .compile_where(&filter.filter, language)
            .map(|w| format!(" WHERE {}", w))
            .unwrap_or_default();

        let fields = match filter.fields.as_deref() {
            Some(fields) if !fields.is_empty() => self.fields(fields, language),
            _ => "*".to_string(),
        };

        let mut params = Vec::new();
        let mut is_read = true;

        let mut sql = match operation {
            Operation::Find | Operation::List => {
                format!("SELECT {} FROM {}{}", fields, table, where_sql)
            }
            Operation::Count => format!("SELECT COUNT(1) AS count FROM {}{}", table, where_sql),
            Operation::Check => format!("SELECT 1 AS count FROM {}{}", table, where_sql),
            Operation::Insert => {
                is_read = false;
                let payload = filter
                    .payload
                    .as_ref()
                    .ok_or_else(|| FilterError::missing(operation, "payload"))?;
                let compiled = compile_payload(payload, PayloadMode::Insert);
                if compiled.columns.is_empty() {
                    return Err(FilterError::missing(operation, "payload"));
                }

                let output = self.output_clause(
                    "inserted",
                    filter.returning.as_deref(),
                    filter.primary_key.as_deref(),
                    language,
                );
                params = compiled.params;
                format!(
                    "INSERT INTO {} ({}){} VALUES({})",
                    table,
                    compiled.columns.join(", "),
                    output,
                    compiled.fragments.join(", ")
                )
            }
            Operation::Update => {
                is_read = false;
                let payload = filter
                    .payload
                    .as_ref()
                    .ok_or_else(|| FilterError::missing(operation, "payload"))?;
                let compiled = compile_payload(payload, PayloadMode::Update);
                if compiled.fragments.is_empty() {
                    return Err(FilterError::missing(operation, "payload"));
                }

                let output =
                    self.output_clause("inserted", filter.returning.as_deref(), None, language);
                params = compiled.params;
                format!(
                    "UPDATE {} SET {}{}{}",
                    table,
                    compiled.fragments.join(", "),
                    output,
                    where_sql
                )
            }
            Operation::Remove => {
                is_read = false;
                let output = self.output_clause(
                    "deleted",
                    filter.returning.as_deref(),
                    filter.primary_key.as_deref(),
                    language,
                );
                format!("DELETE FROM {}{}{}", table, output, where_sql)
            }
            Operation::Drop => {
                is_read = false;
                format!("DROP TABLE {}", table)
            }
            Operation::Truncate => {
                is_read = false;
                format!("TRUNCATE TABLE {}", table)
            }
            Operation::Scalar => {
                let scalar = filter
                    .scalar
                    .as_ref()
                    .ok_or_else(|| FilterError::missing(operation, "scalar"))?;
                self.scalar_sql(scalar, &table, &where_sql, language)?
            }
            Operation::Query => {
                let raw = filter
                    .query
                    .as_deref()
                    .ok_or_else(|| FilterError::missing(operation, "query"))?;
                params = filter.params.clone();
                let sql = inject_where(raw, &where_sql);
                is_read = !is_write_statement(&sql);
                sql
            }
        };

        if operation.is_paged() {
            sql = self.apply_paging(sql, filter, operation, language)?;
        }

        Ok(CompiledQuery {
            operation,
            sql,
            params,
            is_read,
        })
    }

    /// ` OUTPUT <prefix>.col, ...` from the returning list, else the primary key.
    fn output_clause(
        &self,
        prefix: &str,
        returning: Option<&[String]>,
        primary_key: Option<&str>,
        language: &str,
    ) -> String {
        let columns: Vec<String> = match (returning, primary_key) {
            (Some(cols), _) if !cols.is_empty() => cols
                .iter()
                .map(|c| format!("{}.{}", prefix, self.column(c, language)))
                .collect(),
            (_, Some(pk)) if !pk.is_empty() => {
                vec![format!("{}.{}", prefix, self.column(pk, language))]
            }
            _ => return String::new(),
        };
        format!(" OUTPUT {}", columns.join(", "))
    }

    fn scalar_sql(
        &self,
        scalar: &ScalarSpec,
        table: &str,
        where_sql: &str,
        language: &str,
    ) -> FilterResult<String> {
        let aggregate = |func: &str, key: &str| -> FilterResult<String> {
            let arg = self.aggregate_arg(key, language)?;
            Ok(format!(
                "SELECT CAST({}({}) AS NUMERIC) AS value FROM {}{}",
                func, arg, table, where_sql
            ))
        };

        match scalar {
            ScalarSpec::Avg { key } => aggregate("AVG", key),
            ScalarSpec::Min { key } => aggregate("MIN", key),
            ScalarSpec::Max { key } => aggregate("MAX", key),
            ScalarSpec::Sum { key } => aggregate("SUM", key),
            ScalarSpec::Count { .. } => Ok(format!(
                "SELECT CAST(COUNT(1) AS NUMERIC) AS value FROM {}{}",
                table, where_sql
            )),
            ScalarSpec::Group { key, key2 } => {
                if key.trim().is_empty() {
                    return Err(FilterError::MalformedScalar(
                        "group key is empty".to_string(),
                    ));
                }
                let group = self.column(key, language);
                let value = match key2.as_deref().map(str::trim) {
                    Some(k2) if !k2.is_empty() => {
                        format!("CAST(SUM({}) AS NUMERIC)", self.aggregate_arg(k2, language)?)
                    }
                    _ => "CAST(COUNT(1) AS INT)".to_string(),
                };
                Ok(format!(
                    "SELECT {0}, {1} AS value FROM {2}{3} GROUP BY {0}",
                    group, value, table, where_sql
                ))
            }
        }
    }

    fn aggregate_arg(&self, key: &str, language: &str) -> FilterResult<String> {
        match key.trim() {
            "" => Err(FilterError::MalformedScalar(
                "aggregate key is empty".to_string(),
            )),
            "*" => Ok("1".to_string()),
            key => Ok(self.column(key, language)),
        }
    }

    /// Append ORDER BY, then OFFSET/FETCH or inject TOP.
    fn apply_paging(
        &self,
        mut sql: String,
        filter: &FilterDescriptor,
        operation: Operation,
        language: &str,
    ) -> FilterResult<String> {
        let mut ordered = false;
        if let Some(sort) = filter.sort.as_deref().filter(|s| !s.is_empty()) {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.sort(sort, language));
            ordered = true;
        }
        if operation == Operation::Query && find_ignore_case(&sql, "ORDER BY").is_some() {
            ordered = true;
        }

        let skip = filter.skip.filter(|s| *s > 0);
        let take = filter.take.filter(|t| *t > 0);

        match (skip, take) {
            (Some(skip), Some(take)) => {
                if !ordered {
                    return Err(FilterError::OffsetWithoutOrder);
                }
                sql.push_str(&format!(
                    " OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
                    skip, take
                ));
            }
            (Some(skip), None) => {
                if !ordered {
                    return Err(FilterError::OffsetWithoutOrder);
                }
                sql.push_str(&format!(" OFFSET {} ROWS", skip));
            }
            (None, Some(take)) => sql = inject_top(sql, take),
            (None, None) => {}
        }

        Ok(sql)
    }
}

/// Insert `TOP n` after the first SELECT keyword and any DISTINCT/ALL quantifier.
fn inject_top(mut sql: String, take: u64) -> String {
    match find_ignore_case(&sql, "SELECT") {
        Some(index) => {
            let mut at = index + "SELECT".len();
            let rest = &sql[at..];
            let gap = rest.len() - rest.trim_start().len();
            let word = leading_word(rest.trim_start());
            if word.eq_ignore_ascii_case("DISTINCT") || word.eq_ignore_ascii_case("ALL") {
                at += gap + word.len();
            }
            sql.insert_str(at, &format!(" TOP {}", take));
        }
        None => {
            tracing::warn!("No SELECT keyword to limit; take={} ignored", take);
        }
    }
    sql
}

/// Substitute the `{where}` token, or append the clause when there is none.
fn inject_where(raw: &str, where_sql: &str) -> String {
    let clause = where_sql.trim_start();
    let mut sql = String::with_capacity(raw.len() + where_sql.len());
    let mut rest = raw;
    let mut replaced = false;

    while let Some(index) = find_ignore_case(rest, WHERE_TOKEN) {
        sql.push_str(&rest[..index]);
        sql.push_str(clause);
        rest = &rest[index + WHERE_TOKEN.len()..];
        replaced = true;
    }
    sql.push_str(rest);

    if !replaced && !clause.is_empty() {
        sql.push(' ');
        sql.push_str(clause);
    }
    sql
}

/// Whether raw SQL starts with a write verb, looking past a leading `WITH` clause.
pub fn is_write_statement(sql: &str) -> bool {
    let verb = statement_verb(sql);
    WRITE_VERBS.iter().any(|w| w.eq_ignore_ascii_case(verb))
}

/// The verb that drives a statement. For `WITH a AS (...), b AS (...) <verb>`
/// this is the first top-level DML keyword after the CTE bodies.
fn statement_verb(sql: &str) -> &str {
    let sql = sql.trim_start();
    let first = leading_word(sql);
    if !first.eq_ignore_ascii_case("WITH") {
        return first;
    }

    let bytes = sql.as_bytes();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut i = first.len();
    while i < bytes.len() {
        let b = bytes[i];
        if quoted {
            quoted = b != b'\'';
            i += 1;
            continue;
        }
        match b {
            b'\'' => quoted = true,
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            _ if depth == 0 && b.is_ascii_alphabetic() && !is_word_byte(bytes[i - 1]) => {
                let word = leading_word(&sql[i..]);
                if CTE_VERBS.iter().any(|v| v.eq_ignore_ascii_case(word)) {
                    return word;
                }
                i += word.len();
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    first
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'@' | b'#' | b'$')
}

/// Leading run of ASCII letters.
fn leading_word(s: &str) -> &str {
    let end = s
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(s.len());
    &s[..end]
}

/// Byte offset of `needle` in `haystack`, ASCII case-insensitive.
fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .to_ascii_lowercase()
        .find(&needle.to_ascii_lowercase())
}
