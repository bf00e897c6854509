//! WHERE clause compilation.

use crate::ast::{Comparator, Comparison, DatePart, Predicate, SearchAnchor, Value};

use super::Compiler;
use super::escape::escape;

/// Operator joining the fragments of one predicate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn joiner(&self) -> &'static str {
        match self {
            LogicalOp::And => " AND ",
            LogicalOp::Or => " OR ",
        }
    }
}

impl Compiler {
    /// Compile a predicate list into its boolean expression, `None` when empty.
    pub fn compile_where(&self, predicates: &[Predicate], language: &str) -> Option<String> {
        let fragments = self.where_fragments(predicates, language);
        if fragments.is_empty() {
            None
        } else {
            Some(fragments.join(LogicalOp::And.joiner()))
        }
    }

    /// One SQL fragment per predicate, in order, for the caller to join.
    pub fn where_fragments(&self, predicates: &[Predicate], language: &str) -> Vec<String> {
        predicates
            .iter()
            .filter_map(|p| self.predicate_sql(p, language))
            .collect()
    }

    fn predicate_sql(&self, predicate: &Predicate, language: &str) -> Option<String> {
        let sql = match predicate {
            Predicate::Where(c) => self.comparison_sql(c, language),
            Predicate::Or { value } => {
                let inner = self.where_fragments(value, language);
                if inner.is_empty() {
                    return None;
                }
                format!("({})", inner.join(LogicalOp::Or.joiner()))
            }
            Predicate::In { column, value } => {
                let col = self.column(column, language);
                let items = in_list(value);
                if items.is_empty() {
                    format!("{} IN (NULL)", col)
                } else {
                    format!("{} IN ({})", col, items.join(", "))
                }
            }
            Predicate::NotIn { column, value } => {
                let col = self.column(column, language);
                let items = in_list(value);
                if items.is_empty() {
                    // Nothing excluded.
                    "1=1".to_string()
                } else {
                    format!("{} NOT IN ({})", col, items.join(", "))
                }
            }
            Predicate::Query { value } => format!("({})", value),
            Predicate::Contains { column } => {
                let col = self.column(column, language);
                format!("LEN(CAST({} AS NVARCHAR(MAX))) > 0", col)
            }
            Predicate::Empty { column } => {
                let col = self.column(column, language);
                format!("({0} IS NULL OR LEN(CAST({0} AS NVARCHAR(MAX))) = 0)", col)
            }
            Predicate::Between { column, a, b } => {
                let col = self.column(column, language);
                format!("({} BETWEEN {} AND {})", col, escape(a), escape(b))
            }
            Predicate::Search {
                column,
                value,
                operator,
            } => {
                let col = self.column(column, language);
                let term = value.as_deref().unwrap_or("").replace('%', "");
                match operator {
                    SearchAnchor::Beg => {
                        format!("{} LIKE {}", col, escape(&Value::String(format!("{}%", term))))
                    }
                    SearchAnchor::End => {
                        format!("{} LIKE {}", col, escape(&Value::String(format!("%{}", term))))
                    }
                    SearchAnchor::Contains => format!(
                        "CAST({} AS NVARCHAR(MAX)) LIKE {}",
                        col,
                        escape(&Value::String(format!("%{}%", term)))
                    ),
                }
            }
            Predicate::Year(c) => self.date_part_sql(DatePart::Year, c, language),
            Predicate::Month(c) => self.date_part_sql(DatePart::Month, c, language),
            Predicate::Day(c) => self.date_part_sql(DatePart::Day, c, language),
            Predicate::Hour(c) => self.date_part_sql(DatePart::Hour, c, language),
            Predicate::Minute(c) => self.date_part_sql(DatePart::Minute, c, language),
        };
        Some(sql)
    }

    fn comparison_sql(&self, c: &Comparison, language: &str) -> String {
        let col = self.column(&c.column, language);
        let value = c.value.resolved();
        if value.is_null() {
            match c.comparer {
                Comparator::Eq => return format!("{} IS NULL", col),
                Comparator::NotEq => return format!("{} IS NOT NULL", col),
                _ => {}
            }
        }
        format!("{} {} {}", col, c.comparer.as_sql(), escape(&value))
    }

    fn date_part_sql(&self, part: DatePart, c: &Comparison, language: &str) -> String {
        let col = self.column(&c.column, language);
        format!(
            "{} {} {}",
            part.extract(&col),
            c.comparer.as_sql(),
            escape(&c.value)
        )
    }
}

/// Escaped, non-null members of an IN list. A scalar is a one-item list.
fn in_list(value: &Value) -> Vec<String> {
    match value.resolved() {
        Value::Array(items) => items
            .iter()
            .map(Value::resolved)
            .filter(|v| !v.is_null())
            .map(|v| escape(&v))
            .collect(),
        Value::Null => Vec::new(),
        other => vec![escape(&other)],
    }
}
