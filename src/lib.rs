//! # mssql-filter: declarative filters for SQL Server
//!
//! Describe *what* to fetch or change as a [`FilterDescriptor`] and get back
//! parameterized T-SQL ready for an executor.
//!
//! ## Quick Example
//!
//! ```rust
//! use mssql_filter::prelude::*;
//!
//! let filter = FilterDescriptor::new("users", Operation::Find)
//!     .fields(&["id", "email"])
//!     .filter(eq("active", true))
//!     .sort(&["email_asc"])
//!     .take(10);
//!
//! let query = filter.to_sql().unwrap();
//! assert_eq!(
//!     query.sql,
//!     "SELECT TOP 10 \"id\", \"email\" FROM users WHERE \"active\" = 1 ORDER BY \"email\" ASC"
//! );
//! ```
//!
//! ## Payload prefixes
//!
//! | Prefix | Update                         | Insert        |
//! |--------|--------------------------------|---------------|
//! | `+`    | `col = COALESCE(col, 0) + @v`  | value         |
//! | `-`    | `col = COALESCE(col, 0) - @v`  | value         |
//! | `*`    | `col = COALESCE(col, 0) * @v`  | value         |
//! | `/`    | `col = COALESCE(col, 0) / @v`  | value         |
//! | `>`    | `col = GREATEST(col, @v)`      | value         |
//! | `<`    | `col = LEAST(col, @v)`         | value         |
//! | `!`    | toggle bit                     | `0`           |
//! | `=`    | skipped                        | raw SQL       |
//! | `#`    | raw SQL                        | skipped       |
//!
//! [`FilterDescriptor`]: ast::FilterDescriptor

pub mod ast;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod parser;
pub mod transpiler;

pub mod prelude {
    pub use crate::ast::conditions::*;
    pub use crate::ast::*;
    pub use crate::config::{Config, ConnectionConfig};
    pub use crate::engine::{Database, Executor, Output, QueryResult, Row};
    pub use crate::error::*;
    pub use crate::parser::{parse_predicate, parse_predicates};
    pub use crate::transpiler::{CompiledQuery, Compiler, ToSql};
}

/// Compile a descriptor with a fresh cache.
///
/// # Example
///
/// ```
/// use mssql_filter::ast::{FilterDescriptor, Operation};
///
/// let query = mssql_filter::compile(&FilterDescriptor::new("users", Operation::Count)).unwrap();
/// assert_eq!(query.sql, "SELECT COUNT(1) AS count FROM users");
/// ```
pub fn compile(filter: &ast::FilterDescriptor) -> error::FilterResult<transpiler::CompiledQuery> {
    transpiler::Compiler::new().compile(filter)
}
