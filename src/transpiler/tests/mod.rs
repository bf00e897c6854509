//! Transpiler test modules.
//!
//! Tests are organized by category:
//! - `core`: SELECT, COUNT, INSERT, UPDATE, DELETE, DDL, scalar and raw statements
//! - `features`: predicates, payload operators, languages, paging, caching

mod features;
