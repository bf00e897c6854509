//! Insert/update payload compilation.
//!
//! Every `@name` placeholder pushed here has exactly one parameter, in the
//! same order. Toggle and raw branches never bind.

use std::collections::HashSet;

use crate::ast::{Parameter, Payload, UpdateOp, Value};

use super::columns::quote_identifier;
use super::escape::escape;

/// Whether the payload feeds an INSERT or an UPDATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadMode {
    Insert,
    Update,
}

/// Output of payload compilation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledPayload {
    /// Quoted column names (insert only)
    pub columns: Vec<String>,
    /// VALUES entries (insert) or SET assignments (update)
    pub fragments: Vec<String>,
    /// Bound parameters, in placeholder order
    pub params: Vec<Parameter>,
    names: HashSet<String>,
}

impl CompiledPayload {
    fn bind(&mut self, column: &str, value: Value) -> String {
        let name = self.placeholder_name(column);
        self.params.push(Parameter {
            name: name.clone(),
            value,
        });
        format!("@{}", name)
    }

    /// Placeholder-safe, unique name derived from the column.
    fn placeholder_name(&mut self, column: &str) -> String {
        let mut base: String = column
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        if base.is_empty() {
            base.push('p');
        }

        let mut name = base.clone();
        let mut n = 2;
        while self.names.contains(&name) {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        self.names.insert(name.clone());
        name
    }

    fn insert_value(&mut self, column: &str, fragment: String) {
        self.columns.push(quote_identifier(column));
        self.fragments.push(fragment);
    }
}

/// Compile a payload for insert or update.
pub fn compile_payload(payload: &Payload, mode: PayloadMode) -> CompiledPayload {
    let mut out = CompiledPayload::default();

    for entry in payload.entries() {
        // Deferred producers run once per entry.
        let Some(value) = entry.value.as_ref().map(Value::resolved) else {
            continue;
        };
        let value = &value;
        let name = entry.column.as_str();
        let col = quote_identifier(name);

        match (entry.op, mode) {
            (
                UpdateOp::Increment
                | UpdateOp::Decrement
                | UpdateOp::Multiply
                | UpdateOp::Divide
                | UpdateOp::Max
                | UpdateOp::Min,
                PayloadMode::Insert,
            ) => {
                let p = out.bind(name, numeric_or_zero(value));
                out.insert_value(name, p);
            }
            (op @ (UpdateOp::Max | UpdateOp::Min), PayloadMode::Update) => {
                let func = if op == UpdateOp::Max { "GREATEST" } else { "LEAST" };
                let p = out.bind(name, numeric_or_zero(value));
                out.fragments.push(format!("{0} = {1}({0}, {2})", col, func, p));
            }
            (op @ (UpdateOp::Increment
                | UpdateOp::Decrement
                | UpdateOp::Multiply
                | UpdateOp::Divide), PayloadMode::Update) => {
                let symbol = op.prefix().unwrap_or('+');
                let p = out.bind(name, numeric_or_zero(value));
                out.fragments
                    .push(format!("{0} = COALESCE({0}, 0) {1} {2}", col, symbol, p));
            }
            (UpdateOp::Toggle, PayloadMode::Insert) => {
                out.insert_value(name, "0".to_string());
            }
            (UpdateOp::Toggle, PayloadMode::Update) => {
                out.fragments.push(format!(
                    "{0} = CASE WHEN {0} = 1 THEN 0 ELSE 1 END",
                    col
                ));
            }
            (UpdateOp::RawInsertOnly, PayloadMode::Insert) => {
                out.insert_value(name, raw_sql(value));
            }
            (UpdateOp::RawUpdateOnly, PayloadMode::Update) => {
                out.fragments.push(format!("{} = {}", col, raw_sql(value)));
            }
            (UpdateOp::RawInsertOnly, PayloadMode::Update)
            | (UpdateOp::RawUpdateOnly, PayloadMode::Insert) => {}
            (UpdateOp::Plain, PayloadMode::Insert) => {
                let p = out.bind(name, value.clone());
                out.insert_value(name, p);
            }
            (UpdateOp::Plain, PayloadMode::Update) => {
                let p = out.bind(name, value.clone());
                out.fragments.push(format!("{} = {}", col, p));
            }
        }
    }

    out
}

fn numeric_or_zero(value: &Value) -> Value {
    if value.is_falsy() {
        Value::Int(0)
    } else {
        value.clone()
    }
}

/// Raw payload values: text is trusted SQL, anything else is a literal.
fn raw_sql(value: &Value) -> String {
    match value {
        Value::String(sql) => sql.clone(),
        other => escape(other),
    }
}
