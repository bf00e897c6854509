use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ast::{UpdateOp, Value};

/// One insert/update entry. `value` is `None` when the field is left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadEntry {
    pub op: UpdateOp,
    pub column: String,
    pub value: Option<Value>,
}

impl PayloadEntry {
    /// The key as written by the caller, operator prefix included.
    pub fn key(&self) -> String {
        match self.op.prefix() {
            Some(c) => format!("{}{}", c, self.column),
            None => self.column.clone(),
        }
    }
}

/// Ordered field/value mapping for insert and update.
///
/// Keys may carry an operator prefix (`+score`, `!active`, ...), parsed on insertion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Payload {
    entries: Vec<PayloadEntry>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field; the key prefix selects the update operator.
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.push(key, Some(value.into()));
        self
    }

    /// Add a field that is skipped during compilation.
    pub fn unset(mut self, key: &str) -> Self {
        self.push(key, None);
        self
    }

    pub fn push(&mut self, key: &str, value: Option<Value>) {
        let (op, column) = UpdateOp::split_key(key);
        self.entries.push(PayloadEntry {
            op,
            column: column.to_string(),
            value,
        });
    }

    pub fn entries(&self) -> &[PayloadEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            if let Some(value) = &entry.value {
                map.serialize_entry(&entry.key(), value)?;
            }
        }
        map.end()
    }
}

struct PayloadVisitor;

impl<'de> Visitor<'de> for PayloadVisitor {
    type Value = Payload;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of field names to values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Payload, A::Error> {
        let mut payload = Payload::new();
        while let Some((key, value)) = access.next_entry::<String, Value>()? {
            payload.push(&key, Some(value));
        }
        Ok(payload)
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(PayloadVisitor)
    }
}
