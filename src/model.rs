//! # Data Model
//!
//! Tabular record model shared by matching, resolution and registry linkage.
//! Records are ordered field maps with schema-tolerant access: a field that is
//! absent from a record reads as null, and every key evaluation checks the
//! owning [`Table`] schema up front.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Zero-based position of a record within its source table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordIndex(pub u32);

impl RecordIndex {
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RecordIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Identifier for clusters produced by one matching run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterId(pub u32);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// A scalar cell value
///
/// Integers are held exactly; only values with a fractional part or outside
/// the `i64` range fall back to `Number`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

static NULL_VALUE: Value = Value::Null;

impl Value {
    /// NaN numbers are treated as missing, matching tabular sources that use
    /// NaN as their missing marker.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Number(n) => n.is_nan(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Integer(n) => Some(*n != 0),
            Value::Number(n) if !n.is_nan() => Some(*n != 0.0),
            _ => None,
        }
    }

    /// Canonical text used for grouping and join keys. Null never yields a key.
    ///
    /// Integral numbers render without a fractional part so that a phone or
    /// license number stored as `5551234567` keys the same as the text
    /// `"5551234567"`.
    pub fn key_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Integer(n) => Some(n.to_string()),
            Value::Number(n) if n.is_nan() => None,
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                Some(format!("{}", *n as i64))
            }
            Value::Number(n) => Some(n.to_string()),
            Value::Text(s) => Some(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("null"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One row of a roster or reference table: an ordered field-name to value map
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Build a record from (field, value) pairs. Later duplicates overwrite
    /// earlier ones but keep the first position.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut record = Self::new();
        for (field, value) in pairs {
            record.set(field, value);
        }
        record
    }

    /// Builder form of [`Record::set`]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Value of `field`, or null when the record does not carry it
    pub fn value(&self, field: &str) -> &Value {
        self.get(field).unwrap_or(&NULL_VALUE)
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of non-null fields ("completeness")
    pub fn non_null_count(&self) -> usize {
        self.fields.iter().filter(|(_, value)| !value.is_null()).count()
    }

    /// Key tuple for `fields`, or `None` if any component is null or absent
    pub fn key_for(&self, fields: &[String]) -> Option<Vec<String>> {
        fields
            .iter()
            .map(|field| self.value(field).key_text())
            .collect()
    }

    /// Append every field of `other`, overwriting same-named fields
    pub fn extend_from(&mut self, other: &Record) {
        for (field, value) in other.fields() {
            self.set(field, value.clone());
        }
    }

    pub fn renamed<F>(&self, rename: F) -> Record
    where
        F: Fn(&str) -> String,
    {
        Record {
            fields: self
                .fields
                .iter()
                .map(|(name, value)| (rename(name), value.clone()))
                .collect(),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (field, value) in &self.fields {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

struct RecordVisitor;

impl<'de> Visitor<'de> for RecordVisitor {
    type Value = Record;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of field names to scalar values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Record, A::Error> {
        let mut record = Record::new();
        while let Some((field, value)) = access.next_entry::<String, Value>()? {
            record.set(field, value);
        }
        Ok(record)
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(RecordVisitor)
    }
}

/// A record set together with its column schema.
///
/// The schema is the union of field names in first-seen order, optionally
/// seeded with an explicit header. Record positions are stable and serve as
/// the [`RecordIndex`] for matching.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Record>", into = "Vec<Record>")]
pub struct Table {
    columns: Vec<String>,
    records: Vec<Record>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<Record>) -> Self {
        Self::with_columns(Vec::new(), records)
    }

    /// Build a table with an explicit header; columns found only in records
    /// are appended after it.
    pub fn with_columns(columns: Vec<String>, records: Vec<Record>) -> Self {
        let mut table = Self {
            columns: Vec::with_capacity(columns.len()),
            records: Vec::with_capacity(records.len()),
        };
        for column in columns {
            table.add_column(&column);
        }
        for record in records {
            table.push(record);
        }
        table
    }

    pub fn push(&mut self, record: Record) {
        for field in record.field_names() {
            if !self.columns.iter().any(|c| c == field) {
                self.columns.push(field.to_string());
            }
        }
        self.records.push(record);
    }

    fn add_column(&mut self, column: &str) {
        if !self.has_column(column) {
            self.columns.push(column.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn get(&self, index: RecordIndex) -> Option<&Record> {
        self.records.get(index.as_usize())
    }

    pub fn iter_indexed(&self) -> impl Iterator<Item = (RecordIndex, &Record)> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, record)| (RecordIndex(i as u32), record))
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn has_columns(&self, columns: &[String]) -> bool {
        columns.iter().all(|c| self.has_column(c))
    }

    /// Columns from `required` that are absent from the schema, in order
    pub fn missing_columns(&self, required: &[String]) -> Vec<String> {
        required
            .iter()
            .filter(|c| !self.has_column(c))
            .cloned()
            .collect()
    }

    /// Records matching `predicate`; the schema is kept and positions restart at zero
    pub fn filter<P>(&self, predicate: P) -> Table
    where
        P: Fn(&Record) -> bool,
    {
        Table {
            columns: self.columns.clone(),
            records: self
                .records
                .iter()
                .filter(|record| predicate(record))
                .cloned()
                .collect(),
        }
    }

    pub fn rename_columns<F>(&self, rename: F) -> Table
    where
        F: Fn(&str) -> String,
    {
        Table {
            columns: self.columns.iter().map(|c| rename(c)).collect(),
            records: self.records.iter().map(|r| r.renamed(&rename)).collect(),
        }
    }

    /// Count of each non-null value of `column`, keyed by its key text
    pub fn value_counts(&self, column: &str) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            if let Some(key) = record.value(column).key_text() {
                *counts.entry(key).or_insert(0) += 1;
            }
        }
        counts
    }
}

impl From<Vec<Record>> for Table {
    fn from(records: Vec<Record>) -> Self {
        Table::from_records(records)
    }
}

impl From<Table> for Vec<Record> {
    fn from(table: Table) -> Self {
        table.records
    }
}

impl FromIterator<Record> for Table {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Table::from_records(iter.into_iter().collect())
    }
}

/// Shorthand for turning string literals into an owned field list
pub fn field_list(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}
