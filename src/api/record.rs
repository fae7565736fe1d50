//! Records: one row of a Dataverse table, held as typed field values.

use crate::error::{Error, Result};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Guid(Uuid),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    Null,
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_guid(&self) -> Option<Uuid> {
        match self {
            FieldValue::Guid(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Guid(id) => Value::String(id.to_string()),
            FieldValue::Integer(i) => Value::Number((*i).into()),
            FieldValue::Decimal(d) => Number::from_f64(*d).map(Value::Number).unwrap_or(Value::Null),
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Null => Value::Null,
        }
    }

    /// Convert a JSON scalar. Strings in GUID form become [`FieldValue::Guid`];
    /// arrays and objects (expanded navigation properties) yield `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(FieldValue::Null),
            Value::Bool(b) => Some(FieldValue::Boolean(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(FieldValue::Integer(i)),
                None => n.as_f64().map(FieldValue::Decimal),
            },
            Value::String(s) => match Uuid::try_parse(s) {
                Ok(id) if s.len() == 36 => Some(FieldValue::Guid(id)),
                _ => Some(FieldValue::String(s.clone())),
            },
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Guid(id) => write!(f, "{}", id),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Decimal(d) => write!(f, "{}", d),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Null => write!(f, "null"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<Uuid> for FieldValue {
    fn from(value: Uuid) -> Self {
        FieldValue::Guid(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Decimal(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// One row of a table, identified by logical name and, once created, by id.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    logical_name: String,
    id: Option<Uuid>,
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// An in-memory record not yet created on the platform.
    pub fn new(logical_name: impl Into<String>) -> Self {
        Self {
            logical_name: logical_name.into(),
            id: None,
            fields: BTreeMap::new(),
        }
    }

    /// A record that refers to an existing row.
    pub fn with_id(logical_name: impl Into<String>, id: Uuid) -> Self {
        Self {
            logical_name: logical_name.into(),
            id: Some(id),
            fields: BTreeMap::new(),
        }
    }

    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    /// Name of the primary key column, e.g. `accountid`.
    pub fn primary_id_field(&self) -> String {
        primary_id_field(&self.logical_name)
    }

    /// Attach the platform-assigned id. Once set, the id cannot change.
    pub fn assign_id(&mut self, id: Uuid) -> Result<()> {
        match self.id {
            Some(existing) if existing != id => Err(Error::InvalidRecord(format!(
                "{} already has id {}, cannot reassign to {}",
                self.logical_name, existing, id
            ))),
            _ => {
                self.id = Some(id);
                Ok(())
            }
        }
    }

    /// Set a field, replacing any previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> &mut Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Builder form of [`Record::set`].
    pub fn field(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// String value of a field, if present and a string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_str)
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.fields.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keep only the named fields.
    pub fn retain_fields(&mut self, columns: &[String]) {
        self.fields.retain(|name, _| columns.iter().any(|c| c == name));
    }

    /// JSON body for create/update. The primary key column is never sent;
    /// the id travels in the URL.
    pub fn to_payload(&self) -> Value {
        let primary = self.primary_id_field();
        let body: Map<String, Value> = self
            .fields
            .iter()
            .filter(|(name, _)| **name != primary)
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        Value::Object(body)
    }

    /// Build a record from a Web API entity representation. OData
    /// annotations (`@odata.etag`, `...@OData.Community.Display...`) and
    /// nested values are skipped; the primary key column becomes the id.
    pub fn from_payload(logical_name: &str, payload: &Value) -> Result<Self> {
        let object = payload.as_object().ok_or_else(|| {
            Error::InvalidRecord(format!("Expected a JSON object for {}", logical_name))
        })?;

        let mut record = Record::new(logical_name);
        let primary = record.primary_id_field();

        for (name, value) in object {
            if name.contains('@') {
                continue;
            }
            if *name == primary {
                if let Some(id) = value.as_str().and_then(|s| Uuid::try_parse(s).ok()) {
                    record.id = Some(id);
                }
                continue;
            }
            if let Some(field) = FieldValue::from_json(value) {
                record.fields.insert(name.clone(), field);
            }
        }

        Ok(record)
    }
}

/// Primary key column of a table, e.g. `account` -> `accountid`.
pub fn primary_id_field(logical_name: &str) -> String {
    format!("{}id", logical_name)
}
