//! Flat record queries: one table, a column list and a row cap.

use super::record::Record;
use crate::error::{Error, Result};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Logical name of the table, e.g. `account`
    pub entity: String,
    pub select: Vec<String>,
    pub top: Option<u32>,
}

impl Query {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            select: Vec::new(),
            top: None,
        }
    }

    /// Project only these columns
    pub fn select(mut self, fields: &[&str]) -> Self {
        self.select = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Limit number of results
    pub fn top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    /// OData system query options in a stable order
    pub fn to_query_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();

        if !self.select.is_empty() {
            params.push(("$select".to_string(), self.select.join(",")));
        }

        if let Some(top) = self.top {
            params.push(("$top".to_string(), top.to_string()));
        }

        params
    }
}

/// The `value` array of an OData collection response.
#[derive(Debug, Clone)]
pub struct QueryResponse {
    pub value: Vec<Value>,
    pub next_link: Option<String>,
}

impl QueryResponse {
    pub fn from_json(json: Value) -> Result<Self> {
        let next_link = json
            .get("@odata.nextLink")
            .and_then(|n| n.as_str())
            .map(|s| s.to_string());

        let value = match json {
            Value::Object(mut map) => match map.remove("value") {
                Some(Value::Array(items)) => items,
                _ => return Err(missing_value()),
            },
            _ => return Err(missing_value()),
        };

        Ok(Self { value, next_link })
    }

    /// Convert the rows into records of `logical_name`.
    pub fn into_records(self, logical_name: &str) -> Result<Vec<Record>> {
        self.value
            .iter()
            .map(|row| Record::from_payload(logical_name, row))
            .collect()
    }
}

fn missing_value() -> Error {
    Error::Request {
        status: 200,
        reason: "OK".to_string(),
        message: Some("Missing or invalid 'value' array in response".to_string()),
    }
}

/// Rows returned by a query. Consumed by iterating; it cannot be rewound.
#[derive(Debug)]
pub struct RecordSet {
    rows: std::vec::IntoIter<Record>,
}

impl RecordSet {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            rows: records.into_iter(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl Iterator for RecordSet {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for RecordSet {}
