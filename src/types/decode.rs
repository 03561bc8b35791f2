//! Decoding of raw remote records into typed rows.
//!
//! Both the paginated download channel and the live result stream hand out
//! records as textual cells. `RowDecoder` turns them into `Value`s using the
//! result schema.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{Error, Result};

use super::column::RowSchema;
use super::row::Row;
use super::type_info::TypeInfo;
use super::value::Value;

/// A record as delivered by the remote service: one optional text cell per column.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    cells: Vec<Option<String>>,
}

impl RawRecord {
    /// Create a record from its cells. `None` is SQL NULL.
    pub fn new(cells: Vec<Option<String>>) -> Self {
        Self { cells }
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the record has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Approximate wire size, used for throughput logging.
    pub fn byte_size(&self) -> usize {
        self.cells
            .iter()
            .map(|c| c.as_ref().map_or(0, String::len))
            .sum()
    }
}

impl<S: Into<String>> FromIterator<Option<S>> for RawRecord {
    fn from_iter<I: IntoIterator<Item = Option<S>>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|c| c.map(Into::into)).collect())
    }
}

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Decodes raw records against a fixed schema.
#[derive(Debug, Clone)]
pub struct RowDecoder {
    schema: Arc<RowSchema>,
}

impl RowDecoder {
    /// Create a decoder for the given schema.
    pub fn new(schema: Arc<RowSchema>) -> Self {
        Self { schema }
    }

    /// The schema rows are decoded against.
    pub fn schema(&self) -> &Arc<RowSchema> {
        &self.schema
    }

    /// Decode one record into a row.
    pub fn decode(&self, record: RawRecord) -> Result<Row> {
        if record.len() != self.schema.len() {
            return Err(Error::Decode {
                column: "*".to_string(),
                message: format!(
                    "record has {} cells, schema has {} columns",
                    record.len(),
                    self.schema.len()
                ),
            });
        }

        let values = record
            .cells
            .into_iter()
            .zip(&self.schema.columns)
            .map(|(cell, column)| match cell {
                None => Ok(Value::Null),
                Some(text) => decode_cell(&column.data_type, text).map_err(|message| {
                    Error::Decode {
                        column: column.name.clone(),
                        message,
                    }
                }),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Row::new(values, Arc::clone(&self.schema)))
    }
}

fn decode_cell(data_type: &TypeInfo, text: String) -> std::result::Result<Value, String> {
    let invalid = |text: &str| format!("invalid {} literal '{}'", data_type, text);
    match data_type {
        TypeInfo::Tinyint | TypeInfo::Smallint | TypeInfo::Int | TypeInfo::Bigint => text
            .trim()
            .parse()
            .map(Value::Int)
            .map_err(|_| invalid(&text)),
        TypeInfo::Float | TypeInfo::Double => text
            .trim()
            .parse()
            .map(Value::Double)
            .map_err(|_| invalid(&text)),
        TypeInfo::Decimal { .. } => Ok(Value::Decimal(text.trim().to_string())),
        TypeInfo::Boolean => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Boolean(true)),
            "false" | "0" => Ok(Value::Boolean(false)),
            _ => Err(invalid(&text)),
        },
        TypeInfo::String | TypeInfo::Varchar { .. } | TypeInfo::Char { .. } => {
            Ok(Value::String(text))
        }
        TypeInfo::Binary => STANDARD
            .decode(text.trim())
            .map(|bytes| Value::Binary(Bytes::from(bytes)))
            .map_err(|e| format!("invalid base64: {}", e)),
        TypeInfo::Date => NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|_| invalid(&text)),
        TypeInfo::Datetime | TypeInfo::Timestamp => DATETIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text.trim(), fmt).ok())
            .map(Value::Datetime)
            .ok_or_else(|| invalid(&text)),
        TypeInfo::Array(_) | TypeInfo::Map(..) | TypeInfo::Struct(_) => {
            serde_json::from_str(&text)
                .map(Value::Complex)
                .map_err(|e| format!("invalid JSON for {}: {}", data_type, e))
        }
    }
}
