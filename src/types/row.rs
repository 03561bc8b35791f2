//! Decoded result rows.

use std::sync::Arc;

use super::column::{Column, RowSchema};
use super::value::Value;

/// One decoded record.
///
/// Built by `RowDecoder`. All rows of a result share one `RowSchema`.
#[derive(Debug, Clone)]
pub struct Row {
    values: Vec<Value>,
    schema: Arc<RowSchema>,
}

impl Row {
    pub fn new(values: Vec<Value>, schema: Arc<RowSchema>) -> Self {
        Self { values, schema }
    }

    /// Value of column `index`, 0-based.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value of the column named `name`, ignoring ASCII case.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.schema
            .find_by_name(name)
            .and_then(|idx| self.values.get(idx))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn columns(&self) -> &[Column] {
        &self.schema.columns
    }

    /// The schema shared with the decoder and sibling rows.
    pub fn schema(&self) -> &Arc<RowSchema> {
        &self.schema
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }
}

impl IntoIterator for Row {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
