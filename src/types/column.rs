//! Parsed result schema.
//!
//! A download session or live stream reports its columns once as
//! `ColumnMetadata`. They are parsed here into a `RowSchema` that the
//! `RowDecoder` and every `Row` of the result share.

use crate::error::Result;

use super::metadata::ColumnMetadata;
use super::type_info::TypeInfo;

/// One result column with its parsed type.
#[derive(Debug, Clone)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Whether NULL values are allowed.
    pub nullable: bool,
    /// Column data type.
    pub data_type: TypeInfo,
}

impl Column {
    /// A nullable column.
    pub fn new(name: impl Into<String>, data_type: TypeInfo) -> Self {
        Self {
            name: name.into(),
            nullable: true,
            data_type,
        }
    }

    /// Parse the type name reported by the service.
    pub fn from_metadata(meta: &ColumnMetadata) -> Result<Self> {
        Ok(Self {
            name: meta.name.clone(),
            nullable: meta.nullable,
            data_type: TypeInfo::parse(&meta.type_name)?,
        })
    }
}

/// Ordered column name to type mapping shared by all rows of a result.
#[derive(Debug, Clone)]
pub struct RowSchema {
    pub columns: Vec<Column>,
}

impl RowSchema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Parse a session's column list. Fails on the first type name
    /// `TypeInfo::parse` does not understand.
    pub fn from_metadata(metadata: &[ColumnMetadata]) -> Result<Self> {
        metadata
            .iter()
            .map(Column::from_metadata)
            .collect::<Result<Vec<_>>>()
            .map(Self::new)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Index of the column named `name`, ignoring ASCII case.
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_metadata() -> Vec<ColumnMetadata> {
        vec![
            ColumnMetadata {
                name: "id".to_string(),
                type_name: "BIGINT".to_string(),
                nullable: false,
            },
            ColumnMetadata::new("name", "VARCHAR(100)"),
        ]
    }

    #[test]
    fn test_column_from_metadata() {
        let meta = &make_test_metadata()[0];
        let col = Column::from_metadata(meta).unwrap();

        assert_eq!(col.name, "id");
        assert!(!col.nullable);
        assert_eq!(col.data_type, TypeInfo::Bigint);
    }

    #[test]
    fn test_schema_from_metadata() {
        let metadata = make_test_metadata();
        let schema = RowSchema::from_metadata(&metadata).unwrap();

        assert_eq!(schema.len(), 2);
        assert_eq!(schema.column_names(), vec!["id", "name"]);
        assert_eq!(schema.find_by_name("NAME"), Some(1));
        assert_eq!(schema.find_by_name("unknown"), None);
        assert_eq!(schema.get(1).unwrap().data_type.max_size(), 100);
    }

    #[test]
    fn test_schema_rejects_unknown_type() {
        let metadata = vec![ColumnMetadata::new("x", "GEOMETRY")];
        assert!(RowSchema::from_metadata(&metadata).is_err());
    }
}
