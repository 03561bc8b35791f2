//! Column metadata as reported by the remote service.
//!
//! This struct preserves the raw type name the service sends.
//! For user-facing API, use `Column` which carries the parsed type.

/// Column metadata as reported by a download session or live result.
///
/// Use `Column` for user-facing API.
#[derive(Debug, Clone)]
pub struct ColumnMetadata {
    /// Column name.
    pub name: String,
    /// Type name, e.g. `BIGINT` or `ARRAY<STRING>`.
    pub type_name: String,
    /// Whether NULL values are allowed.
    pub nullable: bool,
}

impl ColumnMetadata {
    /// Create new column metadata for a nullable column.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable: true,
        }
    }
}
