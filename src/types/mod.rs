//! Result schema, values and row decoding.

mod column;
mod decode;
mod metadata;
mod row;
mod type_info;
mod value;

pub use column::{Column, RowSchema};
pub use decode::{RawRecord, RowDecoder};
pub use metadata::ColumnMetadata;
pub use row::Row;
pub use type_info::TypeInfo;
pub use value::Value;
