//! Column data type with type-specific attributes.
//!
//! The service describes column types by name (`BIGINT`, `DECIMAL(10,2)`,
//! `ARRAY<STRING>`). This enum is the parsed form of those names.
//!
//! Note: Nullability is a column property, not a type property.

use crate::error::{Error, Result};

/// Column data type with type-specific attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeInfo {
    /// TINYINT - 8-bit signed integer.
    Tinyint,
    /// SMALLINT - 16-bit signed integer.
    Smallint,
    /// INT - 32-bit signed integer.
    Int,
    /// BIGINT - 64-bit signed integer.
    Bigint,
    /// FLOAT - single precision.
    Float,
    /// DOUBLE - double precision.
    Double,
    /// DECIMAL(precision, scale).
    Decimal { precision: u8, scale: u8 },
    /// BOOLEAN.
    Boolean,
    /// STRING - unbounded text.
    String,
    /// VARCHAR(n) - bounded variable-length text.
    Varchar { max_size: u32 },
    /// CHAR(n) - fixed-length text.
    Char { max_size: u32 },
    /// BINARY - raw bytes.
    Binary,
    /// DATE - calendar date.
    Date,
    /// DATETIME - date and time with millisecond precision.
    Datetime,
    /// TIMESTAMP - date and time with nanosecond precision.
    Timestamp,
    /// ARRAY<T>.
    Array(Box<TypeInfo>),
    /// MAP<K, V>.
    Map(Box<TypeInfo>, Box<TypeInfo>),
    /// STRUCT<name:T, ...>.
    Struct(Vec<(String, TypeInfo)>),
}

/// Default DECIMAL attributes when the service omits them.
const DEFAULT_DECIMAL_PRECISION: u8 = 54;
const DEFAULT_DECIMAL_SCALE: u8 = 18;

impl TypeInfo {
    /// Parse a type name as reported by the service.
    ///
    /// Returns `Err(Error::UnsupportedType)` for names it does not know.
    pub fn parse(type_name: &str) -> Result<Self> {
        let trimmed = type_name.trim();
        let unsupported = || Error::UnsupportedType {
            type_name: type_name.to_string(),
        };

        let (base, args) = match trimmed.find(['<', '(']) {
            Some(idx) => {
                let close = match trimmed.as_bytes()[idx] {
                    b'<' => '>',
                    _ => ')',
                };
                if !trimmed.ends_with(close) {
                    return Err(unsupported());
                }
                (&trimmed[..idx], Some(&trimmed[idx + 1..trimmed.len() - 1]))
            }
            None => (trimmed, None),
        };

        let base = base.trim().to_ascii_uppercase();
        match (base.as_str(), args) {
            ("TINYINT", None) => Ok(TypeInfo::Tinyint),
            ("SMALLINT", None) => Ok(TypeInfo::Smallint),
            ("INT" | "INTEGER", None) => Ok(TypeInfo::Int),
            ("BIGINT", None) => Ok(TypeInfo::Bigint),
            ("FLOAT", None) => Ok(TypeInfo::Float),
            ("DOUBLE", None) => Ok(TypeInfo::Double),
            ("BOOLEAN", None) => Ok(TypeInfo::Boolean),
            ("STRING", None) => Ok(TypeInfo::String),
            ("BINARY", None) => Ok(TypeInfo::Binary),
            ("DATE", None) => Ok(TypeInfo::Date),
            ("DATETIME", None) => Ok(TypeInfo::Datetime),
            ("TIMESTAMP", None) => Ok(TypeInfo::Timestamp),
            ("DECIMAL", None) => Ok(TypeInfo::Decimal {
                precision: DEFAULT_DECIMAL_PRECISION,
                scale: DEFAULT_DECIMAL_SCALE,
            }),
            ("DECIMAL", Some(args)) => {
                let parts: Vec<&str> = args.split(',').map(str::trim).collect();
                let precision = parts
                    .first()
                    .and_then(|p| p.parse().ok())
                    .ok_or_else(unsupported)?;
                let scale = match parts.get(1) {
                    Some(s) => s.parse().map_err(|_| unsupported())?,
                    None => 0,
                };
                Ok(TypeInfo::Decimal { precision, scale })
            }
            ("VARCHAR", Some(args)) => Ok(TypeInfo::Varchar {
                max_size: args.trim().parse().map_err(|_| unsupported())?,
            }),
            ("CHAR", Some(args)) => Ok(TypeInfo::Char {
                max_size: args.trim().parse().map_err(|_| unsupported())?,
            }),
            ("ARRAY", Some(args)) => Ok(TypeInfo::Array(Box::new(TypeInfo::parse(args)?))),
            ("MAP", Some(args)) => {
                let parts = split_top_level(args);
                if parts.len() != 2 {
                    return Err(unsupported());
                }
                Ok(TypeInfo::Map(
                    Box::new(TypeInfo::parse(parts[0])?),
                    Box::new(TypeInfo::parse(parts[1])?),
                ))
            }
            ("STRUCT", Some(args)) => {
                let mut fields = Vec::new();
                for field in split_top_level(args) {
                    let (name, field_type) = field.split_once(':').ok_or_else(unsupported)?;
                    fields.push((name.trim().to_string(), TypeInfo::parse(field_type)?));
                }
                Ok(TypeInfo::Struct(fields))
            }
            _ => Err(unsupported()),
        }
    }

    /// Whether values of this type are decoded from JSON text.
    pub fn is_complex(&self) -> bool {
        matches!(
            self,
            TypeInfo::Array(_) | TypeInfo::Map(..) | TypeInfo::Struct(_)
        )
    }

    /// Get precision (for Decimal types, 0 otherwise).
    pub fn precision(&self) -> u8 {
        match self {
            TypeInfo::Decimal { precision, .. } => *precision,
            _ => 0,
        }
    }

    /// Get scale (for Decimal types, 0 otherwise).
    pub fn scale(&self) -> u8 {
        match self {
            TypeInfo::Decimal { scale, .. } => *scale,
            _ => 0,
        }
    }

    /// Get max_size (for sized types like Varchar/Char, 0 otherwise).
    pub fn max_size(&self) -> u32 {
        match self {
            TypeInfo::Varchar { max_size } | TypeInfo::Char { max_size } => *max_size,
            _ => 0,
        }
    }
}

/// Split a generic argument list on commas that are not nested in `<>` or `()`.
fn split_top_level(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (idx, ch) in args.char_indices() {
        match ch {
            '<' | '(' => depth += 1,
            '>' | ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(args[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(args[start..].trim());
    parts
}

impl std::fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeInfo::Tinyint => write!(f, "TINYINT"),
            TypeInfo::Smallint => write!(f, "SMALLINT"),
            TypeInfo::Int => write!(f, "INT"),
            TypeInfo::Bigint => write!(f, "BIGINT"),
            TypeInfo::Float => write!(f, "FLOAT"),
            TypeInfo::Double => write!(f, "DOUBLE"),
            TypeInfo::Decimal { precision, scale } => write!(f, "DECIMAL({},{})", precision, scale),
            TypeInfo::Boolean => write!(f, "BOOLEAN"),
            TypeInfo::String => write!(f, "STRING"),
            TypeInfo::Varchar { max_size } => write!(f, "VARCHAR({})", max_size),
            TypeInfo::Char { max_size } => write!(f, "CHAR({})", max_size),
            TypeInfo::Binary => write!(f, "BINARY"),
            TypeInfo::Date => write!(f, "DATE"),
            TypeInfo::Datetime => write!(f, "DATETIME"),
            TypeInfo::Timestamp => write!(f, "TIMESTAMP"),
            TypeInfo::Array(element) => write!(f, "ARRAY<{}>", element),
            TypeInfo::Map(key, value) => write!(f, "MAP<{},{}>", key, value),
            TypeInfo::Struct(fields) => {
                write!(f, "STRUCT<")?;
                for (idx, (name, field_type)) in fields.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}:{}", name, field_type)?;
                }
                write!(f, ">")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_primitives() {
        assert_eq!(TypeInfo::parse("bigint").unwrap(), TypeInfo::Bigint);
        assert_eq!(TypeInfo::parse(" STRING ").unwrap(), TypeInfo::String);
        assert_eq!(
            TypeInfo::parse("varchar(20)").unwrap(),
            TypeInfo::Varchar { max_size: 20 }
        );
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(
            TypeInfo::parse("DECIMAL(10,2)").unwrap(),
            TypeInfo::Decimal {
                precision: 10,
                scale: 2
            }
        );
        let t = TypeInfo::parse("DECIMAL").unwrap();
        assert_eq!(t.precision(), 54);
        assert_eq!(t.scale(), 18);
    }

    #[test]
    fn test_parse_nested() {
        let t = TypeInfo::parse("MAP<STRING,ARRAY<DECIMAL(5,1)>>").unwrap();
        assert_eq!(
            t,
            TypeInfo::Map(
                Box::new(TypeInfo::String),
                Box::new(TypeInfo::Array(Box::new(TypeInfo::Decimal {
                    precision: 5,
                    scale: 1
                })))
            )
        );
        assert!(t.is_complex());

        let s = TypeInfo::parse("struct<id:bigint, tags:array<string>>").unwrap();
        assert_eq!(format!("{}", s), "STRUCT<id:BIGINT,tags:ARRAY<STRING>>");
    }

    #[test]
    fn test_parse_unsupported() {
        match TypeInfo::parse("INTERVAL_DAY_TIME") {
            Err(Error::UnsupportedType { type_name }) => assert_eq!(type_name, "INTERVAL_DAY_TIME"),
            other => panic!("Expected UnsupportedType error, got {:?}", other),
        }
        assert!(TypeInfo::parse("ARRAY<STRING").is_err());
        assert!(TypeInfo::parse("MAP<STRING>").is_err());
    }
}
