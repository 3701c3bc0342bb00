//! Database value parsing utilities
//!
//! Provides error-safe parsing of stored document bodies.

use rusqlite::Error as SqlError;
use serde_json::Value;

use super::Fields;

/// Parse a stored JSON document body
pub fn parse_fields(s: &str) -> Result<Fields, SqlError> {
    let value: Value = serde_json::from_str(s).map_err(|e| {
        SqlError::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    match value {
        Value::Object(fields) => Ok(fields),
        other => Err(SqlError::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("document body is not an object: {}", other).into(),
        )),
    }
}

/// Extension trait for converting rusqlite Results to Option
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, SqlError>;
}

impl<T> OptionalExt<T> for Result<T, SqlError> {
    fn optional(self) -> Result<Option<T>, SqlError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(SqlError::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
