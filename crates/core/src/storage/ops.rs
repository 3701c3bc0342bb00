//! Field update application shared by the store implementations

use serde_json::Value;

use super::{FieldOp, FieldUpdate, Fields};
use crate::error::{Error, Result};

/// Apply `updates` in order. On error `fields` may be partially modified,
/// so callers apply to a copy and commit only on success.
pub fn apply_updates(fields: &mut Fields, updates: &[FieldUpdate]) -> Result<()> {
    for update in updates {
        match &update.op {
            FieldOp::Set(value) => {
                fields.insert(update.field.clone(), value.clone());
            }
            FieldOp::Delete => {
                fields.remove(&update.field);
            }
            FieldOp::ArrayUnion(values) => {
                let array = array_field(fields, &update.field)?;
                for value in values {
                    if !array.contains(value) {
                        array.push(value.clone());
                    }
                }
            }
            FieldOp::ArrayRemove(values) => {
                let array = array_field(fields, &update.field)?;
                array.retain(|element| !values.contains(element));
            }
        }
    }
    Ok(())
}

fn array_field<'a>(fields: &'a mut Fields, field: &str) -> Result<&'a mut Vec<Value>> {
    let entry = fields
        .entry(field.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));

    if entry.is_null() {
        *entry = Value::Array(Vec::new());
    }

    match entry {
        Value::Array(array) => Ok(array),
        _ => Err(Error::InvalidOperation(format!(
            "field '{}' is not an array",
            field
        ))),
    }
}

/// Does `fields[field]` equal `value`
pub fn field_matches(fields: &Fields, field: &str, value: &Value) -> bool {
    fields.get(field) == Some(value)
}
