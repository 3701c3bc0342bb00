//! Document storage layer for Reminders
//!
//! Models the hosted real-time document store the app is built on:
//! collections of JSON documents, field-level updates with atomic array
//! union/removal, and live per-document watches.

mod memory;
mod migrations;
mod ops;
mod parse;
mod sqlite;
mod traits;
mod watch;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{DocumentListener, DocumentStore};
pub use watch::{Listener, ListenerSet, Subscription};

/// Collection holding user profiles, keyed by uid
pub const USERS_COLLECTION: &str = "users";

/// Collection holding rooms, keyed by room id
pub const ROOMS_COLLECTION: &str = "rooms";

/// Collection holding local auth credentials, keyed by uid
pub const ACCOUNTS_COLLECTION: &str = "accounts";

/// A document body
pub type Fields = serde_json::Map<String, Value>;

/// A stored document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Deserialize the body into a model
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }
}

/// Serialize a model into a document body
pub fn encode<T: Serialize>(value: &T) -> Result<Fields> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(Error::InvalidOperation(
            "document body must serialize to an object".into(),
        )),
    }
}

/// Operation applied to a single field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Set(Value),
    Delete,
    /// Append each value not already present
    ArrayUnion(Vec<Value>),
    /// Remove every element equal to one of the values
    ArrayRemove(Vec<Value>),
}

/// A field-level update
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub field: String,
    pub op: FieldOp,
}

impl FieldUpdate {
    pub fn set(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FieldOp::Set(value.into()),
        }
    }

    pub fn delete(field: &str) -> Self {
        Self {
            field: field.to_string(),
            op: FieldOp::Delete,
        }
    }

    pub fn array_union(field: &str, values: Vec<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FieldOp::ArrayUnion(values),
        }
    }

    pub fn array_remove(field: &str, values: Vec<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FieldOp::ArrayRemove(values),
        }
    }
}
