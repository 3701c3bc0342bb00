//! Document store trait
//!
//! The real-time document store is an external collaborator. This trait is
//! the seam: in-memory and SQLite implementations ship with the crate, and a
//! hosted backend would implement the same operations.

use serde_json::Value;
use uuid::Uuid;

use super::watch::Subscription;
use super::{Document, FieldUpdate, Fields};
use crate::error::Result;

/// Callback receiving a document snapshot, `None` once it no longer exists
pub type DocumentListener = Box<dyn Fn(Option<Document>) + Send + Sync>;

/// Collections of JSON documents with live per-document watches
pub trait DocumentStore: Send + Sync {
    /// Allocate a fresh document id
    fn new_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Read a document
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Create or overwrite a document
    fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<()>;

    /// Apply field updates atomically. Fails with `NotFound` if the
    /// document does not exist.
    fn update(&self, collection: &str, id: &str, updates: &[FieldUpdate]) -> Result<()>;

    /// Delete a document. Deleting a missing document is not an error.
    fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// All documents whose `field` equals `value`
    fn query_eq(&self, collection: &str, field: &str, value: &Value) -> Result<Vec<Document>>;

    /// Watch one document. The listener gets the current snapshot right
    /// away, then a snapshot after every committed write to the document.
    fn watch(&self, collection: &str, id: &str, listener: DocumentListener)
        -> Result<Subscription>;
}
