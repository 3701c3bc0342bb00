//! In-memory document store

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use serde_json::Value;
use tracing::{debug, instrument};

use super::ops::{apply_updates, field_matches};
use super::traits::{DocumentListener, DocumentStore};
use super::watch::{DocKey, DocumentWatchers, Snapshot, Subscription};
use super::{Document, FieldUpdate, Fields};
use crate::error::{Error, Result};

type Collections = HashMap<String, BTreeMap<String, Fields>>;

/// Process-local document store, used in tests and for throwaway sessions
pub struct MemoryStore {
    collections: RwLock<Collections>,
    revision: AtomicU64,
    watchers: DocumentWatchers,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            revision: AtomicU64::new(1),
            watchers: DocumentWatchers::new(),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Collections>> {
        self.collections
            .read()
            .map_err(|_| Error::Storage("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Collections>> {
        self.collections
            .write()
            .map_err(|_| Error::Storage("memory store lock poisoned".into()))
    }

    /// Bump the revision; call while holding the write lock
    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn notify(&self, collection: &str, id: &str, snapshot: Snapshot) {
        let key: DocKey = (collection.to_string(), id.to_string());
        self.watchers.notify(&key, snapshot);
    }

    /// Number of live watches on a document
    pub fn watcher_count(&self, collection: &str, id: &str) -> usize {
        self.watchers
            .watcher_count(&(collection.to_string(), id.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let collections = self.read()?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    #[instrument(skip(self, fields))]
    fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let snapshot = {
            let mut collections = self.write()?;
            collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.to_string(), fields.clone());
            Snapshot {
                revision: self.next_revision(),
                document: Some(Document::new(id, fields)),
            }
        };

        self.notify(collection, id, snapshot);
        Ok(())
    }

    #[instrument(skip(self, updates), fields(count = updates.len()))]
    fn update(&self, collection: &str, id: &str, updates: &[FieldUpdate]) -> Result<()> {
        let snapshot = {
            let mut collections = self.write()?;
            let current = collections
                .get_mut(collection)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| Error::NotFound(format!("{}/{}", collection, id)))?;

            let mut next = current.clone();
            apply_updates(&mut next, updates)?;
            *current = next.clone();

            Snapshot {
                revision: self.next_revision(),
                document: Some(Document::new(id, next)),
            }
        };

        self.notify(collection, id, snapshot);
        Ok(())
    }

    #[instrument(skip(self))]
    fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let snapshot = {
            let mut collections = self.write()?;
            let removed = collections
                .get_mut(collection)
                .and_then(|docs| docs.remove(id));

            if removed.is_none() {
                debug!("Delete of missing document");
                return Ok(());
            }

            Snapshot {
                revision: self.next_revision(),
                document: None,
            }
        };

        self.notify(collection, id, snapshot);
        Ok(())
    }

    fn query_eq(&self, collection: &str, field: &str, value: &Value) -> Result<Vec<Document>> {
        let collections = self.read()?;
        let docs = match collections.get(collection) {
            Some(docs) => docs,
            None => return Ok(Vec::new()),
        };

        Ok(docs
            .iter()
            .filter(|(_, fields)| field_matches(fields, field, value))
            .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
            .collect())
    }

    fn watch(
        &self,
        collection: &str,
        id: &str,
        listener: DocumentListener,
    ) -> Result<Subscription> {
        self.watchers
            .register((collection.to_string(), id.to_string()), listener, || {
                let collections = self.read()?;
                Ok(Snapshot {
                    revision: self.revision.load(Ordering::Acquire),
                    document: collections
                        .get(collection)
                        .and_then(|docs| docs.get(id))
                        .map(|fields| Document::new(id, fields.clone())),
                })
            })
    }
}
