//! SQLite-backed document store
//!
//! Documents are stored as JSON bodies in a single table. Watches are
//! delivered in-process, so only writers sharing this handle are observed.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection};
use serde_json::Value;
use tracing::instrument;

use super::migrations;
use super::ops::{apply_updates, field_matches};
use super::parse::{parse_fields, OptionalExt};
use super::traits::{DocumentListener, DocumentStore};
use super::watch::{DocKey, DocumentWatchers, Snapshot, Subscription};
use super::{Document, FieldUpdate, Fields};
use crate::error::{Error, Result};

/// Main database handle
pub struct SqliteStore {
    conn: Mutex<Connection>,
    revision: AtomicU64,
    watchers: DocumentWatchers,
}

impl SqliteStore {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        migrations::run_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            revision: AtomicU64::new(1),
            watchers: DocumentWatchers::new(),
        })
    }

    /// Get current schema version
    pub fn schema_version(&self) -> Result<u32> {
        migrations::current_version(&*self.conn()?)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage("connection lock poisoned".into()))
    }

    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn notify(&self, collection: &str, id: &str, snapshot: Snapshot) {
        let key: DocKey = (collection.to_string(), id.to_string());
        self.watchers.notify(&key, snapshot);
    }
}

fn load(conn: &Connection, collection: &str, id: &str) -> Result<Option<Fields>> {
    let data: Option<String> = conn
        .query_row(
            "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
            |row| row.get(0),
        )
        .optional()?;

    Ok(data.map(|s| parse_fields(&s)).transpose()?)
}

fn store(conn: &Connection, collection: &str, id: &str, fields: &Fields) -> Result<()> {
    conn.execute(
        "INSERT INTO documents (collection, id, data, updated_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
        params![
            collection,
            id,
            serde_json::to_string(fields)?,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

impl DocumentStore for SqliteStore {
    #[instrument(skip(self))]
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let conn = self.conn()?;
        Ok(load(&conn, collection, id)?.map(|fields| Document::new(id, fields)))
    }

    #[instrument(skip(self, fields))]
    fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let snapshot = {
            let conn = self.conn()?;
            store(&conn, collection, id, &fields)?;
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
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;

            let mut fields = load(&tx, collection, id)?
                .ok_or_else(|| Error::NotFound(format!("{}/{}", collection, id)))?;
            apply_updates(&mut fields, updates)?;
            store(&tx, collection, id, &fields)?;
            tx.commit()?;

            Snapshot {
                revision: self.next_revision(),
                document: Some(Document::new(id, fields)),
            }
        };

        self.notify(collection, id, snapshot);
        Ok(())
    }

    #[instrument(skip(self))]
    fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let snapshot = {
            let conn = self.conn()?;
            let removed = conn.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )?;

            if removed == 0 {
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

    #[instrument(skip(self, value))]
    fn query_eq(&self, collection: &str, field: &str, value: &Value) -> Result<Vec<Document>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, data FROM documents WHERE collection = ?1 ORDER BY id")?;

        let rows = stmt
            .query_map(params![collection], |row| {
                let id: String = row.get(0)?;
                let fields = parse_fields(&row.get::<_, String>(1)?)?;
                Ok(Document::new(id, fields))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .filter(|doc| field_matches(&doc.fields, field, value))
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
                let conn = self.conn()?;
                Ok(Snapshot {
                    revision: self.revision.load(Ordering::Acquire),
                    document: load(&conn, collection, id)?.map(|fields| Document::new(id, fields)),
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Barrier, Mutex};
    use tempfile::tempdir;

    fn body(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_schema_version() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.schema_version().unwrap(), 2);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reminders.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("users", "u1", body(json!({ "email": "ada@example.com" }))).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let doc = store.get("users", "u1").unwrap().unwrap();
        assert_eq!(doc.fields["email"], "ada@example.com");
    }

    #[test]
    fn test_overwrite_replaces_body() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("users", "u1", body(json!({ "email": "a@x.io", "roomId": "r1" }))).unwrap();
        store.set("users", "u1", body(json!({ "email": "b@x.io" }))).unwrap();

        let doc = store.get("users", "u1").unwrap().unwrap();
        assert_eq!(Value::Object(doc.fields), json!({ "email": "b@x.io" }));
    }

    #[test]
    fn test_update_array_ops() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("rooms", "r1", body(json!({ "members": ["a"] }))).unwrap();

        store
            .update("rooms", "r1", &[FieldUpdate::array_union("members", vec![json!("b")])])
            .unwrap();
        store
            .update("rooms", "r1", &[FieldUpdate::array_remove("members", vec![json!("a")])])
            .unwrap();

        let doc = store.get("rooms", "r1").unwrap().unwrap();
        assert_eq!(doc.fields["members"], json!(["b"]));
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result = store.update("rooms", "nope", &[FieldUpdate::delete("members")]);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_query_eq_scoped_to_collection() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("rooms", "r1", body(json!({ "inviteCode": "CODE0001" }))).unwrap();
        store.set("users", "u1", body(json!({ "inviteCode": "CODE0001" }))).unwrap();

        let hits = store.query_eq("rooms", "inviteCode", &json!("CODE0001")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "r1");
    }

    #[test]
    fn test_watch_delete_delivers_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("rooms", "r1", body(json!({ "members": ["a"] }))).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = store
            .watch(
                "rooms",
                "r1",
                Box::new(move |doc: Option<Document>| sink.lock().unwrap().push(doc.is_some())),
            )
            .unwrap();

        store.delete("rooms", "r1").unwrap();
        store.delete("rooms", "r1").unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn test_watch_racing_update_ends_on_latest() {
        let store = SqliteStore::open_in_memory().unwrap();
        for round in 0..300 {
            let id = format!("r{round}");
            store.set("rooms", &id, body(json!({ "n": 0 }))).unwrap();
            let last: Arc<Mutex<Option<i64>>> = Arc::new(Mutex::new(None));
            let barrier = Barrier::new(2);

            let sub = std::thread::scope(|s| {
                s.spawn(|| {
                    barrier.wait();
                    store
                        .update("rooms", &id, &[FieldUpdate::set("n", 1)])
                        .unwrap();
                });
                let watcher = s.spawn(|| {
                    let sink = last.clone();
                    barrier.wait();
                    store
                        .watch(
                            "rooms",
                            &id,
                            Box::new(move |doc: Option<Document>| {
                                *sink.lock().unwrap() =
                                    doc.and_then(|d| d.fields.get("n").and_then(Value::as_i64));
                            }),
                        )
                        .unwrap()
                });
                watcher.join().unwrap()
            });

            assert_eq!(*last.lock().unwrap(), Some(1), "round {round} ended on a stale view");
            drop(sub);
        }
    }
}
