//! Shared Reminders Core Library
//!
//! Models, document storage, authentication and the room pairing protocol
//! for the Shared Reminders client.

pub mod auth;
pub mod config;
pub mod error;
pub mod invariants;
pub mod models;
pub mod profiles;
pub mod rooms;
pub mod storage;

pub use auth::{AccountService, AuthListener, AuthProvider, LocalAuthProvider};
pub use config::{AppConfig, AuthConfig, LogConfig, PairingConfig, StorageBackend, StorageConfig};
pub use error::{Error, Result};
pub use models::*;
pub use profiles::ProfileStore;
pub use rooms::{CodeSource, RandomCodes, RoomService};
pub use storage::{
    Document, DocumentStore, FieldOp, FieldUpdate, MemoryStore, SqliteStore, Subscription,
};
