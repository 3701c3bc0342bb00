//! User profile storage operations

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{AuthUser, UserProfile};
use crate::storage::{encode, DocumentStore, FieldUpdate, USERS_COLLECTION};

/// CRUD over `users/{uid}` documents
#[derive(Clone)]
pub struct ProfileStore {
    store: Arc<dyn DocumentStore>,
}

impl ProfileStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Create the profile for a freshly registered user. An existing
    /// profile is left as is.
    #[instrument(skip(self, user), fields(uid = %user.uid))]
    pub fn create_profile(&self, user: &AuthUser) -> Result<UserProfile> {
        let id = user.uid.to_string();

        if let Some(doc) = self.store.get(USERS_COLLECTION, &id)? {
            debug!("Profile already exists");
            return doc.decode();
        }

        let profile = UserProfile::new(user);
        self.store.set(USERS_COLLECTION, &id, encode(&profile)?)?;
        info!("Profile created");
        Ok(profile)
    }

    /// Find profile by uid
    #[instrument(skip(self))]
    pub fn get_profile(&self, uid: Uuid) -> Result<Option<UserProfile>> {
        self.store
            .get(USERS_COLLECTION, &uid.to_string())?
            .map(|doc| doc.decode())
            .transpose()
    }

    /// Profiles for several users, skipping any that do not exist.
    /// Order follows `uids`.
    pub fn get_profiles(&self, uids: &[Uuid]) -> Result<Vec<UserProfile>> {
        let mut profiles = Vec::with_capacity(uids.len());
        for uid in uids {
            if let Some(profile) = self.get_profile(*uid)? {
                profiles.push(profile);
            }
        }
        Ok(profiles)
    }

    /// Link the user to a room, or clear the link with `None`
    #[instrument(skip(self))]
    pub fn update_user_room(&self, uid: Uuid, room_id: Option<Uuid>) -> Result<()> {
        let value = room_id.map_or(Value::Null, |id| Value::String(id.to_string()));
        self.store.update(
            USERS_COLLECTION,
            &uid.to_string(),
            &[FieldUpdate::set("roomId", value)],
        )
    }

    /// Store the push notification token
    #[instrument(skip(self, token))]
    pub fn update_notification_token(&self, uid: Uuid, token: &str) -> Result<()> {
        self.store.update(
            USERS_COLLECTION,
            &uid.to_string(),
            &[FieldUpdate::set("notificationToken", token)],
        )
    }
}
