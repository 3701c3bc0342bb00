//! User profile model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthUser;

/// Per-user metadata document, keyed by the auth identity id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: Uuid,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    /// Room this user is paired into, if any
    #[serde(default)]
    pub room_id: Option<Uuid>,
    /// Push notification token
    #[serde(default)]
    pub notification_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(user: &AuthUser) -> Self {
        Self {
            uid: user.uid,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            photo_url: user.photo_url.clone(),
            room_id: None,
            notification_token: None,
            created_at: Utc::now(),
        }
    }

    pub fn has_room(&self) -> bool {
        self.room_id.is_some()
    }

    /// Single-letter avatar: first character of the email, uppercased
    pub fn avatar_initial(&self) -> char {
        self.email
            .chars()
            .next()
            .and_then(|c| c.to_uppercase().next())
            .unwrap_or('?')
    }
}
