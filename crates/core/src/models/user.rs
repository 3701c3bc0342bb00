//! Auth identity models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The signed-in identity as reported by the auth provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub uid: Uuid,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// Stored credentials for the local auth provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub uid: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

impl Account {
    pub fn new(email: String, password_hash: String) -> Self {
        Self {
            uid: Uuid::new_v4(),
            email,
            password_hash,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    pub fn to_auth_user(&self) -> AuthUser {
        AuthUser {
            uid: self.uid,
            email: self.email.clone(),
            display_name: None,
            photo_url: None,
        }
    }
}
