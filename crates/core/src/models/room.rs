//! Room model - the pairing unit

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::InviteCode;

/// A room shared by its members, joined through its invite code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// Document id; not stored in the document body
    #[serde(skip)]
    pub id: Uuid,
    pub created_by: Uuid,
    /// Member ids; order carries no meaning
    pub members: Vec<Uuid>,
    pub invite_code: InviteCode,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn new(id: Uuid, created_by: Uuid, invite_code: InviteCode) -> Self {
        Self {
            id,
            created_by,
            members: vec![created_by],
            invite_code,
            created_at: Utc::now(),
        }
    }

    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.members.contains(&user_id)
    }

    pub fn is_creator(&self, user_id: Uuid) -> bool {
        self.created_by == user_id
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Add a member if not already present (array-union semantics)
    pub fn add_member(&mut self, user_id: Uuid) {
        if !self.is_member(user_id) {
            self.members.push(user_id);
        }
    }

    /// Members that remain after `user_id` leaves
    pub fn members_without(&self, user_id: Uuid) -> Vec<Uuid> {
        self.members
            .iter()
            .copied()
            .filter(|id| *id != user_id)
            .collect()
    }
}
