//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible pairing states during
//! development. These checks are compiled out in release builds.

use uuid::Uuid;

use crate::models::Room;

/// Validate that a stored room is internally consistent
pub fn assert_room_invariants(room: &Room) {
    // The last member out deletes the room
    debug_assert!(
        !room.members.is_empty(),
        "Room {} is stored with no members",
        room.id
    );

    debug_assert!(
        room.invite_code.is_well_formed(),
        "Room {} has malformed invite code {}",
        room.id,
        room.invite_code
    );

    if cfg!(debug_assertions) {
        let mut seen = room.members.clone();
        seen.sort();
        seen.dedup();
        assert!(
            seen.len() == room.members.len(),
            "Room {} lists a member twice",
            room.id
        );
    }

    debug_assert!(room.created_by != Uuid::nil(), "Room {} has nil creator", room.id);
}
