//! Screen selection from auth and room state

use reminders_core::{AuthUser, UserProfile};
use uuid::Uuid;

/// Which screen to mount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Auth,
    RoomSetup,
    RoomDashboard { room_id: Uuid },
}

/// No user shows Auth; a user linked to a room shows that room's
/// dashboard; anyone else sets up a room.
pub fn resolve_route(user: Option<&AuthUser>, profile: Option<&UserProfile>) -> Route {
    if user.is_none() {
        return Route::Auth;
    }

    match profile.and_then(|p| p.room_id) {
        Some(room_id) => Route::RoomDashboard { room_id },
        None => Route::RoomSetup,
    }
}
