//! Room setup view model: create a room or join one by code

use reminders_core::{Error, RoomService, INVITE_CODE_LEN};
use uuid::Uuid;

use crate::navigation::Route;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupMode {
    Create,
    Join,
}

pub struct RoomSetupViewModel {
    rooms: RoomService,
    uid: Uuid,
    mode: SetupMode,
    invite_input: String,
    error: Option<String>,
}

impl RoomSetupViewModel {
    pub fn new(rooms: RoomService, uid: Uuid) -> Self {
        Self {
            rooms,
            uid,
            mode: SetupMode::Create,
            invite_input: String::new(),
            error: None,
        }
    }

    pub fn set_mode(&mut self, mode: SetupMode) {
        self.mode = mode;
        self.error = None;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Typed input is uppercased and capped at the code length
    pub fn set_invite_input(&mut self, text: &str) {
        self.invite_input = text.to_uppercase().chars().take(INVITE_CODE_LEN).collect();
        self.error = None;
    }

    /// Create or join, per the current mode
    pub fn submit(&mut self) -> Option<Route> {
        match self.mode {
            SetupMode::Create => self.create_room(),
            SetupMode::Join => self.join_room(),
        }
    }

    pub fn create_room(&mut self) -> Option<Route> {
        self.error = None;
        match self.rooms.create_room(self.uid) {
            Ok(room) => Some(Route::RoomDashboard { room_id: room.id }),
            Err(e) => {
                self.error = Some(error_text(&e, "Failed to create room"));
                None
            }
        }
    }

    pub fn join_room(&mut self) -> Option<Route> {
        if self.invite_input.trim().is_empty() {
            self.error = Some("Please enter an invite code".into());
            return None;
        }

        self.error = None;
        match self.rooms.join_room(&self.invite_input, self.uid) {
            Ok(room) => Some(Route::RoomDashboard { room_id: room.id }),
            Err(e) => {
                self.error = Some(error_text(&e, "Failed to join room"));
                None
            }
        }
    }
}

/// The error's message, or `fallback` when it has none
pub(crate) fn error_text(err: &Error, fallback: &str) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use reminders_core::{AppConfig, MemoryStore};
    use std::sync::Arc;

    fn signed_up(state: &AppState, email: &str) -> Uuid {
        let user = state.accounts.register(email, "secret1").unwrap();
        user.uid
    }

    fn state() -> AppState {
        AppState::with_store(Arc::new(MemoryStore::new()), &AppConfig::default())
    }

    #[test]
    fn invite_input_is_uppercased_and_capped() {
        let state = state();
        let mut vm = RoomSetupViewModel::new(state.rooms.clone(), Uuid::new_v4());

        vm.set_invite_input("abcd1234xyz");
        assert_eq!(vm.invite_input, "ABCD1234");
    }

    #[test]
    fn empty_code_is_rejected() {
        let state = state();
        let mut vm = RoomSetupViewModel::new(state.rooms.clone(), Uuid::new_v4());
        vm.set_mode(SetupMode::Join);

        assert!(vm.submit().is_none());
        assert_eq!(vm.error(), Some("Please enter an invite code"));
    }

    #[test]
    fn create_then_join() {
        let state = state();
        let ada = signed_up(&state, "ada@example.com");
        let bob = signed_up(&state, "bob@example.com");

        let mut creator = RoomSetupViewModel::new(state.rooms.clone(), ada);
        let route = creator.create_room().unwrap();
        let Route::RoomDashboard { room_id } = route else {
            panic!("expected dashboard route, got {route:?}");
        };
        let room = state.rooms.get_room(room_id).unwrap().unwrap();

        let mut joiner = RoomSetupViewModel::new(state.rooms.clone(), bob);
        joiner.set_mode(SetupMode::Join);
        joiner.set_invite_input(&room.invite_code.as_str().to_lowercase());
        assert_eq!(joiner.submit(), Some(Route::RoomDashboard { room_id }));

        // second create for a paired user
        assert!(creator.create_room().is_none());
        assert_eq!(creator.error(), Some("User already belongs to a room"));
    }

    #[test]
    fn unknown_code_shows_error() {
        let state = state();
        let bob = signed_up(&state, "bob@example.com");
        let mut vm = RoomSetupViewModel::new(state.rooms.clone(), bob);

        vm.set_invite_input("ZZZZ9999");
        assert!(vm.join_room().is_none());
        assert_eq!(vm.error(), Some("Invalid invite code"));
    }

    #[test]
    fn empty_messages_fall_back() {
        let err = Error::Authentication(String::new());
        assert_eq!(error_text(&err, "Failed to join room"), "Failed to join room");
    }
}
