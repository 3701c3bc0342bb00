//! Room pairing protocol
//!
//! Create, join and leave are short sequences of document store calls.
//! Two checks are not atomic and are kept that way:
//!
//! - the "already in a room" guard reads the profile, then writes, so two
//!   concurrent creates for one user can both pass;
//! - invite code uniqueness is check-then-create, so two rooms can in
//!   principle end up with the same code. Joins then pick the first match.

mod codes;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::PairingConfig;
use crate::error::{Error, Result};
use crate::invariants::assert_room_invariants;
use crate::models::{InviteCode, Room};
use crate::profiles::ProfileStore;
use crate::storage::{encode, Document, DocumentStore, FieldUpdate, Subscription, ROOMS_COLLECTION};

pub use codes::{CodeSource, RandomCodes};

/// Room store plus the pairing protocol
#[derive(Clone)]
pub struct RoomService {
    store: Arc<dyn DocumentStore>,
    profiles: ProfileStore,
    codes: Arc<dyn CodeSource>,
    max_attempts: u32,
}

impl RoomService {
    pub fn new(store: Arc<dyn DocumentStore>, profiles: ProfileStore) -> Self {
        Self::with_config(store, profiles, &PairingConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn DocumentStore>,
        profiles: ProfileStore,
        config: &PairingConfig,
    ) -> Self {
        Self {
            store,
            profiles,
            codes: Arc::new(RandomCodes),
            max_attempts: config.invite_code_attempts,
        }
    }

    /// Replace the random code source
    pub fn with_code_source(mut self, codes: Arc<dyn CodeSource>) -> Self {
        self.codes = codes;
        self
    }

    /// No stored room uses `code`
    pub fn is_invite_code_unique(&self, code: &InviteCode) -> Result<bool> {
        Ok(self.rooms_with_code(code)?.is_empty())
    }

    /// Draw codes until one is unused, giving up after the configured
    /// number of attempts
    #[instrument(skip(self))]
    pub fn generate_unique_invite_code(&self) -> Result<InviteCode> {
        for attempt in 1..=self.max_attempts {
            let code = self.codes.next_code();
            if self.is_invite_code_unique(&code)? {
                debug!(attempt, "Invite code accepted");
                return Ok(code);
            }
            debug!(attempt, "Invite code collision");
        }

        Err(Error::InviteCodeExhausted {
            attempts: self.max_attempts,
        })
    }

    /// Create a room with `uid` as creator and only member
    #[instrument(skip(self), err)]
    pub fn create_room(&self, uid: Uuid) -> Result<Room> {
        self.ensure_unpaired(uid)?;

        let invite_code = self.generate_unique_invite_code()?;
        let room_id = self.new_room_id()?;
        let room = Room::new(room_id, uid, invite_code);

        self.store
            .set(ROOMS_COLLECTION, &room_id.to_string(), encode(&room)?)?;
        self.profiles.update_user_room(uid, Some(room_id))?;

        assert_room_invariants(&room);
        info!(room_id = %room.id, invite_code = %room.invite_code, "Room created");
        Ok(room)
    }

    /// Join the room holding `invite_code`. Input is trimmed and
    /// uppercased first. Returns the room as stored after the join.
    #[instrument(skip(self), err)]
    pub fn join_room(&self, invite_code: &str, uid: Uuid) -> Result<Room> {
        self.ensure_unpaired(uid)?;

        let code = InviteCode::parse(invite_code)?;
        let rooms = self.rooms_with_code(&code)?;
        if rooms.len() > 1 {
            warn!(code = %code, matches = rooms.len(), "Duplicate invite code, joining first match");
        }
        let matched = rooms.into_iter().next().ok_or(Error::InvalidInviteCode)?;

        self.store.update(
            ROOMS_COLLECTION,
            &matched.id.to_string(),
            &[FieldUpdate::array_union(
                "members",
                vec![Value::String(uid.to_string())],
            )],
        )?;
        self.profiles.update_user_room(uid, Some(matched.id))?;

        // re-read so members who joined alongside are included
        let room = match self.get_room(matched.id)? {
            Some(room) => room,
            None => {
                let mut room = matched;
                room.add_member(uid);
                room
            }
        };
        assert_room_invariants(&room);
        info!(room_id = %room.id, members = room.member_count(), "Joined room");
        Ok(room)
    }

    /// Fetch a room by id
    #[instrument(skip(self))]
    pub fn get_room(&self, room_id: Uuid) -> Result<Option<Room>> {
        self.store
            .get(ROOMS_COLLECTION, &room_id.to_string())?
            .map(|doc| decode_room(&doc))
            .transpose()
    }

    /// Live room updates. `callback` receives the current room straight
    /// away, then every change; `None` once the room is gone or its
    /// document cannot be read.
    pub fn listen_to_room<F>(&self, room_id: Uuid, callback: F) -> Result<Subscription>
    where
        F: Fn(Option<Room>) + Send + Sync + 'static,
    {
        self.store.watch(
            ROOMS_COLLECTION,
            &room_id.to_string(),
            Box::new(move |doc: Option<Document>| {
                let room = doc.and_then(|doc| match decode_room(&doc) {
                    Ok(room) => Some(room),
                    Err(e) => {
                        warn!(room_id = %room_id, error = %e, "Unreadable room snapshot");
                        None
                    }
                });
                callback(room);
            }),
        )
    }

    /// Remove `uid` from the room. The last member out deletes the room.
    #[instrument(skip(self), err)]
    pub fn leave_room(&self, uid: Uuid, room_id: Uuid) -> Result<()> {
        let room = self.get_room(room_id)?.ok_or(Error::RoomNotFound)?;

        if !room.is_member(uid) {
            warn!("Leaving a room the user is not a member of");
        }

        if room.members_without(uid).is_empty() {
            self.store.delete(ROOMS_COLLECTION, &room_id.to_string())?;
            info!("Last member left, room deleted");
        } else {
            self.store.update(
                ROOMS_COLLECTION,
                &room_id.to_string(),
                &[FieldUpdate::array_remove(
                    "members",
                    vec![Value::String(uid.to_string())],
                )],
            )?;
            info!("Left room");
        }

        self.profiles.update_user_room(uid, None)
    }

    /// Whether `uid` is a member of the room. Store errors count as no.
    pub fn validate_room_access(&self, room_id: Uuid, uid: Uuid) -> bool {
        match self.get_room(room_id) {
            Ok(Some(room)) => room.is_member(uid),
            Ok(None) => false,
            Err(e) => {
                warn!(room_id = %room_id, error = %e, "Room access check failed");
                false
            }
        }
    }

    fn ensure_unpaired(&self, uid: Uuid) -> Result<()> {
        let profile = self
            .profiles
            .get_profile(uid)?
            .ok_or_else(|| Error::NotFound(format!("profile {}", uid)))?;

        if profile.has_room() {
            return Err(Error::AlreadyInRoom);
        }
        Ok(())
    }

    fn rooms_with_code(&self, code: &InviteCode) -> Result<Vec<Room>> {
        self.store
            .query_eq(
                ROOMS_COLLECTION,
                "inviteCode",
                &Value::String(code.as_str().to_string()),
            )?
            .iter()
            .map(decode_room)
            .collect()
    }

    fn new_room_id(&self) -> Result<Uuid> {
        let id = self.store.new_id();
        Uuid::parse_str(&id)
            .map_err(|_| Error::InvalidOperation(format!("store issued non-uuid id '{}'", id)))
    }
}

fn decode_room(doc: &Document) -> Result<Room> {
    let mut room: Room = doc.decode()?;
    room.id = Uuid::parse_str(&doc.id)
        .map_err(|_| Error::InvalidOperation(format!("room id '{}' is not a uuid", doc.id)))?;
    Ok(room)
}

#[cfg(test)]
mod tests {
    use super::codes::ScriptedCodes;
    use super::*;
    use crate::models::AuthUser;
    use crate::storage::{MemoryStore, SqliteStore};
    use std::sync::Mutex;

    struct Fixture {
        store: Arc<MemoryStore>,
        profiles: ProfileStore,
        rooms: RoomService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let profiles = ProfileStore::new(store.clone());
        let rooms = RoomService::new(store.clone(), profiles.clone());
        Fixture {
            store,
            profiles,
            rooms,
        }
    }

    fn register(profiles: &ProfileStore, email: &str) -> Uuid {
        let user = AuthUser {
            uid: Uuid::new_v4(),
            email: email.to_string(),
            display_name: None,
            photo_url: None,
        };
        profiles.create_profile(&user).unwrap();
        user.uid
    }

    #[test]
    fn test_create_room_links_profile() {
        let f = fixture();
        let ada = register(&f.profiles, "ada@example.com");

        let room = f.rooms.create_room(ada).unwrap();

        assert_eq!(room.members, vec![ada]);
        assert_eq!(room.created_by, ada);
        assert!(room.invite_code.is_well_formed());
        assert_eq!(f.profiles.get_profile(ada).unwrap().unwrap().room_id, Some(room.id));

        let stored = f.rooms.get_room(room.id).unwrap().unwrap();
        assert_eq!(stored.invite_code, room.invite_code);
        assert_eq!(stored.id, room.id);
    }

    #[test]
    fn test_create_room_rejects_paired_user() {
        let f = fixture();
        let ada = register(&f.profiles, "ada@example.com");
        f.rooms.create_room(ada).unwrap();

        let err = f.rooms.create_room(ada).unwrap_err();
        assert!(matches!(err, Error::AlreadyInRoom));
        assert_eq!(err.to_string(), "User already belongs to a room");
    }

    #[test]
    fn test_create_room_requires_profile() {
        let f = fixture();
        assert!(matches!(f.rooms.create_room(Uuid::new_v4()), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_unique_code_retries_past_collisions() {
        let f = fixture();
        let ada = register(&f.profiles, "ada@example.com");
        let bob = register(&f.profiles, "bob@example.com");

        let codes = Arc::new(ScriptedCodes::new(&["TAKEN001", "TAKEN001", "FRESH002"]));
        let rooms = f.rooms.clone().with_code_source(codes.clone());

        let first = rooms.create_room(ada).unwrap();
        assert_eq!(first.invite_code.as_str(), "TAKEN001");

        let second = rooms.create_room(bob).unwrap();
        assert_eq!(second.invite_code.as_str(), "FRESH002");
        assert_eq!(codes.drawn(), 3);
    }

    #[test]
    fn test_unique_code_gives_up_after_max_attempts() {
        let f = fixture();
        let ada = register(&f.profiles, "ada@example.com");
        let bob = register(&f.profiles, "bob@example.com");

        let codes = Arc::new(ScriptedCodes::new(&["SAME0000"]));
        let rooms = f.rooms.clone().with_code_source(codes.clone());
        rooms.create_room(ada).unwrap();

        let err = rooms.create_room(bob).unwrap_err();
        assert!(matches!(err, Error::InviteCodeExhausted { attempts: 10 }));
        assert_eq!(err.to_string(), "Failed to generate unique invite code");
        assert_eq!(codes.drawn(), 11);

        // nothing linked on failure
        assert!(f.profiles.get_profile(bob).unwrap().unwrap().room_id.is_none());
    }

    #[test]
    fn test_attempts_follow_config() {
        let f = fixture();
        let ada = register(&f.profiles, "ada@example.com");
        let bob = register(&f.profiles, "bob@example.com");

        let codes = Arc::new(ScriptedCodes::new(&["SAME0000"]));
        let config = PairingConfig {
            invite_code_attempts: 3,
        };
        let rooms = RoomService::with_config(f.store.clone(), f.profiles.clone(), &config)
            .with_code_source(codes.clone());
        rooms.create_room(ada).unwrap();

        assert!(matches!(
            rooms.create_room(bob),
            Err(Error::InviteCodeExhausted { attempts: 3 })
        ));
        assert_eq!(codes.drawn(), 4);
    }

    #[test]
    fn test_join_room_by_code() {
        let f = fixture();
        let ada = register(&f.profiles, "ada@example.com");
        let bob = register(&f.profiles, "bob@example.com");
        let room = f.rooms.create_room(ada).unwrap();

        let lowercase = format!("  {} ", room.invite_code.as_str().to_lowercase());
        let joined = f.rooms.join_room(&lowercase, bob).unwrap();

        assert_eq!(joined.id, room.id);
        assert!(joined.is_member(ada) && joined.is_member(bob));
        assert_eq!(f.rooms.get_room(room.id).unwrap().unwrap().member_count(), 2);
        assert_eq!(f.profiles.get_profile(bob).unwrap().unwrap().room_id, Some(room.id));
    }

    #[test]
    fn test_join_unknown_code() {
        let f = fixture();
        let bob = register(&f.profiles, "bob@example.com");

        let err = f.rooms.join_room("NOPE0000", bob).unwrap_err();
        assert!(matches!(err, Error::InvalidInviteCode));
        assert_eq!(err.to_string(), "Invalid invite code");

        assert!(matches!(f.rooms.join_room("short", bob), Err(Error::InvalidInviteCode)));
    }

    #[test]
    fn test_join_rejects_paired_user() {
        let f = fixture();
        let ada = register(&f.profiles, "ada@example.com");
        let bob = register(&f.profiles, "bob@example.com");
        let room = f.rooms.create_room(ada).unwrap();
        f.rooms.create_room(bob).unwrap();

        assert!(matches!(
            f.rooms.join_room(room.invite_code.as_str(), bob),
            Err(Error::AlreadyInRoom)
        ));
    }

    #[test]
    fn test_leave_keeps_room_for_remaining_members() {
        let f = fixture();
        let ada = register(&f.profiles, "ada@example.com");
        let bob = register(&f.profiles, "bob@example.com");
        let room = f.rooms.create_room(ada).unwrap();
        f.rooms.join_room(room.invite_code.as_str(), bob).unwrap();

        f.rooms.leave_room(ada, room.id).unwrap();

        let stored = f.rooms.get_room(room.id).unwrap().unwrap();
        assert_eq!(stored.members, vec![bob]);
        assert_eq!(stored.created_by, ada);
        assert!(f.profiles.get_profile(ada).unwrap().unwrap().room_id.is_none());
    }

    #[test]
    fn test_last_member_leaving_deletes_room() {
        let f = fixture();
        let ada = register(&f.profiles, "ada@example.com");
        let room = f.rooms.create_room(ada).unwrap();

        f.rooms.leave_room(ada, room.id).unwrap();

        assert!(f.rooms.get_room(room.id).unwrap().is_none());
        assert!(f.rooms.is_invite_code_unique(&room.invite_code).unwrap());

        // free to pair again
        f.rooms.create_room(ada).unwrap();
    }

    #[test]
    fn test_leave_missing_room() {
        let f = fixture();
        let ada = register(&f.profiles, "ada@example.com");
        let err = f.rooms.leave_room(ada, Uuid::new_v4()).unwrap_err();
        assert_eq!(err.to_string(), "Room not found");
    }

    #[test]
    fn test_validate_room_access() {
        let f = fixture();
        let ada = register(&f.profiles, "ada@example.com");
        let eve = register(&f.profiles, "eve@example.com");
        let room = f.rooms.create_room(ada).unwrap();

        assert!(f.rooms.validate_room_access(room.id, ada));
        assert!(!f.rooms.validate_room_access(room.id, eve));
        assert!(!f.rooms.validate_room_access(Uuid::new_v4(), ada));
    }

    #[test]
    fn test_validate_room_access_on_corrupt_document() {
        let f = fixture();
        let room_id = Uuid::new_v4();
        let mut fields = crate::storage::Fields::new();
        fields.insert("members".to_string(), Value::String("oops".to_string()));
        f.store.set(ROOMS_COLLECTION, &room_id.to_string(), fields).unwrap();

        assert!(!f.rooms.validate_room_access(room_id, Uuid::new_v4()));
    }

    #[test]
    fn test_listen_follows_membership() {
        let f = fixture();
        let ada = register(&f.profiles, "ada@example.com");
        let bob = register(&f.profiles, "bob@example.com");
        let room = f.rooms.create_room(ada).unwrap();

        let seen: Arc<Mutex<Vec<Option<usize>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = f
            .rooms
            .listen_to_room(room.id, move |room| {
                sink.lock().unwrap().push(room.map(|r| r.member_count()));
            })
            .unwrap();

        f.rooms.join_room(room.invite_code.as_str(), bob).unwrap();
        f.rooms.leave_room(bob, room.id).unwrap();
        f.rooms.leave_room(ada, room.id).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![Some(1), Some(2), Some(1), None]);

        sub.unsubscribe();
        assert_eq!(f.store.watcher_count(ROOMS_COLLECTION, &room.id.to_string()), 0);
    }

    #[test]
    fn test_listen_missing_room_reports_none() {
        let f = fixture();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = f
            .rooms
            .listen_to_room(Uuid::new_v4(), move |room| sink.lock().unwrap().push(room.is_some()))
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![false]);
    }

    #[test]
    fn test_join_returns_stored_members() {
        let f = fixture();
        let ada = register(&f.profiles, "ada@example.com");
        let bob = register(&f.profiles, "bob@example.com");
        let cal = register(&f.profiles, "cal@example.com");
        let room = f.rooms.create_room(ada).unwrap();
        f.rooms.join_room(room.invite_code.as_str(), bob).unwrap();

        let joined = f.rooms.join_room(room.invite_code.as_str(), cal).unwrap();
        assert_eq!(joined.members, vec![ada, bob, cal]);
    }

    #[test]
    fn test_listen_reports_none_for_unreadable_room() {
        let f = fixture();
        let ada = register(&f.profiles, "ada@example.com");
        let room = f.rooms.create_room(ada).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = f
            .rooms
            .listen_to_room(room.id, move |room| {
                sink.lock().unwrap().push(room.map(|r| r.member_count()))
            })
            .unwrap();

        let mut fields = crate::storage::Fields::new();
        fields.insert("members".to_string(), Value::String("oops".to_string()));
        f.store
            .set(ROOMS_COLLECTION, &room.id.to_string(), fields)
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![Some(1), None]);
    }

    #[test]
    fn test_leave_as_non_member_clears_link() {
        let f = fixture();
        let ada = register(&f.profiles, "ada@example.com");
        let eve = register(&f.profiles, "eve@example.com");
        let room = f.rooms.create_room(ada).unwrap();
        f.profiles.update_user_room(eve, Some(room.id)).unwrap();

        f.rooms.leave_room(eve, room.id).unwrap();

        assert!(f.profiles.get_profile(eve).unwrap().unwrap().room_id.is_none());
        let stored = f.rooms.get_room(room.id).unwrap().unwrap();
        assert_eq!(stored.members, vec![ada]);
    }

    fn join_picks_first_room_by_id(store: Arc<dyn DocumentStore>) {
        let profiles = ProfileStore::new(store.clone());
        let rooms = RoomService::new(store.clone(), profiles.clone());
        let code = InviteCode::parse("TWIN0001").unwrap();
        let low = Uuid::from_u128(1);
        let high = Uuid::from_u128(u128::MAX);

        // written out of id order
        for id in [high, low] {
            let room = Room::new(id, Uuid::new_v4(), code.clone());
            store
                .set(ROOMS_COLLECTION, &id.to_string(), encode(&room).unwrap())
                .unwrap();
        }
        assert!(!rooms.is_invite_code_unique(&code).unwrap());

        let bob = register(&profiles, "bob@example.com");
        let joined = rooms.join_room("twin0001", bob).unwrap();

        assert_eq!(joined.id, low);
        assert!(joined.is_member(bob));
        assert!(!rooms.get_room(high).unwrap().unwrap().is_member(bob));
    }

    #[test]
    fn test_duplicate_code_joins_first_room_in_memory() {
        join_picks_first_room_by_id(Arc::new(MemoryStore::new()));
    }

    #[test]
    fn test_duplicate_code_joins_first_room_in_sqlite() {
        join_picks_first_room_by_id(Arc::new(SqliteStore::open_in_memory().unwrap()));
    }
}
