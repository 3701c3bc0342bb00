//! Room dashboard view model
//!
//! Store snapshots arrive on the writer's thread. They are forwarded over an
//! unbounded channel and applied on the view model's side, where member
//! profiles are resolved and successive member lists are diffed.

use std::collections::HashMap;

use chrono::{DateTime, Local, Utc};
use reminders_core::{ProfileStore, Result, Room, RoomService, Subscription, UserProfile};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::room_setup::error_text;
use crate::clipboard::{self, ClipboardError};
use crate::navigation::Route;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberBadge {
    Creator,
    Member,
}

impl MemberBadge {
    pub fn label(&self) -> &'static str {
        match self {
            MemberBadge::Creator => "Creator",
            MemberBadge::Member => "Member",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberCard {
    pub uid: Uuid,
    pub email: String,
    pub initial: char,
    pub badge: MemberBadge,
    pub is_you: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomStats {
    pub member_count: usize,
    /// Tasks are not implemented yet
    pub active_tasks: usize,
    pub created_at: DateTime<Utc>,
}

impl RoomStats {
    pub fn created_label(&self) -> String {
        self.created_at
            .with_timezone(&Local)
            .format("%b %-d, %Y")
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomView {
    pub room: Room,
    pub members: Vec<MemberCard>,
    pub stats: RoomStats,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardState {
    /// No snapshot yet
    Loading,
    NotFound,
    Ready(RoomView),
}

/// Members who appeared or vanished between two snapshots, by email
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipChange {
    pub joined: Vec<String>,
    pub left: Vec<String>,
}

impl MembershipChange {
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.left.is_empty()
    }
}

pub struct DashboardViewModel {
    rooms: RoomService,
    profiles: ProfileStore,
    viewer: Uuid,
    room_id: Uuid,
    state: DashboardState,
    error: Option<String>,
    /// Member ids of the last applied snapshot; `None` until the first
    known_members: Option<Vec<Uuid>>,
    /// Emails of every member resolved so far
    emails: HashMap<Uuid, String>,
    updates: mpsc::UnboundedReceiver<Option<Room>>,
    subscription: Option<Subscription>,
}

impl DashboardViewModel {
    /// Subscribe to `room_id` as seen by `viewer`
    pub fn open(state: &AppState, room_id: Uuid, viewer: Uuid) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = state.rooms.listen_to_room(room_id, move |room| {
            // receiver gone means the dashboard closed
            let _ = tx.send(room);
        })?;
        debug!(%room_id, "Dashboard opened");

        Ok(Self {
            rooms: state.rooms.clone(),
            profiles: state.profiles.clone(),
            viewer,
            room_id,
            state: DashboardState::Loading,
            error: None,
            known_members: None,
            emails: HashMap::new(),
            updates: rx,
            subscription: Some(subscription),
        })
    }

    pub fn room_id(&self) -> Uuid {
        self.room_id
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.subscription.is_some()
    }

    /// Wait for the next snapshot and apply it. `None` once closed.
    pub async fn next_change(&mut self) -> Option<MembershipChange> {
        if !self.is_open() {
            return None;
        }
        let room = self.updates.recv().await?;
        Some(self.apply(room))
    }

    /// Apply every snapshot already queued
    pub fn apply_pending(&mut self) -> Vec<MembershipChange> {
        let mut changes = Vec::new();
        while self.is_open() {
            match self.updates.try_recv() {
                Ok(room) => {
                    let change = self.apply(room);
                    if !change.is_empty() {
                        changes.push(change);
                    }
                }
                Err(_) => break,
            }
        }
        changes
    }

    /// Stop listening. Queued snapshots are discarded.
    pub fn close(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
            self.updates.close();
            debug!(room_id = %self.room_id, "Dashboard closed");
        }
    }

    fn apply(&mut self, room: Option<Room>) -> MembershipChange {
        let Some(room) = room else {
            self.state = DashboardState::NotFound;
            return MembershipChange::default();
        };

        let mut members = Vec::with_capacity(room.members.len());
        for &uid in &room.members {
            match self.profiles.get_profile(uid) {
                Ok(Some(profile)) => {
                    self.emails.insert(uid, profile.email.clone());
                    members.push(member_card(&profile, &room, self.viewer));
                }
                Ok(None) => debug!(%uid, "Member has no profile"),
                Err(e) => warn!(%uid, error = %e, "Failed to load member profile"),
            }
        }

        let change = match &self.known_members {
            Some(known) => diff_members(known, &room.members, self.viewer, &self.emails),
            None => MembershipChange::default(),
        };
        self.known_members = Some(room.members.clone());

        let stats = RoomStats {
            member_count: room.member_count(),
            active_tasks: 0,
            created_at: room.created_at,
        };
        self.state = DashboardState::Ready(RoomView {
            room,
            members,
            stats,
        });

        change
    }

    fn room(&self) -> Option<&Room> {
        match &self.state {
            DashboardState::Ready(view) => Some(&view.room),
            _ => None,
        }
    }

    pub fn share_text(&self) -> Option<String> {
        self.room().map(|room| {
            format!(
                "Join my Shared Reminders room using invite code: {}",
                room.invite_code
            )
        })
    }

    /// Copy the invite code to the system clipboard. `None` without a room.
    pub fn copy_invite_code(&self) -> Option<std::result::Result<(), ClipboardError>> {
        self.room()
            .map(|room| clipboard::copy_invite_code(&room.invite_code))
    }

    /// Leave the room and close the dashboard
    pub fn leave(&mut self) -> Option<Route> {
        self.error = None;
        match self.rooms.leave_room(self.viewer, self.room_id) {
            Ok(()) => {
                info!(room_id = %self.room_id, "Left room");
                self.close();
                Some(Route::RoomSetup)
            }
            Err(e) => {
                self.error = Some(error_text(&e, "Failed to leave room"));
                None
            }
        }
    }
}

impl Drop for DashboardViewModel {
    fn drop(&mut self) {
        self.close();
    }
}

fn member_card(profile: &UserProfile, room: &Room, viewer: Uuid) -> MemberCard {
    MemberCard {
        uid: profile.uid,
        email: profile.email.clone(),
        initial: profile.avatar_initial(),
        badge: if room.is_creator(profile.uid) {
            MemberBadge::Creator
        } else {
            MemberBadge::Member
        },
        is_you: profile.uid == viewer,
    }
}

/// Who joined and who left between `known` and `current`, never the
/// viewer. Members without a resolved email are named by id.
fn diff_members(
    known: &[Uuid],
    current: &[Uuid],
    viewer: Uuid,
    emails: &HashMap<Uuid, String>,
) -> MembershipChange {
    let name = |uid: &Uuid| emails.get(uid).cloned().unwrap_or_else(|| uid.to_string());

    let joined = current
        .iter()
        .filter(|uid| **uid != viewer && !known.contains(uid))
        .map(name)
        .collect();

    let left = known
        .iter()
        .filter(|uid| **uid != viewer && !current.contains(uid))
        .map(name)
        .collect();

    MembershipChange { joined, left }
}
