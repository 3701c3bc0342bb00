//! View models driven by the shell

mod auth;
mod dashboard;
mod room_setup;

pub use auth::{AuthMode, AuthViewModel};
pub use dashboard::{
    DashboardState, DashboardViewModel, MemberBadge, MemberCard, MembershipChange, RoomStats,
    RoomView,
};
pub use room_setup::{RoomSetupViewModel, SetupMode};
