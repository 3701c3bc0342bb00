//! Data models for Reminders

mod invite;
mod profile;
mod room;
mod user;

pub use invite::*;
pub use profile::*;
pub use room::*;
pub use user::*;
