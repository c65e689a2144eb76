//! Rooms: one actor per table, a registry keyed by join code, and the
//! deferred-task plumbing that keeps timers inside the actor's critical
//! section.

pub mod actor;
pub mod config;
pub mod messages;
pub mod registry;
pub mod tasks;

pub use actor::RoomActor;
pub use config::{RoomSettings, RoomSettingsPatch};
pub use messages::{ConnectionHandle, JoinOutcome, RoomHandle, RoomMessage};
pub use registry::RoomRegistry;
