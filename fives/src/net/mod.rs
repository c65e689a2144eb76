//! Wire protocol types and redacted state views.

pub mod messages;
pub mod views;

pub use messages::{ClientMessage, ServerMessage};
pub use views::{GameStateView, SeatView, Viewer};
