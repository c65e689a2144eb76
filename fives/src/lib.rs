//! Authoritative engine and room layer for Fives, a count-down
//! trick-taking card game.
//!
//! The crate splits into four layers:
//!
//! - [`game`]: cards, validation, and the phase state machine. Pure and
//!   synchronous; every mutation is a validated action.
//! - [`ai`]: difficulty-tiered decision heuristics that submit actions
//!   through the same validated path as humans.
//! - [`room`]: one tokio actor per table. The actor's inbox is the
//!   room's critical section; timers and AI turns post messages back
//!   into it instead of touching state directly.
//! - [`net`]: the JSON wire protocol and per-viewer redacted state
//!   views.
//!
//! The `fives_server` binary wires these to an axum websocket endpoint.

pub mod ai;
pub mod game;
pub mod net;
pub mod room;
