//! Computer-controlled seats: difficulty tiers and decision heuristics.

pub mod decision;
pub mod models;

pub use decision::{decide, safe_default};
pub use models::{Difficulty, DifficultyParams};
