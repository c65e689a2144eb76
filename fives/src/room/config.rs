//! Per-room settings, fixed at creation time by the host.

use serde::{Deserialize, Serialize};

use crate::game::entities::{GameError, GameSettings, DEFAULT_STARTING_STAKE};

/// Lowest starting stake a room may choose.
pub const MIN_STARTING_STAKE: i32 = 10;
/// Highest starting stake; one below the elimination threshold.
pub const MAX_STARTING_STAKE: i32 = 31;
/// Bounds for the per-turn timer.
pub const MIN_TURN_SECS: u64 = 10;
pub const MAX_TURN_SECS: u64 = 120;
/// Default seconds a human seat gets before auto-play kicks in.
pub const DEFAULT_TURN_SECS: u64 = 30;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettings {
    pub starting_stake: i32,
    /// Seconds per human turn; 0 disables the timer entirely.
    pub turn_time_limit_secs: u64,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            starting_stake: DEFAULT_STARTING_STAKE,
            turn_time_limit_secs: DEFAULT_TURN_SECS,
        }
    }
}

impl RoomSettings {
    pub fn validate(&self) -> Result<(), GameError> {
        if !(MIN_STARTING_STAKE..=MAX_STARTING_STAKE).contains(&self.starting_stake) {
            return Err(GameError::InvalidMessage);
        }
        if self.turn_time_limit_secs != 0
            && !(MIN_TURN_SECS..=MAX_TURN_SECS).contains(&self.turn_time_limit_secs)
        {
            return Err(GameError::InvalidMessage);
        }
        Ok(())
    }

    #[must_use]
    pub fn game_settings(&self) -> GameSettings {
        GameSettings {
            starting_stake: self.starting_stake,
            rng_seed: None,
        }
    }
}

/// Optional overrides supplied with `CREATE_ROOM`; anything omitted
/// falls back to the defaults.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettingsPatch {
    pub starting_stake: Option<i32>,
    pub turn_time_limit_secs: Option<u64>,
}

impl RoomSettingsPatch {
    /// Resolve the patch against defaults and validate the result.
    pub fn resolve(self) -> Result<RoomSettings, GameError> {
        let mut settings = RoomSettings::default();
        if let Some(stake) = self.starting_stake {
            settings.starting_stake = stake;
        }
        if let Some(secs) = self.turn_time_limit_secs {
            settings.turn_time_limit_secs = secs;
        }
        settings.validate()?;
        Ok(settings)
    }
}
