//! JSON wire protocol: discriminated unions tagged by `type`.
//!
//! Tags are SCREAMING_SNAKE_CASE, payload fields camelCase. Unknown or
//! malformed messages never kill a connection; they come back as an
//! `ERROR` with code `INVALID_MESSAGE`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::views::GameStateView;
use crate::ai::Difficulty;
use crate::game::engine::EngineEvent;
use crate::game::entities::{GameAction, GameError};
use crate::room::config::RoomSettingsPatch;

/// Messages a client may send.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    CreateRoom {
        player_name: String,
        #[serde(default)]
        settings: RoomSettingsPatch,
    },
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_code: String, player_name: String },
    /// Reclaim a seat after a dropped connection.
    #[serde(rename_all = "camelCase")]
    RejoinRoom { room_code: String, player_id: Uuid },
    #[serde(rename_all = "camelCase")]
    SpectateRoom { room_code: String },
    AddAi { difficulty: Difficulty },
    #[serde(rename_all = "camelCase")]
    RemovePlayer { player_id: Uuid },
    StartGame,
    GameAction {
        #[serde(flatten)]
        action: GameAction,
    },
    LeaveRoom,
}

/// Messages the server may send.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    RoomCreated {
        room_code: String,
        player_id: Uuid,
        state: GameStateView,
    },
    #[serde(rename_all = "camelCase")]
    JoinedRoom {
        room_code: String,
        player_id: Uuid,
        host_id: Uuid,
        state: GameStateView,
    },
    #[serde(rename_all = "camelCase")]
    RejoinedRoom {
        room_code: String,
        player_id: Uuid,
        host_id: Uuid,
        state: GameStateView,
    },
    #[serde(rename_all = "camelCase")]
    Spectating {
        room_code: String,
        state: GameStateView,
    },
    #[serde(rename_all = "camelCase")]
    PlayerJoined { player_id: Uuid, name: String },
    #[serde(rename_all = "camelCase")]
    PlayerLeft { player_id: Uuid },
    #[serde(rename_all = "camelCase")]
    PlayerDisconnected { player_id: Uuid },
    #[serde(rename_all = "camelCase")]
    PlayerReconnected { player_id: Uuid },
    #[serde(rename_all = "camelCase")]
    HostTransferred { player_id: Uuid },
    RoomClosed { reason: String },
    GameStarted { state: GameStateView },
    /// Full snapshot, personalized per recipient.
    GameStateSync { state: GameStateView },
    /// Incremental: the events an action produced plus the resulting
    /// snapshot.
    GameStateUpdate {
        events: Vec<EngineEvent>,
        state: GameStateView,
    },
    #[serde(rename_all = "camelCase")]
    TurnTimerStart { seat_id: Uuid, seconds: u64 },
    Error { code: String, message: String },
}

impl ServerMessage {
    #[must_use]
    pub fn error(err: &GameError) -> Self {
        Self::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}
