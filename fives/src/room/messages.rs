//! The room actor's inbox protocol.
//!
//! Every mutation of a room flows through one [`RoomMessage`] channel, so
//! the actor's event loop is the room's critical section. External
//! callers get replies over oneshot channels via [`RoomHandle`]; the
//! actor also sends itself the `Task` variants from scheduled timers.

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::ai::Difficulty;
use crate::game::entities::{GameAction, GameError};
use crate::net::messages::ServerMessage;
use crate::net::views::GameStateView;

/// Outbound half of one websocket connection, as the room sees it.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    pub conn_id: Uuid,
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

impl ConnectionHandle {
    #[must_use]
    pub fn new(sender: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self {
            conn_id: Uuid::new_v4(),
            sender,
        }
    }

    /// Best-effort send; a closed connection is handled by its own
    /// disconnect path, not here.
    pub fn send(&self, msg: ServerMessage) {
        let _ = self.sender.send(msg);
    }
}

/// Successful join/rejoin result.
#[derive(Debug)]
pub struct JoinOutcome {
    pub player_id: Uuid,
    pub host_id: Uuid,
    pub state: GameStateView,
}

/// Internal messages the actor schedules for itself. Each carries the
/// epoch it was scheduled under; a bumped epoch makes the fired timer a
/// no-op.
#[derive(Debug)]
pub enum RoomTask {
    /// An AI (or auto-playing disconnected) seat should act now.
    AiTurn { epoch: u64 },
    /// A human seat ran out its turn timer.
    TurnTimeout { epoch: u64 },
    /// Safety release for the pause lock if no client acknowledged.
    LockExpired { epoch: u64 },
    /// Close the room if no humans reconnected during the grace period.
    IdleCheck,
}

#[derive(Debug)]
pub enum RoomMessage {
    Join {
        name: String,
        conn: ConnectionHandle,
        reply: oneshot::Sender<Result<JoinOutcome, GameError>>,
    },
    Rejoin {
        player_id: Uuid,
        conn: ConnectionHandle,
        reply: oneshot::Sender<Result<JoinOutcome, GameError>>,
    },
    Spectate {
        conn: ConnectionHandle,
        reply: oneshot::Sender<Result<GameStateView, GameError>>,
    },
    AddAi {
        requester: Uuid,
        difficulty: Difficulty,
        reply: oneshot::Sender<Result<(), GameError>>,
    },
    RemovePlayer {
        requester: Uuid,
        player_id: Uuid,
        reply: oneshot::Sender<Result<(), GameError>>,
    },
    StartGame {
        requester: Uuid,
        reply: oneshot::Sender<Result<(), GameError>>,
    },
    Action {
        player_id: Uuid,
        action: GameAction,
        reply: oneshot::Sender<Result<(), GameError>>,
    },
    /// A player deliberately left. `conn_id` guards against a stale
    /// socket tearing down a newer one.
    Leave { player_id: Uuid, conn_id: Uuid },
    /// A socket dropped without leaving.
    Disconnect { conn_id: Uuid },
    Task(RoomTask),
}

/// Cheap cloneable handle to one room's inbox.
#[derive(Clone, Debug)]
pub struct RoomHandle {
    pub code: String,
    tx: mpsc::Sender<RoomMessage>,
}

impl RoomHandle {
    #[must_use]
    pub fn new(code: String, tx: mpsc::Sender<RoomMessage>) -> Self {
        Self { code, tx }
    }

    /// Whether the room actor is still running.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    pub async fn join(
        &self,
        name: String,
        conn: ConnectionHandle,
    ) -> Result<JoinOutcome, GameError> {
        let (reply, rx) = oneshot::channel();
        self.request(RoomMessage::Join { name, conn, reply }, rx)
            .await
    }

    pub async fn rejoin(
        &self,
        player_id: Uuid,
        conn: ConnectionHandle,
    ) -> Result<JoinOutcome, GameError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            RoomMessage::Rejoin {
                player_id,
                conn,
                reply,
            },
            rx,
        )
        .await
    }

    pub async fn spectate(&self, conn: ConnectionHandle) -> Result<GameStateView, GameError> {
        let (reply, rx) = oneshot::channel();
        self.request(RoomMessage::Spectate { conn, reply }, rx).await
    }

    pub async fn add_ai(&self, requester: Uuid, difficulty: Difficulty) -> Result<(), GameError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            RoomMessage::AddAi {
                requester,
                difficulty,
                reply,
            },
            rx,
        )
        .await
    }

    pub async fn remove_player(&self, requester: Uuid, player_id: Uuid) -> Result<(), GameError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            RoomMessage::RemovePlayer {
                requester,
                player_id,
                reply,
            },
            rx,
        )
        .await
    }

    pub async fn start_game(&self, requester: Uuid) -> Result<(), GameError> {
        let (reply, rx) = oneshot::channel();
        self.request(RoomMessage::StartGame { requester, reply }, rx)
            .await
    }

    pub async fn action(&self, player_id: Uuid, action: GameAction) -> Result<(), GameError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            RoomMessage::Action {
                player_id,
                action,
                reply,
            },
            rx,
        )
        .await
    }

    pub async fn leave(&self, player_id: Uuid, conn_id: Uuid) {
        let _ = self.tx.send(RoomMessage::Leave { player_id, conn_id }).await;
    }

    pub async fn disconnect(&self, conn_id: Uuid) {
        let _ = self.tx.send(RoomMessage::Disconnect { conn_id }).await;
    }

    async fn request<T>(
        &self,
        msg: RoomMessage,
        rx: oneshot::Receiver<Result<T, GameError>>,
    ) -> Result<T, GameError> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| GameError::RoomNotFound)?;
        rx.await.map_err(|_| GameError::RoomNotFound)?
    }
}
