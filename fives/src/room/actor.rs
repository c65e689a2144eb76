//! One actor per room.
//!
//! The actor owns the room's [`GameState`] outright and processes its
//! inbox one message at a time, which makes the loop body the room's
//! critical section: two actions racing from different sockets are
//! simply applied in arrival order, and the loser gets a clean
//! `NOT_YOUR_TURN` or `INVALID_PHASE` instead of corrupting state.
//!
//! Timers never touch state directly. They post a [`RoomTask`] back into
//! the inbox carrying the epoch they were armed under; any state change
//! bumps the epoch, so a stale timer that fires late is ignored.

use log::{debug, info, warn};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::config::RoomSettings;
use super::messages::{ConnectionHandle, JoinOutcome, RoomHandle, RoomMessage, RoomTask};
use super::tasks::Scheduler;
use crate::ai::{self, Difficulty, DifficultyParams};
use crate::game::engine::{EngineEvent, GameState};
use crate::game::entities::{GameAction, GameError, Phase};
use crate::net::messages::ServerMessage;
use crate::net::views::{GameStateView, Viewer};

/// Inbox depth; backpressure beyond this slows the sockets, not the room.
const INBOX_CAPACITY: usize = 64;
/// How long a disconnected seat gets before the room plays for it.
const DISCONNECT_AUTOPLAY_DELAY: Duration = Duration::from_secs(3);
/// Safety release for the trick-complete pause if no client acks.
const TRICK_PAUSE_SAFETY: Duration = Duration::from_secs(4);
/// Safety release for the end-of-round pause.
const ROUND_PAUSE_SAFETY: Duration = Duration::from_secs(8);
/// Grace period with zero connected humans before the room closes.
const IDLE_GRACE: Duration = Duration::from_secs(120);

/// Names handed to AI seats, in order of preference.
const AI_NAMES: [&str; 8] = [
    "Nora", "Milo", "Vera", "Otis", "Iris", "Remy", "Sage", "Faye",
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Role {
    Player(Uuid),
    Spectator,
}

#[derive(Debug)]
struct Connection {
    handle: ConnectionHandle,
    role: Role,
}

pub struct RoomActor {
    code: String,
    settings: RoomSettings,
    engine: GameState,
    host: Option<Uuid>,
    conns: HashMap<Uuid, Connection>,
    /// player id -> the conn currently bound to that seat.
    seat_conn: HashMap<Uuid, Uuid>,
    inbox: mpsc::Receiver<RoomMessage>,
    tx: mpsc::Sender<RoomMessage>,
    scheduler: Scheduler,
    /// Bumped on every turn change; stale AI/timeout timers check it.
    turn_epoch: u64,
    /// Bumped on every lock take/release; stale safety releases check it.
    lock_epoch: u64,
    /// When set, the phase the pause lock was taken in. All game actions
    /// except the sync acknowledgement are rejected while locked.
    locked: Option<Phase>,
    /// Single-flight guard so only one AI decision is pending at a time.
    ai_in_flight: bool,
    closing: bool,
}

impl RoomActor {
    /// Spawn the actor task and return the handle the registry keeps.
    #[must_use]
    pub fn spawn(code: String, settings: RoomSettings) -> RoomHandle {
        let (tx, inbox) = mpsc::channel(INBOX_CAPACITY);
        let handle = RoomHandle::new(code.clone(), tx.clone());
        let actor = Self {
            engine: GameState::new(settings.game_settings()),
            code,
            settings,
            host: None,
            conns: HashMap::new(),
            seat_conn: HashMap::new(),
            inbox,
            tx,
            scheduler: Scheduler::default(),
            turn_epoch: 0,
            lock_epoch: 0,
            locked: None,
            ai_in_flight: false,
            closing: false,
        };
        tokio::spawn(actor.run());
        handle
    }

    async fn run(mut self) {
        info!("room {} open", self.code);
        while let Some(msg) = self.inbox.recv().await {
            self.handle(msg);
            if self.closing {
                break;
            }
        }
        self.scheduler.cancel_all();
        info!("room {} closed", self.code);
    }

    fn handle(&mut self, msg: RoomMessage) {
        match msg {
            RoomMessage::Join { name, conn, reply } => {
                let _ = reply.send(self.on_join(name, conn));
            }
            RoomMessage::Rejoin {
                player_id,
                conn,
                reply,
            } => {
                let _ = reply.send(self.on_rejoin(player_id, conn));
            }
            RoomMessage::Spectate { conn, reply } => {
                let view = GameStateView::for_viewer(&self.engine, Viewer::Spectator);
                self.conns.insert(
                    conn.conn_id,
                    Connection {
                        handle: conn,
                        role: Role::Spectator,
                    },
                );
                let _ = reply.send(Ok(view));
            }
            RoomMessage::AddAi {
                requester,
                difficulty,
                reply,
            } => {
                let _ = reply.send(self.on_add_ai(requester, difficulty));
            }
            RoomMessage::RemovePlayer {
                requester,
                player_id,
                reply,
            } => {
                let _ = reply.send(self.on_remove_player(requester, player_id));
            }
            RoomMessage::StartGame { requester, reply } => {
                let _ = reply.send(self.on_start_game(requester));
            }
            RoomMessage::Action {
                player_id,
                action,
                reply,
            } => {
                let _ = reply.send(self.on_action(player_id, action));
            }
            RoomMessage::Leave { player_id, conn_id } => self.on_leave(player_id, conn_id),
            RoomMessage::Disconnect { conn_id } => self.on_disconnect(conn_id),
            RoomMessage::Task(task) => self.on_task(task),
        }
    }

    // === Lobby ===

    fn on_join(
        &mut self,
        name: String,
        conn: ConnectionHandle,
    ) -> Result<JoinOutcome, GameError> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > 20 {
            return Err(GameError::InvalidMessage);
        }
        let player_id = self.engine.add_human_seat(name)?;
        let host_id = *self.host.get_or_insert(player_id);
        self.bind_seat(player_id, conn);
        self.scheduler.cancel_idle_check();

        self.broadcast_except(
            player_id,
            ServerMessage::PlayerJoined {
                player_id,
                name: name.to_string(),
            },
        );
        self.broadcast_sync();
        Ok(JoinOutcome {
            player_id,
            host_id,
            state: GameStateView::for_viewer(&self.engine, Viewer::Seat(player_id)),
        })
    }

    fn on_rejoin(
        &mut self,
        player_id: Uuid,
        conn: ConnectionHandle,
    ) -> Result<JoinOutcome, GameError> {
        let seat = self
            .engine
            .seat(player_id)
            .ok_or(GameError::PlayerNotFound)?;
        if seat.is_ai {
            return Err(GameError::PlayerNotFound);
        }
        // A still-open older socket for this seat gets displaced.
        if let Some(old_conn) = self.seat_conn.get(&player_id).copied() {
            self.conns.remove(&old_conn);
        }
        self.engine.set_connected(player_id, true)?;
        self.bind_seat(player_id, conn);
        self.scheduler.cancel_idle_check();
        if self.host.is_none() {
            self.host = Some(player_id);
            self.broadcast_all(ServerMessage::HostTransferred { player_id });
        }

        self.broadcast_except(player_id, ServerMessage::PlayerReconnected { player_id });
        self.broadcast_sync();
        Ok(JoinOutcome {
            player_id,
            host_id: self.host.unwrap_or(player_id),
            state: GameStateView::for_viewer(&self.engine, Viewer::Seat(player_id)),
        })
    }

    fn bind_seat(&mut self, player_id: Uuid, conn: ConnectionHandle) {
        self.seat_conn.insert(player_id, conn.conn_id);
        self.conns.insert(
            conn.conn_id,
            Connection {
                handle: conn,
                role: Role::Player(player_id),
            },
        );
    }

    fn on_add_ai(&mut self, requester: Uuid, difficulty: Difficulty) -> Result<(), GameError> {
        self.require_host(requester)?;
        let name = AI_NAMES
            .iter()
            .find(|n| !self.engine.seats.iter().any(|s| s.name == **n))
            .map(|n| (*n).to_string())
            .unwrap_or_else(|| format!("Bot {}", self.engine.seats.len() + 1));
        let player_id = self.engine.add_ai_seat(&name, difficulty)?;
        self.broadcast_all(ServerMessage::PlayerJoined { player_id, name });
        self.broadcast_sync();
        Ok(())
    }

    fn on_remove_player(&mut self, requester: Uuid, player_id: Uuid) -> Result<(), GameError> {
        self.require_host(requester)?;
        self.engine.remove_seat(player_id)?;
        if let Some(conn_id) = self.seat_conn.remove(&player_id) {
            if let Some(conn) = self.conns.remove(&conn_id) {
                conn.handle.send(ServerMessage::RoomClosed {
                    reason: "removed by host".to_string(),
                });
            }
        }
        self.broadcast_all(ServerMessage::PlayerLeft { player_id });
        self.broadcast_sync();
        Ok(())
    }

    fn on_start_game(&mut self, requester: Uuid) -> Result<(), GameError> {
        self.require_host(requester)?;
        // Starting again from game over is the "play again" path.
        if self.engine.phase == Phase::GameOver {
            self.engine.reset()?;
        }
        self.engine.start()?;
        info!(
            "room {}: game started with {} seats",
            self.code,
            self.engine.seats.len()
        );
        self.broadcast_state(|state| ServerMessage::GameStarted { state });
        self.schedule_turn();
        Ok(())
    }

    fn require_host(&self, requester: Uuid) -> Result<(), GameError> {
        if self.host != Some(requester) {
            return Err(GameError::NotHost);
        }
        Ok(())
    }

    // === Game actions ===

    fn on_action(&mut self, player_id: Uuid, action: GameAction) -> Result<(), GameError> {
        if action == GameAction::SyncState {
            if self.locked.is_some() {
                self.release_lock();
                return Ok(());
            }
            return Err(GameError::InvalidPhase);
        }
        if self.locked.is_some() {
            return Err(GameError::InvalidPhase);
        }
        if self.engine.phase == Phase::Setup {
            return Err(GameError::GameNotStarted);
        }
        let result = self.apply_action(player_id, action);
        if result.is_err() {
            // A rejected action restarts the turn clock instead of
            // leaving it stopped.
            self.schedule_turn();
        }
        result
    }

    fn apply_action(&mut self, seat_id: Uuid, action: GameAction) -> Result<(), GameError> {
        let events = self.engine.apply(seat_id, action)?;
        self.after_events(events);
        Ok(())
    }

    /// Broadcast the outcome of an engine step and arm whatever comes
    /// next: a pause lock, the next seat's timer, or nothing (game over).
    fn after_events(&mut self, events: Vec<EngineEvent>) {
        self.broadcast_update(events);
        match self.engine.phase {
            Phase::TrickComplete => self.take_lock(TRICK_PAUSE_SAFETY),
            Phase::RoundComplete => self.take_lock(ROUND_PAUSE_SAFETY),
            Phase::GameOver => {
                self.scheduler.cancel_turn_timers();
                self.ai_in_flight = false;
                self.locked = None;
                self.scheduler.cancel_lock_release();
            }
            _ => self.schedule_turn(),
        }
    }

    fn take_lock(&mut self, safety: Duration) {
        self.locked = Some(self.engine.phase);
        self.lock_epoch += 1;
        self.ai_in_flight = false;
        self.scheduler.cancel_turn_timers();
        self.scheduler
            .schedule_lock_release(self.tx.clone(), safety, self.lock_epoch);
        debug!("room {}: paused in {}", self.code, self.engine.phase);
    }

    /// Release the pause lock and advance the engine past the paused
    /// phase. First acknowledgement wins; the safety timer covers rooms
    /// where no client ever acks.
    fn release_lock(&mut self) {
        let Some(phase) = self.locked.take() else {
            return;
        };
        self.scheduler.cancel_lock_release();
        self.lock_epoch += 1;
        let advanced = match phase {
            Phase::TrickComplete => self.engine.advance_after_trick(),
            Phase::RoundComplete => self.engine.start_next_round(),
            _ => Ok(Vec::new()),
        };
        match advanced {
            Ok(events) => self.after_events(events),
            Err(err) => warn!("room {}: advance after pause failed: {err}", self.code),
        }
    }

    /// Arm the right timer for whoever's turn it now is.
    ///
    /// An AI decision already in flight keeps its slot and its original
    /// schedule; extra triggers are dropped, not queued.
    fn schedule_turn(&mut self) {
        if self.ai_in_flight {
            return;
        }
        self.turn_epoch += 1;
        self.scheduler.cancel_turn_timers();

        let Some(seat) = self.engine.turn_seat() else {
            return;
        };
        let seat_id = seat.id;
        let is_ai = seat.is_ai;
        let connected = seat.connected;
        let difficulty = seat.ai_difficulty;

        if is_ai {
            self.ai_in_flight = true;
            let params =
                DifficultyParams::from_difficulty(difficulty.unwrap_or(Difficulty::Medium));
            let delay = Duration::from_millis(params.think_delay_ms());
            self.scheduler
                .schedule_ai_turn(self.tx.clone(), delay, self.turn_epoch);
        } else if !connected {
            self.scheduler.schedule_ai_turn(
                self.tx.clone(),
                DISCONNECT_AUTOPLAY_DELAY,
                self.turn_epoch,
            );
        } else {
            let seconds = self.settings.turn_time_limit_secs;
            if seconds > 0 {
                self.scheduler.schedule_turn_timeout(
                    self.tx.clone(),
                    Duration::from_secs(seconds),
                    self.turn_epoch,
                );
                self.broadcast_all(ServerMessage::TurnTimerStart { seat_id, seconds });
            }
        }
    }

    // === Scheduled tasks ===

    fn on_task(&mut self, task: RoomTask) {
        match task {
            RoomTask::AiTurn { epoch } => self.on_auto_turn(epoch, true),
            RoomTask::TurnTimeout { epoch } => self.on_auto_turn(epoch, false),
            RoomTask::LockExpired { epoch } => {
                if self.locked.is_some() && epoch == self.lock_epoch {
                    debug!("room {}: pause safety release", self.code);
                    self.release_lock();
                }
            }
            RoomTask::IdleCheck => {
                if !self.any_human_connected() {
                    self.close_room("no players remaining");
                }
            }
        }
    }

    /// Play for the seat on turn: full heuristics for an AI seat, the
    /// conservative default for timed-out or disconnected humans.
    fn on_auto_turn(&mut self, epoch: u64, use_heuristics: bool) {
        if epoch != self.turn_epoch || self.locked.is_some() {
            return;
        }
        self.ai_in_flight = false;
        let Some(seat) = self.engine.turn_seat() else {
            return;
        };
        let seat_id = seat.id;
        let difficulty = seat.ai_difficulty;

        let action = match difficulty {
            Some(tier) if use_heuristics => {
                let params = DifficultyParams::from_difficulty(tier);
                ai::decide(&self.engine, seat_id, &params)
            }
            _ => ai::safe_default(&self.engine, seat_id),
        };
        let Some(action) = action else {
            return;
        };

        if let Err(err) = self.apply_action(seat_id, action.clone()) {
            // A heuristic slip must not stall the room; fall back to the
            // always-legal default.
            warn!(
                "room {}: auto action {action:?} rejected ({err}), using default",
                self.code
            );
            if let Some(fallback) = ai::safe_default(&self.engine, seat_id) {
                if let Err(err) = self.apply_action(seat_id, fallback) {
                    warn!("room {}: default auto action rejected: {err}", self.code);
                }
            }
        }
    }

    // === Departures ===

    fn on_leave(&mut self, player_id: Uuid, conn_id: Uuid) {
        if self.seat_conn.get(&player_id) != Some(&conn_id) {
            return;
        }
        self.conns.remove(&conn_id);
        self.seat_conn.remove(&player_id);

        if self.engine.phase == Phase::Setup {
            if self.engine.remove_seat(player_id).is_ok() {
                self.broadcast_all(ServerMessage::PlayerLeft { player_id });
            }
        } else if self.engine.set_connected(player_id, false).is_ok() {
            self.broadcast_all(ServerMessage::PlayerLeft { player_id });
        }
        self.after_departure(player_id);
    }

    fn on_disconnect(&mut self, conn_id: Uuid) {
        let Some(conn) = self.conns.remove(&conn_id) else {
            return;
        };
        let Role::Player(player_id) = conn.role else {
            return;
        };
        if self.seat_conn.get(&player_id) != Some(&conn_id) {
            // A newer socket already took over this seat.
            return;
        }
        self.seat_conn.remove(&player_id);

        if self.engine.phase == Phase::Setup {
            if self.engine.remove_seat(player_id).is_ok() {
                self.broadcast_all(ServerMessage::PlayerLeft { player_id });
            }
        } else if self.engine.set_connected(player_id, false).is_ok() {
            self.broadcast_all(ServerMessage::PlayerDisconnected { player_id });
        }
        self.after_departure(player_id);
    }

    fn after_departure(&mut self, player_id: Uuid) {
        if self.host == Some(player_id) {
            self.transfer_host(player_id);
        }
        self.broadcast_sync();

        // A departed seat on turn gets auto-played rather than stalling
        // the table.
        if self.locked.is_none() && self.engine.turn_seat().map(|s| s.id) == Some(player_id) {
            self.schedule_turn();
        }

        if self.engine.phase == Phase::Setup && self.engine.seats.iter().all(|s| s.is_ai) {
            self.close_room("no players remaining");
        } else if !self.any_human_connected() {
            self.scheduler
                .schedule_idle_check(self.tx.clone(), IDLE_GRACE);
        }
    }

    fn transfer_host(&mut self, leaving: Uuid) {
        let next = self
            .engine
            .seats
            .iter()
            .find(|s| !s.is_ai && s.connected && s.id != leaving)
            .map(|s| s.id);
        self.host = next;
        if let Some(player_id) = next {
            info!("room {}: host transferred", self.code);
            self.broadcast_all(ServerMessage::HostTransferred { player_id });
        }
    }

    fn any_human_connected(&self) -> bool {
        self.engine.seats.iter().any(|s| !s.is_ai && s.connected)
    }

    fn close_room(&mut self, reason: &str) {
        self.broadcast_all(ServerMessage::RoomClosed {
            reason: reason.to_string(),
        });
        self.closing = true;
    }

    // === Broadcast helpers ===

    fn broadcast_all(&self, msg: ServerMessage) {
        for conn in self.conns.values() {
            conn.handle.send(msg.clone());
        }
    }

    fn broadcast_except(&self, player_id: Uuid, msg: ServerMessage) {
        for conn in self.conns.values() {
            if conn.role != Role::Player(player_id) {
                conn.handle.send(msg.clone());
            }
        }
    }

    /// Send a personalized state message to every connection.
    fn broadcast_state<F>(&self, make: F)
    where
        F: Fn(GameStateView) -> ServerMessage,
    {
        for conn in self.conns.values() {
            let viewer = match conn.role {
                Role::Player(id) => Viewer::Seat(id),
                Role::Spectator => Viewer::Spectator,
            };
            conn.handle
                .send(make(GameStateView::for_viewer(&self.engine, viewer)));
        }
    }

    fn broadcast_sync(&self) {
        self.broadcast_state(|state| ServerMessage::GameStateSync { state });
    }

    fn broadcast_update(&self, events: Vec<EngineEvent>) {
        self.broadcast_state(|state| ServerMessage::GameStateUpdate {
            events: events.clone(),
            state,
        });
    }
}
