//! WebSocket endpoint.
//!
//! A connection starts unbound. The first meaningful message must be one
//! of `CREATE_ROOM`, `JOIN_ROOM`, `REJOIN_ROOM`, or `SPECTATE_ROOM`,
//! which binds the socket to a room actor; everything after that is
//! routed to the room's inbox. Malformed JSON never closes the socket,
//! it just earns an `ERROR` reply.
//!
//! # Lifecycle
//!
//! 1. Client connects via `GET /ws` and the socket is split.
//! 2. A send task drains the room-to-client channel into the socket.
//! 3. The receive loop parses client messages and routes them.
//! 4. On drop, the room is told to disconnect this socket so the seat
//!    can be auto-played and later reclaimed with `REJOIN_ROOM`.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use uuid::Uuid;

use fives::game::entities::GameError;
use fives::net::messages::{ClientMessage, ServerMessage};
use fives::room::{ConnectionHandle, RoomHandle};

use crate::AppState;

/// What this socket is bound to, once it has joined a room.
struct Session {
    room: RoomHandle,
    /// `None` for spectators.
    player_id: Option<Uuid>,
}

enum Flow {
    Continue,
    Close,
}

pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let conn = ConnectionHandle::new(out_tx.clone());
    let conn_id = conn.conn_id;

    info!("websocket connected: conn={conn_id}");

    let send_task = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(err) => {
                    warn!("failed to serialize server message: {err}");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut session: Option<Session> = None;
    let mut departed = false;

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let client_msg = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => msg,
                    Err(err) => {
                        debug!("conn={conn_id}: unparseable message: {err}");
                        let _ = out_tx.send(ServerMessage::error(&GameError::InvalidMessage));
                        continue;
                    }
                };
                let flow = route_message(
                    client_msg,
                    &mut session,
                    &mut departed,
                    &conn,
                    &state,
                    &out_tx,
                )
                .await;
                if matches!(flow, Flow::Close) {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                info!("websocket closed: conn={conn_id}");
                break;
            }
            Err(err) => {
                debug!("websocket error on conn={conn_id}: {err}");
                break;
            }
            _ => {}
        }
    }

    send_task.abort();

    // A dropped socket keeps its seat; the room marks it disconnected so
    // the game continues and the player can rejoin.
    if !departed {
        if let Some(session) = &session {
            session.room.disconnect(conn_id).await;
        }
    }

    info!("websocket disconnected: conn={conn_id}");
}

async fn route_message(
    msg: ClientMessage,
    session: &mut Option<Session>,
    departed: &mut bool,
    conn: &ConnectionHandle,
    state: &AppState,
    out_tx: &mpsc::UnboundedSender<ServerMessage>,
) -> Flow {
    match session {
        None => bind_connection(msg, session, conn, state, out_tx).await,
        Some(bound) => {
            match msg {
                ClientMessage::CreateRoom { .. }
                | ClientMessage::JoinRoom { .. }
                | ClientMessage::RejoinRoom { .. }
                | ClientMessage::SpectateRoom { .. } => {
                    // Already bound; one socket, one room.
                    let _ = out_tx.send(ServerMessage::error(&GameError::InvalidMessage));
                    Flow::Continue
                }
                ClientMessage::AddAi { difficulty } => {
                    let result = match bound.player_id {
                        Some(pid) => bound.room.add_ai(pid, difficulty).await,
                        None => Err(GameError::NotHost),
                    };
                    report(result, out_tx);
                    Flow::Continue
                }
                ClientMessage::RemovePlayer { player_id } => {
                    let result = match bound.player_id {
                        Some(pid) => bound.room.remove_player(pid, player_id).await,
                        None => Err(GameError::NotHost),
                    };
                    report(result, out_tx);
                    Flow::Continue
                }
                ClientMessage::StartGame => {
                    let result = match bound.player_id {
                        Some(pid) => bound.room.start_game(pid).await,
                        None => Err(GameError::NotHost),
                    };
                    report(result, out_tx);
                    Flow::Continue
                }
                ClientMessage::GameAction { action } => {
                    let result = match bound.player_id {
                        Some(pid) => bound.room.action(pid, action).await,
                        None => Err(GameError::PlayerNotFound),
                    };
                    report(result, out_tx);
                    Flow::Continue
                }
                ClientMessage::LeaveRoom => {
                    if let Some(pid) = bound.player_id {
                        bound.room.leave(pid, conn.conn_id).await;
                    }
                    *departed = true;
                    Flow::Close
                }
            }
        }
    }
}

/// Handle the first message on an unbound socket.
async fn bind_connection(
    msg: ClientMessage,
    session: &mut Option<Session>,
    conn: &ConnectionHandle,
    state: &AppState,
    out_tx: &mpsc::UnboundedSender<ServerMessage>,
) -> Flow {
    match msg {
        ClientMessage::CreateRoom {
            player_name,
            settings,
        } => {
            let settings = match settings.resolve() {
                Ok(settings) => settings,
                Err(err) => {
                    let _ = out_tx.send(ServerMessage::error(&err));
                    return Flow::Continue;
                }
            };
            let room = state.registry.create_room(settings).await;
            match room.join(player_name, conn.clone()).await {
                Ok(outcome) => {
                    info!("room {} created by {}", room.code, outcome.player_id);
                    let _ = out_tx.send(ServerMessage::RoomCreated {
                        room_code: room.code.clone(),
                        player_id: outcome.player_id,
                        state: outcome.state,
                    });
                    *session = Some(Session {
                        room,
                        player_id: Some(outcome.player_id),
                    });
                }
                Err(err) => {
                    let _ = out_tx.send(ServerMessage::error(&err));
                }
            }
            Flow::Continue
        }
        ClientMessage::JoinRoom {
            room_code,
            player_name,
        } => {
            let Some(room) = state.registry.get(&room_code).await else {
                let _ = out_tx.send(ServerMessage::error(&GameError::RoomNotFound));
                return Flow::Continue;
            };
            match room.join(player_name, conn.clone()).await {
                Ok(outcome) => {
                    let _ = out_tx.send(ServerMessage::JoinedRoom {
                        room_code: room.code.clone(),
                        player_id: outcome.player_id,
                        host_id: outcome.host_id,
                        state: outcome.state,
                    });
                    *session = Some(Session {
                        room,
                        player_id: Some(outcome.player_id),
                    });
                }
                Err(err) => {
                    let _ = out_tx.send(ServerMessage::error(&err));
                }
            }
            Flow::Continue
        }
        ClientMessage::RejoinRoom {
            room_code,
            player_id,
        } => {
            let Some(room) = state.registry.get(&room_code).await else {
                let _ = out_tx.send(ServerMessage::error(&GameError::RoomNotFound));
                return Flow::Continue;
            };
            match room.rejoin(player_id, conn.clone()).await {
                Ok(outcome) => {
                    let _ = out_tx.send(ServerMessage::RejoinedRoom {
                        room_code: room.code.clone(),
                        player_id: outcome.player_id,
                        host_id: outcome.host_id,
                        state: outcome.state,
                    });
                    *session = Some(Session {
                        room,
                        player_id: Some(outcome.player_id),
                    });
                }
                Err(err) => {
                    let _ = out_tx.send(ServerMessage::error(&err));
                }
            }
            Flow::Continue
        }
        ClientMessage::SpectateRoom { room_code } => {
            let Some(room) = state.registry.get(&room_code).await else {
                let _ = out_tx.send(ServerMessage::error(&GameError::RoomNotFound));
                return Flow::Continue;
            };
            match room.spectate(conn.clone()).await {
                Ok(view) => {
                    let _ = out_tx.send(ServerMessage::Spectating {
                        room_code: room.code.clone(),
                        state: view,
                    });
                    *session = Some(Session {
                        room,
                        player_id: None,
                    });
                }
                Err(err) => {
                    let _ = out_tx.send(ServerMessage::error(&err));
                }
            }
            Flow::Continue
        }
        _ => {
            // Everything else requires being in a room first.
            let _ = out_tx.send(ServerMessage::error(&GameError::RoomNotFound));
            Flow::Continue
        }
    }
}

fn report(result: Result<(), GameError>, out_tx: &mpsc::UnboundedSender<ServerMessage>) {
    if let Err(err) = result {
        let _ = out_tx.send(ServerMessage::error(&err));
    }
}
