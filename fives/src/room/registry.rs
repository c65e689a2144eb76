//! Shared registry of live rooms, keyed by join code.

use log::debug;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::actor::RoomActor;
use super::config::RoomSettings;
use super::messages::RoomHandle;

/// Join codes avoid glyphs that read ambiguously over voice or in a
/// screenshot (0/O, 1/I).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 6;

/// How often closed rooms are swept out of the map.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<String, RoomHandle>>>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a new room actor under a fresh join code.
    pub async fn create_room(&self, settings: RoomSettings) -> RoomHandle {
        let mut rooms = self.rooms.write().await;
        let code = loop {
            let candidate = generate_code();
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
        };
        let handle = RoomActor::spawn(code.clone(), settings);
        rooms.insert(code, handle.clone());
        handle
    }

    /// Look up a room; codes are case-insensitive on the way in.
    pub async fn get(&self, code: &str) -> Option<RoomHandle> {
        let code = code.trim().to_ascii_uppercase();
        let rooms = self.rooms.read().await;
        rooms.get(&code).filter(|h| h.is_open()).cloned()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Periodically drop handles whose actors have exited.
    pub fn spawn_sweeper(&self) {
        let rooms = Arc::clone(&self.rooms);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                let mut rooms = rooms.write().await;
                let before = rooms.len();
                rooms.retain(|_, handle| handle.is_open());
                let swept = before - rooms.len();
                if swept > 0 {
                    debug!("swept {swept} closed rooms, {} remain", rooms.len());
                }
            }
        });
    }
}

fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}
