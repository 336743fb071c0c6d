use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dto::sse::ServerEvent;

/// SSE-specific sub-state carved out from [`crate::state::AppState`].
///
/// One hub carries lobby-wide matchmaking events; each open match gets its
/// own topic hub created lazily on first use. Delivery is best-effort in both
/// directions: publishing to a topic nobody listens on is fine, and a client
/// that misses events still converges by re-reading the match.
pub struct SseState {
    lobby: SseHub,
    matches: DashMap<Uuid, Arc<SseHub>>,
    match_capacity: usize,
}

impl SseState {
    /// Build the SSE sub-tree with per-stream channel capacities.
    pub fn new(lobby_capacity: usize, match_capacity: usize) -> Self {
        Self {
            lobby: SseHub::new(lobby_capacity),
            matches: DashMap::new(),
            match_capacity,
        }
    }

    /// Access the lobby hub used to fan out matchmaking events.
    pub fn lobby(&self) -> &SseHub {
        &self.lobby
    }

    /// Get or create the topic hub for a match.
    pub fn match_topic(&self, match_id: Uuid) -> Arc<SseHub> {
        self.matches
            .entry(match_id)
            .or_insert_with(|| Arc::new(SseHub::new(self.match_capacity)))
            .clone()
    }

    /// Drop a match topic once the match is finished. Open subscriber streams
    /// end when the last sender clone goes away.
    pub fn drop_match_topic(&self, match_id: Uuid) {
        self.matches.remove(&match_id);
    }
}

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}
