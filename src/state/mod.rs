//! Shared application state: the storage slot, the SSE hubs, the question
//! bank seam, and the runtime configuration. Passed explicitly to every
//! service call; there is no ambient global match state.

mod sse;

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{config::AppConfig, dao::match_store::MatchStore, error::ServiceError, services::deck::DeckSource};

pub use self::sse::{SseHub, SseState};

/// Cheaply cloneable handle to the application state.
pub type SharedState = Arc<AppState>;

/// Central application state storing the storage handle, realtime hubs, and
/// configuration.
pub struct AppState {
    store: RwLock<Option<Arc<dyn MatchStore>>>,
    sse: SseState,
    deck: Arc<dyn DeckSource>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, deck: Arc<dyn DeckSource>) -> SharedState {
        Arc::new(Self {
            store: RwLock::new(None),
            sse: SseState::new(16, 16),
            deck,
            config,
        })
    }

    /// Obtain a handle to the current match store, if one is installed.
    pub async fn match_store(&self) -> Option<Arc<dyn MatchStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the match store or fail with the degraded-mode error.
    pub async fn require_store(&self) -> Result<Arc<dyn MatchStore>, ServiceError> {
        self.match_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new match store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn MatchStore>) {
        let mut guard = self.store.write().await;
        *guard = Some(store);
    }

    /// Remove the current match store and enter degraded mode.
    pub async fn clear_store(&self) {
        let mut guard = self.store.write().await;
        guard.take();
    }

    /// Whether the service is running without a storage backend.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.store.read().await;
        guard.is_none()
    }

    /// SSE hub and topic registry.
    pub fn sse(&self) -> &SseState {
        &self.sse
    }

    /// Question bank the claimer draws decks from.
    pub fn deck_source(&self) -> &Arc<dyn DeckSource> {
        &self.deck
    }

    /// Runtime configuration (timing windows, bank path).
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
