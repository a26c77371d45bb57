//! Shared application state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use odyssey_core::clock::{Clock, Sleeper};
use odyssey_core::generator::Generator;
use odyssey_core::storage::KeyValueStore;
use odyssey_engine::config::{DirectorConfig, StreamConfig};
use odyssey_engine::director::{Collaborators, Director};
use odyssey_narrative::domain::registry::SceneRegistry;
use odyssey_preload::preloader::Preloader;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::relay::{AudioRelay, StreamRelay};

/// A live session and the relays its director presents through.
#[derive(Debug)]
pub struct SessionHandle {
    /// Drives the session.
    pub director: Director,
    /// Stream cues for the client.
    pub stream: Arc<StreamRelay>,
    /// Audio cues for the client.
    pub audio: Arc<AudioRelay>,
    last_seen: Mutex<DateTime<Utc>>,
}

impl SessionHandle {
    /// When the session was last looked up by a request.
    #[must_use]
    pub fn last_seen(&self) -> DateTime<Utc> {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn touch(&self, now: DateTime<Utc>) {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    fn idle_longer_than(&self, now: DateTime<Utc>, max_idle: Duration) -> bool {
        (now - self.last_seen())
            .to_std()
            .is_ok_and(|idle| idle > max_idle)
    }
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The scene graph.
    pub registry: Arc<SceneRegistry>,
    /// Durable storage for saves and cached anchors.
    pub storage: Arc<dyn KeyValueStore>,
    /// Text and image generation.
    pub generator: Arc<dyn Generator>,
    /// Anchor preloader shared by every session.
    pub preloader: Preloader,
    /// Time source for rate limiting.
    pub clock: Arc<dyn Clock>,
    /// Timer for pauses and retries.
    pub sleeper: Arc<dyn Sleeper>,
    /// Stream retry and rate-limit tunables.
    pub stream_config: StreamConfig,
    /// Scene change pacing.
    pub director_config: DirectorConfig,
    sessions: Arc<RwLock<HashMap<Uuid, Arc<SessionHandle>>>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("scenes", &self.registry.len())
            .field("sessions", &self.sessions().len())
            .field("preloader", &self.preloader)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create new application state with default engine tunables.
    #[must_use]
    pub fn new(
        registry: Arc<SceneRegistry>,
        storage: Arc<dyn KeyValueStore>,
        generator: Arc<dyn Generator>,
        preloader: Preloader,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            registry,
            storage,
            generator,
            preloader,
            clock,
            sleeper,
            stream_config: StreamConfig::default(),
            director_config: DirectorConfig::default(),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn sessions(&self) -> RwLockReadGuard<'_, HashMap<Uuid, Arc<SessionHandle>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn sessions_mut(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, Arc<SessionHandle>>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates and registers a session with fresh relays.
    #[must_use]
    pub fn create_session(&self) -> Arc<SessionHandle> {
        let id = Uuid::new_v4();
        let stream = Arc::new(StreamRelay::new());
        let audio = Arc::new(AudioRelay::new());
        let parts = Collaborators {
            registry: Arc::clone(&self.registry),
            storage: Arc::clone(&self.storage),
            stream: stream.clone(),
            audio: audio.clone(),
            generator: Arc::clone(&self.generator),
            preloader: self.preloader.clone(),
            clock: Arc::clone(&self.clock),
            sleeper: Arc::clone(&self.sleeper),
        };
        let director = Director::new(
            id,
            parts,
            self.stream_config,
            self.director_config.clone(),
        );
        let handle = Arc::new(SessionHandle {
            director,
            stream,
            audio,
            last_seen: Mutex::new(self.clock.now()),
        });
        self.sessions_mut().insert(id, Arc::clone(&handle));
        info!(session_id = %id, "session created");
        handle
    }

    /// Looks up a live session and marks it as seen.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::SessionNotFound` if no session has the id.
    pub fn session(&self, id: Uuid) -> Result<Arc<SessionHandle>, ApiError> {
        let handle = self
            .sessions()
            .get(&id)
            .cloned()
            .ok_or(ApiError::SessionNotFound(id))?;
        handle.touch(self.clock.now());
        Ok(handle)
    }

    /// Unregisters a session, returning it if it was live.
    pub fn remove_session(&self, id: Uuid) -> Option<Arc<SessionHandle>> {
        self.sessions_mut().remove(&id)
    }

    /// Tears down and unregisters every session not looked up for longer
    /// than `max_idle`. Returns how many expired.
    pub async fn expire_idle(&self, max_idle: Duration) -> usize {
        let now = self.clock.now();
        let expired: Vec<Arc<SessionHandle>> = {
            let mut sessions = self.sessions_mut();
            let ids: Vec<Uuid> = sessions
                .iter()
                .filter(|(_, handle)| handle.idle_longer_than(now, max_idle))
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };
        for handle in &expired {
            handle.director.teardown().await;
            info!(session_id = %handle.director.id(), "idle session expired");
        }
        expired.len()
    }

    /// Runs [`expire_idle`](Self::expire_idle) every `every` on a background
    /// task.
    #[must_use]
    pub fn spawn_idle_sweeper(&self, max_idle: Duration, every: Duration) -> JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let expired = state.expire_idle(max_idle).await;
                if expired > 0 {
                    info!(expired, remaining = state.session_count(), "idle sessions swept");
                }
            }
        })
    }

    /// Number of live sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions().len()
    }
}
