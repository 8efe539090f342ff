//! # Demo Sessions
//!
//! Each browser/user gets its own [`DemoSession`]: a step sequencer and a
//! blog post draft. Sessions are never shared; the store only maps ids to
//! independent instances.
//!
//! All mutation goes through [`SessionStore::with_session_mut`], which holds
//! the store's write lock for the whole read-modify-write, so an `advance`
//! and its flag recompute are observed as one step.
//!
//! Sessions untouched for longer than the idle timeout are evicted, either
//! when a new session needs room or by the periodic sweep.

use scribe_core::{BlogPost, FeatureConfig, SeedPolicy, StepSequencer};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

// =============================================================================
// SESSION
// =============================================================================

/// State owned by one demo session.
#[derive(Debug, Clone)]
pub struct DemoSession {
    pub sequencer: StepSequencer,
    pub post: BlogPost,
}

impl DemoSession {
    /// Start a session seeded from the configured feature flags.
    #[must_use]
    pub fn new(features: &FeatureConfig) -> Self {
        Self {
            sequencer: StepSequencer::from_config(features),
            post: BlogPost::new(),
        }
    }
}

/// Errors from session bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found")]
    NotFound,
    #[error("Session limit reached ({0})")]
    LimitReached(usize),
}

// =============================================================================
// SESSION STORE
// =============================================================================

struct SessionEntry {
    session: DemoSession,
    last_seen: Instant,
}

/// In-memory map of session id to session state.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
    features: FeatureConfig,
    max_sessions: usize,
    idle_timeout: Option<Duration>,
}

impl SessionStore {
    /// Create an empty store. New sessions are seeded from `features`.
    #[must_use]
    pub fn new(features: FeatureConfig, max_sessions: usize) -> Self {
        if features.seed_policy == SeedPolicy::Align && !features.is_prefix() {
            tracing::warn!(
                start_stage = %features.prefix_stage(),
                "Enabled features are not a prefix of the unlock order; sessions start at the end of the enabled prefix"
            );
        }
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            features,
            max_sessions,
            idle_timeout: None,
        }
    }

    /// Evict sessions not touched for `timeout`. `None` keeps them forever.
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    /// Idle timeout in effect, if any.
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    fn is_expired(&self, entry: &SessionEntry, now: Instant) -> bool {
        self.idle_timeout
            .is_some_and(|timeout| now.duration_since(entry.last_seen) >= timeout)
    }

    fn evict_expired(&self, sessions: &mut HashMap<Uuid, SessionEntry>) -> usize {
        let now = Instant::now();
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let keep = !self.is_expired(entry, now);
            if !keep {
                tracing::info!(session_id = %id, "Session expired");
            }
            keep
        });
        before - sessions.len()
    }

    /// Drop every idle session and return how many were removed.
    pub async fn evict_idle(&self) -> usize {
        if self.idle_timeout.is_none() {
            return 0;
        }
        let mut sessions = self.sessions.write().await;
        self.evict_expired(&mut sessions)
    }

    /// Look up a live session and mark it as seen. An expired one is removed.
    fn touch<'a>(
        &self,
        sessions: &'a mut HashMap<Uuid, SessionEntry>,
        id: Uuid,
    ) -> Result<&'a mut DemoSession, SessionError> {
        let now = Instant::now();
        let expired = match sessions.get(&id) {
            Some(entry) => self.is_expired(entry, now),
            None => return Err(SessionError::NotFound),
        };
        if expired {
            sessions.remove(&id);
            tracing::info!(session_id = %id, "Session expired");
            return Err(SessionError::NotFound);
        }
        let entry = sessions.get_mut(&id).ok_or(SessionError::NotFound)?;
        entry.last_seen = now;
        Ok(&mut entry.session)
    }

    /// Open a new session and return its id with its initial state.
    pub async fn create(&self) -> Result<(Uuid, DemoSession), SessionError> {
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.max_sessions {
            self.evict_expired(&mut sessions);
        }
        if sessions.len() >= self.max_sessions {
            tracing::warn!(max_sessions = self.max_sessions, "Session limit reached");
            return Err(SessionError::LimitReached(self.max_sessions));
        }

        let id = Uuid::new_v4();
        let session = DemoSession::new(&self.features);
        sessions.insert(
            id,
            SessionEntry {
                session: session.clone(),
                last_seen: Instant::now(),
            },
        );
        tracing::info!(session_id = %id, stage = %session.sequencer.stage(), "Session created");
        Ok((id, session))
    }

    /// Copy out a session's current state.
    pub async fn get(&self, id: Uuid) -> Result<DemoSession, SessionError> {
        let mut sessions = self.sessions.write().await;
        self.touch(&mut sessions, id).map(|session| session.clone())
    }

    /// Run `f` against a session under the write lock and return its result.
    pub async fn with_session_mut<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut DemoSession) -> T,
    ) -> Result<T, SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = self.touch(&mut sessions, id)?;
        Ok(f(session))
    }

    /// End a session.
    pub async fn remove(&self, id: Uuid) -> Result<(), SessionError> {
        match self.sessions.write().await.remove(&id) {
            Some(_) => {
                tracing::info!(session_id = %id, "Session ended");
                Ok(())
            }
            None => Err(SessionError::NotFound),
        }
    }

    /// Number of open sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

// =============================================================================
// TESTS
// =============================================================================
