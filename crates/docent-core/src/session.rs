//! Per-session chat history.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use docent_llm::provider::Message;
use tokio::sync::watch;
use tokio::time::Instant;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

pub trait SessionStore: Send + Sync {
    /// History of `session_id`; empty for unknown sessions.
    fn get(&self, session_id: &str) -> BoxFuture<'_, Result<Vec<Message>, SessionError>>;

    /// Append to `session_id`, creating the session on first use.
    fn append(
        &self,
        session_id: &str,
        messages: Vec<Message>,
    ) -> BoxFuture<'_, Result<(), SessionError>>;

    fn clear(&self, session_id: &str) -> BoxFuture<'_, Result<(), SessionError>>;
}

struct Session {
    messages: Vec<Message>,
    last_seen: Instant,
}

/// Process-local store. Histories are capped at `max_history` messages (oldest dropped) and
/// sessions idle longer than `idle_ttl` are removed by [`evict_idle`](Self::evict_idle).
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    idle_ttl: Duration,
    max_history: usize,
}

impl std::fmt::Debug for InMemorySessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySessionStore")
            .field("idle_ttl", &self.idle_ttl)
            .field("max_history", &self.max_history)
            .finish_non_exhaustive()
    }
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new(idle_ttl: Duration, max_history: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_ttl,
            max_history: max_history.max(1),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Session>>, SessionError> {
        self.sessions
            .lock()
            .map_err(|e| SessionError::Unavailable(e.to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().map_or(0, |s| s.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop sessions idle for longer than the TTL. Returns how many were removed.
    #[must_use]
    pub fn evict_idle(&self) -> usize {
        let Ok(mut sessions) = self.sessions.lock() else {
            return 0;
        };
        let before = sessions.len();
        let ttl = self.idle_ttl;
        sessions.retain(|_, s| s.last_seen.elapsed() <= ttl);
        before - sessions.len()
    }

    /// Run [`evict_idle`](Self::evict_idle) every `interval` until `shutdown` flips to `true`.
    #[must_use]
    pub fn spawn_eviction(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = self.evict_idle();
                        if removed > 0 {
                            tracing::debug!(removed, "evicted idle sessions");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, session_id: &str) -> BoxFuture<'_, Result<Vec<Message>, SessionError>> {
        let session_id = session_id.to_owned();
        Box::pin(async move {
            let mut sessions = self.lock()?;
            Ok(sessions
                .get_mut(&session_id)
                .map(|s| {
                    s.last_seen = Instant::now();
                    s.messages.clone()
                })
                .unwrap_or_default())
        })
    }

    fn append(
        &self,
        session_id: &str,
        messages: Vec<Message>,
    ) -> BoxFuture<'_, Result<(), SessionError>> {
        let session_id = session_id.to_owned();
        Box::pin(async move {
            let mut sessions = self.lock()?;
            let session = sessions.entry(session_id).or_insert_with(|| Session {
                messages: Vec::new(),
                last_seen: Instant::now(),
            });
            session.messages.extend(messages);
            let overflow = session.messages.len().saturating_sub(self.max_history);
            session.messages.drain(..overflow);
            session.last_seen = Instant::now();
            Ok(())
        })
    }

    fn clear(&self, session_id: &str) -> BoxFuture<'_, Result<(), SessionError>> {
        let session_id = session_id.to_owned();
        Box::pin(async move {
            self.lock()?.remove(&session_id);
            Ok(())
        })
    }
}
