//! In-memory session store with pluggable eviction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use devpilot_core::session::{Session, SessionId};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::debug;

/// Shared handle to one session. Holding its lock means owning the session
/// for the duration of one message.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Decides when an idle session may be dropped from memory.
pub trait EvictionPolicy: Send + Sync {
    fn should_evict(&self, idle_for: Duration) -> bool;
}

/// Keeps every session until the capacity bound is hit.
pub struct NoEviction;

impl EvictionPolicy for NoEviction {
    fn should_evict(&self, _idle_for: Duration) -> bool {
        false
    }
}

/// Drops sessions idle for longer than `ttl`.
pub struct TtlEviction {
    ttl: Duration,
}

impl TtlEviction {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }
}

impl EvictionPolicy for TtlEviction {
    fn should_evict(&self, idle_for: Duration) -> bool {
        idle_for >= self.ttl
    }
}

struct Entry {
    handle: SessionHandle,
    last_used: Instant,
}

impl Entry {
    /// Nobody outside the store holds the handle or its lock.
    fn is_idle(&self) -> bool {
        Arc::strong_count(&self.handle) == 1 && self.handle.try_lock().is_ok()
    }
}

pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Entry>>,
    policy: Box<dyn EvictionPolicy>,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(policy: Box<dyn EvictionPolicy>, max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            policy,
            max_sessions: max_sessions.max(1),
        }
    }

    /// A store that never evicts on age.
    pub fn unbounded() -> Self {
        Self::new(Box::new(NoEviction), usize::MAX)
    }

    /// The session's handle if it is already in memory.
    pub async fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        sessions.get_mut(id).map(|entry| {
            entry.last_used = Instant::now();
            entry.handle.clone()
        })
    }

    /// The session's handle, creating an empty session on first use.
    pub async fn get_or_create(&self, id: &SessionId) -> SessionHandle {
        self.insert_if_absent(Session::new(id.clone())).await
    }

    /// Store `session` unless one with the same id is already present; the
    /// handle returned is always the one in the store.
    pub async fn insert_if_absent(&self, session: Session) -> SessionHandle {
        let id = session.id().clone();
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();

        if let Some(entry) = sessions.get_mut(&id) {
            entry.last_used = now;
            return entry.handle.clone();
        }

        debug!(session_id = %id, "Session created");
        let handle = Arc::new(Mutex::new(session));
        sessions.insert(
            id,
            Entry {
                handle: handle.clone(),
                last_used: now,
            },
        );

        if sessions.len() > self.max_sessions {
            evict_least_recent(&mut sessions, self.max_sessions);
        }
        handle
    }

    /// A copy of the session, taken after any in-flight message finishes.
    pub async fn snapshot(&self, id: &SessionId) -> Option<Session> {
        let handle = {
            let sessions = self.sessions.read().await;
            sessions.get(id).map(|entry| entry.handle.clone())
        }?;
        let session = handle.lock().await;
        Some(session.clone())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Apply the eviction policy now. Returns how many sessions were dropped.
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Instant::now()).await
    }

    /// Apply the eviction policy as of `now`. Sessions in use are never
    /// evicted.
    pub async fn sweep_at(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| {
            let idle_for = now.saturating_duration_since(entry.last_used);
            !(entry.is_idle() && self.policy.should_evict(idle_for))
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, remaining = sessions.len(), "Evicted idle sessions");
        }
        evicted
    }
}

/// Drop idle sessions, oldest first, until `max` remain.
fn evict_least_recent(sessions: &mut HashMap<SessionId, Entry>, max: usize) {
    let mut idle: Vec<(Instant, SessionId)> = sessions
        .iter()
        .filter(|(_, entry)| entry.is_idle())
        .map(|(id, entry)| (entry.last_used, id.clone()))
        .collect();
    idle.sort();

    for (_, id) in idle {
        if sessions.len() <= max {
            break;
        }
        debug!(session_id = %id, "Evicting least recently used session");
        sessions.remove(&id);
    }
}
