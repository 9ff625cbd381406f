//! Entry point used by the gateway and CLI: one call per user message.

use std::sync::Arc;

use chrono::Utc;
use devpilot_config::BusyPolicy;
use devpilot_core::error::{Error, SessionError};
use devpilot_core::event::{DomainEvent, EventBus};
use devpilot_core::provider::ToolDefinition;
use devpilot_core::session::{Session, SessionId};
use tokio::sync::{OwnedMutexGuard, broadcast};
use tracing::warn;

use crate::archive::SessionArchive;
use crate::dispatch::DispatchLoop;
use crate::reply::Reply;
use crate::store::{SessionHandle, SessionStore};

pub struct Assistant {
    dispatch: Arc<DispatchLoop>,
    store: SessionStore,
    archive: Option<Arc<dyn SessionArchive>>,
    busy_policy: BusyPolicy,
    event_bus: Arc<EventBus>,
}

impl Assistant {
    pub fn new(dispatch: DispatchLoop, store: SessionStore, event_bus: Arc<EventBus>) -> Self {
        Self {
            dispatch: Arc::new(dispatch),
            store,
            archive: None,
            busy_policy: BusyPolicy::default(),
            event_bus,
        }
    }

    pub fn with_archive(mut self, archive: Arc<dyn SessionArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn with_busy_policy(mut self, policy: BusyPolicy) -> Self {
        self.busy_policy = policy;
        self
    }

    /// Handle one message for `session_id` and return the reply.
    ///
    /// Messages for the same session never run concurrently: depending on
    /// the busy policy a second one waits or fails with `Busy`. Once the
    /// session is locked the message runs on its own task, so dropping the
    /// returned future (a client hanging up) does not cut it short.
    pub async fn respond(&self, session_id: &str, message: &str) -> Result<Reply, Error> {
        let session_id = session_id.trim();
        let message = message.trim();
        if session_id.is_empty() {
            return Err(SessionError::InvalidInput("session_id must not be empty".into()).into());
        }
        if message.is_empty() {
            return Err(SessionError::InvalidInput("message must not be empty".into()).into());
        }

        let id = SessionId::from(session_id);
        let handle = self.session(&id).await?;
        let mut session = self.acquire(&id, handle).await?;

        let dispatch = self.dispatch.clone();
        let archive = self.archive.clone();
        let event_bus = self.event_bus.clone();
        let message = message.to_string();
        let work = tokio::spawn(async move {
            let reply = dispatch.handle(&mut session, &message).await?;
            if let Some(archive) = archive {
                save_session(archive.as_ref(), &session, &event_bus).await;
            }
            Ok::<Reply, SessionError>(reply)
        });

        let reply = work
            .await
            .map_err(|e| Error::Internal(format!("message handling task failed: {e}")))??;
        Ok(reply)
    }

    async fn acquire(&self, id: &SessionId, handle: SessionHandle) -> Result<OwnedMutexGuard<Session>, SessionError> {
        match self.busy_policy {
            BusyPolicy::Queue => Ok(handle.lock_owned().await),
            BusyPolicy::Reject => handle.try_lock_owned().map_err(|_| {
                warn!(session_id = %id, "Session busy; rejecting message");
                SessionError::Busy(id.to_string())
            }),
        }
    }

    /// In-memory session, else the archived one, else a new one.
    async fn session(&self, id: &SessionId) -> Result<SessionHandle, SessionError> {
        if let Some(handle) = self.store.get(id).await {
            return Ok(handle);
        }
        let restored = match &self.archive {
            Some(archive) => archive.load(id).await?,
            None => None,
        };
        let session = restored.unwrap_or_else(|| Session::new(id.clone()));
        Ok(self.store.insert_if_absent(session).await)
    }

    /// A consistent copy of a session's history, if it exists.
    pub async fn transcript(&self, session_id: &str) -> Result<Option<Session>, SessionError> {
        let id = SessionId::from(session_id);
        if let Some(session) = self.store.snapshot(&id).await {
            return Ok(Some(session));
        }
        match &self.archive {
            Some(archive) => archive.load(&id).await,
            None => Ok(None),
        }
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.dispatch.tools().definitions()
    }

    /// Evict idle sessions per the store's policy.
    pub async fn sweep_sessions(&self) -> usize {
        self.store.sweep().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.event_bus.subscribe()
    }
}

/// Save failures are reported but never fail the message.
async fn save_session(archive: &dyn SessionArchive, session: &Session, event_bus: &EventBus) {
    if let Err(e) = archive.save(session).await {
        warn!(session_id = %session.id(), error = %e, "Failed to archive session");
        event_bus.publish(DomainEvent::ErrorOccurred {
            context: format!("archive session {}", session.id()),
            error_message: e.to_string(),
            timestamp: Utc::now(),
        });
    }
}
