//! Durable copies of sessions so conversations survive a restart.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use devpilot_core::error::SessionError;
use devpilot_core::session::{Session, SessionId};
use tracing::debug;

#[async_trait]
pub trait SessionArchive: Send + Sync {
    /// Load a stored session, `None` if it was never saved.
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, SessionError>;

    async fn save(&self, session: &Session) -> Result<(), SessionError>;
}

/// One pretty-printed JSON file per session in a directory.
pub struct JsonFileArchive {
    dir: PathBuf,
}

impl JsonFileArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Session ids are caller-chosen, so file names are hex-encoded.
    fn path_for(&self, id: &SessionId) -> PathBuf {
        let name: String = id.as_str().bytes().map(|b| format!("{b:02x}")).collect();
        self.dir.join(format!("{name}.json"))
    }
}

fn archive_error(context: &str, path: &Path, err: impl std::fmt::Display) -> SessionError {
    SessionError::Archive(format!("{context} {}: {err}", path.display()))
}

#[async_trait]
impl SessionArchive for JsonFileArchive {
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, SessionError> {
        let path = self.path_for(id);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(archive_error("failed to read", &path, e)),
        };
        let session: Session = serde_json::from_str(&raw).map_err(|e| archive_error("failed to parse", &path, e))?;
        debug!(session_id = %id, turns = session.len(), "Session restored from archive");
        Ok(Some(session))
    }

    async fn save(&self, session: &Session) -> Result<(), SessionError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| archive_error("failed to create", &self.dir, e))?;

        let path = self.path_for(session.id());
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(session).map_err(|e| archive_error("failed to encode", &path, e))?;

        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| archive_error("failed to write", &tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| archive_error("failed to replace", &path, e))?;
        Ok(())
    }
}
