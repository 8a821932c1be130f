//! Authenticated-user session.
//!
//! A `Session` is constructed explicitly and handed to whatever needs the
//! current user; nothing reads it from global state. Its lifecycle is
//! `restore` (from the persisted file) or `login`, then `logout`, which
//! clears the in-memory user and deletes the file.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::User;

/// The signed-in user, persisted to a JSON file between runs.
#[derive(Debug, Clone)]
pub struct Session {
    path: PathBuf,
    user: Option<User>,
}

impl Session {
    /// A logged-out session that will persist to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            user: None,
        }
    }

    /// Restore from `path`. A missing or unreadable file yields a
    /// logged-out session.
    pub fn restore(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let user = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<User>(&content) {
                Ok(user) => {
                    debug!(user_id = user.id, "Restored session");
                    Some(user)
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Discarding corrupt session file");
                    None
                }
            },
            Err(_) => None,
        };
        Self { path, user }
    }

    /// Record `user` as signed in and persist it.
    pub fn login(&mut self, user: User) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&user)?;
        std::fs::write(&self.path, json)
            .map_err(|e| Error::Session(format!("Failed to write {}: {e}", self.path.display())))?;
        info!(user_id = user.id, "Signed in");
        self.user = Some(user);
        Ok(())
    }

    /// Clear the user and remove the persisted file.
    pub fn logout(&mut self) -> Result<()> {
        if let Some(user) = self.user.take() {
            info!(user_id = user.id, "Signed out");
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub const fn current(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// The signed-in user, or a session error naming what was attempted.
    pub fn require(&self) -> Result<&User> {
        self.user
            .as_ref()
            .ok_or_else(|| Error::Session("not signed in".into()))
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn token(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.token.as_deref())
    }

    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
