//! Client-side mirror of the signed-in session.
//!
//! The cache starts signed-out on every launch. A file-backed cache clears any
//! session left behind by a previous run unless it is explicitly resumed.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use watch_shop_core::{AuthResponse, UserProfile};

use crate::error::ClientError;
use crate::storage;

/// The current user and how they were authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: UserProfile,
    /// Bearer token; absent for offline sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Signed in against local accounts while the server was unreachable.
    #[serde(default)]
    pub offline: bool,
}

impl Session {
    /// Session backed by a server-issued token.
    #[must_use]
    pub fn online(response: AuthResponse) -> Self {
        Self {
            user: response.user,
            token: Some(response.token),
            offline: false,
        }
    }

    /// Session created from a local account. Carries no token.
    #[must_use]
    pub const fn offline(user: UserProfile) -> Self {
        Self {
            user,
            token: None,
            offline: true,
        }
    }

    /// Whether the user holds the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.role.is_admin()
    }
}

/// Holds at most one [`Session`], optionally mirrored to a JSON file.
#[derive(Debug, Clone)]
pub struct SessionCache {
    path: Option<PathBuf>,
    current: Arc<RwLock<Option<Session>>>,
}

impl SessionCache {
    /// A cache that lives only in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            current: Arc::new(RwLock::new(None)),
        }
    }

    /// A signed-out cache mirrored to `path`. Any stale file is removed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Storage`] if the stale file cannot be removed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, ClientError> {
        let path = path.into();
        storage::remove(&path).await?;
        Ok(Self {
            path: Some(path),
            current: Arc::new(RwLock::new(None)),
        })
    }

    /// A cache mirrored to `path` that restores the session saved there.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded.
    pub async fn resume(path: impl Into<PathBuf>) -> Result<Self, ClientError> {
        let path = path.into();
        let session: Option<Session> = storage::load(&path).await?;
        tracing::debug!(
            path = %path.display(),
            restored = session.is_some(),
            "Session cache resumed"
        );
        Ok(Self {
            path: Some(path),
            current: Arc::new(RwLock::new(session)),
        })
    }

    /// Replace the current session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be written to disk; the cache
    /// is left unchanged in that case.
    pub async fn sign_in(&self, session: Session) -> Result<(), ClientError> {
        let mut current = self.current.write().await;
        if let Some(path) = &self.path {
            storage::save(path, &session).await?;
        }
        tracing::info!(user_id = %session.user.id, offline = session.offline, "Signed in");
        *current = Some(session);
        Ok(())
    }

    /// Clear the current session.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Storage`] if the mirrored file cannot be removed.
    pub async fn sign_out(&self) -> Result<(), ClientError> {
        let mut current = self.current.write().await;
        if let Some(path) = &self.path {
            storage::remove(path).await?;
        }
        if let Some(session) = current.take() {
            tracing::info!(user_id = %session.user.id, "Signed out");
        }
        Ok(())
    }

    /// Snapshot of the current session.
    pub async fn current(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    /// Bearer token of the current session, if it has one.
    pub async fn token(&self) -> Option<String> {
        self.current
            .read()
            .await
            .as_ref()
            .and_then(|s| s.token.clone())
    }
}
