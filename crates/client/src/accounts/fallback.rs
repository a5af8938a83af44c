use watch_shop_core::RegisterRequest;

use super::AccountRepository;
use crate::error::ClientError;
use crate::session::Session;

/// Remote-first repository with a local fallback.
///
/// The local repository is consulted only when the remote one fails with
/// [`ClientError::Unreachable`]. Any answer from the server, including an
/// error, is returned as is.
#[derive(Debug, Clone)]
pub struct FallbackAccounts<R, L> {
    remote: R,
    local: L,
}

impl<R, L> FallbackAccounts<R, L> {
    #[must_use]
    pub const fn new(remote: R, local: L) -> Self {
        Self { remote, local }
    }

    #[must_use]
    pub const fn remote(&self) -> &R {
        &self.remote
    }

    #[must_use]
    pub const fn local(&self) -> &L {
        &self.local
    }
}

impl<R: AccountRepository, L: AccountRepository> AccountRepository for FallbackAccounts<R, L> {
    async fn register(&self, req: &RegisterRequest) -> Result<Session, ClientError> {
        match self.remote.register(req).await {
            Err(ClientError::Unreachable(reason)) => {
                tracing::warn!(%reason, "Server unreachable, registering local account");
                self.local.register(req).await
            }
            other => other,
        }
    }

    async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        match self.remote.login(email, password).await {
            Err(ClientError::Unreachable(reason)) => {
                tracing::warn!(%reason, "Server unreachable, signing in with local account");
                self.local.login(email, password).await
            }
            other => other,
        }
    }
}
