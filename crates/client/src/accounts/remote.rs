use watch_shop_core::RegisterRequest;

use super::AccountRepository;
use crate::api::ApiClient;
use crate::error::ClientError;
use crate::session::Session;

/// Accounts held by the server.
#[derive(Debug, Clone)]
pub struct RemoteAccounts {
    api: ApiClient,
}

impl RemoteAccounts {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }
}

impl AccountRepository for RemoteAccounts {
    async fn register(&self, req: &RegisterRequest) -> Result<Session, ClientError> {
        self.api.register(req).await.map(Session::online)
    }

    async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        self.api.login(email, password).await.map(Session::online)
    }
}
