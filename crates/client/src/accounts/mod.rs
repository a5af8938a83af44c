//! Account repositories the client signs in through.
//!
//! - [`RemoteAccounts`] talks to the API
//! - [`LocalAccounts`] keeps accounts in a JSON file on this device
//! - [`FallbackAccounts`] tries the remote first and uses the local store only
//!   while the server is unreachable

mod fallback;
mod local;
mod remote;

use std::future::Future;

use watch_shop_core::RegisterRequest;

use crate::error::ClientError;
use crate::session::Session;

pub use fallback::FallbackAccounts;
pub use local::{LocalAccounts, SeedAccount};
pub use remote::RemoteAccounts;

/// Registration and password login.
pub trait AccountRepository: Send + Sync {
    /// Create an account and sign it in.
    fn register(
        &self,
        req: &RegisterRequest,
    ) -> impl Future<Output = Result<Session, ClientError>> + Send;

    /// Sign in with email and password.
    fn login(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session, ClientError>> + Send;
}
