//! Watch Shop Client - typed API client and session cache.
//!
//! # Architecture
//!
//! - [`ApiClient`] wraps every HTTP endpoint with typed requests and responses
//! - [`SessionCache`] mirrors the signed-in user and bearer token
//! - [`accounts`] provides remote, local and remote-first/local-fallback
//!   account repositories
//!
//! Sessions created from local accounts are marked offline and carry no
//! token, so nothing signed in that way can reach the server's order store.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod accounts;
pub mod api;
pub mod error;
pub mod session;
mod storage;

pub use accounts::{AccountRepository, FallbackAccounts, LocalAccounts, RemoteAccounts, SeedAccount};
pub use api::{ApiClient, PlacedOrder};
pub use error::ClientError;
pub use session::{Session, SessionCache};
