//! Server-side domain records.
//!
//! Wire types live in `watch_shop_core`; the records here carry fields the
//! API never sends to clients.

pub mod user;

pub use user::UserRecord;
