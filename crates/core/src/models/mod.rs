//! Domain models and wire types shared by the server and the client.
//!
//! Field names serialize in `camelCase` to match the storefront's JSON API.

pub mod api;
pub mod order;
pub mod user;

pub use api::*;
pub use order::{LineItem, Order, OrderDetails, TransitionError};
pub use user::{OwnerSummary, UserProfile};
