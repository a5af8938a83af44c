//! Order lifecycle error types.

use thiserror::Error;

use watch_shop_core::TransitionError;

use crate::db::RepositoryError;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Shipping address or phone was blank.
    #[error("missing fields")]
    MissingFields,

    /// The order has no line items.
    #[error("order must contain at least one item")]
    EmptyOrder,

    /// A line item has a zero quantity, a negative price, or no product.
    #[error("invalid line item: {0}")]
    InvalidLineItem(String),

    /// The submitted total differs from the sum of the line items.
    #[error("order total does not match items")]
    TotalMismatch,

    /// The order's user does not exist.
    #[error("user not found")]
    UnknownUser,

    /// No order with this ID.
    #[error("order not found")]
    NotFound,

    /// The caller may not act on this order.
    #[error("forbidden")]
    Forbidden,

    /// A status update without a status.
    #[error("status is required")]
    MissingStatus,

    /// A status update naming no known status.
    #[error("invalid status: {0}")]
    InvalidStatus(String),

    /// The lifecycle rules refused the change.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Another request changed the order first.
    #[error("order was modified concurrently")]
    ConcurrentModification,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
