//! Orders and their lifecycle rules.
//!
//! The mutation methods on [`Order`] are pure: they check the transition
//! table, apply the change and bump the version counter. Persisting the
//! result (and detecting a concurrent writer through `version`) is the
//! store's job.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::user::OwnerSummary;
use crate::types::{OrderId, OrderStatus, UserId};

/// One product entry within an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: String,
    pub name: String,
    #[serde(default)]
    pub brand: String,
    /// Unit price.
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default)]
    pub image_url: String,
}

impl LineItem {
    /// Unit price times quantity, or `None` if the product overflows.
    #[must_use]
    pub fn subtotal(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Errors raised by the order state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The transition table does not allow `from -> to`.
    #[error("cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Cancel was requested on an order that is already cancelled.
    #[error("order is already cancelled")]
    AlreadyCancelled,

    /// Cancel was requested on an order past the point of cancellation.
    #[error("cannot cancel order in {0} status")]
    NotCancellable(OrderStatus),
}

/// A purchase record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<LineItem>,
    pub total: Decimal,
    pub status: OrderStatus,
    pub shipping_address: String,
    pub phone: String,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency counter, incremented on every mutation.
    pub version: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl Order {
    /// Payment method recorded when the client does not name one.
    pub const DEFAULT_PAYMENT_METHOD: &'static str = "cod";

    /// Sum of line item subtotals, or `None` if any step overflows.
    #[must_use]
    pub fn items_total(items: &[LineItem]) -> Option<Decimal> {
        items
            .iter()
            .try_fold(Decimal::ZERO, |acc, item| acc.checked_add(item.subtotal()?))
    }

    /// Move the order to `next` if the transition table allows it.
    ///
    /// Entering `cancelled` this way stamps `cancelled_at` but records no reason.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::InvalidTransition`] for any move outside the table.
    pub fn transition_to(
        &mut self,
        next: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        self.status = next;
        if next == OrderStatus::Cancelled {
            self.cancelled_at = Some(now);
        }
        self.touch(now);
        Ok(())
    }

    /// Cancel the order, recording the reason.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::AlreadyCancelled`] if the order is cancelled,
    /// or [`TransitionError::NotCancellable`] once it has shipped.
    pub fn cancel(
        &mut self,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.status == OrderStatus::Cancelled {
            return Err(TransitionError::AlreadyCancelled);
        }
        if !self.status.can_transition_to(OrderStatus::Cancelled) {
            return Err(TransitionError::NotCancellable(self.status));
        }

        self.status = OrderStatus::Cancelled;
        self.cancellation_reason = reason.filter(|r| !r.trim().is_empty());
        self.cancelled_at = Some(now);
        self.touch(now);
        Ok(())
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.version += 1;
    }
}

/// An order as returned by the API, with its owner's display fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<OwnerSummary>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(price: i64, quantity: u32) -> LineItem {
        LineItem {
            product_id: "p1".to_owned(),
            name: "Seiko 5".to_owned(),
            brand: "Seiko".to_owned(),
            price: Decimal::from(price),
            quantity,
            image_url: String::new(),
        }
    }

    fn order(status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::generate(),
            user_id: UserId::generate(),
            items: vec![item(100_000, 1)],
            total: Decimal::from(100_000),
            status,
            shipping_address: "123 Main St".to_owned(),
            phone: "0987654321".to_owned(),
            payment_method: Order::DEFAULT_PAYMENT_METHOD.to_owned(),
            created_at: now,
            updated_at: now,
            cancellation_reason: None,
            cancelled_at: None,
            version: 1,
            idempotency_key: None,
        }
    }

    #[test]
    fn test_items_total() {
        let items = [item(150_000, 2), item(200_000, 1)];
        assert_eq!(Order::items_total(&items), Some(Decimal::from(500_000)));
        assert_eq!(Order::items_total(&[]), Some(Decimal::ZERO));
    }

    #[test]
    fn test_items_total_overflow_is_none() {
        let mut huge = item(0, 2);
        huge.price = Decimal::MAX;
        assert_eq!(huge.subtotal(), None);
        assert_eq!(Order::items_total(&[huge]), None);

        let mut max = item(0, 1);
        max.price = Decimal::MAX;
        assert_eq!(Order::items_total(&[max.clone(), max]), None);
    }

    #[test]
    fn test_transition_bumps_version() {
        let mut o = order(OrderStatus::Pending);
        o.transition_to(OrderStatus::Processing, Utc::now()).unwrap();
        assert_eq!(o.status, OrderStatus::Processing);
        assert_eq!(o.version, 2);
        assert!(o.cancelled_at.is_none());
    }

    #[test]
    fn test_transition_rejects_skips_and_rewinds() {
        let mut o = order(OrderStatus::Pending);
        let err = o.transition_to(OrderStatus::Delivered, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Delivered
            }
        );
        assert_eq!(o.version, 1);

        let mut shipped = order(OrderStatus::Shipped);
        assert!(shipped.transition_to(OrderStatus::Pending, Utc::now()).is_err());
    }

    #[test]
    fn test_transition_into_cancelled_stamps_time() {
        let mut o = order(OrderStatus::Processing);
        o.transition_to(OrderStatus::Cancelled, Utc::now()).unwrap();
        assert!(o.cancelled_at.is_some());
        assert!(o.cancellation_reason.is_none());
    }

    #[test]
    fn test_cancel_records_reason() {
        let mut o = order(OrderStatus::Pending);
        o.cancel(Some("changed my mind".to_owned()), Utc::now()).unwrap();
        assert_eq!(o.status, OrderStatus::Cancelled);
        assert_eq!(o.cancellation_reason.as_deref(), Some("changed my mind"));
        assert!(o.cancelled_at.is_some());
    }

    #[test]
    fn test_cancel_twice() {
        let mut o = order(OrderStatus::Pending);
        o.cancel(None, Utc::now()).unwrap();
        assert_eq!(o.cancel(None, Utc::now()), Err(TransitionError::AlreadyCancelled));
    }

    #[test]
    fn test_cancel_after_shipping() {
        for status in [OrderStatus::Shipped, OrderStatus::Delivered] {
            let mut o = order(status);
            assert_eq!(
                o.cancel(None, Utc::now()),
                Err(TransitionError::NotCancellable(status))
            );
        }
    }

    #[test]
    fn test_details_flatten_order_fields() {
        let details = OrderDetails {
            order: order(OrderStatus::Pending),
            user: None,
        };
        let value = serde_json::to_value(&details).unwrap();
        assert_eq!(value["status"], "pending");
        assert_eq!(value["paymentMethod"], "cod");
        assert!(value.get("user").is_none());

        let back: OrderDetails = serde_json::from_value(value).unwrap();
        assert_eq!(back, details);
    }
}
