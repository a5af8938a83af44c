//! Order lifecycle service.
//!
//! Validates new orders, enforces who may see and change which order, and
//! persists every status change with a version check so concurrent writers
//! cannot overwrite each other.

mod error;

pub use error::OrderError;

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument};

use watch_shop_core::{
    CreateOrderRequest, Order, OrderDetails, OrderId, OrderStatus, OwnerSummary, Role, UserId,
};

use crate::db::{OrderStore, RepositoryError, UserStore};
use crate::services::auth::Claims;

/// Who is calling, as established by their session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    fn may_access(self, owner: UserId) -> bool {
        self.role.is_admin() || self.user_id == owner
    }

    fn require_access(self, owner: UserId) -> Result<(), OrderError> {
        if self.may_access(owner) {
            Ok(())
        } else {
            Err(OrderError::Forbidden)
        }
    }

    fn require_admin(self) -> Result<(), OrderError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(OrderError::Forbidden)
        }
    }
}

impl From<&Claims> for Caller {
    fn from(claims: &Claims) -> Self {
        Self {
            user_id: claims.sub,
            role: claims.role,
        }
    }
}

/// Result of an order creation request.
#[derive(Debug, Clone)]
pub struct Placed {
    pub order: OrderDetails,
    /// `true` when an earlier order with the same idempotency key was returned.
    pub replayed: bool,
}

/// Order lifecycle service.
pub struct OrderService<'a, S> {
    store: &'a S,
}

impl<'a, S: UserStore + OrderStore> OrderService<'a, S> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Validate and persist a new `pending` order.
    ///
    /// With an idempotency key, a repeated request from the same user returns
    /// the order created by the first one.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Forbidden` if a non-admin orders for someone else,
    /// one of the validation errors for a malformed order (nothing is
    /// persisted), or `OrderError::UnknownUser` if the user does not exist.
    #[instrument(skip_all, fields(user_id = %req.user_id))]
    pub async fn create(
        &self,
        caller: Caller,
        req: CreateOrderRequest,
        idempotency_key: Option<&str>,
    ) -> Result<Placed, OrderError> {
        caller.require_access(req.user_id)?;
        validate(&req)?;

        let owner = self
            .store
            .user_by_id(req.user_id)
            .await?
            .ok_or(OrderError::UnknownUser)?
            .owner_summary();

        let idempotency_key = idempotency_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_owned);

        if let Some(key) = idempotency_key.as_deref()
            && let Some(existing) = self.store.order_by_idempotency_key(req.user_id, key).await?
        {
            info!(order_id = %existing.id, "Replayed idempotent order");
            return Ok(Placed {
                order: with_owner(existing, Some(owner)),
                replayed: true,
            });
        }

        let now = Utc::now();
        let order = Order {
            id: OrderId::generate(),
            user_id: req.user_id,
            items: req.items,
            total: req.total,
            status: OrderStatus::Pending,
            shipping_address: req.shipping_address.trim().to_owned(),
            phone: req.phone.trim().to_owned(),
            payment_method: req
                .payment_method
                .map(|m| m.trim().to_owned())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| Order::DEFAULT_PAYMENT_METHOD.to_owned()),
            created_at: now,
            updated_at: now,
            cancellation_reason: None,
            cancelled_at: None,
            version: 1,
            idempotency_key,
        };

        match self.store.insert_order(&order).await {
            Ok(()) => {}
            // A concurrent request with the same key won the insert.
            Err(RepositoryError::Conflict(_)) if order.idempotency_key.is_some() => {
                let key = order.idempotency_key.as_deref().unwrap_or_default();
                let existing = self
                    .store
                    .order_by_idempotency_key(order.user_id, key)
                    .await?
                    .ok_or(OrderError::ConcurrentModification)?;
                return Ok(Placed {
                    order: with_owner(existing, Some(owner)),
                    replayed: true,
                });
            }
            Err(e) => return Err(e.into()),
        }

        info!(order_id = %order.id, total = %order.total, "Order created");
        Ok(Placed {
            order: with_owner(order, Some(owner)),
            replayed: false,
        })
    }

    /// All orders of `user_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Forbidden` if a non-admin asks for another user.
    pub async fn list_for_user(
        &self,
        caller: Caller,
        user_id: UserId,
    ) -> Result<Vec<OrderDetails>, OrderError> {
        caller.require_access(user_id)?;

        let mut orders = self.store.orders_for_user(user_id).await?;
        newest_first(&mut orders);

        let owner = self.store.user_by_id(user_id).await?.map(|u| u.owner_summary());
        Ok(orders
            .into_iter()
            .map(|o| with_owner(o, owner.clone()))
            .collect())
    }

    /// Every order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Forbidden` unless the caller is an admin.
    pub async fn list_all(&self, caller: Caller) -> Result<Vec<OrderDetails>, OrderError> {
        caller.require_admin()?;

        let mut orders = self.store.all_orders().await?;
        newest_first(&mut orders);

        let mut owners: HashMap<UserId, Option<OwnerSummary>> = HashMap::new();
        let mut details = Vec::with_capacity(orders.len());
        for order in orders {
            let owner = match owners.get(&order.user_id) {
                Some(owner) => owner.clone(),
                None => {
                    let owner = self
                        .store
                        .user_by_id(order.user_id)
                        .await?
                        .map(|u| u.owner_summary());
                    owners.insert(order.user_id, owner.clone());
                    owner
                }
            };
            details.push(with_owner(order, owner));
        }
        Ok(details)
    }

    /// One order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if absent and `OrderError::Forbidden` if
    /// it belongs to someone else.
    pub async fn get(&self, caller: Caller, id: OrderId) -> Result<OrderDetails, OrderError> {
        let order = self.load(id).await?;
        caller.require_access(order.user_id)?;
        self.details(order).await
    }

    /// Move an order to a new status (admin only).
    ///
    /// # Errors
    ///
    /// Returns `OrderError::MissingStatus` / `InvalidStatus` for a bad request,
    /// `OrderError::Transition` if the lifecycle forbids the move, and
    /// `OrderError::ConcurrentModification` if the order changed meanwhile.
    #[instrument(skip(self, caller), fields(order_id = %id))]
    pub async fn update_status(
        &self,
        caller: Caller,
        id: OrderId,
        status: Option<&str>,
    ) -> Result<OrderDetails, OrderError> {
        caller.require_admin()?;

        let status = status
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(OrderError::MissingStatus)?;
        let next: OrderStatus = status
            .parse()
            .map_err(|_| OrderError::InvalidStatus(status.to_owned()))?;

        let mut order = self.load(id).await?;
        let expected = order.version;
        let from = order.status;
        order.transition_to(next, Utc::now())?;
        self.save(&order, expected).await?;

        info!(%from, to = %next, "Order status updated");
        self.details(order).await
    }

    /// Cancel an order, recording the reason.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Transition` with `AlreadyCancelled` or
    /// `NotCancellable`, `OrderError::Forbidden` for someone else's order, and
    /// `OrderError::ConcurrentModification` if the order changed meanwhile.
    #[instrument(skip(self, caller, reason), fields(order_id = %id))]
    pub async fn cancel(
        &self,
        caller: Caller,
        id: OrderId,
        reason: Option<String>,
    ) -> Result<OrderDetails, OrderError> {
        let mut order = self.load(id).await?;
        caller.require_access(order.user_id)?;

        let expected = order.version;
        order.cancel(reason, Utc::now())?;
        self.save(&order, expected).await?;

        info!("Order cancelled");
        self.details(order).await
    }

    async fn load(&self, id: OrderId) -> Result<Order, OrderError> {
        self.store
            .order_by_id(id)
            .await?
            .ok_or(OrderError::NotFound)
    }

    async fn save(&self, order: &Order, expected_version: i32) -> Result<(), OrderError> {
        self.store
            .update_order(order, expected_version)
            .await
            .map_err(|e| match e {
                RepositoryError::StaleVersion => OrderError::ConcurrentModification,
                RepositoryError::NotFound => OrderError::NotFound,
                other => OrderError::Repository(other),
            })
    }

    async fn details(&self, order: Order) -> Result<OrderDetails, OrderError> {
        let owner = self
            .store
            .user_by_id(order.user_id)
            .await?
            .map(|u| u.owner_summary());
        Ok(with_owner(order, owner))
    }
}

fn validate(req: &CreateOrderRequest) -> Result<(), OrderError> {
    if req.shipping_address.trim().is_empty() || req.phone.trim().is_empty() {
        return Err(OrderError::MissingFields);
    }
    if req.items.is_empty() {
        return Err(OrderError::EmptyOrder);
    }

    for item in &req.items {
        if item.product_id.trim().is_empty() {
            return Err(OrderError::InvalidLineItem("product id is required".to_owned()));
        }
        if item.quantity == 0 {
            return Err(OrderError::InvalidLineItem(format!(
                "quantity of {} must be at least 1",
                item.product_id
            )));
        }
        if item.price < Decimal::ZERO {
            return Err(OrderError::InvalidLineItem(format!(
                "price of {} must not be negative",
                item.product_id
            )));
        }
        if item.subtotal().is_none() {
            return Err(OrderError::InvalidLineItem(format!(
                "subtotal of {} is out of range",
                item.product_id
            )));
        }
    }

    // An overflowing sum cannot equal any representable total.
    if Order::items_total(&req.items) != Some(req.total) {
        return Err(OrderError::TotalMismatch);
    }
    Ok(())
}

/// Sort by creation time, descending; ties keep reverse insertion order.
fn newest_first(orders: &mut [Order]) {
    orders.reverse();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

fn with_owner(order: Order, user: Option<OwnerSummary>) -> OrderDetails {
    OrderDetails { order, user }
}
