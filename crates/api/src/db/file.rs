//! JSON document store.
//!
//! The whole dataset is one document guarded by an async mutex. Every write
//! applies to a copy of the document, persists the copy (temp file, then
//! rename) and only then swaps it in, so a failed write leaves both the file
//! and the in-memory state untouched.
//!
//! Without a path the store lives purely in memory, which is what tests and
//! `DATABASE_URL=memory://` use.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use watch_shop_core::{Email, Order, OrderId, UserId};

use super::{OrderStore, RepositoryError, UserStore};
use crate::models::UserRecord;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    users: Vec<UserRecord>,
    #[serde(default)]
    orders: Vec<Order>,
}

struct Inner {
    path: Option<PathBuf>,
    doc: Mutex<Document>,
}

/// Store holding users and orders in a single JSON document.
#[derive(Clone)]
pub struct JsonFileStore {
    inner: Arc<Inner>,
}

impl JsonFileStore {
    /// A store that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Inner {
                path: None,
                doc: Mutex::new(Document::default()),
            }),
        }
    }

    /// Open (or create on first write) the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Io` if the file exists but cannot be read, and
    /// `RepositoryError::Encoding` if it is not a valid store document.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let path = path.into();
        let doc = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Document::default(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Document::default(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(
            path = %path.display(),
            users = doc.users.len(),
            orders = doc.orders.len(),
            "Opened JSON store"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                path: Some(path),
                doc: Mutex::new(doc),
            }),
        })
    }

    /// Whether writes reach disk.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.inner.path.is_some()
    }

    /// Apply `f` to a copy of the document and commit it if `f` succeeds.
    async fn mutate<F>(&self, f: F) -> Result<(), RepositoryError>
    where
        F: FnOnce(&mut Document) -> Result<(), RepositoryError> + Send,
    {
        let mut guard = self.inner.doc.lock().await;
        let mut next = guard.clone();
        f(&mut next)?;

        if let Some(path) = &self.inner.path {
            persist(path, &next).await?;
        }

        *guard = next;
        Ok(())
    }

    async fn read<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&Document) -> T + Send,
    {
        let guard = self.inner.doc.lock().await;
        f(&guard)
    }
}

async fn persist(path: &Path, doc: &Document) -> Result<(), RepositoryError> {
    let bytes = serde_json::to_vec_pretty(doc)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

impl UserStore for JsonFileStore {
    async fn user_by_id(&self, id: UserId) -> Result<Option<UserRecord>, RepositoryError> {
        Ok(self
            .read(|doc| doc.users.iter().find(|u| u.id == id).cloned())
            .await)
    }

    async fn user_by_email(&self, email: &Email) -> Result<Option<UserRecord>, RepositoryError> {
        Ok(self
            .read(|doc| doc.users.iter().find(|u| u.email == *email).cloned())
            .await)
    }

    async fn insert_user(&self, user: &UserRecord) -> Result<(), RepositoryError> {
        let user = user.clone();
        self.mutate(move |doc| {
            if doc.users.iter().any(|u| u.email == user.email) {
                return Err(RepositoryError::Conflict("email already exists".to_owned()));
            }
            if doc.users.iter().any(|u| u.id == user.id) {
                return Err(RepositoryError::Conflict("user id already exists".to_owned()));
            }
            doc.users.push(user);
            Ok(())
        })
        .await
    }

    async fn update_user(&self, user: &UserRecord) -> Result<(), RepositoryError> {
        let user = user.clone();
        self.mutate(move |doc| {
            let slot = doc
                .users
                .iter_mut()
                .find(|u| u.id == user.id)
                .ok_or(RepositoryError::NotFound)?;
            // Email is the identity key and never changes through an update.
            let email = slot.email.clone();
            *slot = UserRecord { email, ..user };
            Ok(())
        })
        .await
    }
}

impl OrderStore for JsonFileStore {
    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .read(|doc| doc.orders.iter().find(|o| o.id == id).cloned())
            .await)
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        Ok(self
            .read(|doc| {
                doc.orders
                    .iter()
                    .filter(|o| o.user_id == user_id)
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn all_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        Ok(self.read(|doc| doc.orders.clone()).await)
    }

    async fn order_by_idempotency_key(
        &self,
        user_id: UserId,
        key: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .read(|doc| {
                doc.orders
                    .iter()
                    .find(|o| o.user_id == user_id && o.idempotency_key.as_deref() == Some(key))
                    .cloned()
            })
            .await)
    }

    async fn insert_order(&self, order: &Order) -> Result<(), RepositoryError> {
        let order = order.clone();
        self.mutate(move |doc| {
            if let Some(key) = order.idempotency_key.as_deref()
                && doc.orders.iter().any(|o| {
                    o.user_id == order.user_id && o.idempotency_key.as_deref() == Some(key)
                })
            {
                return Err(RepositoryError::Conflict(
                    "idempotency key already exists".to_owned(),
                ));
            }
            doc.orders.push(order);
            Ok(())
        })
        .await
    }

    async fn update_order(&self, order: &Order, expected_version: i32) -> Result<(), RepositoryError> {
        let order = order.clone();
        self.mutate(move |doc| {
            let slot = doc
                .orders
                .iter_mut()
                .find(|o| o.id == order.id)
                .ok_or(RepositoryError::NotFound)?;
            if slot.version != expected_version {
                return Err(RepositoryError::StaleVersion);
            }
            *slot = order;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use watch_shop_core::{LineItem, OrderStatus, Role};

    use super::*;

    pub(crate) fn sample_user(email: &str) -> UserRecord {
        UserRecord::new(
            "Test User".to_owned(),
            Email::parse(email).unwrap(),
            "0900000000".to_owned(),
            Role::User,
        )
    }

    pub(crate) fn sample_order(user_id: UserId) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::generate(),
            user_id,
            items: vec![LineItem {
                product_id: "w-1".to_owned(),
                name: "Submariner".to_owned(),
                brand: "Rolex".to_owned(),
                price: Decimal::new(950_000, 2),
                quantity: 1,
                image_url: String::new(),
            }],
            total: Decimal::new(950_000, 2),
            status: OrderStatus::Pending,
            shipping_address: "1 Dial Street".to_owned(),
            phone: "0900000000".to_owned(),
            payment_method: Order::DEFAULT_PAYMENT_METHOD.to_owned(),
            created_at: now,
            updated_at: now,
            cancellation_reason: None,
            cancelled_at: None,
            version: 1,
            idempotency_key: None,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = JsonFileStore::in_memory();
        let user = sample_user("dup@test.com");
        store.insert_user(&user).await.unwrap();

        let twin = sample_user("dup@test.com");
        let err = store.insert_user(&twin).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        // Case is preserved, so a differently-cased address is a different account.
        store.insert_user(&sample_user("Dup@test.com")).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_user_keeps_email() {
        let store = JsonFileStore::in_memory();
        let mut user = sample_user("keep@test.com");
        store.insert_user(&user).await.unwrap();

        user.google_id = Some("g-123".to_owned());
        user.email = Email::parse("other@test.com").unwrap();
        store.update_user(&user).await.unwrap();

        let loaded = store.user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(loaded.google_id.as_deref(), Some("g-123"));
        assert_eq!(loaded.email.as_str(), "keep@test.com");

        let ghost = sample_user("ghost@test.com");
        assert!(matches!(
            store.update_user(&ghost).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_update_order_rejects_stale_version() {
        let store = JsonFileStore::in_memory();
        let user = sample_user("cas@test.com");
        let order = sample_order(user.id);
        store.insert_order(&order).await.unwrap();

        let mut first = order.clone();
        first.transition_to(OrderStatus::Processing, Utc::now()).unwrap();
        let mut second = order.clone();
        second.cancel(None, Utc::now()).unwrap();

        store.update_order(&first, order.version).await.unwrap();
        let err = store.update_order(&second, order.version).await.unwrap_err();
        assert!(matches!(err, RepositoryError::StaleVersion));

        let stored = store.order_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Processing);
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_idempotency_key_is_scoped_per_user() {
        let store = JsonFileStore::in_memory();
        let alice = sample_user("alice@test.com");
        let bob = sample_user("bob@test.com");

        let mut a = sample_order(alice.id);
        a.idempotency_key = Some("k1".to_owned());
        store.insert_order(&a).await.unwrap();

        let mut again = sample_order(alice.id);
        again.idempotency_key = Some("k1".to_owned());
        assert!(matches!(
            store.insert_order(&again).await,
            Err(RepositoryError::Conflict(_))
        ));

        let mut b = sample_order(bob.id);
        b.idempotency_key = Some("k1".to_owned());
        store.insert_order(&b).await.unwrap();

        let found = store.order_by_idempotency_key(alice.id, "k1").await.unwrap();
        assert_eq!(found.map(|o| o.id), Some(a.id));
        assert_eq!(store.all_orders().await.unwrap().len(), 2);
        assert_eq!(store.orders_for_user(bob.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("shop.json");

        let store = JsonFileStore::open(&path).await.unwrap();
        assert!(store.is_persistent());
        let user = sample_user("persist@test.com");
        store.insert_user(&user).await.unwrap();
        let mut order = sample_order(user.id);
        order.items[0].price = Decimal::new(1, 3);
        order.total = Decimal::new(1, 3);
        store.insert_order(&order).await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).await.unwrap();
        let loaded = reopened.user_by_email(&user.email).await.unwrap().unwrap();
        assert_eq!(loaded, user);
        let orders = reopened.orders_for_user(user.id).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].total, Decimal::new(1, 3));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.json");
        std::fs::write(&path, b"{ not json").unwrap();

        assert!(matches!(
            JsonFileStore::open(&path).await,
            Err(RepositoryError::Encoding(_))
        ));
    }
}
