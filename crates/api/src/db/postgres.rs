//! `PostgreSQL` store.
//!
//! Queries are built at runtime with `sqlx::query_as` so the crate compiles
//! without a live database; rows decode into private structs and are
//! validated on the way out.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use watch_shop_core::{Email, LineItem, Order, OrderId, OrderStatus, Role, UserId};

use super::{OrderStore, RepositoryError, UserStore};
use crate::models::UserRecord;

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Apply the migrations in `crates/api/migrations/`.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails or the history diverges.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

const USER_COLUMNS: &str =
    "id, full_name, email, phone, password_hash, role, google_id, avatar, created_at";

const ORDER_COLUMNS: &str = "id, user_id, items, total, status, shipping_address, phone, \
     payment_method, created_at, updated_at, cancellation_reason, cancelled_at, version, \
     idempotency_key";

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    full_name: String,
    email: String,
    phone: String,
    password_hash: Option<String>,
    role: Role,
    google_id: Option<String>,
    avatar: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = RepositoryError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&r.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::from_uuid(r.id),
            full_name: r.full_name,
            email,
            phone: r.phone,
            password_hash: r.password_hash,
            role: r.role,
            google_id: r.google_id,
            avatar: r.avatar,
            created_at: r.created_at,
        })
    }
}

#[derive(FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    items: Json<Vec<LineItem>>,
    total: Decimal,
    status: OrderStatus,
    shipping_address: String,
    phone: String,
    payment_method: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    cancellation_reason: Option<String>,
    cancelled_at: Option<DateTime<Utc>>,
    version: i32,
    idempotency_key: Option<String>,
}

impl From<OrderRow> for Order {
    fn from(r: OrderRow) -> Self {
        Self {
            id: OrderId::from_uuid(r.id),
            user_id: UserId::from_uuid(r.user_id),
            items: r.items.0,
            total: r.total,
            status: r.status,
            shipping_address: r.shipping_address,
            phone: r.phone,
            payment_method: r.payment_method,
            created_at: r.created_at,
            updated_at: r.updated_at,
            cancellation_reason: r.cancellation_reason,
            cancelled_at: r.cancelled_at,
            version: r.version,
            idempotency_key: r.idempotency_key,
        }
    }
}

/// Map a unique violation to `Conflict`, anything else to `Database`.
fn conflict_or_database(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Store backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying pool, for migrations.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trip a trivial query.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the database is unreachable.
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn fetch_orders(&self, sql: &str, user_id: Option<Uuid>) -> Result<Vec<Order>, RepositoryError> {
        let query = sqlx::query_as::<_, OrderRow>(sql);
        let query = match user_id {
            Some(id) => query.bind(id),
            None => query,
        };
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }
}

impl UserStore for PgStore {
    async fn user_by_id(&self, id: UserId) -> Result<Option<UserRecord>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn user_by_email(&self, email: &Email) -> Result<Option<UserRecord>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn insert_user(&self, user: &UserRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO users (id, full_name, email, phone, password_hash, role, google_id, avatar, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(user.id.as_uuid())
        .bind(&user.full_name)
        .bind(user.email.as_str())
        .bind(&user.phone)
        .bind(user.password_hash.as_deref())
        .bind(user.role)
        .bind(user.google_id.as_deref())
        .bind(user.avatar.as_deref())
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_database(e, "email"))?;

        Ok(())
    }

    async fn update_user(&self, user: &UserRecord) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET full_name = $2, phone = $3, password_hash = $4, role = $5,
                google_id = $6, avatar = $7
            WHERE id = $1
            ",
        )
        .bind(user.id.as_uuid())
        .bind(&user.full_name)
        .bind(&user.phone)
        .bind(user.password_hash.as_deref())
        .bind(user.role)
        .bind(user.google_id.as_deref())
        .bind(user.avatar.as_deref())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

impl OrderStore for PgStore {
    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Order::from))
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at");
        self.fetch_orders(&sql, Some(user_id.as_uuid())).await
    }

    async fn all_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at");
        self.fetch_orders(&sql, None).await
    }

    async fn order_by_idempotency_key(
        &self,
        user_id: UserId,
        key: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 AND idempotency_key = $2"
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id.as_uuid())
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Order::from))
    }

    async fn insert_order(&self, order: &Order) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO orders (id, user_id, items, total, status, shipping_address, phone,
                                payment_method, created_at, updated_at, cancellation_reason,
                                cancelled_at, version, idempotency_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ",
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(Json(&order.items))
        .bind(order.total)
        .bind(order.status)
        .bind(&order.shipping_address)
        .bind(&order.phone)
        .bind(&order.payment_method)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.cancellation_reason.as_deref())
        .bind(order.cancelled_at)
        .bind(order.version)
        .bind(order.idempotency_key.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_database(e, "idempotency key"))?;

        Ok(())
    }

    async fn update_order(&self, order: &Order, expected_version: i32) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE orders
            SET status = $3, updated_at = $4, cancellation_reason = $5,
                cancelled_at = $6, version = $7
            WHERE id = $1 AND version = $2
            ",
        )
        .bind(order.id.as_uuid())
        .bind(expected_version)
        .bind(order.status)
        .bind(order.updated_at)
        .bind(order.cancellation_reason.as_deref())
        .bind(order.cancelled_at)
        .bind(order.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        let exists: Option<(i32,)> = sqlx::query_as("SELECT version FROM orders WHERE id = $1")
            .bind(order.id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match exists {
            Some(_) => Err(RepositoryError::StaleVersion),
            None => Err(RepositoryError::NotFound),
        }
    }
}
