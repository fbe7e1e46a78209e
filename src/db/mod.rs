pub mod categories;
pub mod memory;
pub mod models;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod users;

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use memory::MemoryStore;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: env_or("DATABASE_URL", "postgresql://localhost/commerce".to_string()),
            max_connections: env_or("DB_POOL_MAX", 10),
            min_connections: env_or("DB_POOL_MIN", 2),
            connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT", 10),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT", 300),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    /// Uniqueness or reference conflict.
    #[error("{0}")]
    Conflict(String),
    /// A business rule refused the change (stock, moderation state).
    #[error("{0}")]
    Rejected(String),
    #[error("corrupt row: {0}")]
    Decode(String),
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Map unique / foreign-key violations to [`DbError::Conflict`].
pub(crate) fn conflict_on_violation(err: sqlx::Error, message: &str) -> DbError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() || db_err.is_foreign_key_violation() {
            return DbError::Conflict(message.to_string());
        }
    }
    DbError::Sqlx(err)
}

/// Where records live. Postgres when `DATABASE_URL` is set, otherwise an
/// in-process store with the same semantics.
#[derive(Debug, Clone)]
pub enum Store {
    Postgres(Arc<PgPool>),
    Memory(Arc<MemoryStore>),
}

impl Store {
    pub fn memory() -> Self {
        Store::Memory(Arc::new(MemoryStore::default()))
    }

    pub fn postgres(pool: PgPool) -> Self {
        Store::Postgres(Arc::new(pool))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Store::Postgres(_) => "postgres",
            Store::Memory(_) => "memory",
        }
    }

    pub async fn health_check(&self) -> Result<Duration, DbError> {
        let start = Instant::now();
        if let Store::Postgres(pool) = self {
            sqlx::query("SELECT 1").fetch_one(pool.as_ref()).await?;
        }
        Ok(start.elapsed())
    }
}

pub async fn init_pool(config: Option<DbConfig>) -> Result<PgPool, sqlx::Error> {
    let config = config.unwrap_or_default();

    tracing::info!(
        max = config.max_connections,
        min = config.min_connections,
        "Connecting to Postgres"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect(&config.url)
        .await?;

    sqlx::query("SELECT 1").fetch_one(&pool).await?;
    tracing::info!("Database pool ready");

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Applying schema");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            image TEXT,
            role TEXT NOT NULL DEFAULT 'admin',
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            title TEXT UNIQUE NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            title TEXT NOT NULL,
            description TEXT,
            price DOUBLE PRECISION NOT NULL CHECK (price >= 0),
            discount INTEGER NOT NULL DEFAULT 0 CHECK (discount BETWEEN 0 AND 100),
            quantity INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
            category_id UUID REFERENCES categories(id) ON DELETE RESTRICT,
            is_published BOOLEAN NOT NULL DEFAULT false,
            images TEXT[] NOT NULL DEFAULT '{}',
            attributes JSONB NOT NULL DEFAULT '{}'::jsonb,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::raw_sql(
        r#"
        CREATE INDEX IF NOT EXISTS idx_products_category_id ON products(category_id);
        CREATE INDEX IF NOT EXISTS idx_products_is_published ON products(is_published);
        CREATE INDEX IF NOT EXISTS idx_products_created_at ON products(created_at DESC)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reviews (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            product_id UUID NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            customer_name TEXT NOT NULL,
            rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
            comment TEXT NOT NULL,
            images TEXT[] NOT NULL DEFAULT '{}',
            status TEXT NOT NULL DEFAULT 'pending',
            is_published BOOLEAN NOT NULL DEFAULT false,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::raw_sql(
        r#"
        CREATE INDEX IF NOT EXISTS idx_reviews_product_id ON reviews(product_id);
        CREATE INDEX IF NOT EXISTS idx_reviews_status ON reviews(status)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            customer_name TEXT NOT NULL,
            customer_email TEXT NOT NULL,
            address TEXT NOT NULL,
            items JSONB NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            total_amount DOUBLE PRECISION NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::raw_sql(
        r#"
        CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status);
        CREATE INDEX IF NOT EXISTS idx_orders_created_at ON orders(created_at DESC)
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Schema up to date");

    Ok(())
}
