//! Persistence layer for user records.
//!
//! [`UserStore`] is the narrow document-store contract the directory service
//! depends on. Two implementations ship with the crate:
//!
//! - [`MemoryUserStore`] keeps JSON documents in process (development, tests).
//! - [`PgUserStore`] stores rows in the PostgreSQL `users` table.

pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

use sqlx::postgres::PgPoolOptions;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;
pub use store::{FindOptions, SortOrder, StoreError, UserCursor, UserFilter, UserStore};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the embedded migrations under `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
