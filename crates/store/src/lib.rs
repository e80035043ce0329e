//! SQLite implementation of the agent's record store.

pub mod error;
pub mod sqlite;

pub use {
    error::{Error, Result},
    sqlite::SqliteStore,
};

/// Apply the embedded schema migrations.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
