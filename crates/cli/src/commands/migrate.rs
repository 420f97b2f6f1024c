//! Database migration command.
//!
//! Applies `crates/server/migrations/` (the `pos` schema). The server never
//! migrates on startup.
//!
//! # Environment Variables
//!
//! - `STOCKLINE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)

use thiserror::Error;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Database error: {0}")]
    Connect(String),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run all pending migrations.
pub async fn run() -> Result<(), MigrationError> {
    let pool = super::connect()
        .await
        .map_err(|e| MigrationError::Connect(e.to_string()))?;

    tracing::info!("Running pos migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
