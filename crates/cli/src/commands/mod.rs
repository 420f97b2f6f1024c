//! CLI subcommands.

pub mod migrate;
pub mod token;

use secrecy::SecretString;
use sqlx::PgPool;

/// Database URL could not be resolved.
#[derive(Debug, thiserror::Error)]
#[error("Missing environment variable: STOCKLINE_DATABASE_URL (or DATABASE_URL)")]
pub struct MissingDatabaseUrl;

/// Read the database URL the same way the server does.
pub fn database_url() -> Result<SecretString, MissingDatabaseUrl> {
    dotenvy::dotenv().ok();

    std::env::var("STOCKLINE_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| MissingDatabaseUrl)
}

/// Connect to the database named by the environment.
pub async fn connect() -> Result<PgPool, Box<dyn std::error::Error>> {
    let url = database_url()?;
    tracing::info!("Connecting to database...");
    Ok(stockline_server::db::create_pool(&url).await?)
}
