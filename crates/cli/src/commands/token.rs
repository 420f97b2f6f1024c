//! POS API token commands.
//!
//! Tokens are printed exactly once at issue time; only their SHA-256 digest
//! is stored.

use stockline_server::services::{generate_api_token, hash_api_token};
use thiserror::Error;

/// Errors that can occur during token operations.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Could not reach the database.
    #[error("Database connection error: {0}")]
    Connect(String),

    /// Query failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No such user.
    #[error("User not found: {0}")]
    UserNotFound(i32),
}

async fn pool() -> Result<sqlx::PgPool, TokenError> {
    super::connect()
        .await
        .map_err(|e| TokenError::Connect(e.to_string()))
}

/// Issue a new token for `user_id` and print it.
///
/// # Returns
///
/// The ID of the created token row.
pub async fn issue(user_id: i32, label: Option<&str>) -> Result<i32, TokenError> {
    let pool = pool().await?;

    let email: Option<String> =
        sqlx::query_scalar("SELECT email FROM pos.users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&pool)
            .await?;
    let email = email.ok_or(TokenError::UserNotFound(user_id))?;

    let token = generate_api_token();
    let token_id: i32 = sqlx::query_scalar(
        r"
        INSERT INTO pos.api_tokens (user_id, token_hash, label)
        VALUES ($1, $2, $3)
        RETURNING id
        ",
    )
    .bind(user_id)
    .bind(hash_api_token(&token))
    .bind(label)
    .fetch_one(&pool)
    .await?;

    tracing::info!("Token {} issued for {} (user {})", token_id, email, user_id);

    #[allow(clippy::print_stdout)]
    {
        println!("{token}");
    }
    tracing::warn!("Store this token now. It cannot be shown again.");

    Ok(token_id)
}

/// Revoke every active token of `user_id`.
///
/// # Returns
///
/// The number of tokens revoked.
pub async fn revoke(user_id: i32) -> Result<u64, TokenError> {
    let pool = pool().await?;

    let revoked = sqlx::query(
        "UPDATE pos.api_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
    )
    .bind(user_id)
    .execute(&pool)
    .await?
    .rows_affected();

    tracing::info!("Revoked {} token(s) for user {}", revoked, user_id);
    Ok(revoked)
}
