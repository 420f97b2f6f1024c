//! POS API token authentication.
//!
//! Clients send `Authorization: Bearer <token>`. Only the sha-256 hex digest
//! of a token is ever stored or compared.

use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::db::{InventoryStore, RepositoryError};
use crate::models::CurrentUser;

/// Prefix of every issued token, so leaked tokens are easy to grep for.
pub const TOKEN_PREFIX: &str = "slk_";

/// Authentication failures.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No usable bearer token on the request.
    #[error("missing bearer token")]
    MissingToken,

    /// Token is unknown or revoked.
    #[error("invalid or revoked token")]
    InvalidToken,

    /// Token lookup failed.
    #[error("token lookup failed: {0}")]
    Repository(#[from] RepositoryError),
}

/// Sha-256 hex digest of a plaintext token.
#[must_use]
pub fn hash_api_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Generate a fresh plaintext token (prefix plus 32 random bytes, hex).
#[must_use]
pub fn generate_api_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    format!("{TOKEN_PREFIX}{}", hex::encode(bytes))
}

/// Extract the token from an `Authorization` header value.
#[must_use]
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Resolve an `Authorization` header value to the user it authenticates.
///
/// # Errors
///
/// Returns `AuthError::MissingToken` when there is no bearer token,
/// `AuthError::InvalidToken` when it matches no active token.
pub async fn authenticate<S: InventoryStore>(
    store: &S,
    authorization: Option<&str>,
) -> Result<CurrentUser, AuthError> {
    let token = authorization
        .and_then(bearer_token)
        .ok_or(AuthError::MissingToken)?;

    store
        .user_for_token_hash(&hash_api_token(token))
        .await?
        .ok_or(AuthError::InvalidToken)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryInventoryStore;

    #[test]
    fn test_hash_is_hex_sha256() {
        let digest = hash_api_token("abc");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_generated_tokens_are_unique_and_prefixed() {
        let a = generate_api_token();
        let b = generate_api_token();
        assert_ne!(a, b);
        assert!(a.starts_with(TOKEN_PREFIX));
        assert_eq!(a.len(), TOKEN_PREFIX.len() + 64);
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Bearer"), None);
    }

    #[tokio::test]
    async fn test_authenticate() {
        let store = MemoryInventoryStore::new();
        let user = store.add_user("owner@example.com").await;
        store.add_api_token(user, "slk_good").await;

        let current = authenticate(&store, Some("Bearer slk_good")).await.unwrap();
        assert_eq!(current.id, user);
        assert_eq!(current.email, "owner@example.com");

        assert!(matches!(
            authenticate(&store, None).await,
            Err(AuthError::MissingToken)
        ));
        assert!(matches!(
            authenticate(&store, Some("Bearer slk_bad")).await,
            Err(AuthError::InvalidToken)
        ));
    }
}
