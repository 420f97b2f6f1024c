//! Bearer-token authentication extractor for POS clients.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::Span;

use crate::db::InventoryStore;
use crate::error::{AppError, set_sentry_user};
use crate::models::CurrentUser;
use crate::services::authenticate;
use crate::state::AppState;

/// Extractor that requires a valid POS API token.
///
/// Rejects with 401 when the `Authorization: Bearer` header is missing or
/// the token is unknown or revoked.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequirePosAuth(user): RequirePosAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequirePosAuth(pub CurrentUser);

impl<S: InventoryStore> FromRequestParts<AppState<S>> for RequirePosAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        let user = authenticate(state.store(), header).await?;

        set_sentry_user(user.id.as_i32(), &user.email);
        Span::current().record("user_id", user.id.as_i32());

        Ok(Self(user))
    }
}
