//! Actor and tenant types.

use stockline_core::{ShopId, UserId};

/// The authenticated user behind a request.
///
/// Produced by the bearer-token extractor; carries no permissions of its own.
/// Everything the user may touch is derived from the shop they own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: String,
}

/// A tenant. Every product, variation and sale is scoped to exactly one shop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shop {
    /// Unique shop ID.
    pub id: ShopId,
    /// The single user who owns this shop.
    pub owner_id: UserId,
    /// Display name.
    pub name: String,
}
