//! Resolves the one shop an authenticated user acts on.

use crate::db::InventoryTx;
use crate::models::{CurrentUser, Shop};

use super::SyncError;

/// The authenticated user and the shop they own.
#[derive(Debug, Clone)]
pub struct ShopContext {
    pub user: CurrentUser,
    pub shop: Shop,
}

impl ShopContext {
    /// Look up the shop owned by `user` inside `tx`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::ShopNotFound` when the user owns no shop.
    pub async fn resolve<T: InventoryTx>(tx: &mut T, user: &CurrentUser) -> Result<Self, SyncError> {
        let shop = tx
            .shop_for_owner(user.id)
            .await?
            .ok_or(SyncError::ShopNotFound(user.id))?;

        sentry::configure_scope(|scope| {
            scope.set_tag("shop_id", shop.id);
        });

        Ok(Self {
            user: user.clone(),
            shop,
        })
    }
}
