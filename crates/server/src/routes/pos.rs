//! POS sync API handlers.

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Serialize;
use tracing::instrument;

use stockline_core::{StockChange, VariationId};

use crate::{
    db::InventoryStore,
    error::AppError,
    middleware::RequirePosAuth,
    models::{
        BulkUploadLedger, BulkUploadRequest, SaleSyncLedger, SaleSyncRequest, StockFilter,
        StockQuery, StockRow, StockUpdateRequest,
    },
    services::{self, StockAdjustment},
    state::AppState,
};

/// Build the POS router.
pub fn router<S: InventoryStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/pos/products/bulk-upload", post(bulk_upload::<S>))
        .route("/pos/products/stock", get(list_stock::<S>))
        .route("/pos/products/{variation_id}/stock", put(update_stock::<S>))
        .route("/pos/sales/sync", post(sync_sales::<S>))
}

/// Response for the stock listing.
#[derive(Debug, Serialize)]
pub struct StockListResponse {
    pub success: bool,
    pub data: Vec<StockRow>,
    pub count: usize,
}

/// Response for a manual stock update.
#[derive(Debug, Serialize)]
pub struct StockUpdateResponse {
    pub success: bool,
    pub data: StockChange,
}

/// Upsert a batch of products and variations.
///
/// Responds 201 when the batch committed and created at least one product,
/// 200 when it committed without creating any, and 400 (ledger still in the
/// body) when nothing applied.
///
/// # Errors
///
/// Returns an error for malformed or oversized batches, a caller without a
/// shop, or a failed transaction.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn bulk_upload<S: InventoryStore>(
    RequirePosAuth(user): RequirePosAuth,
    State(state): State<AppState<S>>,
    body: Result<Json<BulkUploadRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BulkUploadLedger>), AppError> {
    let Json(request) = body?;
    let ledger =
        services::bulk_upload(state.store(), state.sync_options(), &user, request).await?;

    let status = if !ledger.success {
        StatusCode::BAD_REQUEST
    } else if ledger.created > 0 {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(ledger)))
}

/// Apply a batch of completed sales.
///
/// Responds 200 when at least one sale applied, 400 (ledger still in the
/// body) when none did.
///
/// # Errors
///
/// Returns an error for malformed or oversized batches, a caller without a
/// shop, or a failed transaction.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn sync_sales<S: InventoryStore>(
    RequirePosAuth(user): RequirePosAuth,
    State(state): State<AppState<S>>,
    body: Result<Json<SaleSyncRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SaleSyncLedger>), AppError> {
    let Json(request) = body?;
    let ledger = services::sync_sales(state.store(), state.sync_options(), &user, request).await?;

    let status = if ledger.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    Ok((status, Json(ledger)))
}

/// List stock levels of the caller's variations.
///
/// # Errors
///
/// Returns an error for an invalid query string or a caller without a shop.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_stock<S: InventoryStore>(
    RequirePosAuth(user): RequirePosAuth,
    State(state): State<AppState<S>>,
    query: Result<Query<StockQuery>, QueryRejection>,
) -> Result<Json<StockListResponse>, AppError> {
    let Query(query) = query?;
    let filter = StockFilter {
        barcode: query.barcode.filter(|barcode| !barcode.is_empty()),
        sku: query.sku.filter(|sku| !sku.is_empty()),
        in_stock_only: query.in_stock.unwrap_or(false),
    };

    let data = services::list_stock(state.store(), &user, &filter).await?;
    Ok(Json(StockListResponse {
        success: true,
        count: data.len(),
        data,
    }))
}

/// Set the absolute stock level of one variation.
///
/// # Errors
///
/// Returns 400 for a negative quantity, 404 for an unknown variation and 403
/// for a variation of another shop.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_stock<S: InventoryStore>(
    RequirePosAuth(user): RequirePosAuth,
    State(state): State<AppState<S>>,
    variation_id: Result<Path<VariationId>, PathRejection>,
    body: Result<Json<StockUpdateRequest>, JsonRejection>,
) -> Result<Json<StockUpdateResponse>, AppError> {
    let Path(variation_id) = variation_id?;
    let Json(body) = body?;

    let change = services::adjust_stock(
        state.store(),
        &user,
        StockAdjustment {
            variation_id,
            stock_quantity: body.stock_quantity,
        },
    )
    .await?;

    Ok(Json(StockUpdateResponse {
        success: true,
        data: change,
    }))
}
