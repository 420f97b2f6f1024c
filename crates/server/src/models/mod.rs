//! Domain models for the POS sync service.
//!
//! - [`shop`] - the authenticated actor and the shop they own
//! - [`catalog`] - products, variations and the write inputs used by the stores
//! - [`sync`] - request payloads posted by POS clients
//! - [`ledger`] - per-request outcome reports returned to POS clients

pub mod catalog;
pub mod ledger;
pub mod shop;
pub mod sync;

pub use catalog::{
    Product, ProductFields, ProductVariation, StockFilter, StockRow, VariationFields,
    VariationOwnership,
};
pub use ledger::{
    BulkUploadLedger, DuplicateItem, FailureCode, ItemFailure, ItemKind, SaleSyncLedger,
};
pub use shop::{CurrentUser, Shop};
pub use sync::{
    BulkUploadRequest, ProductPayload, SaleEvent, SaleSyncRequest, StockQuery,
    StockUpdateRequest, VariationPayload,
};
