//! Core types for Stockline.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod gender;
pub mod id;
pub mod matching;
pub mod stock;

pub use gender::{Gender, GenderParseError};
pub use id::*;
pub use matching::{MatchModeParseError, VariationMatchMode};
pub use stock::{StockChange, is_available};
