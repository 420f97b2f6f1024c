//! Stockline Core - Shared domain types.
//!
//! This crate provides the types shared by all Stockline components:
//! - `server` - POS sync HTTP service
//! - `cli` - Command-line tools for migrations and token management
//! - `integration-tests` - In-process HTTP tests
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. Database encode/decode support is behind the
//! `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, gender tags, variation matching modes, stock changes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
