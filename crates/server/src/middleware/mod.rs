//! HTTP middleware and extractors for the POS API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, one hub per request)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Request ID (add unique ID to each request)
//! 4. Timeout (abort and roll back slow requests)
//!
//! Authentication is an extractor ([`RequirePosAuth`]) rather than a layer,
//! so health checks stay unauthenticated.

pub mod auth;
pub mod request_id;

pub use auth::RequirePosAuth;
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
