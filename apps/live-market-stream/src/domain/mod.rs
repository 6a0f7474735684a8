//! Domain Layer - Quote model and feed protocol types.
//!
//! Pure types with no I/O. Everything here is usable from tests without a
//! runtime.

/// Connection health signal.
pub mod connection;

/// Wire protocol events (`snapshot`, `update`).
pub mod feed;

/// Quote record, asset classes, and the merge rule.
pub mod quote;
