//! Application Services
//!
//! - `stream_manager`: connection lifecycle and quote state
//! - `reconnect`: backoff counter and delay policy
//! - `projection`: consumer view with memoized formatters
//! - `formatting`: locale-aware price and percent rendering

pub mod formatting;
pub mod projection;
pub mod reconnect;
pub mod stream_manager;

pub use formatting::{QuoteFormatter, UNKNOWN_CHANGE};
pub use projection::{QuoteProjector, QuoteView};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use stream_manager::{FeedSnapshot, ManagerParts, StreamManager};
