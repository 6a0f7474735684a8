//! Server-Sent Events
//!
//! Incremental `text/event-stream` decoding and the `reqwest` transport
//! built on it.

pub mod decoder;
pub mod transport;

pub use decoder::{DecodeError, SseDecoder};
pub use transport::{HttpFeedConnection, HttpFeedTransport, TransportError};
