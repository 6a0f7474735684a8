#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::panic
    )
)]

//! Live Market Stream - Server-push quote client
//!
//! Keeps a live list of market quotes (crypto, metals, oil, indices, FX) in
//! sync with a server-push feed. Tracks connection health, reconnects with
//! capped exponential backoff, and renders prices and percent changes for a
//! locale.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Quote model and feed protocol
//!   - `quote`: `Quote`, `AssetClass`, merge-by-symbol, `QuoteBook`
//!   - `feed`: event frames and payload decoding
//!   - `connection`: `ConnectionState`
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: transport, timer, and reporter interfaces
//!   - `services`: stream manager, backoff policy, projection, formatting
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `sse`: `text/event-stream` decoder and `reqwest` transport
//!   - `runtime`: Tokio retry scheduler
//!   - `client`: driver task and `LiveQuoteClient` handle
//!   - `config`, `health`, `metrics`, `telemetry`
//!
//! # Data Flow
//!
//! ```text
//! HTTP stream ──► SseDecoder ──► RuntimeEvent ──┐
//!                                               ├──► StreamManager ──► watch<FeedSnapshot> ──► QuoteView
//! retry timer ────────────────► RuntimeEvent ──┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Quote model and feed protocol.
pub mod domain;

/// Application layer - Connection management and projection.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::connection::ConnectionState;
pub use domain::feed::{FeedDecodeError, FeedEvent, FeedFrame};
pub use domain::quote::{AssetClass, Quote, QuoteBook, QuoteShapeError, merge_quote};

// Ports
pub use application::ports::{
    FeedConnection, FeedTransport, Generation, NoopReporter, RetryScheduler, RetryTimer,
    StreamReporter, TransportSignal,
};

// Services
pub use application::services::{
    FeedSnapshot, ManagerParts, QuoteFormatter, QuoteProjector, QuoteView, ReconnectConfig,
    ReconnectPolicy, StreamManager, UNKNOWN_CHANGE,
};

// Infrastructure config
pub use infrastructure::config::{
    ConfigError, ReconnectSettings, ServerSettings, StreamConfig, TransportSettings,
};

// Client
pub use infrastructure::client::LiveQuoteClient;
pub use infrastructure::runtime::{EventSender, RuntimeEvent, TokioRetryScheduler};
pub use infrastructure::sse::{HttpFeedTransport, SseDecoder, TransportError};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::{PrometheusReporter, get_metrics_handle, init_metrics};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
