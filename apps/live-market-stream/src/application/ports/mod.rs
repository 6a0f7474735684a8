//! Port Interfaces
//!
//! Defines the interfaces (ports) the connection manager drives, following
//! the Hexagonal Architecture pattern. Infrastructure adapters implement
//! them; tests substitute fakes.
//!
//! ## Driven Ports (Outbound)
//!
//! - `FeedTransport` / `FeedConnection`: the server-push connection
//! - `RetryScheduler` / `RetryTimer`: delayed reconnection
//! - `StreamReporter`: counters and gauges about the stream
//!
//! Transports and schedulers never call back into the manager directly.
//! They deliver [`TransportSignal`]s and retry firings tagged with the
//! [`Generation`] they were created for, and the owner of the manager feeds
//! those back in order.

use std::fmt;
use std::time::Duration;

use crate::domain::connection::ConnectionState;
use crate::domain::feed::FeedFrame;

// =============================================================================
// Generation
// =============================================================================

/// Identity of one connection attempt.
///
/// Bumped on every open and on `stop()`. Signals carrying an older
/// generation are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    /// Wrap a raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The following generation.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Raw value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Transport
// =============================================================================

/// What a transport reports about one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSignal {
    /// The stream was accepted by the server.
    Opened,
    /// One dispatched event.
    Frame(FeedFrame),
    /// The connection failed or ended. Carries a human-readable reason.
    Failed(String),
}

/// Handle to one open (or opening) connection.
pub trait FeedConnection: Send {
    /// Release the connection. Must be idempotent.
    fn close(&mut self);
}

/// Factory for feed connections.
pub trait FeedTransport: Send {
    /// Begin connecting to `url`.
    ///
    /// Returns immediately. Progress is reported asynchronously as
    /// [`TransportSignal`]s tagged with `generation`.
    fn open(&mut self, url: &str, generation: Generation) -> Box<dyn FeedConnection>;
}

// =============================================================================
// Scheduler
// =============================================================================

/// Handle to one pending retry.
pub trait RetryTimer: Send {
    /// Cancel the retry. Must be idempotent.
    fn cancel(&mut self);
}

/// Schedules a single retry firing tagged with a generation.
pub trait RetryScheduler: Send {
    /// Fire a retry for `generation` after `delay`.
    fn schedule(&mut self, delay: Duration, generation: Generation) -> Box<dyn RetryTimer>;
}

// =============================================================================
// Reporter
// =============================================================================

/// Observability hooks for the stream, injected into the manager.
#[cfg_attr(test, mockall::automock)]
pub trait StreamReporter: Send + Sync {
    /// A connection was accepted.
    fn connection_opened(&self);
    /// A connection failed or closed.
    fn connection_failed(&self, reason: &str);
    /// A retry was scheduled.
    fn retry_scheduled(&self, attempt: u32, delay: Duration);
    /// The retry limit was reached and the manager went offline.
    fn retries_exhausted(&self, attempts: u32);
    /// A snapshot replaced the quote set.
    fn snapshot_applied(&self, quote_count: usize);
    /// An update was merged.
    fn update_applied(&self);
    /// A message was dropped as malformed.
    fn message_rejected(&self, kind: &'static str);
    /// The published state changed.
    fn state_changed(&self, state: ConnectionState, quote_count: usize);
}

/// Reporter that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl StreamReporter for NoopReporter {
    fn connection_opened(&self) {}
    fn connection_failed(&self, _reason: &str) {}
    fn retry_scheduled(&self, _attempt: u32, _delay: Duration) {}
    fn retries_exhausted(&self, _attempts: u32) {}
    fn snapshot_applied(&self, _quote_count: usize) {}
    fn update_applied(&self) {}
    fn message_rejected(&self, _kind: &'static str) {}
    fn state_changed(&self, _state: ConnectionState, _quote_count: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_advances() {
        let g = Generation::default();
        assert_eq!(g.get(), 0);
        assert_eq!(g.next().get(), 1);
        assert!(g.next() > g);
    }

    #[test]
    fn generation_wraps() {
        assert_eq!(Generation::new(u64::MAX).next(), Generation::new(0));
    }
}
