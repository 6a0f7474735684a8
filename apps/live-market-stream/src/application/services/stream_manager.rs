//! Stream Connection Manager
//!
//! Owns the live feed subscription: one connection at a time, the quote
//! set, and the backoff counter. Every mutation is published on a
//! `tokio::sync::watch` channel as a [`FeedSnapshot`].
//!
//! # State Machine
//!
//! ```text
//!            start()                opened / first event
//! Offline ───────────► Reconnecting ─────────────────────► Live
//!    ▲                   │    ▲                             │
//!    │ stop() / retry    │    │ retry timer fires           │ error / close
//!    │ limit reached     │    └──────── (schedule) ◄────────┘
//!    └───────────────────┘
//! ```
//!
//! The manager is not thread-safe by itself. It is driven from a single
//! task which feeds it commands, transport signals, and retry firings in
//! order. Signals and firings carry the [`Generation`] they were created
//! for; anything from a superseded generation is dropped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::application::ports::{
    FeedConnection, FeedTransport, Generation, RetryScheduler, RetryTimer, StreamReporter,
    TransportSignal,
};
use crate::domain::connection::ConnectionState;
use crate::domain::feed::{FeedEvent, FeedFrame};
use crate::domain::quote::{Quote, QuoteBook};

// =============================================================================
// Published State
// =============================================================================

/// Immutable view of the manager's state at one point in time.
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    /// Quotes in set order.
    pub quotes: Arc<[Quote]>,
    /// Connection health.
    pub status: ConnectionState,
    /// Whether any snapshot or update has ever been applied.
    pub received_any: bool,
    /// Consecutive failed connection attempts.
    pub attempt: u32,
    /// When the quote set last changed.
    pub updated_at: Option<DateTime<Utc>>,
}

impl FeedSnapshot {
    /// Number of quotes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    /// Whether there are no quotes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

// =============================================================================
// Manager
// =============================================================================

/// Collaborators injected into a [`StreamManager`].
pub struct ManagerParts {
    /// Connection factory.
    pub transport: Box<dyn FeedTransport>,
    /// Retry timer factory.
    pub scheduler: Box<dyn RetryScheduler>,
    /// Observability sink.
    pub reporter: Arc<dyn StreamReporter>,
}

/// Connection lifecycle and quote state for one subscription.
pub struct StreamManager {
    url: String,
    transport: Box<dyn FeedTransport>,
    scheduler: Box<dyn RetryScheduler>,
    reporter: Arc<dyn StreamReporter>,
    policy: ReconnectPolicy,
    book: QuoteBook,
    state: ConnectionState,
    received_any: bool,
    updated_at: Option<DateTime<Utc>>,
    generation: Generation,
    connection: Option<Box<dyn FeedConnection>>,
    retry: Option<Box<dyn RetryTimer>>,
    publisher: watch::Sender<FeedSnapshot>,
}

impl StreamManager {
    /// Create an offline manager for `url`.
    #[must_use]
    pub fn new(url: impl Into<String>, reconnect: ReconnectConfig, parts: ManagerParts) -> Self {
        let (publisher, _) = watch::channel(FeedSnapshot::default());
        Self {
            url: url.into(),
            transport: parts.transport,
            scheduler: parts.scheduler,
            reporter: parts.reporter,
            policy: ReconnectPolicy::new(reconnect),
            book: QuoteBook::new(),
            state: ConnectionState::Offline,
            received_any: false,
            updated_at: None,
            generation: Generation::default(),
            connection: None,
            retry: None,
            publisher,
        }
    }

    /// Receive every published [`FeedSnapshot`].
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.publisher.subscribe()
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> FeedSnapshot {
        self.publisher.borrow().clone()
    }

    /// Current connection state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Quotes in set order.
    #[must_use]
    pub fn quotes(&self) -> &[Quote] {
        self.book.as_slice()
    }

    /// Consecutive failed connection attempts.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.policy.attempt_count()
    }

    /// Generation of the current (or last) connection.
    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether a retry is pending.
    #[must_use]
    pub const fn has_pending_retry(&self) -> bool {
        self.retry.is_some()
    }

    /// Whether a connection handle is held.
    #[must_use]
    pub const fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    /// Begin or restart the subscription.
    ///
    /// Any prior connection and pending retry are released first. The
    /// backoff counter starts from zero only when coming from `Offline`.
    pub fn start(&mut self) {
        if self.state == ConnectionState::Offline {
            self.policy.reset();
        }
        self.release();
        tracing::info!(url = %self.url, "Starting live quote subscription");
        self.connect();
    }

    /// End the subscription.
    ///
    /// Closes the connection, cancels any pending retry, and discards the
    /// backoff counter. Signals still in flight become no-ops.
    pub fn stop(&mut self) {
        self.release();
        self.generation = self.generation.next();
        self.policy.reset();

        if self.state != ConnectionState::Offline {
            tracing::info!(url = %self.url, "Stopped live quote subscription");
        }
        self.state = ConnectionState::Offline;
        self.publish();
    }

    /// Apply a transport signal for `generation`.
    pub fn handle_signal(&mut self, generation: Generation, signal: TransportSignal) {
        if generation != self.generation || self.connection.is_none() {
            tracing::trace!(
                %generation,
                current = %self.generation,
                "Ignoring signal from superseded connection"
            );
            return;
        }

        match signal {
            TransportSignal::Opened => self.on_opened(),
            TransportSignal::Frame(frame) => self.on_frame(&frame),
            TransportSignal::Failed(reason) => self.on_failure(&reason),
        }
    }

    /// Apply a retry firing for `generation`.
    pub fn handle_retry(&mut self, generation: Generation) {
        if generation != self.generation || self.retry.is_none() {
            tracing::trace!(%generation, "Ignoring stale retry");
            return;
        }

        self.retry = None;
        tracing::debug!(attempt = self.policy.attempt_count(), "Retry timer fired");
        self.connect();
    }

    fn connect(&mut self) {
        self.generation = self.generation.next();
        self.state = ConnectionState::Reconnecting;

        tracing::debug!(url = %self.url, generation = %self.generation, "Opening feed connection");
        self.connection = Some(self.transport.open(&self.url, self.generation));
        self.publish();
    }

    fn on_opened(&mut self) {
        if self.state == ConnectionState::Live {
            return;
        }

        self.policy.reset();
        self.state = ConnectionState::Live;
        self.reporter.connection_opened();

        tracing::info!(generation = %self.generation, "Live quote feed connected");
        self.publish();
    }

    fn on_frame(&mut self, frame: &FeedFrame) {
        let event = match FeedEvent::decode(frame) {
            Ok(Some(event)) => event,
            Ok(None) => {
                tracing::trace!(event = %frame.event, "Ignoring unhandled event");
                return;
            }
            Err(e) => {
                tracing::warn!(event = %frame.event, error = %e, "Dropping malformed feed message");
                self.reporter.message_rejected(e.kind());
                return;
            }
        };

        // An event proves the stream is open even if the transport never said so.
        if self.state != ConnectionState::Live {
            self.on_opened();
        }

        match event {
            FeedEvent::Snapshot(quotes) => {
                self.book.replace_all(quotes);
                self.reporter.snapshot_applied(self.book.len());
                tracing::debug!(quotes = self.book.len(), "Applied snapshot");
            }
            FeedEvent::Update(quote) => {
                tracing::trace!(symbol = %quote.symbol, price = %quote.price, "Applied update");
                self.book.upsert(quote);
                self.reporter.update_applied();
            }
        }

        self.received_any = true;
        self.updated_at = Some(Utc::now());
        self.publish();
    }

    fn on_failure(&mut self, reason: &str) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
        self.reporter.connection_failed(reason);

        if let Some(delay) = self.policy.next_delay() {
            let attempt = self.policy.attempt_count();
            tracing::warn!(
                reason,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Live quote feed lost, scheduling reconnect"
            );

            self.state = ConnectionState::Reconnecting;
            self.retry = Some(self.scheduler.schedule(delay, self.generation));
            self.reporter.retry_scheduled(attempt, delay);
        } else {
            let attempts = self.policy.attempt_count();
            tracing::error!(reason, attempts, "Reconnect attempts exhausted, going offline");

            self.state = ConnectionState::Offline;
            self.reporter.retries_exhausted(attempts);
        }

        self.publish();
    }

    fn release(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
        if let Some(mut retry) = self.retry.take() {
            retry.cancel();
        }
    }

    fn publish(&self) {
        let snapshot = FeedSnapshot {
            quotes: self.book.as_slice().to_vec().into(),
            status: self.state,
            received_any: self.received_any,
            attempt: self.policy.attempt_count(),
            updated_at: self.updated_at,
        };
        self.reporter.state_changed(self.state, snapshot.quotes.len());
        self.publisher.send_replace(snapshot);
    }
}

impl Drop for StreamManager {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for StreamManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamManager")
            .field("url", &self.url)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("quotes", &self.book.len())
            .field("attempt", &self.policy.attempt_count())
            .finish_non_exhaustive()
    }
}
