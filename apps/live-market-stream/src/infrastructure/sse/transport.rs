//! HTTP Event Stream Transport
//!
//! [`FeedTransport`] over a long-lived `GET` returning `text/event-stream`.
//! Each `open` spawns one task that performs the request, reads the body
//! through [`SseDecoder`], and reports [`TransportSignal`]s on the runtime
//! event channel. A task always ends by reporting exactly one `Failed`,
//! unless it was closed first.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tokio_util::sync::CancellationToken;

use super::decoder::{DecodeError, SseDecoder};
use crate::application::ports::{FeedConnection, FeedTransport, Generation, TransportSignal};
use crate::infrastructure::config::TransportSettings;
use crate::infrastructure::runtime::{EventSender, RuntimeEvent};

/// Why a connection ended.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Connecting or reading the body failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server responded with status {0}")]
    Status(u16),

    /// Nothing arrived within the idle timeout.
    #[error("no data received for {0:?}")]
    Idle(Duration),

    /// The body could not be decoded as an event stream.
    #[error("malformed event stream: {0}")]
    Decode(#[from] DecodeError),

    /// The server closed the stream.
    #[error("stream closed by server")]
    StreamEnded,
}

/// Opens feed connections with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFeedTransport {
    client: reqwest::Client,
    events: EventSender,
    idle_timeout: Option<Duration>,
    max_frame_bytes: usize,
}

impl HttpFeedTransport {
    /// Create a transport reporting on `events`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(settings: &TransportSettings, events: EventSender) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(TransportError::Client)?;

        Ok(Self {
            client,
            events,
            idle_timeout: settings.idle_timeout,
            max_frame_bytes: settings.max_frame_bytes,
        })
    }
}

impl FeedTransport for HttpFeedTransport {
    fn open(&mut self, url: &str, generation: Generation) -> Box<dyn FeedConnection> {
        let cancel = CancellationToken::new();
        let stream = EventStream {
            client: self.client.clone(),
            url: url.to_string(),
            generation,
            events: self.events.clone(),
            idle_timeout: self.idle_timeout,
            max_frame_bytes: self.max_frame_bytes,
        };

        let token = cancel.clone();
        tokio::spawn(async move {
            let error = tokio::select! {
                () = token.cancelled() => {
                    tracing::trace!(%generation, "Feed connection closed locally");
                    return;
                }
                error = stream.run() => error,
            };

            tracing::debug!(%generation, error = %error, "Feed connection ended");
            stream.emit(TransportSignal::Failed(error.to_string()));
        });

        Box::new(HttpFeedConnection { cancel })
    }
}

/// Handle to one streaming request.
#[derive(Debug)]
pub struct HttpFeedConnection {
    cancel: CancellationToken,
}

impl FeedConnection for HttpFeedConnection {
    fn close(&mut self) {
        self.cancel.cancel();
    }
}

impl Drop for HttpFeedConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// =============================================================================
// Connection Task
// =============================================================================

struct EventStream {
    client: reqwest::Client,
    url: String,
    generation: Generation,
    events: EventSender,
    idle_timeout: Option<Duration>,
    max_frame_bytes: usize,
}

impl EventStream {
    /// Stream until something goes wrong; the result is the reason.
    async fn run(&self) -> TransportError {
        match self.pump().await {
            Ok(()) => TransportError::StreamEnded,
            Err(e) => e,
        }
    }

    async fn pump(&self) -> Result<(), TransportError> {
        let request = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send();

        let response = self.within_idle(request).await??;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        tracing::debug!(generation = %self.generation, %status, "Feed stream accepted");
        self.emit(TransportSignal::Opened);

        let mut decoder = SseDecoder::with_max_frame_bytes(self.max_frame_bytes);
        let mut body = response.bytes_stream();

        while let Some(chunk) = self.within_idle(body.next()).await? {
            for frame in decoder.feed(&chunk?)? {
                self.emit(TransportSignal::Frame(frame));
            }
        }

        Ok(())
    }

    async fn within_idle<F: Future>(&self, fut: F) -> Result<F::Output, TransportError> {
        match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| TransportError::Idle(limit)),
            None => Ok(fut.await),
        }
    }

    fn emit(&self, signal: TransportSignal) {
        let event = RuntimeEvent::Transport {
            generation: self.generation,
            signal,
        };
        // Receiver gone means the driver has shut down.
        let _ = self.events.send(event);
    }
}
