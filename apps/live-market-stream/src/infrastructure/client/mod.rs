//! Live Quote Client
//!
//! Runs a [`StreamManager`] on its own Tokio task and exposes a small
//! handle: `start`, `stop`, a `watch` subscription of [`FeedSnapshot`]s, and
//! locale-bound [`QuoteView`]s.
//!
//! The driver task is the only place the manager is touched. Commands from
//! the handle, transport signals, and retry firings are all serialized
//! through its `select!` loop.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{FeedTransport, StreamReporter};
use crate::application::services::{
    FeedSnapshot, ManagerParts, QuoteProjector, QuoteView, ReconnectConfig, StreamManager,
};
use crate::infrastructure::config::StreamConfig;
use crate::infrastructure::runtime::{
    EventReceiver, EventSender, RuntimeEvent, TokioRetryScheduler, event_channel,
};
use crate::infrastructure::sse::{HttpFeedTransport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Stop,
}

/// Handle to a running live quote subscription.
#[derive(Debug)]
pub struct LiveQuoteClient {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<FeedSnapshot>,
    projector: QuoteProjector,
    locale: String,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl LiveQuoteClient {
    /// Spawn a client for `config` using the HTTP transport.
    ///
    /// The client starts offline; call [`start`](Self::start) to connect.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn spawn(
        config: &StreamConfig,
        reporter: Arc<dyn StreamReporter>,
    ) -> Result<Self, TransportError> {
        let (events_tx, events_rx) = event_channel();
        let transport = HttpFeedTransport::new(&config.transport, events_tx.clone())?;

        let mut client = Self::launch(
            &config.feed_url,
            ReconnectConfig::from_settings(&config.reconnect),
            reporter,
            Box::new(transport),
            events_tx,
            events_rx,
        );
        client.locale.clone_from(&config.locale);
        Ok(client)
    }

    /// Spawn a client with a custom transport.
    ///
    /// `make_transport` receives the sender its connections must report on.
    pub fn spawn_with<F>(
        url: &str,
        reconnect: ReconnectConfig,
        reporter: Arc<dyn StreamReporter>,
        make_transport: F,
    ) -> Self
    where
        F: FnOnce(EventSender) -> Box<dyn FeedTransport>,
    {
        let (events_tx, events_rx) = event_channel();
        let transport = make_transport(events_tx.clone());
        Self::launch(url, reconnect, reporter, transport, events_tx, events_rx)
    }

    fn launch(
        url: &str,
        reconnect: ReconnectConfig,
        reporter: Arc<dyn StreamReporter>,
        transport: Box<dyn FeedTransport>,
        events_tx: EventSender,
        events_rx: EventReceiver,
    ) -> Self {
        let manager = StreamManager::new(
            url,
            reconnect,
            ManagerParts {
                transport,
                scheduler: Box::new(TokioRetryScheduler::new(events_tx)),
                reporter,
            },
        );
        let snapshots = manager.subscribe();

        let (commands, commands_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(drive(manager, commands_rx, events_rx, cancel.clone()));

        Self {
            commands,
            snapshots,
            projector: QuoteProjector::new(),
            locale: crate::application::services::formatting::DEFAULT_LOCALE.to_string(),
            cancel,
            task: Some(task),
        }
    }

    /// Begin (or restart) the subscription.
    pub fn start(&self) {
        self.send(Command::Start);
    }

    /// End the subscription. Quotes already received are kept.
    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    /// Receive every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.snapshots.clone()
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> FeedSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Locale used by [`view`](Self::view).
    #[must_use]
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Current view in the configured locale.
    #[must_use]
    pub fn view(&self) -> QuoteView {
        self.view_in(&self.locale)
    }

    /// Current view in `locale`.
    #[must_use]
    pub fn view_in(&self, locale: &str) -> QuoteView {
        self.projector.project_snapshot(&self.snapshot(), locale)
    }

    /// Stop the subscription and wait for the driver task to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::warn!(error = %e, "Live quote driver task failed");
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::warn!(?command, "Live quote driver is not running");
        }
    }
}

impl Drop for LiveQuoteClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn drive(
    mut manager: StreamManager,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut events: EventReceiver,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            Some(command) = commands.recv() => match command {
                Command::Start => manager.start(),
                Command::Stop => manager.stop(),
            },

            Some(event) = events.recv() => match event {
                RuntimeEvent::Transport { generation, signal } => {
                    manager.handle_signal(generation, signal);
                }
                RuntimeEvent::RetryDue { generation } => manager.handle_retry(generation),
            },

            else => break,
        }
    }

    manager.stop();
    tracing::debug!("Live quote driver stopped");
}
