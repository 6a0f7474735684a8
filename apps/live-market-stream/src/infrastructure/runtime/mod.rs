//! Runtime Adapters
//!
//! Tokio-backed implementations of the manager's timer port, plus the event
//! type every adapter uses to report back to the driver task.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::application::ports::{Generation, RetryScheduler, RetryTimer, TransportSignal};

/// Something the driver task must feed into the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    /// A transport signal for one connection generation.
    Transport {
        /// Connection the signal belongs to.
        generation: Generation,
        /// What happened.
        signal: TransportSignal,
    },
    /// A retry delay elapsed.
    RetryDue {
        /// Connection generation the retry was scheduled for.
        generation: Generation,
    },
}

/// Sender half used by adapters.
pub type EventSender = mpsc::UnboundedSender<RuntimeEvent>;

/// Receiver half drained by the driver task.
pub type EventReceiver = mpsc::UnboundedReceiver<RuntimeEvent>;

/// Create the adapter-to-driver channel.
#[must_use]
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

// =============================================================================
// Retry Scheduler
// =============================================================================

/// Schedules retries as sleeping Tokio tasks.
#[derive(Debug, Clone)]
pub struct TokioRetryScheduler {
    events: EventSender,
}

impl TokioRetryScheduler {
    /// Create a scheduler reporting on `events`.
    #[must_use]
    pub const fn new(events: EventSender) -> Self {
        Self { events }
    }
}

impl RetryScheduler for TokioRetryScheduler {
    fn schedule(&mut self, delay: Duration, generation: Generation) -> Box<dyn RetryTimer> {
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the driver has shut down.
            let _ = events.send(RuntimeEvent::RetryDue { generation });
        });
        Box::new(TokioRetryTimer { task })
    }
}

/// Pending retry backed by a sleeping task.
#[derive(Debug)]
pub struct TokioRetryTimer {
    task: JoinHandle<()>,
}

impl RetryTimer for TokioRetryTimer {
    fn cancel(&mut self) {
        self.task.abort();
    }
}

impl Drop for TokioRetryTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let (tx, mut rx) = event_channel();
        let mut scheduler = TokioRetryScheduler::new(tx);
        let _timer = scheduler.schedule(Duration::from_millis(1500), Generation::new(3));

        tokio::time::sleep(Duration::from_millis(1499)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(
            rx.recv().await,
            Some(RuntimeEvent::RetryDue {
                generation: Generation::new(3)
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let (tx, mut rx) = event_channel();
        let mut scheduler = TokioRetryScheduler::new(tx);
        let mut timer = scheduler.schedule(Duration::from_millis(10), Generation::new(1));
        timer.cancel();
        timer.cancel();
        drop(scheduler);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(rx.recv().await, None);
    }
}
