//! State Projection
//!
//! Turns the manager's published [`FeedSnapshot`] into the read-only view a
//! presentation layer consumes: quotes, status, and two formatters. The
//! formatter for each locale is built once and shared.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::formatting::QuoteFormatter;
use super::stream_manager::FeedSnapshot;
use crate::domain::connection::ConnectionState;
use crate::domain::quote::Quote;

/// Consumer-facing view of the feed.
#[derive(Debug, Clone)]
pub struct QuoteView {
    quotes: Arc<[Quote]>,
    status: ConnectionState,
    received_any: bool,
    formatter: Arc<QuoteFormatter>,
}

impl QuoteView {
    /// Quotes in feed order.
    #[must_use]
    pub fn quotes(&self) -> &[Quote] {
        &self.quotes
    }

    /// Connection health.
    #[must_use]
    pub const fn status(&self) -> ConnectionState {
        self.status
    }

    /// Price with two decimals and locale grouping.
    #[must_use]
    pub fn format_price(&self, quote: &Quote) -> String {
        self.formatter.format_price(quote)
    }

    /// Signed one-decimal percent change, or the unknown placeholder.
    #[must_use]
    pub fn format_change_percent(&self, quote: &Quote) -> String {
        self.formatter.format_change_percent(quote)
    }

    /// Nothing has been received yet; show a placeholder.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        !self.received_any
    }

    /// Quotes are shown but the feed is not live.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.received_any && !self.status.is_live()
    }

    /// Formatter backing this view.
    #[must_use]
    pub fn formatter(&self) -> &QuoteFormatter {
        &self.formatter
    }
}

/// Builds [`QuoteView`]s, caching one formatter per locale.
#[derive(Debug, Default)]
pub struct QuoteProjector {
    formatters: RwLock<HashMap<String, Arc<QuoteFormatter>>>,
}

impl QuoteProjector {
    /// Create a projector with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Project quotes and status for `locale`.
    ///
    /// A bare quote list does not record whether an empty snapshot arrived,
    /// so an empty `quotes` projects as loading. Use
    /// [`project_snapshot`](Self::project_snapshot) for views of the live
    /// feed, which carries that flag.
    #[must_use]
    pub fn project(
        &self,
        quotes: Arc<[Quote]>,
        status: ConnectionState,
        locale: &str,
    ) -> QuoteView {
        let received_any = !quotes.is_empty();
        QuoteView {
            quotes,
            status,
            received_any,
            formatter: self.formatter(locale),
        }
    }

    /// Project a published snapshot for `locale`.
    #[must_use]
    pub fn project_snapshot(&self, snapshot: &FeedSnapshot, locale: &str) -> QuoteView {
        QuoteView {
            quotes: Arc::clone(&snapshot.quotes),
            status: snapshot.status,
            received_any: snapshot.received_any,
            formatter: self.formatter(locale),
        }
    }

    /// Shared formatter for `locale`.
    #[must_use]
    pub fn formatter(&self, locale: &str) -> Arc<QuoteFormatter> {
        if let Some(formatter) = self.formatters.read().get(locale) {
            return Arc::clone(formatter);
        }

        let mut formatters = self.formatters.write();
        Arc::clone(
            formatters
                .entry(locale.to_string())
                .or_insert_with(|| Arc::new(QuoteFormatter::new(locale))),
        )
    }

    /// Number of cached formatters.
    #[must_use]
    pub fn cached_locales(&self) -> usize {
        self.formatters.read().len()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::quote::fixtures::quote;

    #[test]
    fn formatter_is_memoized_per_locale() {
        let projector = QuoteProjector::new();
        let a = projector.formatter("en-US");
        let b = projector.formatter("en-US");
        let c = projector.formatter("ar-SA");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(projector.cached_locales(), 2);
    }

    #[test]
    fn project_exposes_quotes_and_status() {
        let projector = QuoteProjector::new();
        let mut btc = quote("BTC", 60500);
        btc.change_percent = Some(Decimal::new(3, 1));
        let view = projector.project(vec![btc.clone()].into(), ConnectionState::Live, "en-US");

        assert_eq!(view.quotes(), &[btc.clone()]);
        assert_eq!(view.status(), ConnectionState::Live);
        assert_eq!(view.format_price(&btc), "60,500.00");
        assert_eq!(view.format_change_percent(&btc), "+0.3%");
        assert!(!view.is_loading());
        assert!(!view.is_stale());
    }

    #[test]
    fn reconnecting_with_quotes_is_stale() {
        let projector = QuoteProjector::new();
        let snapshot = FeedSnapshot {
            quotes: vec![quote("BTC", 1)].into(),
            status: ConnectionState::Reconnecting,
            received_any: true,
            ..FeedSnapshot::default()
        };
        let view = projector.project_snapshot(&snapshot, "en-US");

        assert!(view.is_stale());
        assert!(!view.is_loading());
        assert_eq!(view.quotes().len(), 1);
    }

    #[test]
    fn nothing_received_is_loading() {
        let projector = QuoteProjector::new();
        let view = projector.project_snapshot(&FeedSnapshot::default(), "en-US");

        assert!(view.is_loading());
        assert_eq!(view.status(), ConnectionState::Offline);
    }

    #[test]
    fn empty_snapshot_received_is_not_loading() {
        let projector = QuoteProjector::new();
        let snapshot = FeedSnapshot {
            status: ConnectionState::Live,
            received_any: true,
            ..FeedSnapshot::default()
        };

        assert!(!projector.project_snapshot(&snapshot, "en-US").is_loading());
    }

    #[test]
    fn bare_empty_list_is_loading_unlike_received_snapshot() {
        let projector = QuoteProjector::new();
        let received = FeedSnapshot {
            status: ConnectionState::Live,
            received_any: true,
            ..FeedSnapshot::default()
        };

        let bare = projector.project(Arc::clone(&received.quotes), received.status, "en-US");
        let tracked = projector.project_snapshot(&received, "en-US");

        assert!(bare.is_loading());
        assert!(!tracked.is_loading());
        assert!(bare.quotes().is_empty() && tracked.quotes().is_empty());
    }
}
