//! Feed Events
//!
//! The two-event wire protocol carried over the event stream:
//!
//! - `snapshot`: JSON array of quotes, replaces the whole set
//! - `update`: single JSON quote, merged by symbol
//!
//! Any other event name is ignored.

use super::quote::{Quote, QuoteShapeError};

/// Event name of a full resynchronization.
pub const SNAPSHOT_EVENT: &str = "snapshot";

/// Event name of a single-quote change.
pub const UPDATE_EVENT: &str = "update";

/// One dispatched event from the stream, before payload decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFrame {
    /// Event name (`message` when the stream omits it).
    pub event: String,
    /// Data lines joined with `\n`.
    pub data: String,
    /// Last event id seen on the stream, if any.
    pub id: Option<String>,
}

impl FeedFrame {
    /// Create a frame without an id.
    #[must_use]
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            id: None,
        }
    }
}

/// A decoded protocol event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// Complete quote set.
    Snapshot(Vec<Quote>),
    /// One changed quote.
    Update(Quote),
}

impl FeedEvent {
    /// Decode a frame.
    ///
    /// Returns `Ok(None)` for event names outside the protocol.
    ///
    /// # Errors
    ///
    /// Returns an error when the payload is not JSON of the expected shape.
    pub fn decode(frame: &FeedFrame) -> Result<Option<Self>, FeedDecodeError> {
        match frame.event.as_str() {
            SNAPSHOT_EVENT => {
                let quotes: Vec<Quote> = serde_json::from_str(&frame.data)?;
                for quote in &quotes {
                    quote.validate()?;
                }
                Ok(Some(Self::Snapshot(quotes)))
            }
            UPDATE_EVENT => {
                let quote: Quote = serde_json::from_str(&frame.data)?;
                quote.validate()?;
                Ok(Some(Self::Update(quote)))
            }
            _ => Ok(None),
        }
    }

    /// Protocol name of the event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => SNAPSHOT_EVENT,
            Self::Update(_) => UPDATE_EVENT,
        }
    }
}

/// Payload that could not be turned into a [`FeedEvent`].
#[derive(Debug, thiserror::Error)]
pub enum FeedDecodeError {
    /// Not JSON, or JSON of the wrong structure.
    #[error("invalid payload: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON decoded but a quote field is invalid.
    #[error("invalid quote: {0}")]
    Shape(#[from] QuoteShapeError),
}

impl FeedDecodeError {
    /// Short label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::Shape(_) => "shape",
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use test_case::test_case;

    use super::*;

    const BTC: &str = r#"{"symbol":"BTC","name":"Bitcoin","assetClass":"crypto","price":60000,"currency":"USD","changeAbsolute":null,"changePercent":1.25,"observedAt":"2026-10-16T09:30:00Z","source":"binance"}"#;

    #[test]
    fn decodes_update() {
        let event = FeedEvent::decode(&FeedFrame::new("update", BTC)).unwrap();
        let Some(FeedEvent::Update(quote)) = event else {
            panic!("expected update, got {event:?}");
        };
        assert_eq!(quote.symbol, "BTC");
        assert_eq!(quote.price, Decimal::from(60000));
        assert_eq!(quote.change_absolute, None);
        assert_eq!(quote.change_percent, Some(Decimal::new(125, 2)));
        assert!(!quote.is_delayed());
    }

    #[test]
    fn decodes_snapshot_in_order() {
        let eth = BTC.replace("\"BTC\"", "\"ETH\"");
        let data = format!("[{BTC},{eth}]");
        let event = FeedEvent::decode(&FeedFrame::new("snapshot", data)).unwrap();
        let Some(FeedEvent::Snapshot(quotes)) = event else {
            panic!("expected snapshot, got {event:?}");
        };
        let symbols: Vec<_> = quotes.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC", "ETH"]);
    }

    #[test]
    fn decodes_empty_snapshot() {
        let event = FeedEvent::decode(&FeedFrame::new("snapshot", "[]")).unwrap();
        assert_eq!(event, Some(FeedEvent::Snapshot(vec![])));
    }

    #[test]
    fn decodes_delay_flags() {
        let data = BTC.replace(
            "\"source\":\"binance\"",
            "\"source\":\"tadawul\",\"isDelayed\":true,\"delayMinutes\":15",
        );
        let Some(FeedEvent::Update(quote)) =
            FeedEvent::decode(&FeedFrame::new("update", data)).unwrap()
        else {
            panic!("expected update");
        };
        assert!(quote.is_delayed());
        assert_eq!(quote.delay_minutes, Some(15));
    }

    #[test]
    fn ignores_foreign_events() {
        assert_eq!(FeedEvent::decode(&FeedFrame::new("message", BTC)).unwrap(), None);
        assert_eq!(FeedEvent::decode(&FeedFrame::new("ping", "")).unwrap(), None);
    }

    #[test_case("update", "not json" ; "update not json")]
    #[test_case("update", "[]" ; "update with array")]
    #[test_case("update", r#"{"symbol":"BTC"}"# ; "update missing fields")]
    #[test_case("update", r#"{"symbol":"","name":"x","price":1,"currency":"USD","observedAt":"2026-10-16T09:30:00Z","source":"s"}"# ; "update empty symbol")]
    #[test_case("snapshot", "{}" ; "snapshot with object")]
    #[test_case("snapshot", "" ; "snapshot empty data")]
    #[test_case("snapshot", r#"[{"symbol":"BTC"}]"# ; "snapshot with bad entry")]
    fn rejects_malformed(event: &str, data: &str) {
        assert!(FeedEvent::decode(&FeedFrame::new(event, data)).is_err());
    }

    #[test]
    fn error_kinds() {
        let json = FeedEvent::decode(&FeedFrame::new("update", "{")).unwrap_err();
        assert_eq!(json.kind(), "json");

        let negative = BTC.replace("60000", "-1");
        let shape = FeedEvent::decode(&FeedFrame::new("update", negative)).unwrap_err();
        assert_eq!(shape.kind(), "shape");
    }
}
