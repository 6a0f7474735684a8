//! Quote Model
//!
//! The quote record delivered by the live market feed, its asset class
//! enumeration, and the merge rule that keeps the in-memory quote set
//! ordered and unique by symbol.
//!
//! # Merge Rule
//!
//! A quote whose symbol is already present replaces that entry at the same
//! position. A quote with a new symbol is appended. No other entry moves.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Asset Class
// =============================================================================

/// Instrument category reported by the feed.
///
/// Unrecognized categories decode as [`AssetClass::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    /// Cryptocurrency pair.
    Crypto,
    /// Precious or industrial metal.
    Metal,
    /// Crude oil benchmark.
    Oil,
    /// Equity index.
    Index,
    /// Foreign exchange pair.
    Fx,
    /// Anything else.
    #[default]
    #[serde(other)]
    Other,
}

impl AssetClass {
    /// Wire name of the asset class.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Crypto => "crypto",
            Self::Metal => "metal",
            Self::Oil => "oil",
            Self::Index => "index",
            Self::Fx => "fx",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Quote
// =============================================================================

/// Latest observed price of one tradable instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Unique instrument identifier; the merge key.
    pub symbol: String,
    /// Display name.
    pub name: String,
    /// Instrument category.
    #[serde(default)]
    pub asset_class: AssetClass,
    /// Current value in `currency`.
    pub price: Decimal,
    /// Currency code of `price`.
    pub currency: String,
    /// Absolute change versus the reference point. `None` means unknown.
    #[serde(default)]
    pub change_absolute: Option<Decimal>,
    /// Percent change versus the reference point. `None` means unknown.
    #[serde(default)]
    pub change_percent: Option<Decimal>,
    /// Time of the upstream observation.
    pub observed_at: DateTime<Utc>,
    /// Upstream provenance.
    pub source: String,
    /// Whether the quote comes from a delayed feed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_delayed: Option<bool>,
    /// Feed delay in minutes, when delayed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_minutes: Option<u32>,
}

impl Quote {
    /// Check the fields serde cannot enforce.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), QuoteShapeError> {
        if self.symbol.trim().is_empty() {
            return Err(QuoteShapeError::EmptySymbol);
        }
        if self.currency.trim().is_empty() {
            return Err(QuoteShapeError::EmptyCurrency {
                symbol: self.symbol.clone(),
            });
        }
        if self.price.is_sign_negative() && !self.price.is_zero() {
            return Err(QuoteShapeError::NegativePrice {
                symbol: self.symbol.clone(),
                price: self.price,
            });
        }
        Ok(())
    }

    /// Whether the quote is marked as delayed.
    #[must_use]
    pub fn is_delayed(&self) -> bool {
        self.is_delayed.unwrap_or(false)
    }
}

/// A decoded quote that violates a field constraint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuoteShapeError {
    /// Symbol is empty or whitespace.
    #[error("quote symbol is empty")]
    EmptySymbol,
    /// Currency is empty or whitespace.
    #[error("quote {symbol} has an empty currency")]
    EmptyCurrency {
        /// Offending symbol.
        symbol: String,
    },
    /// Price is below zero.
    #[error("quote {symbol} has negative price {price}")]
    NegativePrice {
        /// Offending symbol.
        symbol: String,
        /// Rejected price.
        price: Decimal,
    },
}

// =============================================================================
// Merge
// =============================================================================

/// Merge one quote into an existing sequence without mutating it.
///
/// Replaces the entry with the same symbol in place, or appends.
#[must_use]
pub fn merge_quote(existing: &[Quote], incoming: Quote) -> Vec<Quote> {
    let mut merged = existing.to_vec();
    match merged.iter().position(|q| q.symbol == incoming.symbol) {
        Some(index) => merged[index] = incoming,
        None => merged.push(incoming),
    }
    merged
}

/// Ordered quote set with a symbol index.
///
/// Owned by the connection manager. Applies the same rule as
/// [`merge_quote`] in O(1) per update.
#[derive(Debug, Clone, Default)]
pub struct QuoteBook {
    quotes: Vec<Quote>,
    index: HashMap<String, usize>,
}

impl QuoteBook {
    /// Create an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole set, keeping payload order.
    ///
    /// A symbol repeated inside the payload keeps the position of its first
    /// occurrence and the value of its last.
    pub fn replace_all(&mut self, quotes: Vec<Quote>) {
        self.quotes.clear();
        self.index.clear();
        for quote in quotes {
            self.upsert(quote);
        }
    }

    /// Merge a single quote.
    pub fn upsert(&mut self, quote: Quote) {
        if let Some(&position) = self.index.get(&quote.symbol) {
            self.quotes[position] = quote;
        } else {
            self.index.insert(quote.symbol.clone(), self.quotes.len());
            self.quotes.push(quote);
        }
    }

    /// Look up a quote by symbol.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<&Quote> {
        self.index.get(symbol).map(|&i| &self.quotes[i])
    }

    /// Quotes in set order.
    #[must_use]
    pub fn as_slice(&self) -> &[Quote] {
        &self.quotes
    }

    /// Number of quotes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    /// Whether the book is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Build a quote with fixed metadata.
    pub fn quote(symbol: &str, price: i64) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            name: format!("{symbol} name"),
            asset_class: AssetClass::Crypto,
            price: Decimal::from(price),
            currency: "USD".to_string(),
            change_absolute: None,
            change_percent: None,
            observed_at: DateTime::parse_from_rfc3339("2026-10-16T09:30:00Z")
                .unwrap()
                .with_timezone(&Utc),
            source: "test".to_string(),
            is_delayed: None,
            delay_minutes: None,
        }
    }
}
