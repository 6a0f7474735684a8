//! Connection State
//!
//! Tri-state health signal of the live feed.

use std::fmt;

use serde::Serialize;

/// Feed health as exposed to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Connection open and delivering events.
    Live,
    /// Connecting, or waiting to retry after a failure.
    Reconnecting,
    /// No subscription is active.
    #[default]
    Offline,
}

impl ConnectionState {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Reconnecting => "reconnecting",
            Self::Offline => "offline",
        }
    }

    /// Whether the feed is currently delivering.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }

    /// Numeric encoding for gauges (live = 2, reconnecting = 1, offline = 0).
    #[must_use]
    pub const fn as_gauge(self) -> f64 {
        match self {
            Self::Live => 2.0,
            Self::Reconnecting => 1.0,
            Self::Offline => 0.0,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
