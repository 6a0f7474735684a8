//! Configuration Module
//!
//! Configuration loading for the live quote client.

mod settings;

pub use settings::{ConfigError, ReconnectSettings, ServerSettings, StreamConfig, TransportSettings};
