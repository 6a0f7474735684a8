//! Application Layer - Connection management and state projection.
//!
//! This layer contains the stream manager, its reconnection policy, and the
//! projection consumed by presentation code, plus the port interfaces the
//! manager drives.

/// Port interfaces for transport, scheduling, and reporting.
pub mod ports;

/// Stream manager, reconnection policy, and projection.
pub mod services;
