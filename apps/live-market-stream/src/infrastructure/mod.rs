//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer, plus the client that wires them to the
//! stream manager.

/// Tokio driver task and client handle.
pub mod client;

/// Configuration loading.
pub mod config;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Tokio timer adapter and runtime event channel.
pub mod runtime;

/// Server-Sent Events decoder and HTTP transport.
pub mod sse;

/// Logging and OpenTelemetry tracing integration.
pub mod telemetry;
