//! Civica Infrastructure Library
//!
//! Shared process-level setup for the picture pipeline binaries. Today that
//! is tracing initialization; see [`telemetry`].

pub mod telemetry;

pub use telemetry::{init_tracing, LogFormat, DEFAULT_FILTER};
