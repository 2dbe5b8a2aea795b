//! # beacon-observability
//!
//! Structured Logging fuer Server und Client (Text oder JSON) via
//! tracing-subscriber.

pub mod logging;

pub use logging::{log_filter_gueltig, logging_initialisieren, LogFormat};
