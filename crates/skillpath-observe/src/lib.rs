//! Observability setup for Skillpath: structured logging via
//! `tracing-subscriber` and optional OpenTelemetry trace export.

pub mod tracing_setup;
