//! Challenge workflow core: state machine, durable checkpointing, retries
//! and batch roadmap generation.
//!
//! - `retry` -- Bounded retry/backoff controller shared by all stage calls
//! - `checkpoint` -- Write-through checkpoint manager over a `CheckpointStore`
//! - `engine` -- Per-session state machine with interrupt and resume
//! - `batch` -- Paced, sequential roadmap generation across modules

pub mod batch;
pub mod checkpoint;
pub mod engine;
pub mod retry;
