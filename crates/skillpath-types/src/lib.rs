//! Shared domain types for Skillpath.
//!
//! This crate contains the domain types used across the curriculum engine:
//! session keys, workflow state, typed stage contracts, curriculum records,
//! configuration and repository errors.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror, schemars.

pub mod config;
pub mod curriculum;
pub mod error;
pub mod session;
pub mod stage;
pub mod workflow;
