//! Business logic and repository trait definitions for Skillpath.
//!
//! This crate defines the "ports" (repository traits and the stage handler
//! trait) that the infrastructure layer implements, and the engine that runs
//! challenge workflows on top of them. It depends only on `skillpath-types`
//! -- never on `skillpath-infra` or any database/IO crate.

pub mod repository;
pub mod service;
pub mod stage;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_support;
