//! Infrastructure layer for Skillpath.
//!
//! Contains implementations of the ports defined in `skillpath-core`:
//! SQLite checkpoint and curriculum stores, the HTTP stage backend, and the
//! `config.toml` loader.

pub mod config;
pub mod sqlite;
pub mod stages;

#[cfg(test)]
pub(crate) mod test_fixtures;
