//! Stage backends.
//!
//! Concrete [`StageHandler`](skillpath_core::stage::handler::StageHandler)
//! implementations that reach the external content services.

pub mod http;
