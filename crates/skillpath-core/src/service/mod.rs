//! Business logic services (use cases).
//!
//! Services orchestrate the engine, the batch controller and repository
//! calls. They depend on traits (ports) -- never on concrete infrastructure
//! implementations.

pub mod curriculum;
