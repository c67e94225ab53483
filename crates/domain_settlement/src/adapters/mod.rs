//! Adapters for the settlement ports
//!
//! - **InMemorySettlementStore** / **InMemoryDirectory**: in-process
//!   implementations used by tests and local runs
//!
//! The PostgreSQL adapters live in the `infra_db` crate.

pub mod memory;

pub use memory::{InMemoryDirectory, InMemorySettlementStore, InMemoryTransaction};
