//! Domain Adapters
//!
//! PostgreSQL implementations of the settlement ports.
//!
//! # Architecture
//!
//! Each adapter:
//! - Implements a port trait from `domain_settlement`
//! - Delegates SQL and row mapping to the repository layer
//! - Translates `DatabaseError` into `PortError`
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::{PostgresDirectory, PostgresSettlementStore};
//! use domain_settlement::{EngineConfig, SettlementEngine};
//! use std::sync::Arc;
//!
//! let engine = SettlementEngine::new(
//!     Arc::new(PostgresSettlementStore::new(pool.clone())),
//!     Arc::new(PostgresDirectory::new(pool)),
//!     EngineConfig::default(),
//! );
//! ```

pub mod directory;
pub mod settlement;

pub use directory::PostgresDirectory;
pub use settlement::{PostgresSettlementStore, PostgresTransaction};
