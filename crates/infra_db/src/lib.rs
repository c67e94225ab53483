//! Infrastructure Database Layer
//!
//! This crate provides the PostgreSQL persistence for the settlement engine
//! using SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern. Repositories hold SQL and row
//! mapping; adapters implement the `domain_settlement` ports on top of them.
//!
//! # Transactions
//!
//! Every engine write runs in one `PostgresTransaction`. The open-settlement
//! rule is backed by a partial unique index, and totals are re-checked by a
//! CHECK constraint, so a bug above this layer cannot persist an unbalanced
//! settlement.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresSettlementStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/settlement")).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresSettlementStore::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{DatabasePool, create_pool, create_pool_from_url, run_migrations, DatabaseConfig};
pub use error::DatabaseError;
pub use adapters::{PostgresDirectory, PostgresSettlementStore, PostgresTransaction};
