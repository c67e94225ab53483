//! Repository implementations
//!
//! Repositories hold the SQL and map between database rows and domain types.
//! They take a `&mut PgConnection` so adapters can run the same query on a
//! pooled connection or inside an open transaction.
//!
//! - [`settlement`]: collections, commissions, payment submissions,
//!   settlements and the audit log
//! - [`directory`]: read-only actor, agent, business and package lookups

pub mod directory;
pub mod settlement;

pub use settlement::{
    AuditRow, CollectionRow, CommissionRow, PaymentRow, SettlementItemRow, SettlementRow,
};
pub use directory::{ActorRow, AgentProfileRow, BusinessRow, PackageRow};
