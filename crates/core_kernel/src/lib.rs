//! Core Kernel - Foundational types shared by the settlement engine
//!
//! This crate provides the building blocks used across the workspace:
//! - Money and rate types with precise decimal arithmetic
//! - Strongly-typed identifiers
//! - Port error and marker traits for the ports-and-adapters layout

pub mod money;
pub mod identifiers;
pub mod ports;
pub mod error;

pub use money::{Money, Currency, MoneyError, Rate};
pub use identifiers::{
    ActorId, GovernorateId, BusinessId, PackageId, CollectionId, CommissionId,
    SettlementId, PaymentSubmissionId, AuditEntryId,
};
pub use ports::{PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth};
pub use error::CoreError;
