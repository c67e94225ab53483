//! Settlement & Commission Reconciliation Domain
//!
//! This crate owns the money-moving core of the directory platform:
//! field agents record cash collections, commissions accrue on them,
//! managers batch outstanding records into settlements that accountants
//! confirm or reject, and agents hand cash to accountants through payment
//! submissions. Balances are never stored; they are derived from these
//! records by the [`ledger`] module.
//!
//! # Settlement Lifecycle
//!
//! ```text
//! COLLECTED ──create──▶ reserved ──confirm──▶ SUBMITTED
//!                          │
//!                          └──reject──▶ COLLECTED (released)
//! ```
//!
//! # Examples
//!
//! ```rust
//! use domain_settlement::{CommissionCalculator, CommissionEventType, AgentProfile};
//! use core_kernel::{ActorId, Currency, Money, Rate};
//! use rust_decimal_macros::dec;
//! use std::collections::BTreeSet;
//!
//! let agent = AgentProfile {
//!     agent_id: ActorId::new(),
//!     governorates: BTreeSet::new(),
//!     commission_rate: Some(Rate::from_percentage(dec!(10)).unwrap()),
//!     rate_active: true,
//!     base_salary: Money::zero(Currency::IQD),
//! };
//!
//! let commission = CommissionCalculator::new(Currency::IQD)
//!     .compute(&agent, CommissionEventType::NewSubscription, Money::new(dec!(50000), Currency::IQD))
//!     .unwrap();
//! assert_eq!(commission.amount.amount(), dec!(5000));
//! ```

pub mod actor;
pub mod directory;
pub mod collection;
pub mod commission;
pub mod payment;
pub mod settlement;
pub mod ledger;
pub mod audit;
pub mod error;
pub mod ports;
pub mod adapters;
pub mod services;

pub use actor::{ActorContext, Role};
pub use directory::{ActorProfile, AgentProfile, Business, Package};
pub use collection::{Collection, CollectionStatus, NewCollection};
pub use commission::{Commission, CommissionCalculator, CommissionEventType, CommissionStatus};
pub use payment::{PaymentSubmission, PaymentSubmissionStatus};
pub use settlement::{Settlement, SettlementQuery, SettlementStatus, Transition};
pub use ledger::{Balance, BalanceCache, BalanceLedger, LedgerSnapshot};
pub use audit::{AuditAction, AuditEntry, AuditQuery};
pub use error::SettlementError;
pub use ports::{DirectoryPort, SettlementStore, StoreTransaction};
pub use adapters::{InMemoryDirectory, InMemorySettlementStore};
pub use services::{EngineConfig, PaymentRequest, SettlementEngine};
