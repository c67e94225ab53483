//! Settlement Domain Ports
//!
//! Port interfaces the settlement engine needs from the outside world.
//!
//! # Architecture
//!
//! - [`DirectoryPort`]: read-only access to actors, agent profiles,
//!   businesses and packages owned by the CRUD layer
//! - [`SettlementStore`]: persistence for collections, commissions,
//!   payment submissions, settlements and the audit log
//! - [`StoreTransaction`]: one all-or-nothing unit of work opened by
//!   [`SettlementStore::begin`]
//!
//! Implementations live in `adapters::memory` (in-process) and in the
//! `infra_db` crate (PostgreSQL).
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut tx = store.begin().await?;
//! tx.lock_agent(agent_id).await?;
//! let outstanding = tx.outstanding_collections(agent_id).await?;
//! // ... build and write records ...
//! tx.commit().await?;
//! ```
//!
//! A transaction dropped without `commit` is rolled back.

use async_trait::async_trait;

use core_kernel::{
    ActorId, BusinessId, CollectionId, CommissionId, DomainPort, HealthCheckable, PackageId,
    PaymentSubmissionId, PortError, SettlementId,
};

use crate::actor::Role;
use crate::audit::{AuditEntry, AuditQuery};
use crate::collection::Collection;
use crate::commission::Commission;
use crate::directory::{ActorProfile, AgentProfile, Business, Package};
use crate::ledger::LedgerSnapshot;
use crate::payment::PaymentSubmission;
use crate::settlement::{Settlement, SettlementQuery};

/// Read access to directory data
#[async_trait]
pub trait DirectoryPort: DomainPort + HealthCheckable {
    /// Resolves any actor's role and governorates
    async fn resolve_actor(&self, id: ActorId) -> Result<ActorProfile, PortError>;

    /// Loads an agent's governorates, rate and salary
    async fn get_agent(&self, id: ActorId) -> Result<AgentProfile, PortError>;

    async fn get_business(&self, id: BusinessId) -> Result<Business, PortError>;

    async fn get_package(&self, id: PackageId) -> Result<Package, PortError>;
}

/// Persistence for settlement records
///
/// Reads outside a transaction may observe any committed state; anything
/// that feeds a write must go through [`StoreTransaction`].
#[async_trait]
pub trait SettlementStore: DomainPort + HealthCheckable {
    /// Opens a new unit of work
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, PortError>;

    /// Returns the settlement or `PortError::NotFound`
    async fn get_settlement(&self, id: SettlementId) -> Result<Settlement, PortError>;

    /// Matching settlements, newest first
    async fn list_settlements(&self, query: &SettlementQuery) -> Result<Vec<Settlement>, PortError>;

    /// An agent's payment submissions, newest first
    async fn list_payments(&self, agent_id: ActorId) -> Result<Vec<PaymentSubmission>, PortError>;

    /// Records relevant to the actor's balance in its role
    async fn load_ledger(&self, actor_id: ActorId, role: Role) -> Result<LedgerSnapshot, PortError>;

    /// Matching audit entries, newest first, at most `query.effective_limit()`
    async fn list_audit_entries(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, PortError>;
}

/// One all-or-nothing unit of work
///
/// `*_for_update` reads lock the returned rows until the transaction ends.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Serializes writers touching this agent's records
    async fn lock_agent(&mut self, agent_id: ActorId) -> Result<(), PortError>;

    async fn load_ledger(&mut self, actor_id: ActorId, role: Role) -> Result<LedgerSnapshot, PortError>;

    /// COLLECTED and unreserved, oldest first
    async fn outstanding_collections(&mut self, agent_id: ActorId) -> Result<Vec<Collection>, PortError>;

    /// PENDING or APPROVED and unreserved, oldest first
    async fn outstanding_commissions(&mut self, agent_id: ActorId) -> Result<Vec<Commission>, PortError>;

    /// RECEIVED and unreserved, oldest first
    async fn unreconciled_payments(&mut self, agent_id: ActorId) -> Result<Vec<PaymentSubmission>, PortError>;

    /// The agent's DRAFT or PENDING settlement, if any
    async fn open_settlement_for_agent(&mut self, agent_id: ActorId) -> Result<Option<Settlement>, PortError>;

    async fn get_settlement_for_update(&mut self, id: SettlementId) -> Result<Settlement, PortError>;

    async fn get_commission_for_update(&mut self, id: CommissionId) -> Result<Commission, PortError>;

    /// Fails with `NotFound` if any id is unknown
    async fn collections_by_ids(&mut self, ids: &[CollectionId]) -> Result<Vec<Collection>, PortError>;

    async fn commissions_by_ids(&mut self, ids: &[CommissionId]) -> Result<Vec<Commission>, PortError>;

    async fn payments_by_ids(&mut self, ids: &[PaymentSubmissionId]) -> Result<Vec<PaymentSubmission>, PortError>;

    async fn insert_collection(&mut self, collection: &Collection) -> Result<(), PortError>;

    async fn insert_commission(&mut self, commission: &Commission) -> Result<(), PortError>;

    async fn insert_payment(&mut self, payment: &PaymentSubmission) -> Result<(), PortError>;

    /// Fails with `Conflict` if the agent already has an open settlement
    async fn insert_settlement(&mut self, settlement: &Settlement) -> Result<(), PortError>;

    async fn update_collection(&mut self, collection: &Collection) -> Result<(), PortError>;

    async fn update_commission(&mut self, commission: &Commission) -> Result<(), PortError>;

    async fn update_payment(&mut self, payment: &PaymentSubmission) -> Result<(), PortError>;

    async fn update_settlement(&mut self, settlement: &Settlement) -> Result<(), PortError>;

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<(), PortError>;

    async fn commit(self: Box<Self>) -> Result<(), PortError>;

    async fn rollback(self: Box<Self>) -> Result<(), PortError>;
}
