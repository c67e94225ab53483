//! In-memory adapters
//!
//! `InMemorySettlementStore` serializes transactions with an owned write
//! guard on the whole state. A transaction works on a copy and swaps it in
//! on commit, so dropping it without commit discards every change.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use core_kernel::{
    ActorId, BusinessId, CollectionId, CommissionId, DomainPort, HealthCheckResult,
    HealthCheckable, PackageId, PaymentSubmissionId, PortError, SettlementId,
};

use crate::actor::Role;
use crate::audit::{AuditEntry, AuditQuery};
use crate::collection::{sort_oldest_first, Collection};
use crate::commission::Commission;
use crate::directory::{ActorProfile, AgentProfile, Business, Package};
use crate::ledger::LedgerSnapshot;
use crate::payment::PaymentSubmission;
use crate::ports::{DirectoryPort, SettlementStore, StoreTransaction};
use crate::settlement::{Settlement, SettlementQuery};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    collections: BTreeMap<CollectionId, Collection>,
    commissions: BTreeMap<CommissionId, Commission>,
    payments: BTreeMap<PaymentSubmissionId, PaymentSubmission>,
    settlements: BTreeMap<SettlementId, Settlement>,
    audit: Vec<AuditEntry>,
}

impl MemoryState {
    fn ledger(&self, actor_id: ActorId, role: Role) -> LedgerSnapshot {
        let mut snapshot = LedgerSnapshot::empty(actor_id, role);
        match role {
            Role::Agent => {
                snapshot.collections = self
                    .collections
                    .values()
                    .filter(|c| c.agent_id == actor_id)
                    .cloned()
                    .collect();
                snapshot.commissions = self
                    .commissions
                    .values()
                    .filter(|c| c.agent_id == actor_id)
                    .cloned()
                    .collect();
                snapshot.payments = self
                    .payments
                    .values()
                    .filter(|p| p.agent_id == actor_id)
                    .cloned()
                    .collect();
            }
            Role::Manager => {
                snapshot.settlements = self
                    .settlements
                    .values()
                    .filter(|s| s.manager_id == actor_id)
                    .cloned()
                    .collect();
            }
            Role::Accountant => {
                snapshot.payments = self
                    .payments
                    .values()
                    .filter(|p| p.accountant_id == actor_id)
                    .cloned()
                    .collect();
            }
            Role::Admin => {}
        }
        snapshot
    }

    fn open_settlement_for(&self, agent_id: ActorId) -> Option<&Settlement> {
        self.settlements
            .values()
            .find(|s| s.agent_id == agent_id && s.is_open())
    }
}

/// In-process settlement store
#[derive(Debug, Clone, Default)]
pub struct InMemorySettlementStore {
    state: Arc<RwLock<MemoryState>>,
    fail_audit: Arc<AtomicBool>,
}

impl InMemorySettlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every audit append fail until switched off
    ///
    /// Audit entries are written last in each operation, so this exercises
    /// rollback of everything written before them.
    pub fn fail_audit_appends(&self, enabled: bool) {
        self.fail_audit.store(enabled, Ordering::SeqCst);
    }

    pub async fn collection(&self, id: CollectionId) -> Option<Collection> {
        self.state.read().await.collections.get(&id).cloned()
    }

    pub async fn commission(&self, id: CommissionId) -> Option<Commission> {
        self.state.read().await.commissions.get(&id).cloned()
    }

    pub async fn payment(&self, id: PaymentSubmissionId) -> Option<PaymentSubmission> {
        self.state.read().await.payments.get(&id).cloned()
    }

    pub async fn audit_len(&self) -> usize {
        self.state.read().await.audit.len()
    }
}

impl DomainPort for InMemorySettlementStore {}

#[async_trait]
impl HealthCheckable for InMemorySettlementStore {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult::healthy("memory-settlement-store", 0)
    }
}

#[async_trait]
impl SettlementStore for InMemorySettlementStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, PortError> {
        let guard = self.state.clone().write_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTransaction {
            guard,
            working,
            fail_audit: self.fail_audit.load(Ordering::SeqCst),
        }))
    }

    async fn get_settlement(&self, id: SettlementId) -> Result<Settlement, PortError> {
        self.state
            .read()
            .await
            .settlements
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Settlement", id))
    }

    async fn list_settlements(&self, query: &SettlementQuery) -> Result<Vec<Settlement>, PortError> {
        let state = self.state.read().await;
        let mut results: Vec<Settlement> = state
            .settlements
            .values()
            .filter(|s| query.matches(s))
            .cloned()
            .collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        if let Some(limit) = query.limit {
            results.truncate(limit as usize);
        }
        Ok(results)
    }

    async fn list_payments(&self, agent_id: ActorId) -> Result<Vec<PaymentSubmission>, PortError> {
        let state = self.state.read().await;
        let mut results: Vec<PaymentSubmission> = state
            .payments
            .values()
            .filter(|p| p.agent_id == agent_id)
            .cloned()
            .collect();
        results.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at).then_with(|| b.id.cmp(&a.id)));
        Ok(results)
    }

    async fn load_ledger(&self, actor_id: ActorId, role: Role) -> Result<LedgerSnapshot, PortError> {
        Ok(self.state.read().await.ledger(actor_id, role))
    }

    async fn list_audit_entries(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, PortError> {
        Ok(query.apply(&self.state.read().await.audit))
    }
}

/// Unit of work over [`InMemorySettlementStore`]
pub struct InMemoryTransaction {
    guard: OwnedRwLockWriteGuard<MemoryState>,
    working: MemoryState,
    fail_audit: bool,
}

fn fetch_all<K, V>(map: &BTreeMap<K, V>, ids: &[K], entity: &str) -> Result<Vec<V>, PortError>
where
    K: Ord + std::fmt::Display,
    V: Clone,
{
    ids.iter()
        .map(|id| map.get(id).cloned().ok_or_else(|| PortError::not_found(entity, id)))
        .collect()
}

fn replace<K, V>(map: &mut BTreeMap<K, V>, id: K, value: &V, entity: &str) -> Result<(), PortError>
where
    K: Ord + std::fmt::Display,
    V: Clone,
{
    match map.get_mut(&id) {
        Some(slot) => {
            *slot = value.clone();
            Ok(())
        }
        None => Err(PortError::not_found(entity, id)),
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn lock_agent(&mut self, _agent_id: ActorId) -> Result<(), PortError> {
        // The write guard already serializes every transaction
        Ok(())
    }

    async fn load_ledger(&mut self, actor_id: ActorId, role: Role) -> Result<LedgerSnapshot, PortError> {
        Ok(self.working.ledger(actor_id, role))
    }

    async fn outstanding_collections(&mut self, agent_id: ActorId) -> Result<Vec<Collection>, PortError> {
        let mut results: Vec<Collection> = self
            .working
            .collections
            .values()
            .filter(|c| c.agent_id == agent_id && c.is_outstanding())
            .cloned()
            .collect();
        sort_oldest_first(&mut results);
        Ok(results)
    }

    async fn outstanding_commissions(&mut self, agent_id: ActorId) -> Result<Vec<Commission>, PortError> {
        let mut results: Vec<Commission> = self
            .working
            .commissions
            .values()
            .filter(|c| c.agent_id == agent_id && c.is_outstanding())
            .cloned()
            .collect();
        results.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(results)
    }

    async fn unreconciled_payments(&mut self, agent_id: ActorId) -> Result<Vec<PaymentSubmission>, PortError> {
        let mut results: Vec<PaymentSubmission> = self
            .working
            .payments
            .values()
            .filter(|p| p.agent_id == agent_id && p.is_outstanding())
            .cloned()
            .collect();
        results.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then_with(|| a.id.cmp(&b.id)));
        Ok(results)
    }

    async fn open_settlement_for_agent(&mut self, agent_id: ActorId) -> Result<Option<Settlement>, PortError> {
        Ok(self.working.open_settlement_for(agent_id).cloned())
    }

    async fn get_settlement_for_update(&mut self, id: SettlementId) -> Result<Settlement, PortError> {
        self.working
            .settlements
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Settlement", id))
    }

    async fn get_commission_for_update(&mut self, id: CommissionId) -> Result<Commission, PortError> {
        self.working
            .commissions
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Commission", id))
    }

    async fn collections_by_ids(&mut self, ids: &[CollectionId]) -> Result<Vec<Collection>, PortError> {
        fetch_all(&self.working.collections, ids, "Collection")
    }

    async fn commissions_by_ids(&mut self, ids: &[CommissionId]) -> Result<Vec<Commission>, PortError> {
        fetch_all(&self.working.commissions, ids, "Commission")
    }

    async fn payments_by_ids(&mut self, ids: &[PaymentSubmissionId]) -> Result<Vec<PaymentSubmission>, PortError> {
        fetch_all(&self.working.payments, ids, "PaymentSubmission")
    }

    async fn insert_collection(&mut self, collection: &Collection) -> Result<(), PortError> {
        self.working.collections.insert(collection.id, collection.clone());
        Ok(())
    }

    async fn insert_commission(&mut self, commission: &Commission) -> Result<(), PortError> {
        self.working.commissions.insert(commission.id, commission.clone());
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &PaymentSubmission) -> Result<(), PortError> {
        self.working.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn insert_settlement(&mut self, settlement: &Settlement) -> Result<(), PortError> {
        if let Some(open) = self.working.open_settlement_for(settlement.agent_id) {
            return Err(PortError::conflict(format!(
                "Agent {} already has open settlement {}",
                settlement.agent_id, open.id
            )));
        }
        self.working.settlements.insert(settlement.id, settlement.clone());
        Ok(())
    }

    async fn update_collection(&mut self, collection: &Collection) -> Result<(), PortError> {
        replace(&mut self.working.collections, collection.id, collection, "Collection")
    }

    async fn update_commission(&mut self, commission: &Commission) -> Result<(), PortError> {
        replace(&mut self.working.commissions, commission.id, commission, "Commission")
    }

    async fn update_payment(&mut self, payment: &PaymentSubmission) -> Result<(), PortError> {
        replace(&mut self.working.payments, payment.id, payment, "PaymentSubmission")
    }

    async fn update_settlement(&mut self, settlement: &Settlement) -> Result<(), PortError> {
        replace(&mut self.working.settlements, settlement.id, settlement, "Settlement")
    }

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<(), PortError> {
        if self.fail_audit {
            return Err(PortError::internal("audit log unavailable"));
        }
        self.working.audit.push(entry.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), PortError> {
        let InMemoryTransaction { mut guard, working, .. } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), PortError> {
        Ok(())
    }
}

/// In-process directory
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    actors: RwLock<HashMap<ActorId, ActorProfile>>,
    agents: RwLock<HashMap<ActorId, AgentProfile>>,
    businesses: RwLock<HashMap<BusinessId, Business>>,
    packages: RwLock<HashMap<PackageId, Package>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_actor(&self, actor: ActorProfile) {
        self.actors.write().await.insert(actor.id, actor);
    }

    pub async fn add_agent(&self, agent: AgentProfile) {
        self.agents.write().await.insert(agent.agent_id, agent);
    }

    pub async fn add_business(&self, business: Business) {
        self.businesses.write().await.insert(business.id, business);
    }

    pub async fn add_package(&self, package: Package) {
        self.packages.write().await.insert(package.id, package);
    }
}

impl DomainPort for InMemoryDirectory {}

#[async_trait]
impl HealthCheckable for InMemoryDirectory {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult::healthy("memory-directory", 0)
    }
}

#[async_trait]
impl DirectoryPort for InMemoryDirectory {
    async fn resolve_actor(&self, id: ActorId) -> Result<ActorProfile, PortError> {
        self.actors
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Actor", id))
    }

    async fn get_agent(&self, id: ActorId) -> Result<AgentProfile, PortError> {
        self.agents
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Agent", id))
    }

    async fn get_business(&self, id: BusinessId) -> Result<Business, PortError> {
        self.businesses
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Business", id))
    }

    async fn get_package(&self, id: PackageId) -> Result<Package, PortError> {
        self.packages
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Package", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::NewCollection;
    use crate::commission::CommissionEventType;
    use chrono::Utc;
    use core_kernel::{Currency, Money};
    use rust_decimal_macros::dec;

    fn collection(agent_id: ActorId) -> Collection {
        Collection::new(&NewCollection {
            agent_id,
            business_id: BusinessId::new(),
            package_id: PackageId::new(),
            amount: Money::new(dec!(1000), Currency::IQD),
            collected_at: Utc::now(),
            event_type: CommissionEventType::NewSubscription,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_commit_publishes_changes() {
        let store = InMemorySettlementStore::new();
        let agent = ActorId::new();
        let c = collection(agent);

        let mut tx = store.begin().await.unwrap();
        tx.insert_collection(&c).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.collection(c.id).await, Some(c));
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_changes() {
        let store = InMemorySettlementStore::new();
        let c = collection(ActorId::new());

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_collection(&c).await.unwrap();
        }
        assert_eq!(store.collection(c.id).await, None);

        let mut tx = store.begin().await.unwrap();
        tx.insert_collection(&c).await.unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(store.collection(c.id).await, None);
    }

    #[tokio::test]
    async fn test_update_unknown_record_is_not_found() {
        let store = InMemorySettlementStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = tx.update_collection(&collection(ActorId::new())).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_outstanding_excludes_reserved() {
        let store = InMemorySettlementStore::new();
        let agent = ActorId::new();
        let free = collection(agent);
        let mut held = collection(agent);
        held.reserve(SettlementId::new()).unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.insert_collection(&free).await.unwrap();
        tx.insert_collection(&held).await.unwrap();
        let outstanding = tx.outstanding_collections(agent).await.unwrap();
        assert_eq!(outstanding.len(), 1);
        assert_eq!(outstanding[0].id, free.id);
    }

    #[tokio::test]
    async fn test_directory_lookups() {
        let directory = InMemoryDirectory::new();
        let business = Business {
            id: BusinessId::new(),
            name: "Tigris Bakery".to_string(),
            governorate_id: core_kernel::GovernorateId::new(),
        };
        directory.add_business(business.clone()).await;

        assert_eq!(directory.get_business(business.id).await.unwrap(), business);
        assert!(directory.get_package(PackageId::new()).await.unwrap_err().is_not_found());
    }
}
