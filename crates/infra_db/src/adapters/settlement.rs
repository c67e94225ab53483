//! PostgreSQL Settlement Store
//!
//! Implements `SettlementStore` and `StoreTransaction` on top of the
//! settlement repository.
//!
//! # Concurrency
//!
//! Writers that touch an agent's outstanding records take the agent's row
//! lock first (`lock_agent`). Settlement confirm and reject only lock the
//! settlement row and the records it already holds, so two transactions never
//! wait on each other in opposite order. The partial unique index on open
//! settlements backs the one-open-settlement rule even if a caller skips the
//! agent lock.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool_from_url, PostgresSettlementStore};
//! use domain_settlement::SettlementStore;
//! use std::sync::Arc;
//!
//! let pool = create_pool_from_url("postgres://localhost/settlement").await?;
//! let store: Arc<dyn SettlementStore> = Arc::new(PostgresSettlementStore::new(pool));
//! ```

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use core_kernel::{
    ActorId, CollectionId, CommissionId, DomainPort, HealthCheckResult, HealthCheckable,
    PaymentSubmissionId, PortError, SettlementId,
};
use domain_settlement::{
    AuditEntry, AuditQuery, Collection, Commission, LedgerSnapshot, PaymentSubmission, Role,
    Settlement, SettlementQuery, SettlementStore, StoreTransaction,
};

use crate::error::DatabaseError;
use crate::repositories::settlement as repo;

/// PostgreSQL-backed settlement store
#[derive(Debug, Clone)]
pub struct PostgresSettlementStore {
    pool: PgPool,
}

impl PostgresSettlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Loads the records behind an actor's balance in its role
async fn load_ledger(
    conn: &mut PgConnection,
    actor_id: ActorId,
    role: Role,
) -> Result<LedgerSnapshot, DatabaseError> {
    let mut snapshot = LedgerSnapshot::empty(actor_id, role);
    match role {
        Role::Agent => {
            snapshot.collections = repo::collections_for_agent(conn, actor_id, false).await?;
            snapshot.commissions = repo::commissions_for_agent(conn, actor_id, false).await?;
            snapshot.payments = repo::payments_where(conn, Some(actor_id), None, false).await?;
        }
        Role::Manager => {
            snapshot.settlements =
                repo::list_settlements(conn, &SettlementQuery::for_manager(actor_id)).await?;
        }
        Role::Accountant => {
            snapshot.payments = repo::payments_where(conn, None, Some(actor_id), false).await?;
        }
        Role::Admin => {}
    }
    Ok(snapshot)
}

impl DomainPort for PostgresSettlementStore {}

#[async_trait]
impl HealthCheckable for PostgresSettlementStore {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-settlement-store").await
    }
}

/// Runs `SELECT 1` and reports latency
pub(crate) async fn ping(pool: &PgPool, adapter_id: &str) -> HealthCheckResult {
    let start = std::time::Instant::now();
    let result = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(_) => HealthCheckResult::healthy(adapter_id, latency_ms),
        Err(e) => HealthCheckResult::unhealthy(adapter_id, latency_ms, format!("Database error: {}", e)),
    }
}

#[async_trait]
impl SettlementStore for PostgresSettlementStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, PortError> {
        let tx = self.pool.begin().await.map_err(DatabaseError::from)?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    #[instrument(skip(self))]
    async fn get_settlement(&self, id: SettlementId) -> Result<Settlement, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(repo::settlement(&mut conn, id, false).await?)
    }

    #[instrument(skip(self))]
    async fn list_settlements(&self, query: &SettlementQuery) -> Result<Vec<Settlement>, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        let settlements = repo::list_settlements(&mut conn, query).await?;
        debug!(count = settlements.len(), "Listed settlements");
        Ok(settlements)
    }

    #[instrument(skip(self))]
    async fn list_payments(&self, agent_id: ActorId) -> Result<Vec<PaymentSubmission>, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        let mut payments = repo::payments_where(&mut conn, Some(agent_id), None, false).await?;
        payments.reverse();
        Ok(payments)
    }

    #[instrument(skip(self))]
    async fn load_ledger(&self, actor_id: ActorId, role: Role) -> Result<LedgerSnapshot, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(load_ledger(&mut conn, actor_id, role).await?)
    }

    #[instrument(skip(self))]
    async fn list_audit_entries(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(repo::list_audit(&mut conn, query).await?)
    }
}

/// One database transaction
///
/// Dropping it without `commit` rolls back.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn lock_agent(&mut self, agent_id: ActorId) -> Result<(), PortError> {
        debug!(%agent_id, "Locking agent");
        Ok(repo::lock_agent(&mut self.tx, agent_id).await?)
    }

    async fn load_ledger(&mut self, actor_id: ActorId, role: Role) -> Result<LedgerSnapshot, PortError> {
        Ok(load_ledger(&mut self.tx, actor_id, role).await?)
    }

    async fn outstanding_collections(&mut self, agent_id: ActorId) -> Result<Vec<Collection>, PortError> {
        Ok(repo::collections_for_agent(&mut self.tx, agent_id, true).await?)
    }

    async fn outstanding_commissions(&mut self, agent_id: ActorId) -> Result<Vec<Commission>, PortError> {
        Ok(repo::commissions_for_agent(&mut self.tx, agent_id, true).await?)
    }

    async fn unreconciled_payments(&mut self, agent_id: ActorId) -> Result<Vec<PaymentSubmission>, PortError> {
        Ok(repo::payments_where(&mut self.tx, Some(agent_id), None, true).await?)
    }

    async fn open_settlement_for_agent(&mut self, agent_id: ActorId) -> Result<Option<Settlement>, PortError> {
        Ok(repo::open_settlement_for_agent(&mut self.tx, agent_id).await?)
    }

    async fn get_settlement_for_update(&mut self, id: SettlementId) -> Result<Settlement, PortError> {
        Ok(repo::settlement(&mut self.tx, id, true).await?)
    }

    async fn get_commission_for_update(&mut self, id: CommissionId) -> Result<Commission, PortError> {
        Ok(repo::commission_for_update(&mut self.tx, id).await?)
    }

    async fn collections_by_ids(&mut self, ids: &[CollectionId]) -> Result<Vec<Collection>, PortError> {
        Ok(repo::collections_by_ids(&mut self.tx, ids).await?)
    }

    async fn commissions_by_ids(&mut self, ids: &[CommissionId]) -> Result<Vec<Commission>, PortError> {
        Ok(repo::commissions_by_ids(&mut self.tx, ids).await?)
    }

    async fn payments_by_ids(&mut self, ids: &[PaymentSubmissionId]) -> Result<Vec<PaymentSubmission>, PortError> {
        Ok(repo::payments_by_ids(&mut self.tx, ids).await?)
    }

    async fn insert_collection(&mut self, collection: &Collection) -> Result<(), PortError> {
        Ok(repo::insert_collection(&mut self.tx, collection).await?)
    }

    async fn insert_commission(&mut self, commission: &Commission) -> Result<(), PortError> {
        Ok(repo::insert_commission(&mut self.tx, commission).await?)
    }

    async fn insert_payment(&mut self, payment: &PaymentSubmission) -> Result<(), PortError> {
        Ok(repo::insert_payment(&mut self.tx, payment).await?)
    }

    async fn insert_settlement(&mut self, settlement: &Settlement) -> Result<(), PortError> {
        Ok(repo::insert_settlement(&mut self.tx, settlement).await?)
    }

    async fn update_collection(&mut self, collection: &Collection) -> Result<(), PortError> {
        Ok(repo::update_collection(&mut self.tx, collection).await?)
    }

    async fn update_commission(&mut self, commission: &Commission) -> Result<(), PortError> {
        Ok(repo::update_commission(&mut self.tx, commission).await?)
    }

    async fn update_payment(&mut self, payment: &PaymentSubmission) -> Result<(), PortError> {
        Ok(repo::update_payment(&mut self.tx, payment).await?)
    }

    async fn update_settlement(&mut self, settlement: &Settlement) -> Result<(), PortError> {
        Ok(repo::update_settlement(&mut self.tx, settlement).await?)
    }

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<(), PortError> {
        Ok(repo::append_audit(&mut self.tx, entry).await?)
    }

    async fn commit(self: Box<Self>) -> Result<(), PortError> {
        self.tx
            .commit()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()).into())
    }

    async fn rollback(self: Box<Self>) -> Result<(), PortError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()).into())
    }
}
