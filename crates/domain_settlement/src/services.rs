//! Settlement domain services
//!
//! `SettlementEngine` is the single entry point for every money-moving
//! operation. Each operation takes a pre-authenticated [`ActorContext`],
//! checks authorization and input before touching the store, and performs
//! all writes inside one [`StoreTransaction`].

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use core_kernel::{
    ActorId, CommissionId, Currency, HealthCheckResult, Money, SettlementId,
};

use crate::actor::{ActorContext, Role};
use crate::audit::{AuditAction, AuditEntry, AuditQuery};
use crate::collection::{sort_oldest_first, Collection, CollectionStatus, NewCollection};
use crate::commission::{Commission, CommissionCalculator, CommissionEventType, CommissionStatus};
use crate::error::SettlementError;
use crate::ledger::{Balance, BalanceCache, BalanceLedger};
use crate::payment::{PaymentSubmission, PaymentSubmissionStatus};
use crate::ports::{DirectoryPort, SettlementStore, StoreTransaction};
use crate::settlement::{Settlement, SettlementQuery, Transition};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// The one currency the platform operates in
    pub currency: Currency,
    /// Create commissions directly in APPROVED
    pub auto_approve_commissions: bool,
    /// How long a displayed balance may be served from cache
    pub balance_cache_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            currency: Currency::IQD,
            auto_approve_commissions: false,
            balance_cache_ttl: Duration::from_secs(30),
        }
    }
}

/// Payload for an agent-to-accountant cash hand-off
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub agent_id: ActorId,
    pub accountant_id: ActorId,
    pub amount: Money,
    pub notes: Option<String>,
}

const READERS: &[Role] = &[Role::Manager, Role::Accountant, Role::Admin];

/// Commits on success, rolls back on failure
async fn finish<T: Send>(
    tx: Box<dyn StoreTransaction>,
    result: Result<T, SettlementError>,
) -> Result<T, SettlementError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = tx.rollback().await {
                warn!(error = %rollback_error, "Rollback failed");
            }
            Err(error)
        }
    }
}

/// The settlement and commission reconciliation engine
pub struct SettlementEngine {
    store: Arc<dyn SettlementStore>,
    directory: Arc<dyn DirectoryPort>,
    config: EngineConfig,
    calculator: CommissionCalculator,
    ledger: BalanceLedger,
    cache: BalanceCache,
}

impl SettlementEngine {
    pub fn new(
        store: Arc<dyn SettlementStore>,
        directory: Arc<dyn DirectoryPort>,
        config: EngineConfig,
    ) -> Self {
        Self {
            calculator: CommissionCalculator::new(config.currency)
                .auto_approve(config.auto_approve_commissions),
            ledger: BalanceLedger::new(config.currency),
            cache: BalanceCache::new(config.balance_cache_ttl),
            store,
            directory,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Health of the store and directory adapters
    pub async fn health(&self) -> Vec<HealthCheckResult> {
        vec![
            self.store.health_check().await,
            self.directory.health_check().await,
        ]
    }

    // ========================================================================
    // Collections
    // ========================================================================

    /// Records a cash collection and the commission earned on it
    ///
    /// # Errors
    ///
    /// - `Authorization` if the caller is neither the agent nor an admin, or
    ///   the agent does not cover the business's governorate
    /// - `Validation` for a non-positive or foreign-currency amount, an
    ///   inactive package, or an amount above the package price
    /// - `NotFound` for an unknown agent, business or package
    /// - `Configuration` if the agent has no active commission rate
    #[instrument(skip(self, actor, request), fields(actor = %actor.actor_id, agent = %request.agent_id))]
    pub async fn record_collection(
        &self,
        actor: &ActorContext,
        request: NewCollection,
    ) -> Result<(Collection, Commission), SettlementError> {
        actor.require_self_or(request.agent_id, Role::Agent, &[], "record collections for this agent")?;
        self.ensure_currency(&request.amount)?;
        let collection = Collection::new(&request)?;

        let agent = self.directory.get_agent(request.agent_id).await?;
        let business = self.directory.get_business(request.business_id).await?;
        let package = self.directory.get_package(request.package_id).await?;

        if !agent.is_assigned_to(business.governorate_id) {
            warn!(business = %business.id, "Agent is not assigned to the business's governorate");
            return Err(SettlementError::unauthorized(format!(
                "Agent {} is not assigned to governorate {}",
                agent.agent_id, business.governorate_id
            )));
        }
        if !package.is_active {
            return Err(SettlementError::validation(format!(
                "Package {} is not active",
                package.id
            )));
        }
        if package.price.currency() != self.config.currency {
            return Err(SettlementError::validation(format!(
                "Package {} is priced in {}, expected {}",
                package.id,
                package.price.currency(),
                self.config.currency
            )));
        }
        if request.amount.amount() > package.price.amount() {
            return Err(SettlementError::validation(format!(
                "Amount {} exceeds the price {} of package {}",
                request.amount, package.price, package.id
            )));
        }

        let commission = self
            .calculator
            .compute(&agent, request.event_type, collection.amount)?
            .for_collection(collection.id);

        let mut tx = self.store.begin().await?;
        let result: Result<(), SettlementError> = async {
            tx.lock_agent(collection.agent_id).await?;
            tx.insert_collection(&collection).await?;
            tx.insert_commission(&commission).await?;
            tx.append_audit(&AuditEntry::new(
                AuditAction::CollectionRecorded,
                collection.id,
                None,
                Some(CollectionStatus::Collected.as_str()),
                actor.actor_id,
                json!({
                    "amount": collection.amount,
                    "business_id": collection.business_id,
                    "package_id": collection.package_id,
                    "collected_at": collection.collected_at,
                }),
            ))
            .await?;
            tx.append_audit(&AuditEntry::new(
                AuditAction::CommissionCreated,
                commission.id,
                None,
                Some(commission.status.as_str()),
                actor.actor_id,
                json!({
                    "collection_id": collection.id,
                    "event_type": commission.event_type,
                    "base_amount": commission.base_amount,
                    "rate": commission.rate,
                    "amount": commission.amount,
                }),
            ))
            .await?;
            Ok(())
        }
        .await;
        finish(tx, result).await?;

        self.cache.invalidate(&[collection.agent_id]).await;
        info!(
            collection = %collection.id,
            commission = %commission.id,
            amount = %collection.amount,
            "Collection recorded"
        );
        Ok((collection, commission))
    }

    /// Lists an agent's outstanding collections, oldest first
    ///
    /// The same snapshot refreshes the agent's cached balance.
    #[instrument(skip(self, actor), fields(actor = %actor.actor_id))]
    pub async fn list_outstanding(
        &self,
        actor: &ActorContext,
        agent_id: ActorId,
    ) -> Result<Vec<Collection>, SettlementError> {
        actor.require_self_or(agent_id, Role::Agent, READERS, "view outstanding collections")?;
        self.directory.get_agent(agent_id).await?;

        let generation = self.cache.generation(agent_id).await;
        let snapshot = self.store.load_ledger(agent_id, Role::Agent).await?;
        let balance = self.ledger.compute(&snapshot)?;
        self.cache.put(balance, generation).await;

        let mut outstanding: Vec<Collection> = snapshot
            .collections
            .into_iter()
            .filter(Collection::is_outstanding)
            .collect();
        sort_oldest_first(&mut outstanding);
        Ok(outstanding)
    }

    // ========================================================================
    // Commissions
    // ========================================================================

    /// Computes the commission an event would earn, without persisting it
    #[instrument(skip(self, actor), fields(actor = %actor.actor_id))]
    pub async fn quote_commission(
        &self,
        actor: &ActorContext,
        agent_id: ActorId,
        event_type: CommissionEventType,
        base_amount: Money,
    ) -> Result<Commission, SettlementError> {
        actor.require_self_or(agent_id, Role::Agent, READERS, "quote commissions")?;
        let agent = self.directory.get_agent(agent_id).await?;
        self.calculator.compute(&agent, event_type, base_amount)
    }

    /// PENDING -> APPROVED
    #[instrument(skip(self, actor), fields(actor = %actor.actor_id))]
    pub async fn approve_commission(
        &self,
        actor: &ActorContext,
        commission_id: CommissionId,
    ) -> Result<Commission, SettlementError> {
        actor.require_any(READERS, "approve commissions")?;

        let mut tx = self.store.begin().await?;
        let result: Result<Commission, SettlementError> = async {
            let mut commission = tx.get_commission_for_update(commission_id).await?;
            let previous = commission.status;
            if commission.approve()? {
                tx.update_commission(&commission).await?;
                tx.append_audit(&AuditEntry::new(
                    AuditAction::CommissionApproved,
                    commission.id,
                    Some(previous.as_str()),
                    Some(commission.status.as_str()),
                    actor.actor_id,
                    json!({ "amount": commission.amount }),
                ))
                .await?;
            }
            Ok(commission)
        }
        .await;
        let commission = finish(tx, result).await?;

        self.cache.invalidate(&[commission.agent_id]).await;
        info!(commission = %commission.id, status = %commission.status, "Commission approved");
        Ok(commission)
    }

    /// PENDING|APPROVED -> CANCELLED
    #[instrument(skip(self, actor, reason), fields(actor = %actor.actor_id))]
    pub async fn cancel_commission(
        &self,
        actor: &ActorContext,
        commission_id: CommissionId,
        reason: &str,
    ) -> Result<Commission, SettlementError> {
        actor.require_any(READERS, "cancel commissions")?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(SettlementError::validation("A cancellation reason is required"));
        }

        let mut tx = self.store.begin().await?;
        let result: Result<Commission, SettlementError> = async {
            let mut commission = tx.get_commission_for_update(commission_id).await?;
            let previous = commission.status;
            if commission.cancel()? {
                tx.update_commission(&commission).await?;
                tx.append_audit(&AuditEntry::new(
                    AuditAction::CommissionCancelled,
                    commission.id,
                    Some(previous.as_str()),
                    Some(CommissionStatus::Cancelled.as_str()),
                    actor.actor_id,
                    json!({ "amount": commission.amount, "reason": reason }),
                ))
                .await?;
            }
            Ok(commission)
        }
        .await;
        let commission = finish(tx, result).await?;

        self.cache.invalidate(&[commission.agent_id]).await;
        info!(commission = %commission.id, "Commission cancelled");
        Ok(commission)
    }

    // ========================================================================
    // Balances
    // ========================================================================

    /// Returns an actor's derived balance, possibly from cache
    #[instrument(skip(self, actor), fields(actor = %actor.actor_id))]
    pub async fn get_balance(
        &self,
        actor: &ActorContext,
        actor_id: ActorId,
    ) -> Result<Balance, SettlementError> {
        if actor.actor_id != actor_id {
            actor.require_any(READERS, "view other balances")?;
        }

        if let Some(balance) = self.cache.get(actor_id).await {
            debug!(subject = %actor_id, "Balance served from cache");
            return Ok(balance);
        }

        let profile = self.directory.resolve_actor(actor_id).await?;
        let generation = self.cache.generation(actor_id).await;
        let snapshot = self.store.load_ledger(actor_id, profile.role).await?;
        let balance = self.ledger.compute(&snapshot)?;
        if !self.cache.put(balance.clone(), generation).await {
            debug!(subject = %actor_id, "Balance not cached");
        }
        Ok(balance)
    }

    // ========================================================================
    // Settlements
    // ========================================================================

    /// Snapshots an agent's outstanding records into a PENDING settlement
    ///
    /// # Errors
    ///
    /// - `Authorization` unless the caller is the named manager covering one
    ///   of the agent's governorates, or an admin
    /// - `Conflict` if the agent already has a PENDING settlement
    /// - `Validation` if there is nothing outstanding to settle
    #[instrument(skip(self, actor), fields(actor = %actor.actor_id))]
    pub async fn create_settlement(
        &self,
        actor: &ActorContext,
        agent_id: ActorId,
        manager_id: ActorId,
    ) -> Result<Settlement, SettlementError> {
        let acting_as_manager = actor.actor_id == manager_id && actor.has_role(Role::Manager);
        if !acting_as_manager && !actor.is_admin() {
            warn!("Settlement creation refused");
            return Err(SettlementError::unauthorized(format!(
                "{} may not create settlements for manager {}",
                actor.actor_id, manager_id
            )));
        }

        let manager = self.directory.resolve_actor(manager_id).await?;
        if manager.role != Role::Manager || !manager.is_active {
            return Err(SettlementError::validation(format!(
                "{} is not an active manager",
                manager_id
            )));
        }
        let agent = self.directory.get_agent(agent_id).await?;
        if !actor.is_admin() && !manager.shares_governorate_with(&agent.governorates) {
            warn!(agent = %agent_id, "Manager does not cover the agent's governorates");
            return Err(SettlementError::unauthorized(format!(
                "Manager {} does not supervise agent {}",
                manager_id, agent_id
            )));
        }

        let mut tx = self.store.begin().await?;
        let result: Result<Settlement, SettlementError> = async {
            tx.lock_agent(agent_id).await?;
            if let Some(open) = tx.open_settlement_for_agent(agent_id).await? {
                return Err(SettlementError::conflict(format!(
                    "Agent {} already has pending settlement {}",
                    agent_id, open.id
                )));
            }

            let mut collections = tx.outstanding_collections(agent_id).await?;
            let mut commissions = tx.outstanding_commissions(agent_id).await?;
            let mut payments = tx.unreconciled_payments(agent_id).await?;

            let mut settlement = Settlement::draft(
                agent_id,
                manager_id,
                actor.actor_id,
                self.config.currency,
                &collections,
                &commissions,
                &payments,
                Utc::now(),
            )?;
            settlement.submit()?;
            tx.insert_settlement(&settlement).await?;

            for collection in collections.iter_mut() {
                collection.reserve(settlement.id)?;
                tx.update_collection(collection).await?;
            }
            for commission in commissions.iter_mut() {
                commission.reserve(settlement.id)?;
                tx.update_commission(commission).await?;
            }
            for payment in payments.iter_mut() {
                payment.reserve(settlement.id)?;
                tx.update_payment(payment).await?;
            }

            tx.append_audit(&AuditEntry::new(
                AuditAction::SettlementCreated,
                settlement.id,
                None,
                Some(settlement.status.as_str()),
                actor.actor_id,
                json!({
                    "agent_id": agent_id,
                    "manager_id": manager_id,
                    "collections": settlement.collection_ids.len(),
                    "commissions": settlement.commission_ids.len(),
                    "payments": settlement.payment_ids.len(),
                    "total_collected": settlement.total_collected,
                    "total_commissions": settlement.total_commissions,
                    "amount_delivered": settlement.amount_delivered,
                    "total_prepaid": settlement.total_prepaid,
                }),
            ))
            .await?;
            Ok(settlement)
        }
        .await;
        let settlement = finish(tx, result).await?;

        info!(
            settlement = %settlement.id,
            agent = %agent_id,
            total_collected = %settlement.total_collected,
            amount_delivered = %settlement.amount_delivered,
            "Settlement created"
        );
        Ok(settlement)
    }

    /// PENDING -> CONFIRMED, finalizing every referenced record
    ///
    /// Confirming a CONFIRMED settlement returns it unchanged.
    #[instrument(skip(self, actor), fields(actor = %actor.actor_id))]
    pub async fn confirm_settlement(
        &self,
        actor: &ActorContext,
        settlement_id: SettlementId,
    ) -> Result<Settlement, SettlementError> {
        actor.require_any(&[Role::Accountant], "confirm settlements")?;

        let mut tx = self.store.begin().await?;
        let result: Result<(Settlement, Vec<ActorId>, bool), SettlementError> = async {
            let mut settlement = tx.get_settlement_for_update(settlement_id).await?;
            let transition = settlement.confirm(actor.actor_id, Utc::now())?;
            let Transition::Applied { from, to } = transition else {
                return Ok((settlement, Vec::new(), false));
            };

            let mut collections = tx.collections_by_ids(&settlement.collection_ids).await?;
            let mut commissions = tx.commissions_by_ids(&settlement.commission_ids).await?;
            let mut payments = tx.payments_by_ids(&settlement.payment_ids).await?;

            let collected = Money::sum(self.config.currency, collections.iter().map(|c| &c.amount))?;
            if collected != settlement.total_collected {
                return Err(SettlementError::validation(format!(
                    "Settlement {} records total {} but its collections sum to {}",
                    settlement.id, settlement.total_collected, collected
                )));
            }

            for collection in collections.iter_mut() {
                collection.mark_submitted(settlement.id)?;
                tx.update_collection(collection).await?;
                tx.append_audit(&AuditEntry::new(
                    AuditAction::CollectionSubmitted,
                    collection.id,
                    Some(CollectionStatus::Collected.as_str()),
                    Some(CollectionStatus::Submitted.as_str()),
                    actor.actor_id,
                    json!({ "settlement_id": settlement.id, "amount": collection.amount }),
                ))
                .await?;
            }
            for commission in commissions.iter_mut() {
                let previous = commission.status;
                commission.mark_paid(settlement.id)?;
                tx.update_commission(commission).await?;
                tx.append_audit(&AuditEntry::new(
                    AuditAction::CommissionPaid,
                    commission.id,
                    Some(previous.as_str()),
                    Some(CommissionStatus::Paid.as_str()),
                    actor.actor_id,
                    json!({ "settlement_id": settlement.id, "amount": commission.amount }),
                ))
                .await?;
            }
            for payment in payments.iter_mut() {
                payment.reconcile(settlement.id)?;
                tx.update_payment(payment).await?;
                tx.append_audit(&AuditEntry::new(
                    AuditAction::PaymentReconciled,
                    payment.id,
                    Some(PaymentSubmissionStatus::Received.as_str()),
                    Some(PaymentSubmissionStatus::Reconciled.as_str()),
                    actor.actor_id,
                    json!({ "settlement_id": settlement.id, "amount": payment.amount }),
                ))
                .await?;
            }

            let net_cash_due = settlement.net_cash_due()?;
            tx.update_settlement(&settlement).await?;
            tx.append_audit(&AuditEntry::new(
                AuditAction::SettlementConfirmed,
                settlement.id,
                Some(from.as_str()),
                Some(to.as_str()),
                actor.actor_id,
                json!({
                    "amount_delivered": settlement.amount_delivered,
                    "total_prepaid": settlement.total_prepaid,
                    "net_cash_due": net_cash_due,
                }),
            ))
            .await?;

            let accountants: Vec<ActorId> = payments.iter().map(|p| p.accountant_id).collect();
            Ok((settlement, accountants, true))
        }
        .await;
        let (settlement, accountants, applied) = finish(tx, result).await?;

        if applied {
            let mut touched = vec![settlement.agent_id, settlement.manager_id];
            touched.extend(accountants);
            self.cache.invalidate(&touched).await;
            info!(settlement = %settlement.id, "Settlement confirmed");
        } else {
            debug!(settlement = %settlement.id, "Settlement already confirmed");
        }
        Ok(settlement)
    }

    /// PENDING -> REJECTED, releasing every referenced record
    ///
    /// Rejecting a REJECTED settlement returns it unchanged.
    #[instrument(skip(self, actor, reason), fields(actor = %actor.actor_id))]
    pub async fn reject_settlement(
        &self,
        actor: &ActorContext,
        settlement_id: SettlementId,
        reason: &str,
    ) -> Result<Settlement, SettlementError> {
        actor.require_any(&[Role::Accountant, Role::Manager], "reject settlements")?;

        let mut tx = self.store.begin().await?;
        let result: Result<(Settlement, bool), SettlementError> = async {
            let mut settlement = tx.get_settlement_for_update(settlement_id).await?;
            let may_reject = actor.is_admin()
                || actor.has_role(Role::Accountant)
                || actor.actor_id == settlement.manager_id;
            if !may_reject {
                warn!(settlement = %settlement_id, "Settlement rejection refused");
                return Err(SettlementError::unauthorized(format!(
                    "{} is not the manager of settlement {}",
                    actor.actor_id, settlement_id
                )));
            }

            let transition = settlement.reject(actor.actor_id, reason, Utc::now())?;
            let Transition::Applied { from, to } = transition else {
                return Ok((settlement, false));
            };

            for mut collection in tx.collections_by_ids(&settlement.collection_ids).await? {
                if collection.release(settlement.id) {
                    tx.update_collection(&collection).await?;
                }
            }
            for mut commission in tx.commissions_by_ids(&settlement.commission_ids).await? {
                if commission.release(settlement.id) {
                    tx.update_commission(&commission).await?;
                }
            }
            for mut payment in tx.payments_by_ids(&settlement.payment_ids).await? {
                if payment.release(settlement.id) {
                    tx.update_payment(&payment).await?;
                }
            }

            tx.update_settlement(&settlement).await?;
            tx.append_audit(&AuditEntry::new(
                AuditAction::SettlementRejected,
                settlement.id,
                Some(from.as_str()),
                Some(to.as_str()),
                actor.actor_id,
                json!({ "reason": settlement.rejection_reason }),
            ))
            .await?;
            Ok((settlement, true))
        }
        .await;
        let (settlement, applied) = finish(tx, result).await?;

        if applied {
            self.cache.invalidate(&[settlement.agent_id]).await;
            info!(settlement = %settlement.id, "Settlement rejected");
        }
        Ok(settlement)
    }

    #[instrument(skip(self, actor), fields(actor = %actor.actor_id))]
    pub async fn get_settlement(
        &self,
        actor: &ActorContext,
        settlement_id: SettlementId,
    ) -> Result<Settlement, SettlementError> {
        let settlement = self.store.get_settlement(settlement_id).await?;
        actor.require_self_or(settlement.agent_id, Role::Agent, READERS, "view this settlement")?;
        Ok(settlement)
    }

    /// Lists settlements, newest first; agents only see their own
    #[instrument(skip(self, actor), fields(actor = %actor.actor_id))]
    pub async fn list_settlements(
        &self,
        actor: &ActorContext,
        mut query: SettlementQuery,
    ) -> Result<Vec<Settlement>, SettlementError> {
        if actor.require_any(READERS, "list settlements").is_err() {
            match query.agent_id {
                Some(agent_id) if agent_id != actor.actor_id => {
                    return Err(SettlementError::unauthorized(format!(
                        "{} may not list settlements of {}",
                        actor.actor_id, agent_id
                    )));
                }
                _ if !actor.has_role(Role::Agent) => {
                    return Err(SettlementError::unauthorized(format!(
                        "{} may not list settlements",
                        actor.actor_id
                    )));
                }
                _ => query.agent_id = Some(actor.actor_id),
            }
        }
        Ok(self.store.list_settlements(&query).await?)
    }

    // ========================================================================
    // Payment submissions
    // ========================================================================

    /// Records a cash hand-off from an agent to an accountant
    ///
    /// # Errors
    ///
    /// - `Validation` for a non-positive amount or a non-accountant recipient
    /// - `Conflict` while the agent has a PENDING settlement, whose snapshot
    ///   could not include the payment
    /// - `InsufficientBalance` if the amount exceeds the agent's balance
    #[instrument(skip(self, actor, request), fields(actor = %actor.actor_id, agent = %request.agent_id))]
    pub async fn submit_payment(
        &self,
        actor: &ActorContext,
        request: PaymentRequest,
    ) -> Result<PaymentSubmission, SettlementError> {
        actor.require_self_or(request.agent_id, Role::Agent, &[], "submit payments for this agent")?;
        self.ensure_currency(&request.amount)?;
        let payment = PaymentSubmission::new(
            request.agent_id,
            request.accountant_id,
            request.amount,
            request.notes,
        )?;

        self.directory.get_agent(request.agent_id).await?;
        let accountant = self.directory.resolve_actor(request.accountant_id).await?;
        if accountant.role != Role::Accountant || !accountant.is_active {
            return Err(SettlementError::validation(format!(
                "{} is not an active accountant",
                request.accountant_id
            )));
        }

        let mut tx = self.store.begin().await?;
        let result: Result<(), SettlementError> = async {
            tx.lock_agent(payment.agent_id).await?;
            if let Some(open) = tx.open_settlement_for_agent(payment.agent_id).await? {
                return Err(SettlementError::conflict(format!(
                    "Agent {} has pending settlement {}; submit the payment once it is confirmed or rejected",
                    payment.agent_id, open.id
                )));
            }
            let snapshot = tx.load_ledger(payment.agent_id, Role::Agent).await?;
            let balance = self.ledger.compute(&snapshot)?;
            if payment.amount.amount() > balance.current_balance.amount() {
                return Err(SettlementError::InsufficientBalance {
                    requested: payment.amount,
                    available: balance.current_balance,
                });
            }

            tx.insert_payment(&payment).await?;
            tx.append_audit(&AuditEntry::new(
                AuditAction::PaymentSubmitted,
                payment.id,
                None,
                Some(payment.status.as_str()),
                actor.actor_id,
                json!({
                    "accountant_id": payment.accountant_id,
                    "amount": payment.amount,
                    "balance_before": balance.current_balance,
                }),
            ))
            .await?;
            Ok(())
        }
        .await;
        if let Err(SettlementError::InsufficientBalance { requested, available }) = &result {
            warn!(%requested, %available, "Payment exceeds balance");
        }
        finish(tx, result).await?;

        self.cache
            .invalidate(&[payment.agent_id, payment.accountant_id])
            .await;
        info!(payment = %payment.id, amount = %payment.amount, "Payment submitted");
        Ok(payment)
    }

    /// An agent's payment submissions, newest first
    #[instrument(skip(self, actor), fields(actor = %actor.actor_id))]
    pub async fn list_payments(
        &self,
        actor: &ActorContext,
        agent_id: ActorId,
    ) -> Result<Vec<PaymentSubmission>, SettlementError> {
        actor.require_self_or(agent_id, Role::Agent, READERS, "view payments")?;
        Ok(self.store.list_payments(agent_id).await?)
    }

    // ========================================================================
    // Audit
    // ========================================================================

    #[instrument(skip(self, actor), fields(actor = %actor.actor_id))]
    pub async fn list_audit_entries(
        &self,
        actor: &ActorContext,
        query: AuditQuery,
    ) -> Result<Vec<AuditEntry>, SettlementError> {
        actor.require_any(READERS, "read the audit log")?;
        Ok(self.store.list_audit_entries(&query).await?)
    }

    fn ensure_currency(&self, amount: &Money) -> Result<(), SettlementError> {
        if amount.currency() != self.config.currency {
            return Err(SettlementError::validation(format!(
                "Expected an amount in {}, got {}",
                self.config.currency,
                amount.currency()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for SettlementEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.currency, Currency::IQD);
        assert!(!config.auto_approve_commissions);
        assert_eq!(config.balance_cache_ttl, Duration::from_secs(30));
    }

    #[test]
    fn test_readers_exclude_agents() {
        assert!(!READERS.contains(&Role::Agent));
    }
}
