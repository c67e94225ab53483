//! Settlement Repository
//!
//! SQL and row mapping for collections, commissions, payment submissions,
//! settlements and the audit log. Every function takes a plain connection so
//! the same query runs against a pooled connection or inside an open
//! transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgConnection};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use core_kernel::{
    ActorId, AuditEntryId, BusinessId, CollectionId, CommissionId, Currency, Money, PackageId,
    PaymentSubmissionId, Rate, SettlementId,
};
use domain_settlement::{
    AuditAction, AuditEntry, AuditQuery, Collection, CollectionStatus, Commission,
    CommissionEventType, CommissionStatus, PaymentSubmission, PaymentSubmissionStatus, Settlement,
    SettlementQuery, SettlementStatus,
};

use crate::error::DatabaseError;

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct CollectionRow {
    pub collection_id: Uuid,
    pub agent_id: Uuid,
    pub business_id: Uuid,
    pub package_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub collected_at: DateTime<Utc>,
    pub status: String,
    pub reserved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CommissionRow {
    pub commission_id: Uuid,
    pub agent_id: Uuid,
    pub collection_id: Option<Uuid>,
    pub event_type: String,
    pub base_amount: Decimal,
    pub rate: Decimal,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub reserved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PaymentRow {
    pub payment_id: Uuid,
    pub agent_id: Uuid,
    pub accountant_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub notes: Option<String>,
    pub status: String,
    pub reserved_by: Option<Uuid>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct SettlementRow {
    pub settlement_id: Uuid,
    pub agent_id: Uuid,
    pub manager_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_collected: Decimal,
    pub total_commissions: Decimal,
    pub amount_delivered: Decimal,
    pub total_prepaid: Decimal,
    pub currency: String,
    pub status: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub confirmed_by: Option<Uuid>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<Uuid>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct SettlementItemRow {
    pub settlement_id: Uuid,
    pub item_type: String,
    pub item_id: Uuid,
}

#[derive(Debug, Clone, FromRow)]
pub struct AuditRow {
    pub audit_id: Uuid,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub previous_status: Option<String>,
    pub new_status: Option<String>,
    pub performed_by: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub changes: JsonValue,
}

const ITEM_COLLECTION: &str = "collection";
const ITEM_COMMISSION: &str = "commission";
const ITEM_PAYMENT: &str = "payment";

// ============================================================================
// Row -> domain
// ============================================================================

fn currency(code: &str) -> Result<Currency, DatabaseError> {
    Currency::from_str(code).map_err(|e| DatabaseError::decode("currency", e))
}

fn parse<T>(column: &str, value: &str) -> Result<T, DatabaseError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| DatabaseError::decode(column, e))
}

impl TryFrom<CollectionRow> for Collection {
    type Error = DatabaseError;

    fn try_from(row: CollectionRow) -> Result<Self, Self::Error> {
        Ok(Collection {
            id: CollectionId::from_uuid(row.collection_id),
            agent_id: ActorId::from_uuid(row.agent_id),
            business_id: BusinessId::from_uuid(row.business_id),
            package_id: PackageId::from_uuid(row.package_id),
            amount: Money::new(row.amount, currency(&row.currency)?),
            collected_at: row.collected_at,
            status: parse::<CollectionStatus>("status", &row.status)?,
            reserved_by: row.reserved_by.map(SettlementId::from_uuid),
            created_at: row.created_at,
        })
    }
}

impl TryFrom<CommissionRow> for Commission {
    type Error = DatabaseError;

    fn try_from(row: CommissionRow) -> Result<Self, Self::Error> {
        let currency = currency(&row.currency)?;
        Ok(Commission {
            id: CommissionId::from_uuid(row.commission_id),
            agent_id: ActorId::from_uuid(row.agent_id),
            collection_id: row.collection_id.map(CollectionId::from_uuid),
            event_type: parse::<CommissionEventType>("event_type", &row.event_type)?,
            base_amount: Money::new(row.base_amount, currency),
            rate: Rate::from_percentage(row.rate).map_err(|e| DatabaseError::decode("rate", e))?,
            amount: Money::new(row.amount, currency),
            status: parse::<CommissionStatus>("status", &row.status)?,
            reserved_by: row.reserved_by.map(SettlementId::from_uuid),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<PaymentRow> for PaymentSubmission {
    type Error = DatabaseError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(PaymentSubmission {
            id: PaymentSubmissionId::from_uuid(row.payment_id),
            agent_id: ActorId::from_uuid(row.agent_id),
            accountant_id: ActorId::from_uuid(row.accountant_id),
            amount: Money::new(row.amount, currency(&row.currency)?),
            notes: row.notes,
            status: parse::<PaymentSubmissionStatus>("status", &row.status)?,
            reserved_by: row.reserved_by.map(SettlementId::from_uuid),
            submitted_at: row.submitted_at,
        })
    }
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = DatabaseError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(AuditEntry {
            id: AuditEntryId::from_uuid(row.audit_id),
            action: parse::<AuditAction>("action", &row.action)?,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            previous_status: row.previous_status,
            new_status: row.new_status,
            performed_by: ActorId::from_uuid(row.performed_by),
            timestamp: row.occurred_at,
            changes: row.changes,
        })
    }
}

/// Builds a settlement from its header row and snapshot items
fn settlement_from_parts(
    row: SettlementRow,
    items: &[SettlementItemRow],
) -> Result<Settlement, DatabaseError> {
    let currency = currency(&row.currency)?;
    let mut collection_ids = Vec::new();
    let mut commission_ids = Vec::new();
    let mut payment_ids = Vec::new();

    for item in items.iter().filter(|i| i.settlement_id == row.settlement_id) {
        match item.item_type.as_str() {
            ITEM_COLLECTION => collection_ids.push(CollectionId::from_uuid(item.item_id)),
            ITEM_COMMISSION => commission_ids.push(CommissionId::from_uuid(item.item_id)),
            ITEM_PAYMENT => payment_ids.push(PaymentSubmissionId::from_uuid(item.item_id)),
            other => return Err(DatabaseError::decode("item_type", other)),
        }
    }

    Ok(Settlement {
        id: SettlementId::from_uuid(row.settlement_id),
        agent_id: ActorId::from_uuid(row.agent_id),
        manager_id: ActorId::from_uuid(row.manager_id),
        period_start: row.period_start,
        period_end: row.period_end,
        collection_ids,
        commission_ids,
        payment_ids,
        total_collected: Money::new(row.total_collected, currency),
        total_commissions: Money::new(row.total_commissions, currency),
        amount_delivered: Money::new(row.amount_delivered, currency),
        total_prepaid: Money::new(row.total_prepaid, currency),
        status: parse::<SettlementStatus>("status", &row.status)?,
        created_by: ActorId::from_uuid(row.created_by),
        created_at: row.created_at,
        confirmed_by: row.confirmed_by.map(ActorId::from_uuid),
        confirmed_at: row.confirmed_at,
        rejected_by: row.rejected_by.map(ActorId::from_uuid),
        rejected_at: row.rejected_at,
        rejection_reason: row.rejection_reason,
        updated_at: row.updated_at,
    })
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, DatabaseError>
where
    T: TryFrom<R, Error = DatabaseError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Puts fetched records back into the caller's id order
///
/// Fails with `NotFound` when any requested id has no record.
fn in_request_order<T, K>(
    records: Vec<T>,
    ids: &[K],
    key: impl Fn(&T) -> K,
    entity: &str,
) -> Result<Vec<T>, DatabaseError>
where
    K: std::hash::Hash + Eq + Copy + std::fmt::Display,
{
    let mut by_id: HashMap<K, T> = records.into_iter().map(|r| (key(&r), r)).collect();
    ids.iter()
        .map(|id| by_id.remove(id).ok_or_else(|| DatabaseError::not_found(entity, id)))
        .collect()
}

// ============================================================================
// Locks
// ============================================================================

const LOCK_AGENT: &str = "SELECT actor_id FROM actors WHERE actor_id = $1 FOR UPDATE";

/// Takes the agent's row lock until the surrounding transaction ends
pub async fn lock_agent(conn: &mut PgConnection, agent_id: ActorId) -> Result<(), DatabaseError> {
    sqlx::query_scalar::<_, Uuid>(LOCK_AGENT)
        .bind(agent_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| DatabaseError::not_found("Agent", agent_id))
}

// ============================================================================
// Collections
// ============================================================================

const COLLECTION_COLUMNS: &str = "collection_id, agent_id, business_id, package_id, amount, currency, \
     collected_at, status, reserved_by, created_at";

pub async fn collections_for_agent(
    conn: &mut PgConnection,
    agent_id: ActorId,
    outstanding_only: bool,
) -> Result<Vec<Collection>, DatabaseError> {
    let sql = format!(
        "SELECT {COLLECTION_COLUMNS} FROM collections \
         WHERE agent_id = $1 AND (NOT $2 OR (status = 'COLLECTED' AND reserved_by IS NULL)) \
         ORDER BY collected_at, collection_id"
    );
    let rows = sqlx::query_as::<_, CollectionRow>(&sql)
        .bind(agent_id.as_uuid())
        .bind(outstanding_only)
        .fetch_all(&mut *conn)
        .await?;
    convert_all(rows)
}

pub async fn collections_by_ids(
    conn: &mut PgConnection,
    ids: &[CollectionId],
) -> Result<Vec<Collection>, DatabaseError> {
    let uuids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
    let sql = format!(
        "SELECT {COLLECTION_COLUMNS} FROM collections WHERE collection_id = ANY($1) FOR UPDATE"
    );
    let rows = sqlx::query_as::<_, CollectionRow>(&sql)
        .bind(&uuids)
        .fetch_all(&mut *conn)
        .await?;
    in_request_order(convert_all(rows)?, ids, |c: &Collection| c.id, "Collection")
}

pub async fn insert_collection(conn: &mut PgConnection, c: &Collection) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO collections (collection_id, agent_id, business_id, package_id, amount, currency, \
         collected_at, status, reserved_by, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(c.id.as_uuid())
    .bind(c.agent_id.as_uuid())
    .bind(c.business_id.as_uuid())
    .bind(c.package_id.as_uuid())
    .bind(c.amount.amount())
    .bind(c.amount.currency().code())
    .bind(c.collected_at)
    .bind(c.status.as_str())
    .bind(c.reserved_by.map(|id| *id.as_uuid()))
    .bind(c.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn update_collection(conn: &mut PgConnection, c: &Collection) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        "UPDATE collections SET status = $2, reserved_by = $3 WHERE collection_id = $1",
    )
    .bind(c.id.as_uuid())
    .bind(c.status.as_str())
    .bind(c.reserved_by.map(|id| *id.as_uuid()))
    .execute(&mut *conn)
    .await?;
    ensure_updated(result.rows_affected(), "Collection", c.id)
}

// ============================================================================
// Commissions
// ============================================================================

const COMMISSION_COLUMNS: &str = "commission_id, agent_id, collection_id, event_type, base_amount, rate, \
     amount, currency, status, reserved_by, created_at, updated_at";

pub async fn commissions_for_agent(
    conn: &mut PgConnection,
    agent_id: ActorId,
    outstanding_only: bool,
) -> Result<Vec<Commission>, DatabaseError> {
    let sql = format!(
        "SELECT {COMMISSION_COLUMNS} FROM commissions \
         WHERE agent_id = $1 \
           AND (NOT $2 OR (status IN ('PENDING', 'APPROVED') AND reserved_by IS NULL)) \
         ORDER BY created_at, commission_id"
    );
    let rows = sqlx::query_as::<_, CommissionRow>(&sql)
        .bind(agent_id.as_uuid())
        .bind(outstanding_only)
        .fetch_all(&mut *conn)
        .await?;
    convert_all(rows)
}

pub async fn commission_for_update(
    conn: &mut PgConnection,
    id: CommissionId,
) -> Result<Commission, DatabaseError> {
    let sql = format!("SELECT {COMMISSION_COLUMNS} FROM commissions WHERE commission_id = $1 FOR UPDATE");
    sqlx::query_as::<_, CommissionRow>(&sql)
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Commission", id))?
        .try_into()
}

pub async fn commissions_by_ids(
    conn: &mut PgConnection,
    ids: &[CommissionId],
) -> Result<Vec<Commission>, DatabaseError> {
    let uuids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
    let sql = format!(
        "SELECT {COMMISSION_COLUMNS} FROM commissions WHERE commission_id = ANY($1) FOR UPDATE"
    );
    let rows = sqlx::query_as::<_, CommissionRow>(&sql)
        .bind(&uuids)
        .fetch_all(&mut *conn)
        .await?;
    in_request_order(convert_all(rows)?, ids, |c: &Commission| c.id, "Commission")
}

pub async fn insert_commission(conn: &mut PgConnection, c: &Commission) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO commissions (commission_id, agent_id, collection_id, event_type, base_amount, rate, \
         amount, currency, status, reserved_by, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(c.id.as_uuid())
    .bind(c.agent_id.as_uuid())
    .bind(c.collection_id.map(|id| *id.as_uuid()))
    .bind(c.event_type.as_str())
    .bind(c.base_amount.amount())
    .bind(c.rate.as_percentage())
    .bind(c.amount.amount())
    .bind(c.amount.currency().code())
    .bind(c.status.as_str())
    .bind(c.reserved_by.map(|id| *id.as_uuid()))
    .bind(c.created_at)
    .bind(c.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn update_commission(conn: &mut PgConnection, c: &Commission) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        "UPDATE commissions SET status = $2, reserved_by = $3, updated_at = $4 WHERE commission_id = $1",
    )
    .bind(c.id.as_uuid())
    .bind(c.status.as_str())
    .bind(c.reserved_by.map(|id| *id.as_uuid()))
    .bind(c.updated_at)
    .execute(&mut *conn)
    .await?;
    ensure_updated(result.rows_affected(), "Commission", c.id)
}

// ============================================================================
// Payment submissions
// ============================================================================

const PAYMENT_COLUMNS: &str =
    "payment_id, agent_id, accountant_id, amount, currency, notes, status, reserved_by, submitted_at";

/// Payments by agent or by receiving accountant, oldest first
pub async fn payments_where(
    conn: &mut PgConnection,
    agent_id: Option<ActorId>,
    accountant_id: Option<ActorId>,
    outstanding_only: bool,
) -> Result<Vec<PaymentSubmission>, DatabaseError> {
    let sql = format!(
        "SELECT {PAYMENT_COLUMNS} FROM payment_submissions \
         WHERE ($1::uuid IS NULL OR agent_id = $1) \
           AND ($2::uuid IS NULL OR accountant_id = $2) \
           AND (NOT $3 OR (status = 'RECEIVED' AND reserved_by IS NULL)) \
         ORDER BY submitted_at, payment_id"
    );
    let rows = sqlx::query_as::<_, PaymentRow>(&sql)
        .bind(agent_id.map(|id| *id.as_uuid()))
        .bind(accountant_id.map(|id| *id.as_uuid()))
        .bind(outstanding_only)
        .fetch_all(&mut *conn)
        .await?;
    convert_all(rows)
}

pub async fn payments_by_ids(
    conn: &mut PgConnection,
    ids: &[PaymentSubmissionId],
) -> Result<Vec<PaymentSubmission>, DatabaseError> {
    let uuids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
    let sql = format!(
        "SELECT {PAYMENT_COLUMNS} FROM payment_submissions WHERE payment_id = ANY($1) FOR UPDATE"
    );
    let rows = sqlx::query_as::<_, PaymentRow>(&sql)
        .bind(&uuids)
        .fetch_all(&mut *conn)
        .await?;
    in_request_order(convert_all(rows)?, ids, |p: &PaymentSubmission| p.id, "PaymentSubmission")
}

pub async fn insert_payment(conn: &mut PgConnection, p: &PaymentSubmission) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO payment_submissions (payment_id, agent_id, accountant_id, amount, currency, notes, \
         status, reserved_by, submitted_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(p.id.as_uuid())
    .bind(p.agent_id.as_uuid())
    .bind(p.accountant_id.as_uuid())
    .bind(p.amount.amount())
    .bind(p.amount.currency().code())
    .bind(p.notes.as_deref())
    .bind(p.status.as_str())
    .bind(p.reserved_by.map(|id| *id.as_uuid()))
    .bind(p.submitted_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn update_payment(conn: &mut PgConnection, p: &PaymentSubmission) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        "UPDATE payment_submissions SET status = $2, reserved_by = $3 WHERE payment_id = $1",
    )
    .bind(p.id.as_uuid())
    .bind(p.status.as_str())
    .bind(p.reserved_by.map(|id| *id.as_uuid()))
    .execute(&mut *conn)
    .await?;
    ensure_updated(result.rows_affected(), "PaymentSubmission", p.id)
}

// ============================================================================
// Settlements
// ============================================================================

const SETTLEMENT_COLUMNS: &str = "settlement_id, agent_id, manager_id, period_start, period_end, \
     total_collected, total_commissions, amount_delivered, total_prepaid, currency, status, \
     created_by, created_at, confirmed_by, confirmed_at, rejected_by, rejected_at, \
     rejection_reason, updated_at";

const SELECT_ITEMS: &str = "SELECT settlement_id, item_type, item_id FROM settlement_items \
     WHERE settlement_id = ANY($1) ORDER BY settlement_id, position";

async fn attach_items(
    conn: &mut PgConnection,
    rows: Vec<SettlementRow>,
) -> Result<Vec<Settlement>, DatabaseError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = rows.iter().map(|r| r.settlement_id).collect();
    let items = sqlx::query_as::<_, SettlementItemRow>(SELECT_ITEMS)
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;
    rows.into_iter()
        .map(|row| settlement_from_parts(row, &items))
        .collect()
}

pub async fn settlement(
    conn: &mut PgConnection,
    id: SettlementId,
    for_update: bool,
) -> Result<Settlement, DatabaseError> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let sql = format!("SELECT {SETTLEMENT_COLUMNS} FROM settlements WHERE settlement_id = $1{lock}");
    let row = sqlx::query_as::<_, SettlementRow>(&sql)
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Settlement", id))?;
    attach_items(conn, vec![row])
        .await?
        .pop()
        .ok_or_else(|| DatabaseError::not_found("Settlement", id))
}

pub async fn open_settlement_for_agent(
    conn: &mut PgConnection,
    agent_id: ActorId,
) -> Result<Option<Settlement>, DatabaseError> {
    let sql = format!(
        "SELECT {SETTLEMENT_COLUMNS} FROM settlements \
         WHERE agent_id = $1 AND status IN ('DRAFT', 'PENDING') FOR UPDATE"
    );
    let rows = sqlx::query_as::<_, SettlementRow>(&sql)
        .bind(agent_id.as_uuid())
        .fetch_all(&mut *conn)
        .await?;
    Ok(attach_items(conn, rows).await?.pop())
}

/// Matching settlements, newest first
pub async fn list_settlements(
    conn: &mut PgConnection,
    query: &SettlementQuery,
) -> Result<Vec<Settlement>, DatabaseError> {
    let sql = format!(
        "SELECT {SETTLEMENT_COLUMNS} FROM settlements \
         WHERE ($1::uuid IS NULL OR agent_id = $1) \
           AND ($2::uuid IS NULL OR manager_id = $2) \
           AND ($3::text IS NULL OR status = $3) \
         ORDER BY created_at DESC, settlement_id DESC \
         LIMIT $4"
    );
    let rows = sqlx::query_as::<_, SettlementRow>(&sql)
        .bind(query.agent_id.map(|id| *id.as_uuid()))
        .bind(query.manager_id.map(|id| *id.as_uuid()))
        .bind(query.status.map(|s| s.as_str()))
        .bind(query.limit.map(i64::from))
        .fetch_all(&mut *conn)
        .await?;
    attach_items(conn, rows).await
}

/// Inserts the header and its snapshot items
///
/// A second open settlement for the same agent trips the partial unique
/// index and surfaces as `DuplicateEntry`.
pub async fn insert_settlement(conn: &mut PgConnection, s: &Settlement) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO settlements (settlement_id, agent_id, manager_id, period_start, period_end, \
         total_collected, total_commissions, amount_delivered, total_prepaid, currency, status, \
         created_by, created_at, confirmed_by, confirmed_at, rejected_by, rejected_at, \
         rejection_reason, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)",
    )
    .bind(s.id.as_uuid())
    .bind(s.agent_id.as_uuid())
    .bind(s.manager_id.as_uuid())
    .bind(s.period_start)
    .bind(s.period_end)
    .bind(s.total_collected.amount())
    .bind(s.total_commissions.amount())
    .bind(s.amount_delivered.amount())
    .bind(s.total_prepaid.amount())
    .bind(s.total_collected.currency().code())
    .bind(s.status.as_str())
    .bind(s.created_by.as_uuid())
    .bind(s.created_at)
    .bind(s.confirmed_by.map(|id| *id.as_uuid()))
    .bind(s.confirmed_at)
    .bind(s.rejected_by.map(|id| *id.as_uuid()))
    .bind(s.rejected_at)
    .bind(s.rejection_reason.as_deref())
    .bind(s.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| match DatabaseError::from(&e) {
        DatabaseError::DuplicateEntry(_) => {
            DatabaseError::duplicate("Open settlement", "agent_id", s.agent_id)
        }
        other => other,
    })?;

    let items = s
        .collection_ids
        .iter()
        .map(|id| (ITEM_COLLECTION, id.as_uuid()))
        .chain(s.commission_ids.iter().map(|id| (ITEM_COMMISSION, id.as_uuid())))
        .chain(s.payment_ids.iter().map(|id| (ITEM_PAYMENT, id.as_uuid())));

    for (position, (item_type, item_id)) in items.enumerate() {
        sqlx::query(
            "INSERT INTO settlement_items (settlement_id, item_type, item_id, position) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(s.id.as_uuid())
        .bind(item_type)
        .bind(item_id)
        .bind(position as i32)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Writes the lifecycle columns; totals and items never change after insert
pub async fn update_settlement(conn: &mut PgConnection, s: &Settlement) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        "UPDATE settlements SET status = $2, confirmed_by = $3, confirmed_at = $4, \
         rejected_by = $5, rejected_at = $6, rejection_reason = $7, updated_at = $8 \
         WHERE settlement_id = $1",
    )
    .bind(s.id.as_uuid())
    .bind(s.status.as_str())
    .bind(s.confirmed_by.map(|id| *id.as_uuid()))
    .bind(s.confirmed_at)
    .bind(s.rejected_by.map(|id| *id.as_uuid()))
    .bind(s.rejected_at)
    .bind(s.rejection_reason.as_deref())
    .bind(s.updated_at)
    .execute(&mut *conn)
    .await?;
    ensure_updated(result.rows_affected(), "Settlement", s.id)
}

// ============================================================================
// Audit log
// ============================================================================

pub async fn append_audit(conn: &mut PgConnection, entry: &AuditEntry) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO audit_entries (audit_id, action, entity_type, entity_id, previous_status, \
         new_status, performed_by, occurred_at, changes) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(entry.id.as_uuid())
    .bind(entry.action.as_str())
    .bind(&entry.entity_type)
    .bind(entry.entity_id)
    .bind(entry.previous_status.as_deref())
    .bind(entry.new_status.as_deref())
    .bind(entry.performed_by.as_uuid())
    .bind(entry.timestamp)
    .bind(&entry.changes)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Matching entries, newest first
pub async fn list_audit(conn: &mut PgConnection, query: &AuditQuery) -> Result<Vec<AuditEntry>, DatabaseError> {
    let rows = sqlx::query_as::<_, AuditRow>(
        "SELECT audit_id, action, entity_type, entity_id, previous_status, new_status, \
         performed_by, occurred_at, changes \
         FROM audit_entries \
         WHERE ($1::text IS NULL OR action = $1) \
           AND ($2::uuid IS NULL OR performed_by = $2) \
           AND ($3::uuid IS NULL OR entity_id = $3) \
         ORDER BY occurred_at DESC, audit_id DESC \
         LIMIT $4",
    )
    .bind(query.action.map(|a| a.as_str()))
    .bind(query.performed_by.map(|id| *id.as_uuid()))
    .bind(query.entity_id)
    .bind(query.effective_limit() as i64)
    .fetch_all(&mut *conn)
    .await?;
    convert_all(rows)
}

fn ensure_updated(rows: u64, entity: &str, id: impl std::fmt::Display) -> Result<(), DatabaseError> {
    if rows == 0 {
        return Err(DatabaseError::not_found(entity, id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn settlement_row(id: Uuid) -> SettlementRow {
        let now = Utc::now();
        SettlementRow {
            settlement_id: id,
            agent_id: Uuid::now_v7(),
            manager_id: Uuid::now_v7(),
            period_start: now,
            period_end: now,
            total_collected: dec!(50000),
            total_commissions: dec!(5000),
            amount_delivered: dec!(45000),
            total_prepaid: dec!(0),
            currency: "IQD".to_string(),
            status: "PENDING".to_string(),
            created_by: Uuid::now_v7(),
            created_at: now,
            confirmed_by: None,
            confirmed_at: None,
            rejected_by: None,
            rejected_at: None,
            rejection_reason: None,
            updated_at: now,
        }
    }

    #[test]
    fn test_settlement_items_are_split_by_type() {
        let id = Uuid::now_v7();
        let other = Uuid::now_v7();
        let items = vec![
            SettlementItemRow { settlement_id: id, item_type: "collection".into(), item_id: Uuid::now_v7() },
            SettlementItemRow { settlement_id: id, item_type: "commission".into(), item_id: Uuid::now_v7() },
            SettlementItemRow { settlement_id: other, item_type: "collection".into(), item_id: Uuid::now_v7() },
            SettlementItemRow { settlement_id: id, item_type: "payment".into(), item_id: Uuid::now_v7() },
        ];

        let settlement = settlement_from_parts(settlement_row(id), &items).unwrap();
        assert_eq!(settlement.collection_ids.len(), 1);
        assert_eq!(settlement.commission_ids.len(), 1);
        assert_eq!(settlement.payment_ids.len(), 1);
        assert_eq!(settlement.status, SettlementStatus::Pending);
        assert_eq!(settlement.amount_delivered.currency(), Currency::IQD);
    }

    #[test]
    fn test_unknown_status_is_a_decode_error() {
        let mut row = settlement_row(Uuid::now_v7());
        row.status = "ARCHIVED".to_string();
        let result = settlement_from_parts(row, &[]);
        assert!(matches!(result, Err(DatabaseError::SerializationError(_))));
    }

    #[test]
    fn test_commission_row_conversion() {
        let now = Utc::now();
        let row = CommissionRow {
            commission_id: Uuid::now_v7(),
            agent_id: Uuid::now_v7(),
            collection_id: None,
            event_type: "RENEWAL".to_string(),
            base_amount: dec!(50000),
            rate: dec!(10),
            amount: dec!(5000),
            currency: "IQD".to_string(),
            status: "APPROVED".to_string(),
            reserved_by: None,
            created_at: now,
            updated_at: now,
        };

        let commission = Commission::try_from(row).unwrap();
        assert_eq!(commission.event_type, CommissionEventType::Renewal);
        assert_eq!(commission.rate.as_percentage(), dec!(10));
        assert!(commission.is_outstanding());
    }

    #[test]
    fn test_missing_ids_are_reported() {
        let present = CollectionId::new();
        let missing = CollectionId::new();
        let result = in_request_order(vec![present], &[present, missing], |id| *id, "Collection");
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
    }

    #[test]
    fn test_request_order_is_restored() {
        let a = CollectionId::new();
        let b = CollectionId::new();
        let ordered = in_request_order(vec![a, b], &[b, a], |id| *id, "Collection").unwrap();
        assert_eq!(ordered, vec![b, a]);
    }
}
