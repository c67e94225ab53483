//! Directory Repository
//!
//! Read-only queries over actors, governorate assignments, agent profiles,
//! businesses and packages.

use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use std::collections::BTreeSet;
use std::str::FromStr;
use uuid::Uuid;

use core_kernel::{ActorId, BusinessId, Currency, GovernorateId, Money, PackageId, Rate};
use domain_settlement::{ActorProfile, AgentProfile, Business, Package, Role};

use crate::error::DatabaseError;

#[derive(Debug, Clone, FromRow)]
pub struct ActorRow {
    pub actor_id: Uuid,
    pub role: String,
    pub display_name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct AgentProfileRow {
    pub agent_id: Uuid,
    pub commission_rate: Option<Decimal>,
    pub rate_active: bool,
    pub base_salary: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct BusinessRow {
    pub business_id: Uuid,
    pub name: String,
    pub governorate_id: Uuid,
}

#[derive(Debug, Clone, FromRow)]
pub struct PackageRow {
    pub package_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub currency: String,
    pub is_active: bool,
}

fn currency(code: &str) -> Result<Currency, DatabaseError> {
    Currency::from_str(code).map_err(|e| DatabaseError::decode("currency", e))
}

async fn governorates(
    conn: &mut PgConnection,
    actor_id: ActorId,
) -> Result<BTreeSet<GovernorateId>, DatabaseError> {
    let ids = sqlx::query_scalar::<_, Uuid>(
        "SELECT governorate_id FROM actor_governorates WHERE actor_id = $1",
    )
    .bind(actor_id.as_uuid())
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids.into_iter().map(GovernorateId::from_uuid).collect())
}

pub async fn actor(conn: &mut PgConnection, id: ActorId) -> Result<ActorProfile, DatabaseError> {
    let row = sqlx::query_as::<_, ActorRow>(
        "SELECT actor_id, role, display_name, is_active FROM actors WHERE actor_id = $1",
    )
    .bind(id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Actor", id))?;

    Ok(ActorProfile {
        id: ActorId::from_uuid(row.actor_id),
        role: Role::from_str(&row.role).map_err(|e| DatabaseError::decode("role", e))?,
        display_name: row.display_name,
        governorates: governorates(conn, id).await?,
        is_active: row.is_active,
    })
}

/// Agent profile; actors without a profile row are not agents
pub async fn agent(conn: &mut PgConnection, id: ActorId) -> Result<AgentProfile, DatabaseError> {
    let row = sqlx::query_as::<_, AgentProfileRow>(
        "SELECT p.agent_id, p.commission_rate, p.rate_active, p.base_salary, p.currency \
         FROM agent_profiles p JOIN actors a ON a.actor_id = p.agent_id \
         WHERE p.agent_id = $1 AND a.role = 'agent'",
    )
    .bind(id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Agent", id))?;

    let commission_rate = row
        .commission_rate
        .map(Rate::from_percentage)
        .transpose()
        .map_err(|e| DatabaseError::decode("commission_rate", e))?;

    Ok(AgentProfile {
        agent_id: ActorId::from_uuid(row.agent_id),
        governorates: governorates(conn, id).await?,
        commission_rate,
        rate_active: row.rate_active,
        base_salary: Money::new(row.base_salary, currency(&row.currency)?),
    })
}

pub async fn business(conn: &mut PgConnection, id: BusinessId) -> Result<Business, DatabaseError> {
    let row = sqlx::query_as::<_, BusinessRow>(
        "SELECT business_id, name, governorate_id FROM businesses WHERE business_id = $1",
    )
    .bind(id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Business", id))?;

    Ok(Business {
        id: BusinessId::from_uuid(row.business_id),
        name: row.name,
        governorate_id: GovernorateId::from_uuid(row.governorate_id),
    })
}

pub async fn package(conn: &mut PgConnection, id: PackageId) -> Result<Package, DatabaseError> {
    let row = sqlx::query_as::<_, PackageRow>(
        "SELECT package_id, name, price, currency, is_active FROM packages WHERE package_id = $1",
    )
    .bind(id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Package", id))?;

    Ok(Package {
        id: PackageId::from_uuid(row.package_id),
        name: row.name,
        price: Money::new(row.price, currency(&row.currency)?),
        is_active: row.is_active,
    })
}
