//! PostgreSQL Directory Adapter
//!
//! Read-only `DirectoryPort` over the CRUD layer's tables.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use core_kernel::{
    ActorId, BusinessId, DomainPort, HealthCheckResult, HealthCheckable, PackageId, PortError,
};
use domain_settlement::{ActorProfile, AgentProfile, Business, DirectoryPort, Package};

use crate::adapters::settlement::ping;
use crate::error::DatabaseError;
use crate::repositories::directory as repo;

#[derive(Debug, Clone)]
pub struct PostgresDirectory {
    pool: PgPool,
}

impl PostgresDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PostgresDirectory {}

#[async_trait]
impl HealthCheckable for PostgresDirectory {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-directory").await
    }
}

#[async_trait]
impl DirectoryPort for PostgresDirectory {
    #[instrument(skip(self))]
    async fn resolve_actor(&self, id: ActorId) -> Result<ActorProfile, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(repo::actor(&mut conn, id).await?)
    }

    #[instrument(skip(self))]
    async fn get_agent(&self, id: ActorId) -> Result<AgentProfile, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(repo::agent(&mut conn, id).await?)
    }

    #[instrument(skip(self))]
    async fn get_business(&self, id: BusinessId) -> Result<Business, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(repo::business(&mut conn, id).await?)
    }

    #[instrument(skip(self))]
    async fn get_package(&self, id: PackageId) -> Result<Package, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(repo::package(&mut conn, id).await?)
    }
}
