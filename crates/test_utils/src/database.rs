//! Database Test Utilities
//!
//! Starts a throwaway PostgreSQL container, applies the settlement schema and
//! seeds the directory tables that the CRUD layer owns in production.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

use domain_settlement::{ActorProfile, AgentProfile, Business, Package};

/// Default PostgreSQL image for testing
const POSTGRES_IMAGE: &str = "postgres";
const POSTGRES_TAG: &str = "16-alpine";
const POSTGRES_USER: &str = "test_user";
const POSTGRES_PASSWORD: &str = "test_password";
const POSTGRES_DB: &str = "settlement_test";

/// Configuration for test database
#[derive(Debug, Clone)]
pub struct TestDatabaseConfig {
    pub user: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: u16,
}

impl Default for TestDatabaseConfig {
    fn default() -> Self {
        Self {
            user: POSTGRES_USER.to_string(),
            password: POSTGRES_PASSWORD.to_string(),
            database: POSTGRES_DB.to_string(),
            host: "localhost".to_string(),
            port: 5432,
        }
    }
}

impl TestDatabaseConfig {
    /// Creates the database connection URL
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

/// A wrapper around a PostgreSQL test container
pub struct TestDatabase {
    _container: ContainerAsync<GenericImage>,
    pub config: TestDatabaseConfig,
    pub pool: PgPool,
}

impl TestDatabase {
    /// Starts a new PostgreSQL container for testing
    ///
    /// # Returns
    ///
    /// A new TestDatabase instance with an initialized schema
    ///
    /// # Errors
    ///
    /// Returns an error if the container fails to start or schema fails to initialize
    pub async fn new() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        // Create and start the container
        let container = GenericImage::new(POSTGRES_IMAGE, POSTGRES_TAG)
            .with_exposed_port(5432.tcp())
            .with_wait_for(WaitFor::message_on_stderr("database system is ready to accept connections"))
            .with_env_var("POSTGRES_USER", POSTGRES_USER)
            .with_env_var("POSTGRES_PASSWORD", POSTGRES_PASSWORD)
            .with_env_var("POSTGRES_DB", POSTGRES_DB)
            .start()
            .await?;

        // Get the mapped port
        let port = container.get_host_port_ipv4(5432).await?;
        let host = container.get_host().await?.to_string();

        let config = TestDatabaseConfig {
            user: POSTGRES_USER.to_string(),
            password: POSTGRES_PASSWORD.to_string(),
            database: POSTGRES_DB.to_string(),
            host,
            port,
        };

        // Create connection pool
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.connection_url())
            .await?;

        let test_db = Self {
            _container: container,
            config,
            pool,
        };

        // Initialize schema
        test_db.init_schema().await?;

        Ok(test_db)
    }

    /// Initializes the database schema from the migrations file
    async fn init_schema(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let schema = include_str!("../../../migrations/20260101_000001_settlement_schema.sql");
        sqlx::raw_sql(schema).execute(&self.pool).await?;
        Ok(())
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Inserts an actor and its governorate assignments
    pub async fn seed_actor(&self, actor: &ActorProfile) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO actors (actor_id, role, display_name, is_active) VALUES ($1, $2, $3, $4)",
        )
        .bind(actor.id.as_uuid())
        .bind(actor.role.as_str())
        .bind(&actor.display_name)
        .bind(actor.is_active)
        .execute(&self.pool)
        .await?;

        for governorate in &actor.governorates {
            sqlx::query("INSERT INTO actor_governorates (actor_id, governorate_id) VALUES ($1, $2)")
                .bind(actor.id.as_uuid())
                .bind(governorate.as_uuid())
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    /// Inserts the agent profile row; the actor must already exist
    pub async fn seed_agent_profile(&self, agent: &AgentProfile) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO agent_profiles (agent_id, commission_rate, rate_active, base_salary, currency) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(agent.agent_id.as_uuid())
        .bind(agent.commission_rate.map(|r| r.as_percentage()))
        .bind(agent.rate_active)
        .bind(agent.base_salary.amount())
        .bind(agent.base_salary.currency().code())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn seed_business(&self, business: &Business) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO businesses (business_id, name, governorate_id) VALUES ($1, $2, $3)")
            .bind(business.id.as_uuid())
            .bind(&business.name)
            .bind(business.governorate_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn seed_package(&self, package: &Package) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO packages (package_id, name, price, currency, is_active) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(package.id.as_uuid())
        .bind(&package.name)
        .bind(package.price.amount())
        .bind(package.price.currency().code())
        .bind(package.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_connection_url() {
        let config = TestDatabaseConfig::default();
        let url = config.connection_url();

        assert!(url.starts_with("postgres://"));
        assert!(url.contains(POSTGRES_USER));
        assert!(url.contains(POSTGRES_DB));
    }
}
