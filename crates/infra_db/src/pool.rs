//! Database connection pool management
//!
//! Settlement writes serialize on per-agent row locks, so every pooled
//! connection carries a `lock_timeout`: a request stuck behind another
//! settlement for the same agent gives up with SQLSTATE 55P03, which the
//! error layer reports as a conflict instead of hanging the caller.

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::DatabaseError;

/// Type alias for the PostgreSQL connection pool
pub type DatabasePool = PgPool;

const APPLICATION_NAME: &str = "settlement-engine";

/// Connection pool and session settings
///
/// # Example
///
/// ```rust
/// use infra_db::DatabaseConfig;
/// use std::time::Duration;
///
/// let config = DatabaseConfig::new("postgres://localhost/settlement")
///     .max_connections(20)
///     .lock_timeout(Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long to wait for a pooled connection
    pub connect_timeout: Duration,
    pub max_lifetime: Duration,
    pub idle_timeout: Duration,
    /// Longest wait for a row lock before the statement fails
    pub lock_timeout: Duration,
    /// Longest any single statement may run
    pub statement_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 2,
            connect_timeout: Duration::from_secs(30),
            max_lifetime: Duration::from_secs(30 * 60),
            idle_timeout: Duration::from_secs(10 * 60),
            lock_timeout: Duration::from_secs(5),
            statement_timeout: Duration::from_secs(30),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    /// Session parameters applied to every connection at startup
    fn session_options(&self) -> [(&'static str, String); 2] {
        [
            ("lock_timeout", format!("{}ms", self.lock_timeout.as_millis())),
            ("statement_timeout", format!("{}ms", self.statement_timeout.as_millis())),
        ]
    }

    fn connect_options(&self) -> Result<PgConnectOptions, DatabaseError> {
        let options = PgConnectOptions::from_str(&self.url)
            .map_err(|e| DatabaseError::ConnectionFailed(format!("invalid database url: {}", e)))?;
        Ok(options
            .application_name(APPLICATION_NAME)
            .options(self.session_options()))
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new("postgres://localhost/settlement")
    }
}

/// Creates a database connection pool with the given configuration
///
/// # Errors
///
/// Returns `DatabaseError::ConnectionFailed` if the URL is malformed or the
/// pool cannot reach the server
pub async fn create_pool(config: DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        lock_timeout_ms = config.lock_timeout.as_millis() as u64,
        "Creating database pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout)
        .max_lifetime(config.max_lifetime)
        .idle_timeout(config.idle_timeout)
        .connect_with(config.connect_options()?)
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

    info!("Database pool created");
    Ok(pool)
}

/// Creates a connection pool from a URL string with default settings
pub async fn create_pool_from_url(url: &str) -> Result<DatabasePool, DatabaseError> {
    create_pool(DatabaseConfig::new(url)).await
}

/// Applies the workspace migrations that have not run yet
///
/// # Errors
///
/// Returns `DatabaseError::MigrationFailed` if any migration fails
pub async fn run_migrations(pool: &DatabasePool) -> Result<(), DatabaseError> {
    info!("Applying database migrations");
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = DatabaseConfig::new("postgres://test")
            .max_connections(50)
            .min_connections(10)
            .lock_timeout(Duration::from_millis(1500));

        assert_eq!(config.max_connections, 50);
        assert_eq!(config.min_connections, 10);
        assert_eq!(config.lock_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_default_targets_settlement_database() {
        let config = DatabaseConfig::default();
        assert_eq!(config.url, "postgres://localhost/settlement");
        assert_eq!(config.lock_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_session_options_use_milliseconds() {
        let config = DatabaseConfig::default().statement_timeout(Duration::from_secs(2));
        let options = config.session_options();
        assert_eq!(options[0], ("lock_timeout", "5000ms".to_string()));
        assert_eq!(options[1], ("statement_timeout", "2000ms".to_string()));
    }

    #[test]
    fn test_malformed_url_is_a_connection_error() {
        let result = DatabaseConfig::new("not a url").connect_options();
        assert!(matches!(result, Err(DatabaseError::ConnectionFailed(_))));
    }
}
