//! API configuration

use serde::Deserialize;
use std::time::Duration;

use core_kernel::Currency;
use domain_settlement::EngineConfig;

/// API configuration
///
/// Every field can be overridden through an `API_`-prefixed environment
/// variable (`API_PORT`, `API_JWT_SECRET`, `API_CURRENCY`, ...). Unset
/// fields keep their defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Database URL
    pub database_url: String,
    /// Log level
    pub log_level: String,
    /// Operating currency of the platform
    pub currency: Currency,
    /// Create commissions already approved
    pub auto_approve_commissions: bool,
    /// Seconds a displayed balance may be served from cache
    pub balance_cache_ttl_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/settlement".to_string(),
            log_level: "info".to_string(),
            currency: Currency::IQD,
            auto_approve_commissions: false,
            balance_cache_ttl_secs: 30,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Settlement engine settings carried by this configuration
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            currency: self.currency,
            auto_approve_commissions: self.auto_approve_commissions,
            balance_cache_ttl: Duration::from_secs(self.balance_cache_ttl_secs),
        }
    }
}
