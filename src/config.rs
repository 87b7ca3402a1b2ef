//! Environment-based Configuration
//!
//! Configuration loading from environment variables. Development defaults
//! exist for everything except the platform deposit addresses, which have no
//! sane fallback: a network without a configured address simply can never
//! produce a matching recipient.
//!
//! # Environment Variables
//!
//! - `STAKEVAULT_LOOKUP_URL` - Base URL of the transaction lookup service
//! - `STAKEVAULT_PROBE_TIMEOUT_MS` - Bounded wait per network probe
//! - `STAKEVAULT_API_PORT` - REST API port (default: 3001)
//! - `STAKEVAULT_LOG_LEVEL` - Logging level (trace, debug, info, warn, error)
//! - `STAKEVAULT_LOG_JSON` - Set to "1" for JSON log output
//! - `STAKEVAULT_BSC_ADDRESS` - Platform deposit address on BSC
//! - `STAKEVAULT_ETHEREUM_ADDRESS` - Platform deposit address on Ethereum
//! - `STAKEVAULT_POLYGON_ADDRESS` - Platform deposit address on Polygon
//! - `STAKEVAULT_TRON_ADDRESS` - Platform deposit address on TRON

use std::env;

use thiserror::Error;

use crate::reconciler::registry::KnownAddressRegistry;
use crate::reconciler::types::{Network, ReconcilerConfig};

/// Default lookup service for development
pub const DEFAULT_LOOKUP_URL: &str = "http://localhost:8545/scan";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct StakeVaultConfig {
    /// Transaction lookup service base URL
    pub lookup_url: String,

    /// Bounded wait per network probe, in milliseconds
    pub probe_timeout_ms: u64,

    /// REST API port
    pub api_port: u16,

    /// Platform deposit address per network (missing entries stay unset)
    pub deposit_addresses: Vec<(Network, String)>,

    /// Log level
    pub log_level: String,

    /// JSON log output
    pub log_json: bool,
}

impl StakeVaultConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let lookup_url =
            env::var("STAKEVAULT_LOOKUP_URL").unwrap_or_else(|_| DEFAULT_LOOKUP_URL.to_string());

        let probe_timeout_ms = parse_env_or("STAKEVAULT_PROBE_TIMEOUT_MS", 8_000)?;
        let api_port: u16 = parse_env_or("STAKEVAULT_API_PORT", 3001)?;

        let mut deposit_addresses = Vec::new();
        for network in Network::ALL {
            let var = format!("STAKEVAULT_{}_ADDRESS", network.slug().to_uppercase());
            if let Ok(address) = env::var(&var) {
                if !address.trim().is_empty() {
                    deposit_addresses.push((network, address));
                }
            }
        }

        let log_level = env::var("STAKEVAULT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_json = env::var("STAKEVAULT_LOG_JSON")
            .map(|v| v == "1")
            .unwrap_or(false);

        Ok(Self {
            lookup_url,
            probe_timeout_ms,
            api_port,
            deposit_addresses,
            log_level,
            log_json,
        })
    }

    /// Registry of platform deposit addresses
    pub fn address_registry(&self) -> KnownAddressRegistry {
        KnownAddressRegistry::from_pairs(self.deposit_addresses.iter().cloned())
    }

    /// Reconciler configuration derived from this config
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            probe_timeout_ms: self.probe_timeout_ms,
            networks: Network::ALL.to_vec(),
        }
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("=== StakeVault Configuration ===");
        println!("Lookup URL: {}", self.lookup_url);
        println!("Probe Timeout: {} ms", self.probe_timeout_ms);
        println!("API Port: {}", self.api_port);
        for (network, address) in &self.deposit_addresses {
            println!("Deposit Address [{}]: {}", network, address);
        }
        println!("Log Level: {}", self.log_level);
        println!("================================");
    }
}

/// Parse an env var, falling back to a default when unset
fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(var.to_string(), value)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_or_default() {
        let value: u64 = parse_env_or("STAKEVAULT_TEST_UNSET_VAR", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_registry_from_config() {
        let config = StakeVaultConfig {
            lookup_url: DEFAULT_LOOKUP_URL.to_string(),
            probe_timeout_ms: 8_000,
            api_port: 3001,
            deposit_addresses: vec![(Network::Bsc, "0xabc".to_string())],
            log_level: "info".to_string(),
            log_json: false,
        };

        let registry = config.address_registry();
        assert_eq!(registry.address_for(Network::Bsc), Some("0xabc"));
        assert!(registry.address_for(Network::Tron).is_none());
    }
}
