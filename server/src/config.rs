//! Process configuration.
//!
//! All values come from the environment (a `.env` file is honored by the
//! binary). The ledger endpoint, program address, write credential, and
//! commitment secret are required: a process without them cannot do anything
//! meaningful, so absence is a fatal startup condition rather than a
//! defaulted one.

use std::env;
use std::time::Duration;

use thiserror::Error;
use ticket_registry_core::{CommitmentSecret, SigningKey};

/// Fatal configuration problems. The process logs these and refuses to
/// start.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is unset or empty.
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
}

/// Ledger connection settings.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint of the registry node.
    pub rpc_url: String,
    /// Address the registry program is deployed at.
    pub program_address: String,
    /// System credential for registration, use-marking, and event creation.
    pub write_key: SigningKey,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Bounded retries for ledger reads.
    pub read_retries: usize,
    /// Receipt polls before a write is reported transient.
    pub finality_attempts: u32,
    /// Delay between receipt polls.
    pub finality_interval: Duration,
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
}

/// Complete application configuration.
///
/// The secret and write key are redacted-by-type; deriving `Debug` here is
/// safe.
#[derive(Debug, Clone)]
pub struct Config {
    /// Ledger connection settings.
    pub ledger: LedgerConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
    /// The process-wide commitment secret.
    pub commitment_secret: CommitmentSecret,
}

impl Config {
    /// Loads configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is missing.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads configuration through an arbitrary lookup, so tests can inject
    /// variables without mutating the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::MissingVar(name))
        };
        let parsed = |name: &str, default: u64| -> u64 {
            lookup(name)
                .and_then(|value| value.parse().ok())
                .unwrap_or(default)
        };

        Ok(Self {
            ledger: LedgerConfig {
                rpc_url: required("REGISTRY_RPC_URL")?,
                program_address: required("REGISTRY_PROGRAM_ADDRESS")?,
                write_key: SigningKey::new(required("REGISTRY_WRITE_KEY")?),
                request_timeout: Duration::from_secs(parsed("LEDGER_REQUEST_TIMEOUT_SECS", 10)),
                read_retries: usize::try_from(parsed("LEDGER_READ_RETRIES", 2))
                    .unwrap_or(usize::MAX),
                finality_attempts: u32::try_from(parsed("FINALITY_POLL_ATTEMPTS", 20))
                    .unwrap_or(u32::MAX),
                finality_interval: Duration::from_millis(parsed(
                    "FINALITY_POLL_INTERVAL_MS",
                    500,
                )),
            },
            server: ServerConfig {
                host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: lookup("PORT")
                    .and_then(|value| value.parse().ok())
                    .unwrap_or(4000),
            },
            commitment_secret: CommitmentSecret::new(
                required("COMMITMENT_SECRET")?.into_bytes(),
            ),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("REGISTRY_RPC_URL", "http://127.0.0.1:8545"),
            ("REGISTRY_PROGRAM_ADDRESS", "0xprogram"),
            ("REGISTRY_WRITE_KEY", "admin-key"),
            ("COMMITMENT_SECRET", "test-secret"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|name| env.get(name).map(ToString::to_string))
    }

    #[test]
    fn loads_with_required_values_and_defaults() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.ledger.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.ledger.read_retries, 2);
        assert_eq!(config.ledger.finality_attempts, 20);
        assert_eq!(config.ledger.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn each_required_variable_is_fatal_when_missing() {
        for name in [
            "REGISTRY_RPC_URL",
            "REGISTRY_PROGRAM_ADDRESS",
            "REGISTRY_WRITE_KEY",
            "COMMITMENT_SECRET",
        ] {
            let mut env = base_env();
            env.remove(name);
            let err = load(&env).unwrap_err();
            assert!(matches!(err, ConfigError::MissingVar(missing) if missing == name));
        }
    }

    #[test]
    fn empty_required_values_count_as_missing() {
        let mut env = base_env();
        env.insert("COMMITMENT_SECRET", "");
        assert!(load(&env).is_err());
    }

    #[test]
    fn optional_overrides_are_applied() {
        let mut env = base_env();
        env.insert("PORT", "8080");
        env.insert("LEDGER_READ_RETRIES", "5");
        let config = load(&env).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.ledger.read_retries, 5);
    }

    #[test]
    fn debug_output_never_contains_secrets() {
        let rendered = format!("{:?}", load(&base_env()).unwrap());
        assert!(!rendered.contains("admin-key"));
        assert!(!rendered.contains("test-secret"));
    }
}
