//! Server Configuration
//!
//! Read from environment variables (after `.env` is loaded).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fund_backtest::PriceProvider;
use fund_backtest::provider::{HttpProvider, MockPriceProvider, ScriptProvider};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{key} is not valid: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("{0} must be set for the selected provider")]
    Missing(&'static str),

    #[error(transparent)]
    Provider(#[from] fund_backtest::BacktestError),
}

/// Where price series come from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderConfig {
    Script { interpreter: String, script: PathBuf },
    Http { base_url: String },
    Mock,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub provider: ProviderConfig,

    /// Caller-level bound on fetching plus simulating one request
    pub request_timeout: Duration,

    pub static_dir: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into());

        let request_timeout = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(value) => value
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or(ConfigError::Invalid {
                    key: "REQUEST_TIMEOUT_SECS",
                    value,
                })?,
            None => Duration::from_secs(30),
        };

        let script = lookup("FUND_DATA_SCRIPT");
        let kind = lookup("FUND_PROVIDER")
            .map(|k| k.trim().to_ascii_lowercase())
            .unwrap_or_else(|| if script.is_some() { "script".into() } else { "mock".into() });

        let provider = match kind.as_str() {
            "script" => ProviderConfig::Script {
                interpreter: lookup("PYTHON_BIN").unwrap_or_else(|| "python3".into()),
                script: script.map(PathBuf::from).ok_or(ConfigError::Missing("FUND_DATA_SCRIPT"))?,
            },
            "http" => ProviderConfig::Http {
                base_url: lookup("FUND_PROVIDER_URL").ok_or(ConfigError::Missing("FUND_PROVIDER_URL"))?,
            },
            "mock" => ProviderConfig::Mock,
            _ => {
                return Err(ConfigError::Invalid {
                    key: "FUND_PROVIDER",
                    value: kind,
                });
            }
        };

        Ok(Self {
            bind_addr,
            provider,
            request_timeout,
            static_dir: lookup("STATIC_DIR").map_or_else(|| PathBuf::from("static"), PathBuf::from),
        })
    }

    pub fn build_provider(&self) -> Result<Arc<dyn PriceProvider>, ConfigError> {
        let provider: Arc<dyn PriceProvider> = match &self.provider {
            ProviderConfig::Script {
                interpreter,
                script,
            } => Arc::new(
                ScriptProvider::new(interpreter.clone(), script.clone())
                    .with_timeout(self.request_timeout),
            ),
            ProviderConfig::Http { base_url } => {
                Arc::new(HttpProvider::new(base_url.clone(), self.request_timeout)?)
            }
            ProviderConfig::Mock => Arc::new(MockPriceProvider::new()),
        };
        Ok(provider)
    }
}
