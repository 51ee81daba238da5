use crate::config::options::ClientOptions;
use crate::domain::datasource::Datasource;
use crate::utils::error::{DbError, Result};
use crate::utils::validation::Validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    pub datasource: DatasourceConfig,
    pub client: Option<ClientConfig>,
    pub settings: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasourceConfig {
    pub uri: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    pub request_timeout_seconds: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub max_wait_seconds: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub priority: Option<u32>,
}

impl ConnectorConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(DbError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Parses TOML after replacing `${VAR}` with environment values.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| DbError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    // unknown variables stay as written so the error later names them
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| DbError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn datasource(&self) -> Result<Datasource> {
        Datasource::parse(&self.datasource.uri)
    }

    /// Defaults overridden by the `[client]` and `[settings]` tables.
    pub fn client_options(&self) -> ClientOptions {
        let mut options = ClientOptions::default();

        if let Some(client) = &self.client {
            if let Some(secs) = client.request_timeout_seconds {
                options.request_timeout = Duration::from_secs(secs);
            }
            if let Some(ms) = client.poll_interval_ms {
                options.poll_interval = Duration::from_millis(ms);
            }
            if let Some(secs) = client.max_wait_seconds {
                options.max_wait = Duration::from_secs(secs);
            }
            if let Some(attempts) = client.retry_attempts {
                options.retry_attempts = attempts;
            }
            if let Some(ms) = client.retry_delay_ms {
                options.retry_delay = Duration::from_millis(ms);
            }
            if let Some(priority) = client.priority {
                options.priority = priority;
            }
        }

        if let Some(settings) = &self.settings {
            options.settings.extend(settings.clone());
        }

        options
    }
}

impl Validate for ConnectorConfig {
    fn validate(&self) -> Result<()> {
        self.datasource()?;
        self.client_options().validate()
    }
}
