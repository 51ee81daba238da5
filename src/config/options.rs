use crate::utils::error::Result;
use crate::utils::validation::{validate_positive_number, validate_range, Validate};
use std::collections::BTreeMap;
use std::time::Duration;

/// Setting that makes select results come back as CSV with a header row.
pub const OUTPUT_FORMAT_SETTING: &str = "odps.sql.select.output.format";

/// Tuning knobs for talking to the service.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    /// Upper bound on how long one statement may run before giving up.
    pub max_wait: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    /// Job priority, 0 (highest) to 9.
    pub priority: u32,
    /// Extra SQL settings sent with every statement.
    pub settings: BTreeMap<String, String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
            max_wait: Duration::from_secs(24 * 60 * 60),
            retry_attempts: 3,
            retry_delay: Duration::from_millis(500),
            priority: 9,
            settings: BTreeMap::new(),
        }
    }
}

impl ClientOptions {
    /// JSON object for the SQL task's `settings` property.
    pub fn settings_json(&self) -> Result<String> {
        let mut settings = self.settings.clone();
        settings.insert(OUTPUT_FORMAT_SETTING.to_string(), "csv".to_string());
        Ok(serde_json::to_string(&settings)?)
    }
}

impl Validate for ClientOptions {
    fn validate(&self) -> Result<()> {
        validate_positive_number(
            "client.request_timeout_seconds",
            self.request_timeout.as_millis() as u64,
            1,
        )?;
        validate_positive_number(
            "client.poll_interval_ms",
            self.poll_interval.as_millis() as u64,
            1,
        )?;
        validate_positive_number("client.max_wait_seconds", self.max_wait.as_millis() as u64, 1)?;
        validate_range("client.retry_attempts", self.retry_attempts, 0, 10)?;
        validate_range("client.priority", self.priority, 0, 9)?;
        Ok(())
    }
}
