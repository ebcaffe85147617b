//! Project configuration file
//!
//! One JSON file describes one vended account plus how to reach the catalog
//! and where to keep state.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use vendo_core::lifecycle::{LifecycleConfig, Operation};
use vendo_core::request::AccountDefinition;
use vendo_state::BackendConfig;

/// Region used when neither the file nor the command line names one
pub const DEFAULT_REGION: &str = "us-east-1";

/// Longest accepted operation timeout (one week)
pub const MAX_TIMEOUT_MINUTES: u64 = 7 * 24 * 60;

/// Extra lock lifetime on top of the operation timeout
const LOCK_MARGIN_MINUTES: i64 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    #[serde(flatten)]
    pub account: AccountDefinition,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_timeout_minutes")]
    pub create_minutes: u64,
    #[serde(default = "default_timeout_minutes")]
    pub delete_minutes: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create_minutes: default_timeout_minutes(),
            delete_minutes: default_timeout_minutes(),
        }
    }
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_timeout_minutes() -> u64 {
    60
}

fn default_poll_interval_secs() -> u64 {
    10
}

impl ProjectConfig {
    /// Read and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        let config = Self::parse(&content)
            .map_err(|e| format!("Invalid configuration {}: {}", path.display(), e))?;
        log::debug!(
            "Loaded configuration for {} from {}",
            config.account.name,
            path.display()
        );
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        let config: Self = serde_json::from_str(content).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.poll_interval_secs == 0 {
            return Err("poll_interval_secs must be greater than 0".to_string());
        }
        for minutes in [self.timeouts.create_minutes, self.timeouts.delete_minutes] {
            if minutes == 0 || minutes > MAX_TIMEOUT_MINUTES {
                return Err(format!(
                    "timeouts must be between 1 and {} minutes, got {}",
                    MAX_TIMEOUT_MINUTES, minutes
                ));
            }
        }
        if self.region.trim().is_empty() {
            return Err("region must not be empty".to_string());
        }
        Ok(())
    }

    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            create_timeout: minutes(self.timeouts.create_minutes),
            delete_timeout: minutes(self.timeouts.delete_minutes),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
        }
    }

    /// How long a state lock taken for `operation` stays valid
    pub fn lock_ttl(&self, operation: Operation) -> chrono::Duration {
        let timeout_minutes = match operation {
            Operation::Create => self.timeouts.create_minutes,
            Operation::Delete => self.timeouts.delete_minutes,
        };
        let timeout_minutes = timeout_minutes.min(MAX_TIMEOUT_MINUTES) as i64;
        chrono::Duration::minutes(timeout_minutes + LOCK_MARGIN_MINUTES)
    }
}

fn minutes(n: u64) -> Duration {
    Duration::from_secs(n.saturating_mul(60))
}
