use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::record::Record;

/// What happens to an optimistic insert whose create request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Remove the insert; the collection returns to its prior state.
    #[default]
    Revert,
    /// Keep the insert tagged as an error until the user retries or dismisses it.
    Retain,
}

/// Per-store settings.
///
/// ```
/// use storefront_sync::{FailurePolicy, StoreConfig};
///
/// let config = StoreConfig::from_json_str(r#"{ "failure_policy": "retain" }"#).unwrap();
/// assert_eq!(config.failure_policy, FailurePolicy::Retain);
/// assert_eq!(config.debounce_ms, 250);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Storage key for persisted snapshots. Defaults to `storefront:<collection>`.
    pub storage_key: Option<String>,
    /// Minimum spacing between snapshot writes.
    pub debounce_ms: u64,
    /// Whether snapshots are written at all.
    pub persist: bool,
    pub failure_policy: FailurePolicy,
    /// Send success notifications, not only failures.
    pub notify_success: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_key: None,
            debounce_ms: 250,
            persist: true,
            failure_policy: FailurePolicy::Revert,
            notify_success: false,
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, StoreError> {
        serde_json::from_str(json).map_err(|e| StoreError::Config(e.to_string()))
    }

    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = Some(key.into());
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce_ms = debounce.as_millis() as u64;
        self
    }

    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_success_notifications(mut self, enabled: bool) -> Self {
        self.notify_success = enabled;
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn storage_key_for<R: Record>(&self) -> String {
        self.storage_key
            .clone()
            .unwrap_or_else(|| format!("storefront:{}", R::COLLECTION))
    }
}
