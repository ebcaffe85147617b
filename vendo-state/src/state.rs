//! State file structures for persisting resource handles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vendo_core::handle::ResourceHandle;

/// The document written to the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State file format version
    pub version: u32,
    /// Monotonically increasing number for each state modification
    pub serial: u64,
    /// Unique identifier for this state lineage (prevents accidental overwrites)
    pub lineage: String,
    /// Version of Vendo that last modified this state
    pub vendo_version: String,
    /// Every account handle currently tracked
    #[serde(default)]
    pub accounts: Vec<AccountState>,
}

impl StateFile {
    /// Current state file format version
    pub const CURRENT_VERSION: u32 = 1;

    /// Create a new empty state file
    pub fn new() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            lineage: uuid::Uuid::new_v4().to_string(),
            vendo_version: env!("CARGO_PKG_VERSION").to_string(),
            accounts: Vec::new(),
        }
    }

    /// Bump the serial before writing a modified state
    pub fn increment_serial(&mut self) {
        self.serial += 1;
        self.vendo_version = env!("CARGO_PKG_VERSION").to_string();
    }

    pub fn find_account(&self, name: &str) -> Option<&AccountState> {
        self.accounts.iter().find(|a| a.handle.name == name)
    }

    /// Insert or replace the account stored under the handle's name
    pub fn upsert_account(&mut self, handle: ResourceHandle) {
        let entry = AccountState::new(handle);
        match self
            .accounts
            .iter_mut()
            .find(|a| a.handle.name == entry.handle.name)
        {
            Some(existing) => *existing = entry,
            None => self.accounts.push(entry),
        }
    }

    pub fn remove_account(&mut self, name: &str) -> Option<AccountState> {
        let pos = self.accounts.iter().position(|a| a.handle.name == name)?;
        Some(self.accounts.remove(pos))
    }

    pub fn handles(&self) -> impl Iterator<Item = &ResourceHandle> {
        self.accounts.iter().map(|a| &a.handle)
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

/// A tracked account handle and when it last changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    #[serde(flatten)]
    pub handle: ResourceHandle,
    pub updated: DateTime<Utc>,
}

impl AccountState {
    pub fn new(handle: ResourceHandle) -> Self {
        Self {
            handle,
            updated: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_file_new() {
        let state = StateFile::new();
        assert_eq!(state.version, StateFile::CURRENT_VERSION);
        assert_eq!(state.serial, 0);
        assert!(!state.lineage.is_empty());
        assert!(state.accounts.is_empty());
    }

    #[test]
    fn test_upsert_replaces_by_name() {
        let mut state = StateFile::new();
        state.upsert_account(ResourceHandle::new("sandbox", "pp-1").with_tracking_id("rec-1"));
        state.upsert_account(ResourceHandle::new("sandbox", "pp-1").with_tracking_id("rec-2"));
        state.upsert_account(ResourceHandle::new("prod", "pp-2"));

        assert_eq!(state.accounts.len(), 2);
        let sandbox = state.find_account("sandbox").unwrap();
        assert_eq!(sandbox.handle.tracking_id.as_deref(), Some("rec-2"));
    }

    #[test]
    fn test_remove_account() {
        let mut state = StateFile::new();
        state.upsert_account(ResourceHandle::new("sandbox", "pp-1"));

        let removed = state.remove_account("sandbox");
        assert_eq!(removed.map(|a| a.handle.resource_id), Some("pp-1".to_string()));
        assert!(state.remove_account("sandbox").is_none());
        assert_eq!(state.handles().count(), 0);
    }

    #[test]
    fn test_state_file_serialization_flattens_handle() {
        let mut state = StateFile::new();
        state.upsert_account(ResourceHandle::new("sandbox", "pp-1").with_tracking_id("rec-1"));
        state.increment_serial();

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["accounts"][0]["resource_id"], "pp-1");
        assert_eq!(json["accounts"][0]["tracking_id"], "rec-1");

        let back: StateFile = serde_json::from_value(json).unwrap();
        assert_eq!(back.serial, 1);
        assert_eq!(back.lineage, state.lineage);
        assert_eq!(back.accounts, state.accounts);
    }
}
