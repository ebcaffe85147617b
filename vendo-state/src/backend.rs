//! State backend trait and error types

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vendo_core::handle::StoreError;

use crate::lock::LockInfo;
use crate::state::StateFile;

/// Failures reading, writing or locking the account state
#[derive(Debug, Error)]
pub enum BackendError {
    /// Another run holds a live lock
    #[error("Account state is held by {who} for {operation} (lock ID: {lock_id})")]
    Locked {
        lock_id: String,
        who: String,
        operation: String,
    },

    #[error("No lock with ID {0} is held")]
    LockNotFound(String),

    /// The lock on disk is not the one the caller holds
    #[error("Lock {expected} is no longer current, {actual} holds the state")]
    LockMismatch { expected: String, actual: String },

    #[error("Unknown state backend \"{0}\" (supported: local)")]
    UnsupportedBackend(String),

    #[error("Corrupt account state: {0}")]
    InvalidState(String),

    #[error("State storage failed: {0}")]
    Io(String),

    #[error("Could not encode account state: {0}")]
    Serialization(String),
}

impl BackendError {
    pub fn locked(lock: &LockInfo) -> Self {
        Self::Locked {
            lock_id: lock.id.clone(),
            who: lock.who.clone(),
            operation: lock.operation.clone(),
        }
    }
}

impl From<BackendError> for StoreError {
    fn from(err: BackendError) -> Self {
        StoreError::new(err.to_string())
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Where the account state and its lock live
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Read the current state, `None` if nothing was written yet
    async fn read_state(&self) -> BackendResult<Option<StateFile>>;

    /// Replace the stored state
    async fn write_state(&self, state: &StateFile) -> BackendResult<()>;

    /// Take the lock for `operation`, failing if a live lock is held
    async fn acquire_lock(&self, operation: &str, ttl: Duration) -> BackendResult<LockInfo>;

    /// Release a lock previously returned by `acquire_lock`
    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()>;

    /// Remove a lock by id regardless of who holds it
    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()>;
}

/// Backend selection as written in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend type (currently only "local")
    #[serde(rename = "type", default = "default_backend_type")]
    pub backend_type: String,
    /// Path of the state file for the local backend
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_backend_type() -> String {
    "local".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend_type: default_backend_type(),
            path: None,
        }
    }
}
