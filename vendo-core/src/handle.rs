//! Handle - Durable identity of a provisioned account

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::BoxFuture;

/// State kept by the caller for the whole lifetime of a provisioned resource
///
/// `resource_id` never changes once assigned. `tracking_id` points at the
/// most recent operation (create, then delete).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHandle {
    /// Name the resource was provisioned under
    pub name: String,
    /// Durable id of the provisioned resource (e.g., pp-xxxxxxxx)
    pub resource_id: String,
    /// Tracking id of the last submitted operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
}

impl ResourceHandle {
    pub fn new(name: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_id: resource_id.into(),
            tracking_id: None,
        }
    }

    pub fn with_tracking_id(mut self, tracking_id: impl Into<String>) -> Self {
        self.tracking_id = Some(tracking_id.into());
        self
    }
}

/// Error raised by a handle store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct StoreError(pub String);

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Persists resource handles across operations
pub trait HandleStore: Send + Sync {
    /// Insert or replace the handle stored under `handle.name`
    fn save(&self, handle: &ResourceHandle) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Forget the handle stored under `handle.name`
    fn remove(&self, handle: &ResourceHandle) -> BoxFuture<'_, Result<(), StoreError>>;
}

/// In-memory handle store, keyed by name
#[derive(Debug, Default)]
pub struct MemoryHandleStore {
    handles: Mutex<HashMap<String, ResourceHandle>>,
}

impl MemoryHandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<ResourceHandle> {
        self.handles
            .lock()
            .ok()
            .and_then(|handles| handles.get(name).cloned())
    }

    pub fn len(&self) -> usize {
        self.handles.lock().map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HandleStore for MemoryHandleStore {
    fn save(&self, handle: &ResourceHandle) -> BoxFuture<'_, Result<(), StoreError>> {
        let result = self
            .handles
            .lock()
            .map(|mut handles| {
                handles.insert(handle.name.clone(), handle.clone());
            })
            .map_err(|e| StoreError::new(format!("Handle store poisoned: {}", e)));
        Box::pin(async move { result })
    }

    fn remove(&self, handle: &ResourceHandle) -> BoxFuture<'_, Result<(), StoreError>> {
        let result = self
            .handles
            .lock()
            .map(|mut handles| {
                handles.remove(&handle.name);
            })
            .map_err(|e| StoreError::new(format!("Handle store poisoned: {}", e)));
        Box::pin(async move { result })
    }
}
