//! Adapter persisting core resource handles through a state backend

use tokio::sync::Mutex;
use vendo_core::client::BoxFuture;
use vendo_core::handle::{HandleStore, ResourceHandle, StoreError};

use crate::backend::{BackendResult, StateBackend};
use crate::state::StateFile;

/// `HandleStore` writing every change straight to the backend
///
/// Each save or remove is a read-modify-write of the whole state file. Writes
/// from one process are serialized here; other processes are kept out by the
/// backend lock, which the caller holds for the duration of a run.
pub struct StateHandleStore {
    backend: Box<dyn StateBackend>,
    writes: Mutex<()>,
}

impl StateHandleStore {
    pub fn new(backend: Box<dyn StateBackend>) -> Self {
        Self {
            backend,
            writes: Mutex::new(()),
        }
    }

    pub fn backend(&self) -> &dyn StateBackend {
        self.backend.as_ref()
    }

    /// Load the handle stored under `name`
    pub async fn load(&self, name: &str) -> BackendResult<Option<ResourceHandle>> {
        let state = self.backend.read_state().await?;
        Ok(state.and_then(|s| s.find_account(name).map(|a| a.handle.clone())))
    }

    /// Load every stored handle
    pub async fn load_all(&self) -> BackendResult<Vec<ResourceHandle>> {
        let state = self.backend.read_state().await?;
        Ok(state
            .map(|s| s.handles().cloned().collect())
            .unwrap_or_default())
    }

    async fn upsert(&self, handle: ResourceHandle) -> BackendResult<()> {
        let _guard = self.writes.lock().await;
        let mut state = self.backend.read_state().await?.unwrap_or_default();
        log::debug!(
            "Recording {} -> {} in state serial {}",
            handle.name,
            handle.resource_id,
            state.serial + 1
        );
        state.upsert_account(handle);
        state.increment_serial();
        self.backend.write_state(&state).await
    }

    async fn delete(&self, name: &str) -> BackendResult<()> {
        let _guard = self.writes.lock().await;
        let Some(mut state) = self.backend.read_state().await? else {
            return Ok(());
        };
        if state.remove_account(name).is_none() {
            return Ok(());
        }
        log::debug!("Removing {} from state", name);
        state.increment_serial();
        self.backend.write_state(&state).await
    }
}

impl HandleStore for StateHandleStore {
    fn save(&self, handle: &ResourceHandle) -> BoxFuture<'_, Result<(), StoreError>> {
        let handle = handle.clone();
        Box::pin(async move { self.upsert(handle).await.map_err(StoreError::from) })
    }

    fn remove(&self, handle: &ResourceHandle) -> BoxFuture<'_, Result<(), StoreError>> {
        let name = handle.name.clone();
        Box::pin(async move { self.delete(&name).await.map_err(StoreError::from) })
    }
}
