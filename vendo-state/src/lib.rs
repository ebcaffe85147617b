//! Vendo State Management
//!
//! Persists resource handles between runs so a vended account provisioned
//! in one invocation can be inspected or terminated in a later one.
//!
//! # Overview
//!
//! - **StateFile**: versioned document listing every known account handle
//! - **StateBackend**: storage trait (currently a local JSON file)
//! - **LockInfo**: lock record guarding the state against concurrent runs
//! - **StateHandleStore**: adapter exposing a backend as a core `HandleStore`
//!
//! # Example
//!
//! ```ignore
//! use vendo_state::{BackendConfig, StateHandleStore, create_backend};
//!
//! let backend = create_backend(&BackendConfig::default())?;
//! let lock = backend.acquire_lock("create", chrono::Duration::minutes(70)).await?;
//!
//! let store = StateHandleStore::new(backend);
//! // ... run the lifecycle controller against `store` ...
//!
//! store.backend().release_lock(&lock).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod lock;
pub mod state;
pub mod store;

// Re-export main types for convenience
pub use backend::{BackendConfig, BackendError, BackendResult, StateBackend};
pub use backends::create_backend;
pub use lock::LockInfo;
pub use state::{AccountState, StateFile};
pub use store::StateHandleStore;
