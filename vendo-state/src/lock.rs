//! Lock records guarding the state against concurrent runs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A held lock on the state
///
/// Locks expire so that a crashed run does not block the state forever. The
/// expiry must outlast the operation holding it, which for provisioning can
/// be the better part of an hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockInfo {
    pub id: String,
    /// Operation holding the lock (e.g., "create", "delete", "import")
    pub operation: String,
    /// Lock owner as user@hostname
    pub who: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl LockInfo {
    pub fn new(operation: impl Into<String>, ttl: Duration) -> Self {
        let created = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation: operation.into(),
            who: lock_owner(),
            created,
            expires: created + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires
    }
}

fn lock_owner() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{}@{}", user, host)
}
