//! Client - Boundary to the asynchronous provisioning service
//!
//! A submission returns immediately with a tracking id. Completion is only
//! observable by describing the operation record behind that id.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::request::ProvisioningRequest;
use crate::token::IdempotencyToken;

/// Record statuses reported by the catalog service
pub mod status {
    pub const CREATED: &str = "CREATED";
    pub const IN_PROGRESS: &str = "IN_PROGRESS";
    pub const SUCCEEDED: &str = "SUCCEEDED";
    pub const FAILED: &str = "FAILED";
}

/// Errors reported by a provisioning client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The service rejected a submission outright
    #[error("Submission rejected: {0}")]
    Submission(String),

    /// No record matches the id (yet, or any more)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Retryable condition (throttling, network, timeouts)
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Condition that retrying cannot fix (malformed id, access denied)
    #[error("Fatal failure: {0}")]
    Fatal(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Snapshot of an operation as reported by the service
///
/// Never modified locally; each poll fetches a fresh record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRecord {
    /// Tracking id of the operation (record id)
    pub tracking_id: String,
    /// Durable id of the provisioned resource
    pub resource_id: Option<String>,
    /// Raw status value (e.g., CREATED, IN_PROGRESS, SUCCEEDED)
    pub status: String,
    /// Error messages attached to the record by the service
    pub errors: Vec<String>,
}

impl OperationRecord {
    pub fn new(tracking_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            tracking_id: tracking_id.into(),
            resource_id: None,
            status: status.into(),
            errors: Vec::new(),
        }
    }

    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.errors.push(message.into());
        self
    }
}

/// Result of a provisioning submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub resource_id: String,
    pub tracking_id: String,
}

/// Result of a termination submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Termination accepted; poll this tracking id
    Submitted { tracking_id: String },
    /// The service has no such resource; nothing left to terminate
    AlreadyTerminated,
}

/// Provisioning service operations
///
/// Every call is side-effecting against the external service. Submissions are
/// never retried by the caller; a failed submission is surfaced immediately.
pub trait ProvisioningClient: Send + Sync {
    /// Name of this client (e.g., "servicecatalog")
    fn name(&self) -> &'static str;

    /// Submit a provisioning request
    fn submit_provision(
        &self,
        request: &ProvisioningRequest,
        token: &IdempotencyToken,
    ) -> BoxFuture<'_, ClientResult<Submission>>;

    /// Submit a termination for a provisioned resource
    ///
    /// A resource the service no longer knows about maps to
    /// [`Termination::AlreadyTerminated`] rather than an error.
    fn submit_termination(
        &self,
        resource_id: &str,
        token: &IdempotencyToken,
    ) -> BoxFuture<'_, ClientResult<Termination>>;

    /// Describe the operation behind a tracking id
    ///
    /// Returns [`ClientError::NotFound`] while the service has not caught up
    /// with a fresh submission.
    fn describe_operation(&self, tracking_id: &str) -> BoxFuture<'_, ClientResult<OperationRecord>>;
}

impl ProvisioningClient for Box<dyn ProvisioningClient> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn submit_provision(
        &self,
        request: &ProvisioningRequest,
        token: &IdempotencyToken,
    ) -> BoxFuture<'_, ClientResult<Submission>> {
        (**self).submit_provision(request, token)
    }

    fn submit_termination(
        &self,
        resource_id: &str,
        token: &IdempotencyToken,
    ) -> BoxFuture<'_, ClientResult<Termination>> {
        (**self).submit_termination(resource_id, token)
    }

    fn describe_operation(
        &self,
        tracking_id: &str,
    ) -> BoxFuture<'_, ClientResult<OperationRecord>> {
        (**self).describe_operation(tracking_id)
    }
}
