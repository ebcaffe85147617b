//! Lifecycle - Create and Delete flows for a vended account
//!
//! Create: build request, submit, persist handle, wait for `SUCCEEDED`.
//! Delete: submit termination, persist new tracking id, wait, forget handle.
//!
//! The handle is persisted as soon as the submission is accepted. A create
//! that later times out or fails still leaves the handle in the store so the
//! half-created resource can be found and terminated.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::client::{ClientError, OperationRecord, ProvisioningClient, Termination};
use crate::handle::{HandleStore, ResourceHandle, StoreError};
use crate::request::{AccountDefinition, ProvisioningRequest, RequestError};
use crate::token::{TokenSource, random_tokens};
use crate::waiter::{self, WaitError, WaitSpec, wait_for_target};

/// Lifecycle operation being performed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// Failure of a lifecycle operation, tagged with the phase that failed
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{operation} {name}: invalid request: {source}")]
    Request {
        operation: Operation,
        name: String,
        source: RequestError,
    },

    #[error("{operation} {name}: submission failed: {source}")]
    Submit {
        operation: Operation,
        name: String,
        source: ClientError,
    },

    #[error("{operation} {name} ({resource_id}): waiting for completion failed: {source}")]
    Wait {
        operation: Operation,
        name: String,
        resource_id: String,
        source: WaitError,
    },

    #[error("{operation} {name} ({resource_id}): failed to persist handle: {source}")]
    Store {
        operation: Operation,
        name: String,
        resource_id: String,
        source: StoreError,
    },
}

impl LifecycleError {
    pub fn operation(&self) -> Operation {
        match self {
            Self::Request { operation, .. }
            | Self::Submit { operation, .. }
            | Self::Wait { operation, .. }
            | Self::Store { operation, .. } => *operation,
        }
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Timing configuration for lifecycle operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    pub create_timeout: Duration,
    pub delete_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            create_timeout: waiter::DEFAULT_TIMEOUT,
            delete_timeout: waiter::DEFAULT_TIMEOUT,
            poll_interval: waiter::DEFAULT_POLL_INTERVAL,
        }
    }
}

impl LifecycleConfig {
    fn wait_spec(&self, operation: Operation) -> WaitSpec {
        let timeout = match operation {
            Operation::Create => self.create_timeout,
            Operation::Delete => self.delete_timeout,
        };
        WaitSpec::record_succeeded()
            .with_poll_interval(self.poll_interval)
            .with_timeout(timeout)
    }
}

/// Drives Create and Delete for one resource at a time
///
/// Holds no per-resource state, so independent resources can run their
/// lifecycles concurrently against the same controller.
pub struct LifecycleController<C, S> {
    client: C,
    store: S,
    config: LifecycleConfig,
    tokens: TokenSource,
}

impl<C, S> LifecycleController<C, S>
where
    C: ProvisioningClient,
    S: HandleStore,
{
    pub fn new(client: C, store: S) -> Self {
        Self {
            client,
            store,
            config: LifecycleConfig::default(),
            tokens: random_tokens(),
        }
    }

    pub fn with_config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the idempotency token source (one token per submission)
    pub fn with_token_source(mut self, tokens: TokenSource) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Provision an account and wait until the catalog reports success
    pub async fn create(&self, definition: &AccountDefinition) -> LifecycleResult<ResourceHandle> {
        let operation = Operation::Create;
        let name = definition.name.clone();

        let request = ProvisioningRequest::from_definition(definition).map_err(|source| {
            LifecycleError::Request {
                operation,
                name: name.clone(),
                source,
            }
        })?;

        let token = (self.tokens)();
        log::debug!(
            "Provisioning {} (product {}, artifact {}, {} parameters, token {})",
            name,
            request.product_id(),
            request.artifact_id(),
            request.parameters().len(),
            token
        );
        let submission = self
            .client
            .submit_provision(&request, &token)
            .await
            .map_err(|source| LifecycleError::Submit {
                operation,
                name: name.clone(),
                source,
            })?;
        log::info!(
            "Submitted provisioning of {}: resource {}, record {}",
            name,
            submission.resource_id,
            submission.tracking_id
        );

        let handle = ResourceHandle::new(&name, &submission.resource_id)
            .with_tracking_id(&submission.tracking_id);
        self.persist(operation, &handle).await?;

        self.wait(operation, &handle, &submission.tracking_id).await?;
        log::info!("Provisioned {} ({})", name, handle.resource_id);

        Ok(handle)
    }

    /// Terminate the resource behind `handle` and wait for completion
    ///
    /// Terminating a resource the service no longer knows is a no-op success.
    pub async fn delete(&self, handle: &ResourceHandle) -> LifecycleResult<()> {
        let operation = Operation::Delete;

        let token = (self.tokens)();
        log::debug!(
            "Terminating {} ({}, token {})",
            handle.name,
            handle.resource_id,
            token
        );
        let termination = self
            .client
            .submit_termination(&handle.resource_id, &token)
            .await
            .map_err(|source| LifecycleError::Submit {
                operation,
                name: handle.name.clone(),
                source,
            })?;

        let tracking_id = match termination {
            Termination::Submitted { tracking_id } => tracking_id,
            Termination::AlreadyTerminated => {
                log::warn!(
                    "{} ({}) is already gone, forgetting it",
                    handle.name,
                    handle.resource_id
                );
                return self.forget(operation, handle).await;
            }
        };
        log::info!(
            "Submitted termination of {} ({}): record {}",
            handle.name,
            handle.resource_id,
            tracking_id
        );

        let in_flight = handle.clone().with_tracking_id(&tracking_id);
        self.persist(operation, &in_flight).await?;

        self.wait(operation, &in_flight, &tracking_id).await?;
        log::info!("Terminated {} ({})", handle.name, handle.resource_id);

        self.forget(operation, &in_flight).await
    }

    /// Describe the last operation recorded on `handle`
    ///
    /// Returns `None` when the handle has no tracking id or the service has no
    /// record of it yet.
    pub async fn status(
        &self,
        handle: &ResourceHandle,
    ) -> Result<Option<OperationRecord>, ClientError> {
        let Some(tracking_id) = handle.tracking_id.as_deref() else {
            return Ok(None);
        };
        match self.client.describe_operation(tracking_id).await {
            Ok(record) => Ok(Some(record)),
            Err(ClientError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Adopt an existing resource id under `name` without submitting anything
    pub async fn import(&self, name: &str, resource_id: &str) -> LifecycleResult<ResourceHandle> {
        let handle = ResourceHandle::new(name, resource_id);
        self.persist(Operation::Create, &handle).await?;
        Ok(handle)
    }

    async fn wait(
        &self,
        operation: Operation,
        handle: &ResourceHandle,
        tracking_id: &str,
    ) -> LifecycleResult<OperationRecord> {
        let spec = self.config.wait_spec(operation);
        log::debug!(
            "Waiting up to {:?} for {} of {} (record {})",
            spec.timeout,
            operation,
            handle.name,
            tracking_id
        );

        let client = &self.client;
        wait_for_target(&spec, move || client.describe_operation(tracking_id))
            .await
            .map_err(|source| LifecycleError::Wait {
                operation,
                name: handle.name.clone(),
                resource_id: handle.resource_id.clone(),
                source,
            })
    }

    async fn persist(&self, operation: Operation, handle: &ResourceHandle) -> LifecycleResult<()> {
        self.store
            .save(handle)
            .await
            .map_err(|source| LifecycleError::Store {
                operation,
                name: handle.name.clone(),
                resource_id: handle.resource_id.clone(),
                source,
            })
    }

    async fn forget(&self, operation: Operation, handle: &ResourceHandle) -> LifecycleResult<()> {
        self.store
            .remove(handle)
            .await
            .map_err(|source| LifecycleError::Store {
                operation,
                name: handle.name.clone(),
                resource_id: handle.resource_id.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{BoxFuture, ClientResult, Submission, status};
    use crate::handle::MemoryHandleStore;
    use crate::token::IdempotencyToken;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Client replaying scripted responses and recording every call
    #[derive(Default)]
    struct ScriptedClient {
        provisions: Mutex<VecDeque<ClientResult<Submission>>>,
        terminations: Mutex<VecDeque<ClientResult<Termination>>>,
        records: Mutex<VecDeque<ClientResult<OperationRecord>>>,
        submitted: Mutex<Vec<(ProvisioningRequest, IdempotencyToken)>>,
        terminated: Mutex<Vec<(String, IdempotencyToken)>>,
        described: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn provision(self, result: ClientResult<Submission>) -> Self {
            self.provisions.lock().unwrap().push_back(result);
            self
        }

        fn terminate(self, result: ClientResult<Termination>) -> Self {
            self.terminations.lock().unwrap().push_back(result);
            self
        }

        fn record(self, result: ClientResult<OperationRecord>) -> Self {
            self.records.lock().unwrap().push_back(result);
            self
        }
    }

    impl ProvisioningClient for ScriptedClient {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn submit_provision(
            &self,
            request: &ProvisioningRequest,
            token: &IdempotencyToken,
        ) -> BoxFuture<'_, ClientResult<Submission>> {
            self.submitted
                .lock()
                .unwrap()
                .push((request.clone(), token.clone()));
            let result = self
                .provisions
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ClientError::Fatal("no provision scripted".into())));
            Box::pin(async move { result })
        }

        fn submit_termination(
            &self,
            resource_id: &str,
            token: &IdempotencyToken,
        ) -> BoxFuture<'_, ClientResult<Termination>> {
            self.terminated
                .lock()
                .unwrap()
                .push((resource_id.to_string(), token.clone()));
            let result = self
                .terminations
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ClientError::Fatal("no termination scripted".into())));
            Box::pin(async move { result })
        }

        fn describe_operation(
            &self,
            tracking_id: &str,
        ) -> BoxFuture<'_, ClientResult<OperationRecord>> {
            self.described.lock().unwrap().push(tracking_id.to_string());
            let mut records = self.records.lock().unwrap();
            // the last scripted record sticks once the script runs out
            let next = if records.len() > 1 {
                records.pop_front()
            } else {
                records.front().cloned()
            };
            let result = next.unwrap_or(Err(ClientError::NotFound(tracking_id.to_string())));
            Box::pin(async move { result })
        }
    }

    fn sequential_tokens() -> TokenSource {
        let counter = AtomicUsize::new(0);
        Box::new(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            IdempotencyToken::new(format!("token-{}", n))
        })
    }

    fn fast_config() -> LifecycleConfig {
        LifecycleConfig {
            create_timeout: Duration::from_secs(5),
            delete_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(5),
        }
    }

    fn controller(
        client: ScriptedClient,
    ) -> LifecycleController<ScriptedClient, MemoryHandleStore> {
        LifecycleController::new(client, MemoryHandleStore::new())
            .with_config(fast_config())
            .with_token_source(sequential_tokens())
    }

    fn definition() -> AccountDefinition {
        AccountDefinition::new("sandbox", "prod-abc", "pa-123")
            .with_parameter("b", "2")
            .with_parameter("a", "1")
    }

    fn submission() -> ClientResult<Submission> {
        Ok(Submission {
            resource_id: "pp-1".to_string(),
            tracking_id: "rec-create".to_string(),
        })
    }

    fn record(tracking_id: &str, status: &str) -> ClientResult<OperationRecord> {
        Ok(OperationRecord::new(tracking_id, status).with_resource_id("pp-1"))
    }

    #[tokio::test]
    async fn create_submits_translated_request_and_waits() {
        let client = ScriptedClient::default()
            .provision(submission())
            .record(Err(ClientError::NotFound("rec-create".into())))
            .record(record("rec-create", status::IN_PROGRESS))
            .record(record("rec-create", status::SUCCEEDED));
        let controller = controller(client);

        let handle = controller.create(&definition()).await.unwrap();

        assert_eq!(handle.resource_id, "pp-1");
        assert_eq!(handle.tracking_id.as_deref(), Some("rec-create"));
        assert_eq!(controller.store().get("sandbox"), Some(handle));

        let submitted = controller.client().submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        let (request, token) = &submitted[0];
        assert_eq!(token.as_str(), "token-1");
        let pairs: Vec<(&str, &str)> = request
            .parameters()
            .iter()
            .map(|p| (p.key.as_str(), p.value.as_str()))
            .collect();
        assert_eq!(pairs, vec![("a", "1"), ("b", "2")]);

        let described = controller.client().described.lock().unwrap();
        assert!(described.iter().all(|id| id == "rec-create"));
        assert_eq!(described.len(), 3);
    }

    #[tokio::test]
    async fn create_keeps_handle_when_record_fails() {
        let client = ScriptedClient::default()
            .provision(submission())
            .record(record("rec-create", status::CREATED))
            .record(Ok(OperationRecord::new("rec-create", status::FAILED)
                .with_error("Email already registered")));
        let controller = controller(client);

        let err = controller.create(&definition()).await.unwrap_err();
        match &err {
            LifecycleError::Wait {
                operation,
                resource_id,
                source: WaitError::UnexpectedState { status, .. },
                ..
            } => {
                assert_eq!(*operation, Operation::Create);
                assert_eq!(resource_id, "pp-1");
                assert_eq!(status, "FAILED");
            }
            other => panic!("Expected Wait/UnexpectedState, got {:?}", other),
        }
        assert!(err.to_string().contains("Email already registered"));

        let stored = controller.store().get("sandbox").unwrap();
        assert_eq!(stored.resource_id, "pp-1");
    }

    #[tokio::test]
    async fn create_timeout_leaves_handle_in_store() {
        let client = ScriptedClient::default()
            .provision(submission())
            .record(record("rec-create", status::IN_PROGRESS));
        let controller = LifecycleController::new(client, MemoryHandleStore::new()).with_config(
            LifecycleConfig {
                create_timeout: Duration::from_millis(30),
                ..fast_config()
            },
        );

        let err = controller.create(&definition()).await.unwrap_err();
        match &err {
            LifecycleError::Wait { source, .. } => assert!(source.is_timeout()),
            other => panic!("Expected Wait timeout, got {:?}", other),
        }
        assert_eq!(err.operation(), Operation::Create);
        assert!(controller.store().get("sandbox").is_some());
    }

    #[tokio::test]
    async fn create_submission_error_is_surfaced_without_handle() {
        let client = ScriptedClient::default().provision(Err(ClientError::Submission(
            "InvalidParametersException".into(),
        )));
        let controller = controller(client);

        let err = controller.create(&definition()).await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Submit {
                operation: Operation::Create,
                ..
            }
        ));
        assert!(controller.store().is_empty());
        assert!(controller.client().described.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_rejects_invalid_request_before_submitting() {
        let controller = controller(ScriptedClient::default());
        let mut def = definition();
        def.name = "x".repeat(65);

        let err = controller.create(&def).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Request { .. }));
        assert!(controller.client().submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_waits_on_termination_record_and_clears_handle() {
        let client = ScriptedClient::default()
            .terminate(Ok(Termination::Submitted {
                tracking_id: "rec-delete".to_string(),
            }))
            .record(record("rec-delete", status::CREATED))
            .record(record("rec-delete", status::SUCCEEDED));
        let controller = controller(client);
        let handle = ResourceHandle::new("sandbox", "pp-1").with_tracking_id("rec-create");
        controller.store().save(&handle).await.unwrap();

        controller.delete(&handle).await.unwrap();

        assert!(controller.store().get("sandbox").is_none());
        let terminated = controller.client().terminated.lock().unwrap();
        assert_eq!(terminated[0].0, "pp-1");
        let described = controller.client().described.lock().unwrap();
        assert!(described.iter().all(|id| id == "rec-delete"));
    }

    #[tokio::test]
    async fn delete_twice_is_a_no_op_the_second_time() {
        let client = ScriptedClient::default()
            .terminate(Ok(Termination::Submitted {
                tracking_id: "rec-delete".to_string(),
            }))
            .terminate(Ok(Termination::AlreadyTerminated))
            .record(record("rec-delete", status::SUCCEEDED));
        let controller = controller(client);
        let handle = ResourceHandle::new("sandbox", "pp-1").with_tracking_id("rec-create");

        controller.delete(&handle).await.unwrap();
        controller.delete(&handle).await.unwrap();

        let terminated = controller.client().terminated.lock().unwrap();
        assert_eq!(terminated.len(), 2);
        assert!(terminated.iter().all(|(id, _)| id == "pp-1"));
        assert_ne!(terminated[0].1, terminated[1].1);
        assert_eq!(controller.client().described.lock().unwrap().len(), 1);
        assert!(controller.store().is_empty());
    }

    #[tokio::test]
    async fn delete_timeout_keeps_handle_with_new_tracking_id() {
        let client = ScriptedClient::default()
            .terminate(Ok(Termination::Submitted {
                tracking_id: "rec-delete".to_string(),
            }))
            .record(record("rec-delete", status::IN_PROGRESS));
        let controller = LifecycleController::new(client, MemoryHandleStore::new()).with_config(
            LifecycleConfig {
                delete_timeout: Duration::from_millis(30),
                ..fast_config()
            },
        );
        let handle = ResourceHandle::new("sandbox", "pp-1").with_tracking_id("rec-create");
        controller.store().save(&handle).await.unwrap();

        let err = controller.delete(&handle).await.unwrap_err();
        assert_eq!(err.operation(), Operation::Delete);

        let stored = controller.store().get("sandbox").unwrap();
        assert_eq!(stored.resource_id, "pp-1");
        assert_eq!(stored.tracking_id.as_deref(), Some("rec-delete"));
    }

    #[tokio::test]
    async fn delete_submission_error_aborts() {
        let client = ScriptedClient::default()
            .terminate(Err(ClientError::Submission("AccessDenied".into())));
        let controller = controller(client);
        let handle = ResourceHandle::new("sandbox", "pp-1");
        controller.store().save(&handle).await.unwrap();

        let err = controller.delete(&handle).await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Submit {
                operation: Operation::Delete,
                ..
            }
        ));
        assert!(controller.store().get("sandbox").is_some());
    }

    #[tokio::test]
    async fn each_submission_gets_a_fresh_token() {
        let client = ScriptedClient::default()
            .provision(submission())
            .terminate(Ok(Termination::Submitted {
                tracking_id: "rec-delete".to_string(),
            }))
            .record(record("any", status::SUCCEEDED));
        let controller = controller(client);

        let handle = controller.create(&definition()).await.unwrap();
        controller.delete(&handle).await.unwrap();

        let create_token = controller.client().submitted.lock().unwrap()[0].1.clone();
        let delete_token = controller.client().terminated.lock().unwrap()[0].1.clone();
        assert_eq!(create_token.as_str(), "token-1");
        assert_eq!(delete_token.as_str(), "token-2");
    }

    #[tokio::test]
    async fn status_describes_last_tracking_id() {
        let client = ScriptedClient::default().record(record("rec-create", status::IN_PROGRESS));
        let controller = controller(client);

        let handle = ResourceHandle::new("sandbox", "pp-1").with_tracking_id("rec-create");
        let record = controller.status(&handle).await.unwrap().unwrap();
        assert_eq!(record.status, status::IN_PROGRESS);

        let imported = ResourceHandle::new("sandbox", "pp-1");
        assert_eq!(controller.status(&imported).await.unwrap(), None);
    }

    #[tokio::test]
    async fn status_treats_missing_record_as_none() {
        let controller = controller(ScriptedClient::default());
        let handle = ResourceHandle::new("sandbox", "pp-1").with_tracking_id("rec-unknown");
        assert_eq!(controller.status(&handle).await.unwrap(), None);
    }

    #[tokio::test]
    async fn import_persists_handle_without_tracking_id() {
        let controller = controller(ScriptedClient::default());
        let handle = controller.import("legacy", "pp-42").await.unwrap();
        assert_eq!(handle.tracking_id, None);
        assert_eq!(controller.store().get("legacy"), Some(handle));
    }
}
