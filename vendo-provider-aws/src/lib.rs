//! Vendo AWS Provider
//!
//! Provisioning client backed by the AWS Service Catalog API. Account
//! Factory products (e.g., Control Tower vended accounts) are provisioned
//! with `ProvisionProduct`, terminated with `TerminateProvisionedProduct`
//! and tracked through `DescribeRecord`.
//!
//! ## Module Structure
//!
//! - `client` - ServiceCatalogClient and the ProvisioningClient implementation
//! - `errors` - Mapping of SDK errors onto the vendo error taxonomy

pub mod client;
pub mod errors;

pub use client::ServiceCatalogClient;
pub use errors::{ErrorClass, classify};

use vendo_core::client::{
    BoxFuture, ClientResult, OperationRecord, ProvisioningClient, Submission, Termination,
};
use vendo_core::request::ProvisioningRequest;
use vendo_core::token::IdempotencyToken;

// =============================================================================
// ProvisioningClient Trait Implementation
// =============================================================================

impl ProvisioningClient for ServiceCatalogClient {
    fn name(&self) -> &'static str {
        "servicecatalog"
    }

    fn submit_provision(
        &self,
        request: &ProvisioningRequest,
        token: &IdempotencyToken,
    ) -> BoxFuture<'_, ClientResult<Submission>> {
        let request = request.clone();
        let token = token.clone();
        Box::pin(async move { self.sc_provision_product(&request, &token).await })
    }

    fn submit_termination(
        &self,
        resource_id: &str,
        token: &IdempotencyToken,
    ) -> BoxFuture<'_, ClientResult<Termination>> {
        let resource_id = resource_id.to_string();
        let token = token.clone();
        Box::pin(async move { self.sc_terminate_provisioned_product(&resource_id, &token).await })
    }

    fn describe_operation(
        &self,
        tracking_id: &str,
    ) -> BoxFuture<'_, ClientResult<OperationRecord>> {
        let tracking_id = tracking_id.to_string();
        Box::pin(async move { self.sc_describe_record(&tracking_id).await })
    }
}
