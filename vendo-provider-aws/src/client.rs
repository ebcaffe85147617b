//! Service Catalog client
//!
//! Talks to the AWS Service Catalog API. Submissions return a record detail
//! immediately; completion is observed through `DescribeRecord`.

use std::fmt::Debug;

use aws_config::Region;
use aws_sdk_servicecatalog::Client as CatalogClient;
use aws_sdk_servicecatalog::error::SdkError;
use aws_sdk_servicecatalog::operation::terminate_provisioned_product::{
    TerminateProvisionedProductError, TerminateProvisionedProductOutput,
};
use aws_sdk_servicecatalog::types::{ProvisioningParameter, RecordDetail, Tag};
use vendo_core::client::{ClientError, ClientResult, OperationRecord, Submission, Termination};
use vendo_core::request::{ACCEPT_LANGUAGE, ProvisioningRequest};
use vendo_core::token::IdempotencyToken;

use crate::errors::{self, ErrorClass, classify};

/// Service Catalog provisioning client
pub struct ServiceCatalogClient {
    catalog_client: CatalogClient,
    region: String,
}

impl ServiceCatalogClient {
    /// Create a new ServiceCatalogClient for the specified region
    pub async fn new(region: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self::from_client(CatalogClient::new(&config), region)
    }

    /// Wrap an already configured SDK client
    pub fn from_client(catalog_client: CatalogClient, region: &str) -> Self {
        Self {
            catalog_client,
            region: region.to_string(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    // =========================================================================
    // Service Catalog API Methods
    // =========================================================================

    /// Submit a ProvisionProduct request
    pub async fn sc_provision_product(
        &self,
        request: &ProvisioningRequest,
        token: &IdempotencyToken,
    ) -> ClientResult<Submission> {
        let parameters: Vec<ProvisioningParameter> = request
            .parameters()
            .iter()
            .map(|p| {
                ProvisioningParameter::builder()
                    .key(&p.key)
                    .value(&p.value)
                    .build()
            })
            .collect();

        let tags = request
            .tags()
            .iter()
            .map(|t| {
                Tag::builder()
                    .key(&t.key)
                    .value(&t.value)
                    .build()
                    .map_err(|e| ClientError::Submission(format!("Invalid tag {}: {}", t.key, e)))
            })
            .collect::<ClientResult<Vec<Tag>>>()?;

        log::debug!(
            "ProvisionProduct {} (product {}, artifact {}): parameters {:?}, tags {:?}",
            request.name(),
            request.product_id(),
            request.artifact_id(),
            parameters,
            tags
        );

        let output = self
            .catalog_client
            .provision_product()
            .accept_language(ACCEPT_LANGUAGE)
            .provision_token(token.as_str())
            .product_id(request.product_id())
            .provisioning_artifact_id(request.artifact_id())
            .provisioned_product_name(request.name())
            .set_provisioning_parameters(Some(parameters))
            .set_tags(Some(tags))
            .set_notification_arns(Some(Vec::new()))
            .send()
            .await
            .map_err(errors::submission_error)?;

        let detail = output
            .record_detail()
            .ok_or_else(|| ClientError::Submission("No record detail returned".to_string()))?;

        let resource_id = detail.provisioned_product_id().ok_or_else(|| {
            ClientError::Submission("No provisioned product id returned".to_string())
        })?;
        let tracking_id = detail
            .record_id()
            .ok_or_else(|| ClientError::Submission("No record id returned".to_string()))?;

        Ok(Submission {
            resource_id: resource_id.to_string(),
            tracking_id: tracking_id.to_string(),
        })
    }

    /// Submit a TerminateProvisionedProduct request
    ///
    /// An unknown provisioned product maps to [`Termination::AlreadyTerminated`].
    pub async fn sc_terminate_provisioned_product(
        &self,
        resource_id: &str,
        token: &IdempotencyToken,
    ) -> ClientResult<Termination> {
        let result = self
            .catalog_client
            .terminate_provisioned_product()
            .accept_language(ACCEPT_LANGUAGE)
            .provisioned_product_id(resource_id)
            .terminate_token(token.as_str())
            .send()
            .await;

        termination_from_result(resource_id, result)
    }

    /// Describe a record by id
    pub async fn sc_describe_record(&self, record_id: &str) -> ClientResult<OperationRecord> {
        let output = self
            .catalog_client
            .describe_record()
            .accept_language(ACCEPT_LANGUAGE)
            .id(record_id)
            .send()
            .await
            .map_err(errors::describe_error)?;

        match output.record_detail() {
            Some(detail) => record_from_detail(record_id, detail),
            // The service sometimes answers before the record is visible
            None => Err(ClientError::NotFound(format!(
                "Record {} has no detail yet",
                record_id
            ))),
        }
    }
}

/// Interpret the outcome of a TerminateProvisionedProduct call
///
/// A product the service no longer knows is already terminated; every other
/// failure is a rejected submission.
pub fn termination_from_result<R>(
    resource_id: &str,
    result: Result<
        TerminateProvisionedProductOutput,
        SdkError<TerminateProvisionedProductError, R>,
    >,
) -> ClientResult<Termination>
where
    R: Debug,
{
    let output = match result {
        Ok(output) => output,
        Err(err) if classify(&err) == ErrorClass::NotFound => {
            log::debug!(
                "Provisioned product {} not found: {}",
                resource_id,
                errors::message(&err)
            );
            return Ok(Termination::AlreadyTerminated);
        }
        Err(err) => return Err(errors::submission_error(err)),
    };

    let tracking_id = output
        .record_detail()
        .and_then(|d| d.record_id())
        .ok_or_else(|| ClientError::Submission("No record id returned".to_string()))?;

    Ok(Termination::Submitted {
        tracking_id: tracking_id.to_string(),
    })
}

/// Convert a record detail into an operation record
pub fn record_from_detail(record_id: &str, detail: &RecordDetail) -> ClientResult<OperationRecord> {
    let status = detail
        .status()
        .ok_or_else(|| ClientError::NotFound(format!("Record {} has no status yet", record_id)))?;

    let mut record = OperationRecord::new(detail.record_id().unwrap_or(record_id), status.as_str());
    if let Some(resource_id) = detail.provisioned_product_id() {
        record = record.with_resource_id(resource_id);
    }
    for error in detail.record_errors() {
        let message = match (error.code(), error.description()) {
            (Some(code), Some(description)) => format!("{}: {}", code, description),
            (None, Some(description)) => description.to_string(),
            (Some(code), None) => code.to_string(),
            (None, None) => continue,
        };
        record = record.with_error(message);
    }
    Ok(record)
}
