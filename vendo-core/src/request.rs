//! Request - Account definitions and provisioning requests

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::params::{
    ParameterError, ProvisioningParameter, Tag, translate_parameters, translate_tags,
};

/// Maximum length of a provisioned product name
pub const MAX_NAME_LEN: usize = 64;

/// Language code sent with every submission
pub const ACCEPT_LANGUAGE: &str = "en";

/// Declared configuration of a vended account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountDefinition {
    /// Human-readable name of the provisioned product
    pub name: String,
    /// Catalog product identifier (e.g., prod-xxxxxxxx)
    pub product_id: String,
    /// Provisioning artifact (product version) identifier (e.g., pa-xxxxxxxx)
    #[serde(alias = "artefact_id")]
    pub artifact_id: String,
    /// Product parameters passed through as opaque strings
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl AccountDefinition {
    pub fn new(
        name: impl Into<String>,
        product_id: impl Into<String>,
        artifact_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            product_id: product_id.into(),
            artifact_id: artifact_id.into(),
            parameters: HashMap::new(),
            tags: HashMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Errors raised while building a provisioning request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Name must be between 1 and {MAX_NAME_LEN} characters, got {0}")]
    InvalidName(usize),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid parameters: {0}")]
    Parameters(#[source] ParameterError),

    #[error("Invalid tags: {0}")]
    Tags(#[source] ParameterError),
}

/// A validated request to provision a product
///
/// Built once per Create call and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningRequest {
    product_id: String,
    artifact_id: String,
    name: String,
    parameters: Vec<ProvisioningParameter>,
    tags: Vec<Tag>,
}

impl ProvisioningRequest {
    /// Build a request from an account definition
    pub fn from_definition(definition: &AccountDefinition) -> Result<Self, RequestError> {
        let name_len = definition.name.chars().count();
        if name_len == 0 || name_len > MAX_NAME_LEN {
            return Err(RequestError::InvalidName(name_len));
        }
        if definition.product_id.trim().is_empty() {
            return Err(RequestError::MissingField("product_id"));
        }
        if definition.artifact_id.trim().is_empty() {
            return Err(RequestError::MissingField("artifact_id"));
        }

        let parameters = translate_parameters(
            definition
                .parameters
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        )
        .map_err(RequestError::Parameters)?;

        let tags = translate_tags(definition.tags.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .map_err(RequestError::Tags)?;

        Ok(Self {
            product_id: definition.product_id.clone(),
            artifact_id: definition.artifact_id.clone(),
            name: definition.name.clone(),
            parameters,
            tags,
        })
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[ProvisioningParameter] {
        &self.parameters
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> AccountDefinition {
        AccountDefinition::new("sandbox", "prod-abc", "pa-123")
    }

    #[test]
    fn request_carries_translated_parameters() {
        let def = definition().with_parameter("a", "1").with_parameter("b", "2");
        let request = ProvisioningRequest::from_definition(&def).unwrap();

        assert_eq!(request.product_id(), "prod-abc");
        assert_eq!(request.artifact_id(), "pa-123");
        assert_eq!(request.name(), "sandbox");
        assert_eq!(request.parameters().len(), 2);
        for (key, value) in [("a", "1"), ("b", "2")] {
            let matching: Vec<_> = request
                .parameters()
                .iter()
                .filter(|p| p.key == key)
                .collect();
            assert_eq!(matching.len(), 1);
            assert_eq!(matching[0].value, value);
        }
    }

    #[test]
    fn request_rejects_empty_name() {
        let mut def = definition();
        def.name = String::new();
        assert_eq!(
            ProvisioningRequest::from_definition(&def),
            Err(RequestError::InvalidName(0))
        );
    }

    #[test]
    fn request_rejects_long_name() {
        let mut def = definition();
        def.name = "x".repeat(MAX_NAME_LEN + 1);
        assert_eq!(
            ProvisioningRequest::from_definition(&def),
            Err(RequestError::InvalidName(MAX_NAME_LEN + 1))
        );

        def.name = "x".repeat(MAX_NAME_LEN);
        assert!(ProvisioningRequest::from_definition(&def).is_ok());
    }

    #[test]
    fn request_requires_product_and_artifact() {
        let mut def = definition();
        def.product_id = " ".to_string();
        assert_eq!(
            ProvisioningRequest::from_definition(&def),
            Err(RequestError::MissingField("product_id"))
        );

        let mut def = definition();
        def.artifact_id = String::new();
        assert_eq!(
            ProvisioningRequest::from_definition(&def),
            Err(RequestError::MissingField("artifact_id"))
        );
    }

    #[test]
    fn request_rejects_empty_parameter_key() {
        let def = definition().with_parameter("", "orphan");
        assert!(matches!(
            ProvisioningRequest::from_definition(&def),
            Err(RequestError::Parameters(ParameterError::EmptyKey { .. }))
        ));
    }

    #[test]
    fn definition_accepts_artefact_alias() {
        let json = r#"{
            "name": "sandbox",
            "product_id": "prod-abc",
            "artefact_id": "pa-123",
            "parameters": {"AccountEmail": "a@example.com"}
        }"#;
        let def: AccountDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.artifact_id, "pa-123");
        assert_eq!(
            def.parameters.get("AccountEmail").map(String::as_str),
            Some("a@example.com")
        );
        assert!(def.tags.is_empty());
    }
}
