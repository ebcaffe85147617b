//! Params - Translating string mappings into provisioning key/value pairs
//!
//! Values are passed through as opaque strings. Keys must be non-empty and
//! unique; a duplicate is rejected instead of overwriting the earlier entry.

use std::collections::BTreeMap;

use thiserror::Error;

/// Prefix of tag keys reserved by the catalog service
pub const RESERVED_TAG_PREFIX: &str = "aws:";

/// A single provisioning parameter submitted with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningParameter {
    pub key: String,
    pub value: String,
}

/// A tag attached to the provisioned resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// Errors raised while translating a mapping
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    #[error("Empty key (value: {value:?})")]
    EmptyKey { value: String },

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
}

/// Convert a mapping of parameter names to values into provisioning parameters
///
/// The result is sorted by key, so two mappings with the same entries always
/// produce the same payload regardless of their iteration order.
pub fn translate_parameters<I, K, V>(
    entries: I,
) -> Result<Vec<ProvisioningParameter>, ParameterError>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let pairs = collect_unique(entries)?;
    Ok(pairs
        .into_iter()
        .map(|(key, value)| ProvisioningParameter { key, value })
        .collect())
}

/// Convert a mapping of tag keys to values into tags
///
/// Keys starting with `aws:` belong to the catalog service and are left out.
pub fn translate_tags<I, K, V>(entries: I) -> Result<Vec<Tag>, ParameterError>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let pairs = collect_unique(entries)?;
    Ok(pairs
        .into_iter()
        .filter(|(key, _)| {
            let reserved = key.starts_with(RESERVED_TAG_PREFIX);
            if reserved {
                log::debug!("Skipping reserved tag key {}", key);
            }
            !reserved
        })
        .map(|(key, value)| Tag { key, value })
        .collect())
}

fn collect_unique<I, K, V>(entries: I) -> Result<BTreeMap<String, String>, ParameterError>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut pairs = BTreeMap::new();
    for (key, value) in entries {
        let key = key.into();
        let value = value.into();
        if key.trim().is_empty() {
            return Err(ParameterError::EmptyKey { value });
        }
        if pairs.contains_key(&key) {
            return Err(ParameterError::DuplicateKey(key));
        }
        pairs.insert(key, value);
    }
    Ok(pairs)
}
