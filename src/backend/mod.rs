//! Remote key-value backends.
//!
//! A [`Backend`] fronts one remote store. Parameter Store (standard and
//! advanced tier) and Secrets Manager each get an implementation; commands
//! obtain one through a [`BackendProvider`] so tests can substitute the
//! in-memory mock.

pub mod reference;
pub mod secrets;
pub mod ssm;

#[cfg(test)]
pub(crate) mod mock;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::config::AwsConfig;
use crate::tags::StoreMode;

pub use reference::{BackendKind, Ref, RefError};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Unsupported(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }
}

/// Options for storing a value.
#[derive(Debug, Clone)]
pub struct PutOptions {
    pub value: String,
    pub store_mode: StoreMode,
    /// Store as a SecureString (Parameter Store only).
    pub secure: bool,
    /// KMS key for SecureString encryption.
    pub kms_key_id: Option<String>,
}

impl Default for PutOptions {
    fn default() -> Self {
        Self {
            value: String::new(),
            store_mode: StoreMode::Raw,
            secure: false,
            kms_key_id: None,
        }
    }
}

/// Options for reading a value.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetOptions {
    /// Return the stored bytes untouched, skipping tag lookup.
    pub force_raw: bool,
    /// Decode a JSON-encoded value regardless of tags.
    pub force_json: bool,
}

/// One key under a listed prefix. Carries the decrypted value for the
/// export/jsonize paths; the completion cache must only ever persist the
/// path and store mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterEntry {
    pub path: String,
    pub value: String,
    pub store_mode: StoreMode,
}

/// Metadata shown by `describe`.
#[derive(Debug, Clone, Default)]
pub struct DescribeOutput {
    pub path: String,
    pub arn: Option<String>,
    pub parameter_type: Option<String>,
    pub tier: Option<String>,
    pub data_type: Option<String>,
    pub version: Option<i64>,
    pub created_date: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub tags: BTreeMap<String, String>,
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn put(&self, target: &Ref, opts: PutOptions) -> Result<(), BackendError>;

    async fn get(&self, target: &Ref, opts: GetOptions) -> Result<String, BackendError>;

    async fn describe(&self, target: &Ref) -> Result<DescribeOutput, BackendError>;

    /// Lists every key under `path`, with values and storage modes. Paginates
    /// internally; the returned order is whatever the backend yields.
    async fn list_by_prefix(
        &self,
        path: &str,
        recursive: bool,
    ) -> Result<Vec<ParameterEntry>, BackendError>;
}

/// Creates a [`Backend`] for a ref kind.
#[async_trait]
pub trait BackendProvider: Send + Sync {
    async fn backend(&self, kind: BackendKind) -> Result<Arc<dyn Backend>, BackendError>;
}

/// Production provider backed by the AWS SDK. The shared SDK config is
/// resolved once on first use.
pub struct AwsBackendProvider {
    aws: AwsConfig,
    sdk: OnceCell<aws_config::SdkConfig>,
}

impl AwsBackendProvider {
    pub fn new(aws: AwsConfig) -> Self {
        Self {
            aws,
            sdk: OnceCell::new(),
        }
    }

    async fn sdk_config(&self) -> &aws_config::SdkConfig {
        self.sdk
            .get_or_init(|| async {
                let mut loader = aws_config::defaults(BehaviorVersion::latest());
                if let Some(region) = self.aws.region.clone() {
                    loader = loader.region(Region::new(region));
                }
                if let Some(profile) = &self.aws.profile {
                    loader = loader.profile_name(profile);
                }
                loader.load().await
            })
            .await
    }
}

#[async_trait]
impl BackendProvider for AwsBackendProvider {
    async fn backend(&self, kind: BackendKind) -> Result<Arc<dyn Backend>, BackendError> {
        let config = self.sdk_config().await;
        Ok(match kind {
            BackendKind::Ps | BackendKind::Psa => {
                Arc::new(ssm::SsmBackend::new(aws_sdk_ssm::Client::new(config)))
            }
            BackendKind::Sm => Arc::new(secrets::SecretsBackend::new(
                aws_sdk_secretsmanager::Client::new(config),
            )),
        })
    }
}

/// Decodes a JSON-encoded value for display: a JSON string unquotes, any
/// other valid JSON document passes through unchanged, and non-JSON input is
/// an error.
pub(crate) fn decode_json(raw: &str) -> Result<String, BackendError> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::String(s)) => Ok(s),
        Ok(_) => Ok(raw.to_string()),
        Err(_) => Err(BackendError::Other(anyhow!("invalid JSON value: {raw}"))),
    }
}

/// JSON-encodes a scalar for `--store json` puts; values that already parse
/// as JSON are stored untouched.
pub(crate) fn encode_json_value(value: &str) -> String {
    if serde_json::from_str::<serde_json::Value>(value).is_ok() {
        value.to_string()
    } else {
        serde_json::Value::String(value.to_string()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_json_unquotes_strings() {
        assert_eq!(decode_json("\"hello\"").unwrap(), "hello");
    }

    #[test]
    fn decode_json_passes_documents_through() {
        assert_eq!(decode_json("{\"a\":1}").unwrap(), "{\"a\":1}");
        assert_eq!(decode_json("[1,2]").unwrap(), "[1,2]");
        assert_eq!(decode_json("42").unwrap(), "42");
    }

    #[test]
    fn decode_json_rejects_non_json() {
        assert!(decode_json("not json").is_err());
    }

    #[test]
    fn encode_json_value_quotes_scalars_only() {
        assert_eq!(encode_json_value("hello"), "\"hello\"");
        assert_eq!(encode_json_value("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(encode_json_value("\"already\""), "\"already\"");
        assert_eq!(encode_json_value("123"), "123");
    }
}
