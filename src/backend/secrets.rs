//! Secrets Manager backend for `sm:` refs.
//!
//! Secret names are flat, so prefix listing is unsupported here; completion
//! and bulk commands treat `sm:` as empty.

use async_trait::async_trait;
use aws_sdk_secretsmanager::Client;
use aws_sdk_secretsmanager::types::Tag;
use chrono::{DateTime, Utc};

use crate::tags::{self, StoreMode, TAG_STORE_MODE};

use super::{
    Backend, BackendError, DescribeOutput, GetOptions, ParameterEntry, PutOptions, Ref,
    decode_json, encode_json_value,
};

pub struct SecretsBackend {
    client: Client,
}

impl SecretsBackend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn managed_tag_list(store_mode: StoreMode) -> Vec<Tag> {
        tags::managed_tags(store_mode)
            .into_iter()
            .map(|(key, value)| Tag::builder().key(key).value(value).build())
            .collect()
    }
}

#[async_trait]
impl Backend for SecretsBackend {
    async fn put(&self, target: &Ref, opts: PutOptions) -> Result<(), BackendError> {
        let value = match opts.store_mode {
            StoreMode::Json => encode_json_value(&opts.value),
            StoreMode::Raw => opts.value.clone(),
        };
        let tag_list = Self::managed_tag_list(opts.store_mode);

        let created = self
            .client
            .create_secret()
            .name(&target.path)
            .secret_string(&value)
            .set_tags(Some(tag_list.clone()))
            .send()
            .await;

        match created {
            Ok(_) => Ok(()),
            Err(err) => {
                let service = err.into_service_error();
                if !service.is_resource_exists_exception() {
                    return Err(sdk_error(service, "secretsmanager CreateSecret"));
                }

                // Already present: update the value, then refresh the tags.
                self.client
                    .put_secret_value()
                    .secret_id(&target.path)
                    .secret_string(&value)
                    .send()
                    .await
                    .map_err(|err| {
                        sdk_error(err.into_service_error(), "secretsmanager PutSecretValue")
                    })?;

                self.client
                    .tag_resource()
                    .secret_id(&target.path)
                    .set_tags(Some(tag_list))
                    .send()
                    .await
                    .map_err(|err| {
                        sdk_error(err.into_service_error(), "secretsmanager TagResource")
                    })?;

                Ok(())
            }
        }
    }

    async fn get(&self, target: &Ref, opts: GetOptions) -> Result<String, BackendError> {
        let out = self
            .client
            .get_secret_value()
            .secret_id(&target.path)
            .send()
            .await
            .map_err(|err| {
                let service = err.into_service_error();
                if service.is_resource_not_found_exception() {
                    BackendError::NotFound(target.to_string())
                } else {
                    sdk_error(service, "secretsmanager GetSecretValue")
                }
            })?;

        let raw = out.secret_string().unwrap_or_default().to_string();

        if opts.force_raw {
            return Ok(raw);
        }

        let describe = self
            .client
            .describe_secret()
            .secret_id(&target.path)
            .send()
            .await
            .map_err(|err| sdk_error(err.into_service_error(), "secretsmanager DescribeSecret"))?;

        let store_mode = describe
            .tags()
            .iter()
            .find(|tag| tag.key() == Some(TAG_STORE_MODE))
            .and_then(|tag| tag.value())
            .map(StoreMode::from_tag)
            .unwrap_or(StoreMode::Raw);

        if opts.force_json || store_mode == StoreMode::Json {
            return decode_json(&raw);
        }
        Ok(raw)
    }

    async fn describe(&self, target: &Ref) -> Result<DescribeOutput, BackendError> {
        let out = self
            .client
            .describe_secret()
            .secret_id(&target.path)
            .send()
            .await
            .map_err(|err| {
                let service = err.into_service_error();
                if service.is_resource_not_found_exception() {
                    BackendError::NotFound(target.to_string())
                } else {
                    sdk_error(service, "secretsmanager DescribeSecret")
                }
            })?;

        Ok(DescribeOutput {
            path: target.path.clone(),
            arn: out.arn().map(str::to_string),
            created_date: out.created_date().and_then(aws_datetime),
            last_modified: out.last_changed_date().and_then(aws_datetime),
            tags: out
                .tags()
                .iter()
                .filter_map(|tag| Some((tag.key()?.to_string(), tag.value()?.to_string())))
                .collect(),
            ..DescribeOutput::default()
        })
    }

    async fn list_by_prefix(
        &self,
        _path: &str,
        _recursive: bool,
    ) -> Result<Vec<ParameterEntry>, BackendError> {
        Err(BackendError::Unsupported(
            "prefix listing is not supported for the sm: backend".to_string(),
        ))
    }
}

fn sdk_error<E>(err: E, operation: &'static str) -> BackendError
where
    E: std::error::Error + Send + Sync + 'static,
{
    BackendError::Other(anyhow::Error::new(err).context(operation))
}

fn aws_datetime(dt: &aws_sdk_secretsmanager::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}
