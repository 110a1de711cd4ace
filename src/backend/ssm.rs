//! SSM Parameter Store backend, serving both `ps:` and `psa:` refs.

use anyhow::Context as _;
use async_trait::async_trait;
use aws_sdk_ssm::Client;
use aws_sdk_ssm::types::{
    ParameterStringFilter, ParameterTier, ParameterType, ResourceTypeForTagging, Tag,
};
use chrono::{DateTime, Utc};

use crate::tags::{self, StoreMode, TAG_STORE_MODE};

use super::{
    Backend, BackendError, BackendKind, DescribeOutput, GetOptions, ParameterEntry, PutOptions,
    Ref, decode_json, encode_json_value,
};

pub struct SsmBackend {
    client: Client,
}

impl SsmBackend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn store_mode_for(&self, path: &str) -> Result<StoreMode, BackendError> {
        let tags = self.resource_tags(path).await?;
        Ok(tags
            .iter()
            .find(|(key, _)| key == TAG_STORE_MODE)
            .map(|(_, value)| StoreMode::from_tag(value))
            .unwrap_or(StoreMode::Raw))
    }

    async fn resource_tags(&self, path: &str) -> Result<Vec<(String, String)>, BackendError> {
        let out = self
            .client
            .list_tags_for_resource()
            .resource_type(ResourceTypeForTagging::Parameter)
            .resource_id(path)
            .send()
            .await
            .map_err(|err| sdk_error(err.into_service_error(), "ssm ListTagsForResource"))?;

        Ok(out
            .tag_list()
            .iter()
            .map(|tag| (tag.key().to_string(), tag.value().to_string()))
            .collect())
    }
}

#[async_trait]
impl Backend for SsmBackend {
    async fn put(&self, target: &Ref, opts: PutOptions) -> Result<(), BackendError> {
        let value = match opts.store_mode {
            StoreMode::Json => encode_json_value(&opts.value),
            StoreMode::Raw => opts.value.clone(),
        };

        let parameter_type = if opts.secure {
            ParameterType::SecureString
        } else {
            ParameterType::String
        };

        let mut request = self
            .client
            .put_parameter()
            .name(&target.path)
            .value(value)
            .r#type(parameter_type)
            .overwrite(true);

        if target.kind == BackendKind::Psa {
            request = request.tier(ParameterTier::Advanced);
        }
        if opts.secure {
            if let Some(key_id) = &opts.kms_key_id {
                request = request.key_id(key_id);
            }
        }

        request
            .send()
            .await
            .map_err(|err| sdk_error(err.into_service_error(), "ssm PutParameter"))?;

        // Tags cannot ride along with an overwriting put, so they are applied
        // in a second call.
        let tag_list: Vec<Tag> = tags::managed_tags(opts.store_mode)
            .into_iter()
            .map(|(key, value)| {
                Tag::builder()
                    .key(key)
                    .value(value)
                    .build()
                    .context("build ssm tag")
            })
            .collect::<Result<_, _>>()?;

        self.client
            .add_tags_to_resource()
            .resource_type(ResourceTypeForTagging::Parameter)
            .resource_id(&target.path)
            .set_tags(Some(tag_list))
            .send()
            .await
            .map_err(|err| sdk_error(err.into_service_error(), "ssm AddTagsToResource"))?;

        Ok(())
    }

    async fn get(&self, target: &Ref, opts: GetOptions) -> Result<String, BackendError> {
        let out = self
            .client
            .get_parameter()
            .name(&target.path)
            .with_decryption(true)
            .send()
            .await
            .map_err(|err| {
                let service = err.into_service_error();
                if service.is_parameter_not_found() {
                    BackendError::NotFound(target.to_string())
                } else {
                    sdk_error(service, "ssm GetParameter")
                }
            })?;

        let raw = out
            .parameter()
            .and_then(|p| p.value())
            .unwrap_or_default()
            .to_string();

        if opts.force_raw {
            return Ok(raw);
        }
        if opts.force_json {
            return decode_json(&raw);
        }

        match self.store_mode_for(&target.path).await? {
            StoreMode::Json => decode_json(&raw),
            StoreMode::Raw => Ok(raw),
        }
    }

    async fn describe(&self, target: &Ref) -> Result<DescribeOutput, BackendError> {
        let out = self
            .client
            .get_parameter()
            .name(&target.path)
            .with_decryption(false)
            .send()
            .await
            .map_err(|err| {
                let service = err.into_service_error();
                if service.is_parameter_not_found() {
                    BackendError::NotFound(target.to_string())
                } else {
                    sdk_error(service, "ssm GetParameter")
                }
            })?;

        let mut describe = DescribeOutput {
            path: target.path.clone(),
            ..DescribeOutput::default()
        };

        if let Some(parameter) = out.parameter() {
            describe.arn = parameter.arn().map(str::to_string);
            describe.version = Some(parameter.version());
            describe.parameter_type = parameter.r#type().map(|t| t.as_str().to_string());
            describe.data_type = parameter.data_type().map(str::to_string);
            describe.last_modified = parameter.last_modified_date().and_then(aws_datetime);
        }

        // Tier only shows up in parameter metadata.
        let meta = self
            .client
            .describe_parameters()
            .parameter_filters(
                ParameterStringFilter::builder()
                    .key("Name")
                    .option("Equals")
                    .values(&target.path)
                    .build()
                    .context("build ssm parameter filter")?,
            )
            .send()
            .await
            .map_err(|err| sdk_error(err.into_service_error(), "ssm DescribeParameters"))?;

        if let Some(metadata) = meta.parameters().first() {
            describe.tier = metadata.tier().map(|t| t.as_str().to_string());
        }

        describe.tags = self.resource_tags(&target.path).await?.into_iter().collect();

        Ok(describe)
    }

    async fn list_by_prefix(
        &self,
        path: &str,
        recursive: bool,
    ) -> Result<Vec<ParameterEntry>, BackendError> {
        let mut named: Vec<(String, String)> = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let out = self
                .client
                .get_parameters_by_path()
                .path(path)
                .recursive(recursive)
                .with_decryption(true)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|err| sdk_error(err.into_service_error(), "ssm GetParametersByPath"))?;

            for parameter in out.parameters() {
                if let Some(name) = parameter.name() {
                    named.push((
                        name.to_string(),
                        parameter.value().unwrap_or_default().to_string(),
                    ));
                }
            }

            next_token = out.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }

        let mut entries = Vec::with_capacity(named.len());
        for (name, value) in named {
            let store_mode = self.store_mode_for(&name).await?;
            entries.push(ParameterEntry {
                path: name,
                value,
                store_mode,
            });
        }
        Ok(entries)
    }
}

fn sdk_error<E>(err: E, operation: &'static str) -> BackendError
where
    E: std::error::Error + Send + Sync + 'static,
{
    BackendError::Other(anyhow::Error::new(err).context(operation))
}

fn aws_datetime(dt: &aws_sdk_ssm::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}
