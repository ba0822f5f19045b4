//! Purpose: AWS Systems Manager Parameter Store backend for `ParameterStore`.
//! Exports: `SsmConfig`, `SsmStore`.
//! Role: Translates store capabilities into aws-sdk-ssm calls and maps SDK failures.
//! Invariants: Values are written as `String` parameters; type information lives in tags.
//! Invariants: SDK errors become `ErrorKind::Remote` carrying the parameter name.
//! Notes: Credentials, region and retries come from the shared AWS config chain.
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ssm::Client;
use aws_sdk_ssm::config::Region;
use aws_sdk_ssm::error::DisplayErrorContext;
use aws_sdk_ssm::types::{ParameterType, ResourceTypeForTagging};

use super::store::{ApiResult, Parameter, ParameterPage, ParameterStore, Tag};
use crate::core::error::{Error, ErrorKind};

/// SSM client configuration. Unset fields fall back to the AWS SDK defaults.
#[derive(Clone, Debug, Default)]
pub struct SsmConfig {
    pub region: Option<String>,
    pub profile: Option<String>,
    /// Endpoint override (e.g. LocalStack)
    pub endpoint: Option<String>,
}

#[derive(Clone)]
pub struct SsmStore {
    client: Client,
}

impl std::fmt::Debug for SsmStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsmStore").finish_non_exhaustive()
    }
}

impl SsmStore {
    pub async fn connect(config: SsmConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = config.region {
            loader = loader.region(Region::new(region));
        }
        if let Some(profile) = config.profile {
            loader = loader.profile_name(profile);
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_ssm::config::Builder::from(&sdk_config);
        if let Some(endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(builder.build()),
        }
    }
}

fn remote_error(action: &str, name: &str, err: impl std::error::Error) -> Error {
    let detail = DisplayErrorContext(&err).to_string();
    let mut error = Error::new(ErrorKind::Remote)
        .with_message(format!("{action} failed: {detail}"))
        .with_key(name);
    if detail.contains("Throttl") {
        error = error.with_hint("Lower --batch-size or raise --batch-pause-ms.");
    }
    error
}

#[async_trait]
impl ParameterStore for SsmStore {
    async fn list_by_prefix(
        &self,
        prefix: &str,
        recursive: bool,
        decrypt: bool,
        next_token: Option<String>,
    ) -> ApiResult<ParameterPage> {
        tracing::debug!(path = prefix, "get parameters by path");
        let response = self
            .client
            .get_parameters_by_path()
            .path(prefix)
            .recursive(recursive)
            .with_decryption(decrypt)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|err| remote_error("get parameters by path", prefix, err))?;

        let parameters = response
            .parameters()
            .iter()
            .filter_map(|parameter| {
                let name = parameter.name()?;
                Some(Parameter::new(name, parameter.value().unwrap_or_default()))
            })
            .collect();

        Ok(ParameterPage {
            parameters,
            next_token: response.next_token().map(str::to_string),
        })
    }

    async fn set_value(
        &self,
        name: &str,
        value: &str,
        overwrite: bool,
        description: Option<&str>,
    ) -> ApiResult<()> {
        tracing::debug!(parameter = name, "put parameter");
        self.client
            .put_parameter()
            .name(name)
            .value(value)
            .r#type(ParameterType::String)
            .overwrite(overwrite)
            .set_description(description.map(str::to_string))
            .send()
            .await
            .map_err(|err| remote_error("put parameter", name, err))?;
        Ok(())
    }

    async fn delete_value(&self, name: &str) -> ApiResult<()> {
        tracing::debug!(parameter = name, "delete parameter");
        self.client
            .delete_parameter()
            .name(name)
            .send()
            .await
            .map_err(|err| remote_error("delete parameter", name, err))?;
        Ok(())
    }

    async fn get_tags(&self, resource_id: &str) -> ApiResult<Vec<Tag>> {
        tracing::debug!(parameter = resource_id, "list tags for parameter");
        let response = self
            .client
            .list_tags_for_resource()
            .resource_type(ResourceTypeForTagging::Parameter)
            .resource_id(resource_id)
            .send()
            .await
            .map_err(|err| remote_error("list tags", resource_id, err))?;
        Ok(response
            .tag_list()
            .iter()
            .map(|tag| Tag::new(tag.key(), tag.value()))
            .collect())
    }

    async fn set_tags(&self, resource_id: &str, tags: &[Tag]) -> ApiResult<()> {
        tracing::debug!(parameter = resource_id, count = tags.len(), "add tags to parameter");
        let sdk_tags = tags
            .iter()
            .map(|tag| {
                aws_sdk_ssm::types::Tag::builder()
                    .key(&tag.key)
                    .value(&tag.value)
                    .build()
                    .map_err(|err| {
                        Error::new(ErrorKind::Internal)
                            .with_message("failed to build tag")
                            .with_key(resource_id)
                            .with_source(err)
                    })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        self.client
            .add_tags_to_resource()
            .resource_type(ResourceTypeForTagging::Parameter)
            .resource_id(resource_id)
            .set_tags(Some(sdk_tags))
            .send()
            .await
            .map_err(|err| remote_error("add tags", resource_id, err))?;
        Ok(())
    }

    async fn remove_tags(&self, resource_id: &str, keys: &[String]) -> ApiResult<()> {
        tracing::debug!(parameter = resource_id, "remove tags from parameter");
        self.client
            .remove_tags_from_resource()
            .resource_type(ResourceTypeForTagging::Parameter)
            .resource_id(resource_id)
            .set_tag_keys(Some(keys.to_vec()))
            .send()
            .await
            .map_err(|err| remote_error("remove tags", resource_id, err))?;
        Ok(())
    }
}
