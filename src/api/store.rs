//! Purpose: Define the remote parameter store capability set consumed by the batch executor.
//! Exports: `ParameterStore`, `Parameter`, `ParameterPage`, `Tag`, `ApiResult`.
//! Role: Seam between batch orchestration and a concrete backend (SSM, test doubles).
//! Invariants: Implementations are `Send + Sync` and safe to call from many tasks at once.
//! Invariants: Every failure is reported as `ErrorKind::Remote` with the parameter name as key.
use async_trait::async_trait;

use crate::core::error::Error;

pub type ApiResult<T> = Result<T, Error>;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One page of a prefix listing. `next_token` is `None` on the last page.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ParameterPage {
    pub parameters: Vec<Parameter>,
    pub next_token: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[async_trait]
pub trait ParameterStore: Send + Sync {
    async fn list_by_prefix(
        &self,
        prefix: &str,
        recursive: bool,
        decrypt: bool,
        next_token: Option<String>,
    ) -> ApiResult<ParameterPage>;

    async fn set_value(
        &self,
        name: &str,
        value: &str,
        overwrite: bool,
        description: Option<&str>,
    ) -> ApiResult<()>;

    async fn delete_value(&self, name: &str) -> ApiResult<()>;

    async fn get_tags(&self, resource_id: &str) -> ApiResult<Vec<Tag>>;

    async fn set_tags(&self, resource_id: &str, tags: &[Tag]) -> ApiResult<()>;

    async fn remove_tags(&self, resource_id: &str, keys: &[String]) -> ApiResult<()>;
}
