//! CloudFormation stack lifecycle wrapper
//!
//! Thin client over the CloudFormation API. Stacks managed by this tool carry
//! the [`STACK_NAME_PREFIX`] and acknowledge the IAM capability on create and
//! update. "Stack does not exist" is surfaced as a distinct error so callers
//! can branch on it without string matching.

use aws_sdk_cloudformation::Client;
use aws_sdk_cloudformation::error::ProvideErrorMetadata;
use aws_sdk_cloudformation::types::{Capability, Parameter, Stack, StackResourceDetail, Tag};
use thiserror::Error;

pub use aws_sdk_cloudformation::types::Tag as StackTag;

/// Prefix carried by every stack this tool creates
pub const STACK_NAME_PREFIX: &str = "stratus-";

/// Tag key recording the user-facing name on managed stacks
pub const NAME_TAG_KEY: &str = "stratus:name";

/// Errors from stack lifecycle operations
#[derive(Debug, Error)]
pub enum StackError {
    #[error("Stack '{0}' does not exist")]
    NotFound(String),

    #[error("CloudFormation error: {0}")]
    Api(String),
}

/// Client for stack lifecycle operations
pub struct StackClient {
    client: Client,
}

impl StackClient {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    /// Create a stack from an inline template body.
    pub async fn create_stack(
        &self,
        stack_name: &str,
        disable_rollback: bool,
        tags: Vec<Tag>,
        template_body: &str,
    ) -> Result<String, StackError> {
        tracing::debug!(stack_name, "creating stack from template body");
        let output = self
            .client
            .create_stack()
            .stack_name(stack_name)
            .template_body(template_body)
            .capabilities(Capability::CapabilityIam)
            .disable_rollback(disable_rollback)
            .set_tags(Some(tags))
            .send()
            .await
            .map_err(api_error)?;
        Ok(output.stack_id().unwrap_or_default().to_string())
    }

    /// Create a stack from a template stored at a URL.
    pub async fn create_stack_from_url(
        &self,
        stack_name: &str,
        disable_rollback: bool,
        tags: Vec<Tag>,
        template_url: &str,
    ) -> Result<String, StackError> {
        tracing::debug!(stack_name, template_url, "creating stack from template url");
        let output = self
            .client
            .create_stack()
            .stack_name(stack_name)
            .template_url(template_url)
            .capabilities(Capability::CapabilityIam)
            .disable_rollback(disable_rollback)
            .set_tags(Some(tags))
            .send()
            .await
            .map_err(api_error)?;
        Ok(output.stack_id().unwrap_or_default().to_string())
    }

    /// Update a stack from an inline template body with the given parameters.
    pub async fn update_stack(
        &self,
        stack_name: &str,
        template_body: &str,
        parameters: Vec<Parameter>,
    ) -> Result<(), StackError> {
        tracing::debug!(stack_name, "updating stack from template body");
        self.client
            .update_stack()
            .stack_name(stack_name)
            .template_body(template_body)
            .set_parameters(Some(parameters))
            .capabilities(Capability::CapabilityIam)
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }

    /// Update a stack from a template stored at a URL, optionally retagging it.
    pub async fn update_stack_from_url(
        &self,
        stack_name: &str,
        template_url: &str,
        tags: Option<Vec<Tag>>,
    ) -> Result<(), StackError> {
        tracing::debug!(stack_name, template_url, "updating stack from template url");
        self.client
            .update_stack()
            .stack_name(stack_name)
            .template_url(template_url)
            .capabilities(Capability::CapabilityIam)
            .set_tags(tags)
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }

    /// Delete a stack.
    pub async fn delete_stack(&self, stack_name: &str) -> Result<(), StackError> {
        tracing::debug!(stack_name, "deleting stack");
        self.client
            .delete_stack()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }

    /// Describe a stack, failing with [`StackError::NotFound`] when it does
    /// not exist.
    pub async fn describe_stack(&self, stack_name: &str) -> Result<Stack, StackError> {
        let result = self
            .client
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await;

        match result {
            Ok(output) => output
                .stacks()
                .first()
                .cloned()
                .ok_or_else(|| StackError::NotFound(stack_name.to_string())),
            Err(err) => {
                let message = service_message(&err);
                if message.contains("does not exist") {
                    Err(StackError::NotFound(stack_name.to_string()))
                } else {
                    Err(StackError::Api(message))
                }
            }
        }
    }

    /// Whether a stack with the given name exists.
    pub async fn stack_exists(&self, stack_name: &str) -> Result<bool, StackError> {
        match self.describe_stack(stack_name).await {
            Ok(_) => Ok(true),
            Err(StackError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Fetch the raw template body of a stack.
    pub async fn get_stack_template(&self, stack_name: &str) -> Result<String, StackError> {
        let output = self
            .client
            .get_template()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(api_error)?;
        output
            .template_body()
            .map(str::to_string)
            .ok_or_else(|| StackError::Api(format!("No template returned for '{stack_name}'")))
    }

    /// List stacks managed by this tool: name carries the prefix and the
    /// stack is not nested under a parent.
    pub async fn list_stacks(&self) -> Result<Vec<Stack>, StackError> {
        let mut stacks = Vec::new();
        let mut pages = self.client.describe_stacks().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| StackError::Api(e.to_string()))?;
            for stack in page.stacks() {
                if stack.parent_id().is_none() && is_managed_stack_name(stack.stack_name().unwrap_or_default()) {
                    stacks.push(stack.clone());
                }
            }
        }
        Ok(stacks)
    }

    /// List top-level stacks carrying the managed name tag, regardless of
    /// their stack name.
    pub async fn list_tagged_stacks(&self) -> Result<Vec<Stack>, StackError> {
        let mut stacks = Vec::new();
        let mut pages = self.client.describe_stacks().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| StackError::Api(e.to_string()))?;
            for stack in page.stacks() {
                if stack.parent_id().is_none() && has_name_tag(stack.tags()) {
                    stacks.push(stack.clone());
                }
            }
        }
        Ok(stacks)
    }

    /// Describe one resource of a stack by its logical id.
    pub async fn describe_stack_resource(
        &self,
        stack_name: &str,
        logical_resource_id: &str,
    ) -> Result<StackResourceDetail, StackError> {
        let output = self
            .client
            .describe_stack_resource()
            .stack_name(stack_name)
            .logical_resource_id(logical_resource_id)
            .send()
            .await
            .map_err(api_error)?;
        output.stack_resource_detail().cloned().ok_or_else(|| {
            StackError::Api(format!(
                "No resource detail returned for '{logical_resource_id}'"
            ))
        })
    }
}

/// Whether a stack name belongs to this tool.
pub fn is_managed_stack_name(stack_name: &str) -> bool {
    stack_name.starts_with(STACK_NAME_PREFIX)
}

/// Whether a tag set carries the managed name tag.
pub fn has_name_tag(tags: &[Tag]) -> bool {
    tags.iter().any(|t| t.key() == Some(NAME_TAG_KEY))
}

fn api_error<E>(err: aws_sdk_cloudformation::error::SdkError<E>) -> StackError
where
    E: ProvideErrorMetadata + std::fmt::Debug,
{
    StackError::Api(service_message(&err))
}

fn service_message<E>(err: &aws_sdk_cloudformation::error::SdkError<E>) -> String
where
    E: ProvideErrorMetadata + std::fmt::Debug,
{
    err.as_service_error()
        .and_then(|e| e.message())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{err:?}"))
}
