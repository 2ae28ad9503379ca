//! Configuration schema and model
//!
//! Parses the image-build configuration document (YAML, or JSON as a YAML
//! subset) into immutable model structs. Shape and type problems, unknown
//! fields and field-format violations are [`ConfigError`]s raised at parse
//! time; semantic rules run afterwards via [`ImageBuildConfig::validate`] and
//! produce a [`ValidationReport`] instead of erroring.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::lookup::{ObjectStore, SnapshotStore, UrlProbe};
use crate::validation::ebs::{
    EbsVolumeIopsValidator, EbsVolumeKmsKeyIdValidator, EbsVolumeSizeSnapshotValidator,
    EbsVolumeThroughputIopsValidator, EbsVolumeThroughputValidator, EbsVolumeTypeSizeValidator,
};
use crate::validation::url::{UrlValidator, url_scheme};
use crate::validation::{Param, ValidationReport};

/// Tag key prefix reserved for tags the tool manages itself
pub const RESERVED_TAG_PREFIX: &str = "stratus:";

static PARENT_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new("^(ami|arn)").unwrap());
static SUBNET_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^subnet-([0-9a-f]{8}|[0-9a-f]{17})$").unwrap());
static SECURITY_GROUP_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sg-([0-9a-f]{8}|[0-9a-f]{17})$").unwrap());
static INSTANCE_ROLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^arn:.*:(role|instance-profile)/").unwrap());
static LAMBDA_ROLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new("^arn:.*:role/").unwrap());

/// Error raised while parsing the configuration document
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document could not be deserialized (shape, types, unknown fields)
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A field parsed but its value has an invalid format
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}

impl ConfigError {
    fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A key/value tag attached to built resources
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// Root volume settings for the built image
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct Volume {
    pub volume_type: Option<String>,
    pub size: Option<i64>,
    pub iops: Option<i64>,
    pub throughput: Option<i64>,
    pub encrypted: Option<bool>,
    pub kms_key_id: Option<String>,
    pub snapshot_id: Option<String>,
}

impl Volume {
    pub const DEFAULT_SIZE_GIB: i64 = 20;
    pub const DEFAULT_VOLUME_TYPE: &'static str = "gp3";

    pub fn type_or_default(&self) -> &str {
        self.volume_type.as_deref().unwrap_or(Self::DEFAULT_VOLUME_TYPE)
    }

    pub fn size_or_default(&self) -> i64 {
        self.size.unwrap_or(Self::DEFAULT_SIZE_GIB)
    }
}

/// Image section: output tags and root volume
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct Image {
    pub tags: Option<Vec<Tag>>,
    pub root_volume: Option<Volume>,
}

/// Kind of a build component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    Arn,
    Script,
}

/// One build component: a managed component ARN or a script URL
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct Component {
    #[serde(rename = "Type")]
    pub component_type: ComponentType,
    pub value: String,
}

/// IAM roles used during the build
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct Iam {
    pub instance_role: Option<String>,
    pub cleanup_lambda_role: Option<String>,
}

/// Build section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct Build {
    pub instance_type: String,
    pub parent_image: String,
    pub components: Option<Vec<Component>>,
    pub subnet_id: Option<String>,
    pub security_group_ids: Option<Vec<String>>,
    pub iam: Option<Iam>,
    pub tags: Option<Vec<Tag>>,
}

/// Distribution settings for the built image
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct DistributionConfiguration {
    pub regions: Option<String>,
    pub launch_permission: Option<String>,
}

/// Development overrides
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct DevSettings {
    pub update_os_and_reboot: Option<bool>,
    pub terminate_instance_on_failure: Option<bool>,
    pub distribution_configuration: Option<DistributionConfiguration>,
}

/// The whole image-build configuration document
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct ImageBuildConfig {
    pub image: Option<Image>,
    pub build: Build,
    pub dev_settings: Option<DevSettings>,
    pub custom_s3_bucket: Option<String>,
}

impl ImageBuildConfig {
    /// Parse and shape-check a configuration document.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.check_formats()?;
        Ok(config)
    }

    fn check_formats(&self) -> Result<(), ConfigError> {
        if let Some(image) = &self.image {
            check_tags("Image/Tags", image.tags.as_deref())?;
        }
        check_tags("Build/Tags", self.build.tags.as_deref())?;

        if !PARENT_IMAGE_RE.is_match(&self.build.parent_image) {
            return Err(ConfigError::invalid_field(
                "Build/ParentImage",
                format!(
                    "'{}' is invalid, expected an AMI id or an ARN",
                    self.build.parent_image
                ),
            ));
        }

        if let Some(subnet_id) = &self.build.subnet_id
            && !SUBNET_ID_RE.is_match(subnet_id)
        {
            return Err(ConfigError::invalid_field(
                "Build/SubnetId",
                format!("'{subnet_id}' is not a valid subnet id"),
            ));
        }

        for group_id in self.build.security_group_ids.iter().flatten() {
            if !SECURITY_GROUP_ID_RE.is_match(group_id) {
                return Err(ConfigError::invalid_field(
                    "Build/SecurityGroupIds",
                    format!("'{group_id}' is not a valid security group id"),
                ));
            }
        }

        if let Some(iam) = &self.build.iam {
            if let Some(role) = &iam.instance_role
                && !INSTANCE_ROLE_RE.is_match(role)
            {
                return Err(ConfigError::invalid_field(
                    "Build/Iam/InstanceRole",
                    format!("'{role}' is not a role or instance-profile ARN"),
                ));
            }
            if let Some(role) = &iam.cleanup_lambda_role
                && !LAMBDA_ROLE_RE.is_match(role)
            {
                return Err(ConfigError::invalid_field(
                    "Build/Iam/CleanupLambdaRole",
                    format!("'{role}' is not a role ARN"),
                ));
            }
        }

        for component in self.build.components.iter().flatten() {
            check_component(component)?;
        }

        if let Some(permission) = self
            .dev_settings
            .as_ref()
            .and_then(|d| d.distribution_configuration.as_ref())
            .and_then(|d| d.launch_permission.as_ref())
            && serde_json::from_str::<serde_json::Value>(permission).is_err()
        {
            return Err(ConfigError::invalid_field(
                "DevSettings/DistributionConfiguration/LaunchPermission",
                format!("'{permission}' is invalid"),
            ));
        }

        Ok(())
    }

    /// Run the semantic validators over the parsed configuration.
    ///
    /// Collaborators are injected so callers (and tests) decide how snapshot,
    /// object-storage and URL lookups are performed. Rule violations never
    /// error; they accumulate into the returned report.
    pub async fn validate(
        &self,
        snapshots: &dyn SnapshotStore,
        objects: &dyn ObjectStore,
        probe: &dyn UrlProbe,
    ) -> ValidationReport {
        let mut failures = Vec::new();

        if let Some(volume) = self.image.as_ref().and_then(|i| i.root_volume.as_ref()) {
            let volume_type = Param::str("VolumeType", volume.type_or_default());
            let size = Param::int("Size", volume.size_or_default());
            let iops = Param::opt_int("Iops", volume.iops);
            let throughput = Param::opt_int("Throughput", volume.throughput);
            let snapshot_id = Param::opt_str("SnapshotId", volume.snapshot_id.clone());
            let kms_key_id = Param::opt_str("KmsKeyId", volume.kms_key_id.clone());
            let encrypted = Param::opt_bool("Encrypted", volume.encrypted);

            failures.extend(EbsVolumeTypeSizeValidator::validate(&volume_type, &size));
            failures.extend(EbsVolumeThroughputValidator::validate(
                &volume_type,
                &throughput,
            ));
            failures.extend(EbsVolumeThroughputIopsValidator::validate(
                &volume_type,
                &iops,
                &throughput,
            ));
            failures.extend(EbsVolumeIopsValidator::validate(&volume_type, &size, &iops));
            failures.extend(
                EbsVolumeSizeSnapshotValidator::validate(&snapshot_id, &size, snapshots).await,
            );
            failures.extend(EbsVolumeKmsKeyIdValidator::validate(
                &kms_key_id,
                &encrypted,
            ));
        }

        for component in self.build.components.iter().flatten() {
            if component.component_type == ComponentType::Script {
                let url = Param::str("Build/Components/Value", &component.value);
                failures.extend(UrlValidator::validate(&url, objects, probe).await);
            }
        }

        ValidationReport::new(failures)
    }
}

fn check_tags(field: &str, tags: Option<&[Tag]>) -> Result<(), ConfigError> {
    for tag in tags.into_iter().flatten() {
        if tag.key.starts_with(RESERVED_TAG_PREFIX) {
            return Err(ConfigError::invalid_field(
                field,
                format!(
                    "The tag key prefix '{RESERVED_TAG_PREFIX}' is reserved and cannot be used."
                ),
            ));
        }
    }
    Ok(())
}

fn check_component(component: &Component) -> Result<(), ConfigError> {
    match component.component_type {
        ComponentType::Arn => {
            if !component.value.starts_with("arn") {
                return Err(ConfigError::invalid_field(
                    "Build/Components/Value",
                    format!(
                        "The Type in Component is arn, the value '{}' is invalid. \
                         Choose a value with 'arn' prefix.",
                        component.value
                    ),
                ));
            }
        }
        ComponentType::Script => {
            if !matches!(url_scheme(&component.value), Some("https" | "s3")) {
                return Err(ConfigError::invalid_field(
                    "Build/Components/Value",
                    format!(
                        "The Type in Component is script, the value '{}' is invalid. \
                         Choose a value with 'https' or 's3' prefix url.",
                        component.value
                    ),
                ));
            }
        }
    }
    Ok(())
}
