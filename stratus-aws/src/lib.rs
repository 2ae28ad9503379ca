//! Stratus AWS collaborators
//!
//! Concrete implementations of the lookup traits declared in `stratus-core`,
//! plus the CloudFormation stack-lifecycle wrapper. All clients share one
//! [`aws_config::SdkConfig`] loaded by the caller.

pub mod cfn;
pub mod ec2;
pub mod http;
pub mod s3;

pub use cfn::{STACK_NAME_PREFIX, StackClient, StackError};
pub use ec2::SnapshotClient;
pub use http::HttpProbe;
pub use s3::ObjectClient;

/// Load the shared AWS configuration, optionally overriding the region.
pub async fn load_aws_config(region: Option<String>) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(aws_config::Region::new(region));
    }
    loader.load().await
}
