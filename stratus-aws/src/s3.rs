//! S3 object existence check

use async_trait::async_trait;
use aws_sdk_s3::Client;
use stratus_core::lookup::{LookupFault, ObjectStore};

/// Object existence check backed by S3 `HeadObject`
pub struct ObjectClient {
    client: Client,
}

impl ObjectClient {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl ObjectStore for ObjectClient {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<(), LookupFault> {
        tracing::debug!(bucket, key, "checking object existence");
        match self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                // HeadObject reports absence and no-access as a bare 404/403
                if err
                    .raw_response()
                    .is_some_and(|r| r.status().as_u16() == 404)
                {
                    Err(LookupFault::NotFound {
                        message: format!("s3://{bucket}/{key} not found"),
                    })
                } else {
                    Err(LookupFault::Other {
                        message: err.to_string(),
                    })
                }
            }
        }
    }
}
