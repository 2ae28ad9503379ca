//! EC2 snapshot metadata lookup

use async_trait::async_trait;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::error::ProvideErrorMetadata;
use stratus_core::lookup::{LookupFault, SnapshotInfo, SnapshotStore};

/// Error codes EC2 returns for missing or malformed snapshot identifiers
const NOT_FOUND_CODES: [&str; 2] = ["InvalidSnapshot.NotFound", "InvalidSnapshot.Malformed"];

/// EBS snapshot lookup backed by the EC2 API
pub struct SnapshotClient {
    client: Client,
}

impl SnapshotClient {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl SnapshotStore for SnapshotClient {
    async fn describe_snapshot(&self, snapshot_id: &str) -> Result<SnapshotInfo, LookupFault> {
        tracing::debug!(snapshot_id, "describing snapshot");
        let result = self
            .client
            .describe_snapshots()
            .snapshot_ids(snapshot_id)
            .send()
            .await;

        match result {
            Ok(output) => {
                let snapshot =
                    output
                        .snapshots()
                        .first()
                        .ok_or_else(|| LookupFault::NotFound {
                            message: format!("no snapshot returned for '{snapshot_id}'"),
                        })?;
                Ok(SnapshotInfo {
                    volume_size: snapshot.volume_size().map(i64::from),
                    state: snapshot.state().map(|s| s.as_str().to_string()),
                })
            }
            Err(err) => {
                let service = err.as_service_error();
                let code = service.and_then(|e| e.code()).unwrap_or_default();
                let message = service
                    .and_then(|e| e.message())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{err:?}"));
                if NOT_FOUND_CODES.contains(&code) {
                    Err(LookupFault::NotFound { message })
                } else {
                    Err(LookupFault::Other { message })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_snapshot_identifier_codes_classify_as_not_found() {
        assert!(NOT_FOUND_CODES.contains(&"InvalidSnapshot.NotFound"));
        assert!(NOT_FOUND_CODES.contains(&"InvalidSnapshot.Malformed"));
        assert!(!NOT_FOUND_CODES.contains(&"RequestLimitExceeded"));
    }
}
