//! Collaborator interfaces for validators that consult external services
//!
//! Validators never talk to AWS or the network directly. They receive these
//! traits, so tests can substitute fakes without touching validator logic.
//! Faults are pre-classified by the implementations: a known, user-actionable
//! condition (object or snapshot missing) is distinct from everything else.

use async_trait::async_trait;
use thiserror::Error;

/// Fault from a cloud lookup (snapshot metadata, object existence)
#[derive(Debug, Clone, Error)]
pub enum LookupFault {
    /// The requested entity does not exist or the identifier is malformed
    #[error("not found: {message}")]
    NotFound { message: String },

    /// Any other transport or service fault
    #[error("{message}")]
    Other { message: String },
}

/// Fault from opening a remote URL
#[derive(Debug, Clone, Error)]
pub enum FetchFault {
    /// The server answered with an error status
    #[error("HTTP status {code}: {reason}")]
    Status { code: u16, reason: String },

    /// The request never got an HTTP answer (DNS, connect, TLS)
    #[error("connection error: {reason}")]
    Connection { reason: String },

    /// The URL could not be parsed at all
    #[error("malformed URL")]
    Malformed,
}

/// Snapshot metadata as reported by the cloud
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    /// Recorded volume size in GiB, if the service reported one
    pub volume_size: Option<i64>,
    /// Lifecycle state, "completed" when the snapshot is ready
    pub state: Option<String>,
}

/// Snapshot metadata lookup
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn describe_snapshot(&self, snapshot_id: &str) -> Result<SnapshotInfo, LookupFault>;
}

/// Object-storage existence check
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<(), LookupFault>;
}

/// Remote URL probe
#[async_trait]
pub trait UrlProbe: Send + Sync {
    async fn open(&self, url: &str) -> Result<(), FetchFault>;
}
