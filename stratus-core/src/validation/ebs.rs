//! EBS volume validators
//!
//! Each validator checks one rule relating volume type, size, IOPS, throughput,
//! snapshot and encryption settings. Numeric bounds come from the per-type
//! tables below:
//!
//! - standard volumes range from 1 GiB to 1 TiB (1024 GiB)
//! - gp2 and gp3 volumes range from 1 GiB to 16 TiB (16384 GiB)
//! - io1 and io2 volumes range from 4 GiB to 16 TiB (16384 GiB)
//! - st1 and sc1 volumes range from 500 GiB to 16 TiB (16384 GiB)

use crate::lookup::{LookupFault, SnapshotStore};
use crate::validation::{FailureCollector, FailureLevel, Param, ValidationFailure};

/// Size bounds in GiB per volume type. `None` means unconstrained.
pub fn volume_size_bounds(volume_type: &str) -> Option<(i64, i64)> {
    match volume_type {
        "standard" => Some((1, 1024)),
        "gp2" | "gp3" => Some((1, 16384)),
        "io1" | "io2" => Some((4, 16384)),
        "st1" | "sc1" => Some((500, 16384)),
        _ => None,
    }
}

/// Provisioned IOPS bounds per volume type; only IOPS-bearing types have them.
pub fn volume_iops_bounds(volume_type: &str) -> Option<(i64, i64)> {
    match volume_type {
        "gp3" => Some((3000, 16000)),
        "io1" | "io2" => Some((100, 64000)),
        _ => None,
    }
}

/// Maximum IOPS per GiB of volume size, for IOPS-bearing types.
pub fn max_iops_per_gib(volume_type: &str) -> Option<i64> {
    match volume_type {
        "gp3" | "io2" => Some(500),
        "io1" => Some(50),
        _ => None,
    }
}

/// Validates that the volume size fits the chosen volume type.
pub struct EbsVolumeTypeSizeValidator;

impl EbsVolumeTypeSizeValidator {
    pub fn validate(volume_type: &Param, volume_size: &Param) -> Vec<ValidationFailure> {
        let mut failures = FailureCollector::new("EbsVolumeTypeSize");
        if let (Some(vtype), Some(size)) = (volume_type.as_str(), volume_size.as_int())
            && let Some((min_size, max_size)) = volume_size_bounds(vtype)
        {
            if size > max_size {
                failures.add(
                    format!("The size of {vtype} volumes can not exceed {max_size} GiB"),
                    FailureLevel::Error,
                    &[volume_size],
                );
            } else if size < min_size {
                failures.add(
                    format!("The size of {vtype} volumes must be at least {min_size} GiB"),
                    FailureLevel::Error,
                    &[volume_size],
                );
            }
        }
        failures.into_failures()
    }
}

/// Validates gp3 throughput range. No-op for every other type.
pub struct EbsVolumeThroughputValidator;

impl EbsVolumeThroughputValidator {
    pub const MIN_THROUGHPUT: i64 = 125;
    pub const MAX_THROUGHPUT: i64 = 1000;

    pub fn validate(volume_type: &Param, volume_throughput: &Param) -> Vec<ValidationFailure> {
        let mut failures = FailureCollector::new("EbsVolumeThroughput");
        if volume_type.as_str() == Some("gp3")
            && let Some(throughput) = volume_throughput.as_int()
            && !(Self::MIN_THROUGHPUT..=Self::MAX_THROUGHPUT).contains(&throughput)
        {
            failures.add(
                format!(
                    "Throughput must be between {} MB/s and {} MB/s when provisioning gp3 volumes.",
                    Self::MIN_THROUGHPUT,
                    Self::MAX_THROUGHPUT
                ),
                FailureLevel::Error,
                &[volume_throughput],
            );
        }
        failures.into_failures()
    }
}

/// Validates the gp3 throughput-to-IOPS ratio. No-op when throughput or IOPS
/// is unset, or for other types.
pub struct EbsVolumeThroughputIopsValidator;

impl EbsVolumeThroughputIopsValidator {
    pub const MAX_THROUGHPUT_TO_IOPS_RATIO: f64 = 0.25;

    pub fn validate(
        volume_type: &Param,
        volume_iops: &Param,
        volume_throughput: &Param,
    ) -> Vec<ValidationFailure> {
        let mut failures = FailureCollector::new("EbsVolumeThroughputIops");
        if volume_type.as_str() == Some("gp3")
            && let (Some(iops), Some(throughput)) =
                (volume_iops.as_int(), volume_throughput.as_int())
            && throughput as f64 > iops as f64 * Self::MAX_THROUGHPUT_TO_IOPS_RATIO
        {
            failures.add(
                format!(
                    "Throughput to IOPS ratio of {} is too high; maximum is {}.",
                    throughput as f64 / iops as f64,
                    Self::MAX_THROUGHPUT_TO_IOPS_RATIO
                ),
                FailureLevel::Error,
                &[volume_throughput],
            );
        }
        failures.into_failures()
    }
}

/// Validates the IOPS value against the per-type bounds and the IOPS-to-size
/// ratio cap. Types without IOPS bounds, and unset IOPS, pass.
pub struct EbsVolumeIopsValidator;

impl EbsVolumeIopsValidator {
    pub fn validate(
        volume_type: &Param,
        volume_size: &Param,
        volume_iops: &Param,
    ) -> Vec<ValidationFailure> {
        let mut failures = FailureCollector::new("EbsVolumeIops");
        if let Some(vtype) = volume_type.as_str()
            && let Some((min_iops, max_iops)) = volume_iops_bounds(vtype)
            && let Some(iops) = volume_iops.as_int()
        {
            if iops < min_iops || iops > max_iops {
                failures.add(
                    format!(
                        "IOPS rate must be between {min_iops} and {max_iops} \
                         when provisioning {vtype} volumes."
                    ),
                    FailureLevel::Error,
                    &[volume_iops],
                );
            } else if let (Some(size), Some(cap)) =
                (volume_size.as_int(), max_iops_per_gib(vtype))
                // widen before multiplying: the parser accepts sizes large
                // enough to overflow i64 here
                && i128::from(iops) > i128::from(size) * i128::from(cap)
            {
                failures.add(
                    format!(
                        "IOPS to volume size ratio of {} is too high; maximum is {}.",
                        iops as f64 / size as f64,
                        cap
                    ),
                    FailureLevel::Error,
                    &[volume_iops],
                );
            }
        }
        failures.into_failures()
    }
}

/// Validates the volume size against the snapshot it restores from, and that
/// the snapshot is in the "completed" state. Only runs when a snapshot id is
/// set; lookup faults are classified into failures rather than propagated.
pub struct EbsVolumeSizeSnapshotValidator;

impl EbsVolumeSizeSnapshotValidator {
    pub async fn validate(
        snapshot_id: &Param,
        volume_size: &Param,
        snapshots: &dyn SnapshotStore,
    ) -> Vec<ValidationFailure> {
        let mut failures = FailureCollector::new("EbsVolumeSizeSnapshot");
        let Some(id) = snapshot_id.as_str() else {
            return failures.into_failures();
        };

        match snapshots.describe_snapshot(id).await {
            Ok(info) => {
                match info.volume_size {
                    None => failures.add(
                        format!("Unable to get volume size for snapshot {id}"),
                        FailureLevel::Error,
                        &[snapshot_id],
                    ),
                    Some(snapshot_size) => {
                        if let Some(size) = volume_size.as_int() {
                            if size < snapshot_size {
                                failures.add(
                                    format!(
                                        "The EBS volume size must not be smaller than \
                                         {snapshot_size}, because it is the size of the \
                                         provided snapshot {id}"
                                    ),
                                    FailureLevel::Error,
                                    &[volume_size],
                                );
                            } else if size > snapshot_size {
                                failures.add(
                                    "The specified volume size is larger than snapshot size. \
                                     In order to use the full capacity of the volume, you'll \
                                     need to manually resize the partition.",
                                    FailureLevel::Warning,
                                    &[volume_size],
                                );
                            }
                        }
                    }
                }

                if info.state.as_deref() != Some("completed") {
                    failures.add(
                        format!(
                            "Snapshot {id} is in state '{}' not 'completed'",
                            info.state.as_deref().unwrap_or("unknown")
                        ),
                        FailureLevel::Warning,
                        &[snapshot_id],
                    );
                }
            }
            Err(LookupFault::NotFound { message }) => failures.add(
                format!("The snapshot {id} does not appear to exist: {message}"),
                FailureLevel::Error,
                &[snapshot_id],
            ),
            Err(LookupFault::Other { message }) => failures.add(
                format!("Issue getting info for snapshot {id}: {message}"),
                FailureLevel::Error,
                &[snapshot_id],
            ),
        }
        failures.into_failures()
    }
}

/// Validates that a KMS key id is only given for encrypted volumes.
pub struct EbsVolumeKmsKeyIdValidator;

impl EbsVolumeKmsKeyIdValidator {
    pub fn validate(
        volume_kms_key_id: &Param,
        volume_encrypted: &Param,
    ) -> Vec<ValidationFailure> {
        let mut failures = FailureCollector::new("EbsVolumeKmsKeyId");
        if let Some(key_id) = volume_kms_key_id.as_str()
            && volume_encrypted.as_bool() != Some(true)
        {
            failures.add(
                format!("Kms Key Id {key_id} is specified, the encrypted state must be True."),
                FailureLevel::Error,
                &[volume_encrypted],
            );
        }
        failures.into_failures()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::lookup::SnapshotInfo;

    fn errors(failures: &[ValidationFailure]) -> usize {
        failures
            .iter()
            .filter(|f| f.level == FailureLevel::Error)
            .count()
    }

    #[test]
    fn size_at_bounds_passes_and_one_past_fails() {
        for vtype in ["standard", "gp2", "gp3", "io1", "io2", "st1", "sc1"] {
            let (min, max) = volume_size_bounds(vtype).unwrap();
            for (size, expected_failures) in
                [(min, 0), (max, 0), (min - 1, 1), (max + 1, 1)]
            {
                let failures = EbsVolumeTypeSizeValidator::validate(
                    &Param::str("VolumeType", vtype),
                    &Param::int("Size", size),
                );
                assert_eq!(
                    failures.len(),
                    expected_failures,
                    "type {vtype} size {size}"
                );
                assert_eq!(errors(&failures), expected_failures);
            }
        }
    }

    #[test]
    fn size_only_one_side_of_the_interval_can_fire() {
        let failures = EbsVolumeTypeSizeValidator::validate(
            &Param::str("VolumeType", "st1"),
            &Param::int("Size", 20000),
        );
        assert_eq!(failures.len(), 1);
        assert!(failures[0].message.contains("can not exceed 16384 GiB"));
    }

    #[test]
    fn unknown_volume_type_is_unconstrained() {
        let failures = EbsVolumeTypeSizeValidator::validate(
            &Param::str("VolumeType", "mystery"),
            &Param::int("Size", 9999999),
        );
        assert!(failures.is_empty());
    }

    #[test]
    fn gp3_throughput_range() {
        for (throughput, ok) in [(125, true), (1000, true), (124, false), (1001, false)] {
            let failures = EbsVolumeThroughputValidator::validate(
                &Param::str("VolumeType", "gp3"),
                &Param::int("Throughput", throughput),
            );
            assert_eq!(failures.is_empty(), ok, "throughput {throughput}");
        }
    }

    #[test]
    fn throughput_ignored_for_non_gp3() {
        let failures = EbsVolumeThroughputValidator::validate(
            &Param::str("VolumeType", "gp2"),
            &Param::int("Throughput", 5),
        );
        assert!(failures.is_empty());
    }

    #[test]
    fn throughput_unset_passes() {
        let failures = EbsVolumeThroughputValidator::validate(
            &Param::str("VolumeType", "gp3"),
            &Param::unset("Throughput"),
        );
        assert!(failures.is_empty());
    }

    #[test]
    fn throughput_iops_ratio_just_over_cap_fails() {
        let failures = EbsVolumeThroughputIopsValidator::validate(
            &Param::str("VolumeType", "gp3"),
            &Param::int("Iops", 400),
            &Param::int("Throughput", 101),
        );
        assert_eq!(errors(&failures), 1);
        assert!(failures[0].message.contains("0.2525"));
    }

    #[test]
    fn throughput_iops_ratio_exactly_at_cap_passes() {
        let failures = EbsVolumeThroughputIopsValidator::validate(
            &Param::str("VolumeType", "gp3"),
            &Param::int("Iops", 400),
            &Param::int("Throughput", 100),
        );
        assert!(failures.is_empty());
    }

    #[test]
    fn throughput_iops_unset_throughput_passes() {
        let failures = EbsVolumeThroughputIopsValidator::validate(
            &Param::str("VolumeType", "gp3"),
            &Param::int("Iops", 400),
            &Param::unset("Throughput"),
        );
        assert!(failures.is_empty());
    }

    #[test]
    fn io1_iops_below_min_fails() {
        let failures = EbsVolumeIopsValidator::validate(
            &Param::str("VolumeType", "io1"),
            &Param::int("Size", 4),
            &Param::int("Iops", 99),
        );
        assert_eq!(errors(&failures), 1);
        assert!(failures[0].message.contains("between 100 and 64000"));
    }

    #[test]
    fn io1_iops_over_size_ratio_fails() {
        // 4 GiB at 50 IOPS/GiB caps at 200
        let failures = EbsVolumeIopsValidator::validate(
            &Param::str("VolumeType", "io1"),
            &Param::int("Size", 4),
            &Param::int("Iops", 201),
        );
        assert_eq!(errors(&failures), 1);
        assert!(failures[0].message.contains("maximum is 50"));
    }

    #[test]
    fn io1_iops_within_bounds_passes() {
        for iops in [100, 150, 200] {
            let failures = EbsVolumeIopsValidator::validate(
                &Param::str("VolumeType", "io1"),
                &Param::int("Size", 4),
                &Param::int("Iops", iops),
            );
            assert!(failures.is_empty(), "iops {iops}");
        }
    }

    #[test]
    fn iops_out_of_bounds_skips_ratio_check() {
        // 16001 is both above the gp3 max and above the size ratio cap;
        // only the bounds failure fires.
        let failures = EbsVolumeIopsValidator::validate(
            &Param::str("VolumeType", "gp3"),
            &Param::int("Size", 1),
            &Param::int("Iops", 16001),
        );
        assert_eq!(failures.len(), 1);
        assert!(failures[0].message.contains("IOPS rate must be between"));
    }

    #[test]
    fn iops_ratio_handles_sizes_that_overflow_the_product() {
        // 2e17 GiB times the 50 IOPS/GiB cap exceeds i64::MAX; in-bounds
        // IOPS on such a volume must pass without arithmetic overflow
        let failures = EbsVolumeIopsValidator::validate(
            &Param::str("VolumeType", "io1"),
            &Param::int("Size", 200_000_000_000_000_000),
            &Param::int("Iops", 1000),
        );
        assert!(failures.is_empty());
    }

    #[test]
    fn iops_unset_passes() {
        let failures = EbsVolumeIopsValidator::validate(
            &Param::str("VolumeType", "io1"),
            &Param::int("Size", 4),
            &Param::unset("Iops"),
        );
        assert!(failures.is_empty());
    }

    #[test]
    fn kms_key_requires_encryption() {
        let failures = EbsVolumeKmsKeyIdValidator::validate(
            &Param::str("KmsKeyId", "key-1"),
            &Param::bool("Encrypted", false),
        );
        assert_eq!(errors(&failures), 1);

        let failures = EbsVolumeKmsKeyIdValidator::validate(
            &Param::str("KmsKeyId", "key-1"),
            &Param::bool("Encrypted", true),
        );
        assert!(failures.is_empty());

        let failures = EbsVolumeKmsKeyIdValidator::validate(
            &Param::unset("KmsKeyId"),
            &Param::bool("Encrypted", false),
        );
        assert!(failures.is_empty());
    }

    struct FakeSnapshots(Result<SnapshotInfo, LookupFault>);

    #[async_trait]
    impl SnapshotStore for FakeSnapshots {
        async fn describe_snapshot(
            &self,
            _snapshot_id: &str,
        ) -> Result<SnapshotInfo, LookupFault> {
            self.0.clone()
        }
    }

    fn completed_snapshot(size: i64) -> FakeSnapshots {
        FakeSnapshots(Ok(SnapshotInfo {
            volume_size: Some(size),
            state: Some("completed".to_string()),
        }))
    }

    #[tokio::test]
    async fn snapshot_shrink_is_an_error() {
        let failures = EbsVolumeSizeSnapshotValidator::validate(
            &Param::str("SnapshotId", "snap-1234"),
            &Param::int("Size", 40),
            &completed_snapshot(50),
        )
        .await;
        assert_eq!(errors(&failures), 1);
        assert!(failures[0].message.contains("must not be smaller than 50"));
        assert!(failures[0].message.contains("snap-1234"));
    }

    #[tokio::test]
    async fn snapshot_grow_is_a_warning() {
        let failures = EbsVolumeSizeSnapshotValidator::validate(
            &Param::str("SnapshotId", "snap-1234"),
            &Param::int("Size", 60),
            &completed_snapshot(50),
        )
        .await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].level, FailureLevel::Warning);
        assert!(failures[0].message.contains("manually resize"));
    }

    #[tokio::test]
    async fn snapshot_equal_size_passes() {
        let failures = EbsVolumeSizeSnapshotValidator::validate(
            &Param::str("SnapshotId", "snap-1234"),
            &Param::int("Size", 50),
            &completed_snapshot(50),
        )
        .await;
        assert!(failures.is_empty());
    }

    #[tokio::test]
    async fn snapshot_pending_state_warns_alongside_size_outcome() {
        let store = FakeSnapshots(Ok(SnapshotInfo {
            volume_size: Some(50),
            state: Some("pending".to_string()),
        }));
        let failures = EbsVolumeSizeSnapshotValidator::validate(
            &Param::str("SnapshotId", "snap-1234"),
            &Param::int("Size", 40),
            &store,
        )
        .await;
        assert_eq!(failures.len(), 2);
        assert_eq!(errors(&failures), 1);
        assert!(failures[1].message.contains("in state 'pending' not 'completed'"));
    }

    #[tokio::test]
    async fn snapshot_missing_size_is_an_error() {
        let store = FakeSnapshots(Ok(SnapshotInfo {
            volume_size: None,
            state: Some("completed".to_string()),
        }));
        let failures = EbsVolumeSizeSnapshotValidator::validate(
            &Param::str("SnapshotId", "snap-1234"),
            &Param::int("Size", 40),
            &store,
        )
        .await;
        assert_eq!(errors(&failures), 1);
        assert!(failures[0].message.contains("Unable to get volume size"));
    }

    #[tokio::test]
    async fn snapshot_not_found_is_a_distinct_error() {
        let store = FakeSnapshots(Err(LookupFault::NotFound {
            message: "snapshot 'snap-1234' was not found".to_string(),
        }));
        let failures = EbsVolumeSizeSnapshotValidator::validate(
            &Param::str("SnapshotId", "snap-1234"),
            &Param::int("Size", 40),
            &store,
        )
        .await;
        assert_eq!(errors(&failures), 1);
        assert!(failures[0].message.contains("does not appear to exist"));
    }

    #[tokio::test]
    async fn snapshot_generic_fault_carries_underlying_message() {
        let store = FakeSnapshots(Err(LookupFault::Other {
            message: "throttled".to_string(),
        }));
        let failures = EbsVolumeSizeSnapshotValidator::validate(
            &Param::str("SnapshotId", "snap-1234"),
            &Param::int("Size", 40),
            &store,
        )
        .await;
        assert_eq!(errors(&failures), 1);
        assert!(failures[0].message.contains("throttled"));
    }

    #[tokio::test]
    async fn snapshot_unset_id_is_a_no_op() {
        let store = FakeSnapshots(Err(LookupFault::Other {
            message: "should never be called".to_string(),
        }));
        let failures = EbsVolumeSizeSnapshotValidator::validate(
            &Param::unset("SnapshotId"),
            &Param::int("Size", 40),
            &store,
        )
        .await;
        assert!(failures.is_empty());
    }

    #[test]
    fn validators_are_idempotent() {
        let volume_type = Param::str("VolumeType", "gp3");
        let size = Param::int("Size", 0);
        let first = EbsVolumeTypeSizeValidator::validate(&volume_type, &size);
        let second = EbsVolumeTypeSizeValidator::validate(&volume_type, &size);
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }
}
