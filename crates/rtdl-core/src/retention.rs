//! Storage retention policy
//!
//! Two ways of bounding disk usage under the storage root:
//! - [`auto_clean`] deletes every file older than a threshold (periodic sweep)
//! - [`delete_oldest`] evicts the single oldest file (on-demand `clean`)
//!
//! Both prune directories left empty afterwards and never remove the root.
//! Neither coordinates with the engine: a file still being written can be
//! deleted if it qualifies.

use crate::error::RtdlError;
use crate::storage::{self, StoredFile};
use chrono::Utc;
use rtdl_types::{EvictionReport, SweepOutcome, SweepReport};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info};

pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Age-based retention settings for a storage root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub root_dir: PathBuf,
    pub age_threshold_days: u64,
}

impl RetentionPolicy {
    pub fn new(root_dir: impl Into<PathBuf>, age_threshold_days: u64) -> Self {
        Self {
            root_dir: root_dir.into(),
            age_threshold_days,
        }
    }

    /// Files with an mtime at or before this instant are expired
    ///
    /// Thresholds too large for the clock saturate, so nothing expires.
    pub fn cutoff_ms(&self, now_ms: i64) -> i64 {
        let days = i64::try_from(self.age_threshold_days).unwrap_or(i64::MAX);
        now_ms.saturating_sub(days.saturating_mul(MILLIS_PER_DAY))
    }

    pub fn is_expired(&self, file: &StoredFile, now_ms: i64) -> bool {
        file.mtime_ms <= self.cutoff_ms(now_ms)
    }
}

/// The root must be a directory when it exists at all
async fn check_root(root: &Path) -> Result<(), RtdlError> {
    match fs::metadata(root).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(RtdlError::fs(
            root,
            std::io::Error::new(std::io::ErrorKind::Other, "storage root is not a directory"),
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RtdlError::fs(root, e)),
    }
}

/// Delete every file older than the policy threshold
pub async fn auto_clean(policy: &RetentionPolicy) -> Result<SweepReport, RtdlError> {
    auto_clean_at(policy, Utc::now().timestamp_millis()).await
}

/// [`auto_clean`] with an explicit clock reading
pub async fn auto_clean_at(policy: &RetentionPolicy, now_ms: i64) -> Result<SweepReport, RtdlError> {
    check_root(&policy.root_dir).await?;

    let files = storage::list_files(&policy.root_dir).await;
    let scanned = files.len();
    if files.is_empty() {
        return Ok(SweepReport::nothing_to_do(
            SweepOutcome::NoFiles,
            policy.age_threshold_days,
            0,
        ));
    }

    let expired: Vec<_> = files
        .into_iter()
        .filter(|f| policy.is_expired(f, now_ms))
        .collect();
    if expired.is_empty() {
        return Ok(SweepReport::nothing_to_do(
            SweepOutcome::NothingOldEnough,
            policy.age_threshold_days,
            scanned,
        ));
    }

    let tally = delete_files(&expired).await;
    let pruned_dirs = storage::prune_empty_dirs(&policy.root_dir).await;

    Ok(SweepReport {
        outcome: SweepOutcome::Cleaned,
        threshold_days: policy.age_threshold_days,
        scanned_count: scanned,
        deleted_count: tally.deleted_count,
        failed_count: tally.failed_count,
        bytes_freed: tally.bytes_freed,
        pruned_dirs,
    })
}

/// Outcome counts of a batch deletion
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DeletionTally {
    pub deleted_count: usize,
    pub failed_count: usize,
    pub bytes_freed: u64,
}

/// Remove every file in `files`; a failure is logged and the batch goes on
pub(crate) async fn delete_files(files: &[StoredFile]) -> DeletionTally {
    let mut tally = DeletionTally::default();
    for file in files {
        match fs::remove_file(&file.path).await {
            Ok(()) => {
                tally.deleted_count += 1;
                tally.bytes_freed += file.size_bytes;
                info!("Auto-deleted: {}", file.path.display());
            }
            Err(e) => {
                tally.failed_count += 1;
                error!("Failed to delete {}: {}", file.path.display(), e);
            }
        }
    }
    tally
}

/// The file with the smallest mtime; the first one encountered wins ties
pub fn oldest(files: &[StoredFile]) -> Option<&StoredFile> {
    files.iter().reduce(|best, f| if f.mtime_ms < best.mtime_ms { f } else { best })
}

/// Delete the single oldest file anywhere under `root`
pub async fn delete_oldest(root: &Path) -> Result<EvictionReport, RtdlError> {
    check_root(root).await?;

    let files = storage::list_files(root).await;
    let victim = oldest(&files).ok_or(RtdlError::NothingToDelete)?;

    fs::remove_file(&victim.path)
        .await
        .map_err(|e| RtdlError::fs(&victim.path, e))?;
    info!("Deleted: {}", victim.path.display());

    let pruned_dirs = storage::prune_empty_dirs(root).await;

    Ok(EvictionReport {
        path: victim.path.clone(),
        size_bytes: victim.size_bytes,
        pruned_dirs,
    })
}
