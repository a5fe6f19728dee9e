use tracing::{debug, info};

use crate::config::{BackupConfig, BackupType};
use crate::error::{BackupError, Result};
use crate::storage::StorageBackend;

/// Outcome of applying a retention count to a set of remote keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrunePlan {
    /// Keys retained, newest first.
    pub kept: Vec<String>,
    /// Keys scheduled for deletion, newest first.
    pub expired: Vec<String>,
}

/// Split `keys` into the `keep` newest and the expired remainder.
///
/// Keys embed a lexically time-sortable timestamp, so descending string
/// order equals reverse-chronological order; ties fall back to full-string
/// comparison, which is deterministic.
pub fn plan(mut keys: Vec<String>, keep: usize) -> PrunePlan {
    keys.sort_unstable_by(|a, b| b.cmp(a));
    let expired = keys.split_off(keep.min(keys.len()));
    PrunePlan {
        kept: keys,
        expired,
    }
}

/// Enforce the retention count for one tier: list the tier's objects and
/// delete the oldest excess in a single batch. Returns the number of keys
/// deleted.
///
/// Both failure modes here are recoverable by type ([`BackupError::PruneList`],
/// [`BackupError::PruneDelete`]): a failed prune never invalidates the backup
/// that was just uploaded.
pub fn run(
    config: &BackupConfig,
    backend: &dyn StorageBackend,
    backup_type: BackupType,
) -> Result<usize> {
    let prefix = format!("{}/{}", config.prefix, backup_type);
    let keys = backend
        .list(&prefix)
        .map_err(|e| BackupError::PruneList {
            prefix: prefix.clone(),
            reason: e.to_string(),
        })?;

    let keep = config.retention.retained(backup_type);
    let plan = plan(keys, keep);
    if plan.expired.is_empty() {
        debug!(prefix = %prefix, keep, "nothing to prune");
        return Ok(0);
    }

    backend
        .delete_batch(&plan.expired)
        .map_err(|e| BackupError::PruneDelete {
            reason: e.to_string(),
        })?;

    info!(
        prefix = %prefix,
        kept = plan.kept.len(),
        deleted = plan.expired.len(),
        "pruned expired backups"
    );
    Ok(plan.expired.len())
}
