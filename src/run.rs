use std::fs::File;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::archive;
use crate::config::{BackupConfig, BackupType};
use crate::error::{BackupError, Result, Severity};
use crate::prune;
use crate::storage::StorageBackend;

/// Timestamp format embedded in remote keys and the archive marker.
/// Must stay lexically sortable in time order: pruning depends on it.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Result of a completed backup run.
#[derive(Debug)]
pub struct RunReport {
    pub backup_type: BackupType,
    pub timestamp: String,
    pub remote_key: String,
    /// Non-fatal stage failures (prune, cleanup) observed during the run.
    pub warnings: Vec<BackupError>,
}

/// Run one backup cycle: archive the data directory, upload the archive,
/// prune expired remote objects, remove local temporary state.
///
/// `backup_type` accepts any string; unrecognized values are treated as
/// "hourly" (see [`BackupType::parse`]). Archive and upload failures abort
/// the run; prune and cleanup failures are recorded in the report instead.
pub fn run(
    config: &BackupConfig,
    backend: &dyn StorageBackend,
    backup_type: &str,
) -> Result<RunReport> {
    let backup_type = BackupType::parse(backup_type);
    let timestamp = Utc::now().format(TIMESTAMP_FORMAT).to_string();
    info!(backup_type = %backup_type, timestamp = %timestamp, "beginning backup");

    let mut warnings = Vec::new();

    info!("compressing directory");
    let archive_path = archive::create(config, backup_type, &timestamp)?;

    let remote_key = format!("{}/{}/{}.tar.gz", config.prefix, backup_type, timestamp);
    info!(key = %remote_key, "uploading archive");
    upload(backend, &archive_path, &remote_key)?;

    info!("pruning expired backups");
    gate(
        prune::run(config, backend, backup_type).map(|_| ()),
        &mut warnings,
    )?;

    info!("removing temporary backup directory");
    gate(archive::remove_work_dir(config), &mut warnings)?;

    info!(key = %remote_key, "backup complete");
    Ok(RunReport {
        backup_type,
        timestamp,
        remote_key,
        warnings,
    })
}

/// Apply the severity policy to a stage outcome: fatal errors propagate,
/// everything else is logged and recorded as a warning.
fn gate(outcome: Result<()>, warnings: &mut Vec<BackupError>) -> Result<()> {
    match outcome {
        Ok(()) => Ok(()),
        Err(err) => match err.severity() {
            Severity::Fatal => Err(err),
            Severity::Recoverable => {
                error!(error = %err, "stage failed; continuing run");
                warnings.push(err);
                Ok(())
            }
            Severity::Warning => {
                warn!(error = %err, "stage failed; run unaffected");
                warnings.push(err);
                Ok(())
            }
        },
    }
}

/// Stream the completed archive to the object store as one logical put.
/// No retry, no checksum verification.
fn upload(backend: &dyn StorageBackend, path: &std::path::Path, key: &str) -> Result<()> {
    let mut file = File::open(path).map_err(|e| BackupError::Upload {
        key: key.to_string(),
        reason: format!("failed to open {}: {e}", path.display()),
    })?;
    let len = file
        .metadata()
        .map_err(|e| BackupError::Upload {
            key: key.to_string(),
            reason: format!("failed to stat {}: {e}", path.display()),
        })?
        .len();

    backend
        .put_stream(key, &mut file, len)
        .map_err(|e| BackupError::Upload {
            key: key.to_string(),
            reason: e.to_string(),
        })
}
