use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use ignore::WalkBuilder;
use tracing::{debug, info};

use crate::config::{BackupConfig, BackupType};
use crate::error::{BackupError, Result};

/// Name of the synthetic marker entry recording the run that produced the
/// archive. Added to the archive stream instead of being written into the
/// source tree, so the tree being backed up is never mutated.
pub const MARKER_NAME: &str = "BACKUP_DATE";

/// Build a gzip-compressed tar archive of every regular file under the
/// configured data directory and return its path.
///
/// Creates the per-run working directory; a pre-existing directory (e.g.
/// from a crashed prior run) fails the run rather than being reused.
/// Partially written output is left on disk for the cleanup stage.
pub fn create(config: &BackupConfig, backup_type: BackupType, timestamp: &str) -> Result<PathBuf> {
    let work_dir = config.work_dir();
    fs::create_dir(&work_dir).map_err(|source| BackupError::WorkDir {
        path: work_dir.clone(),
        source,
    })?;

    let output = tempfile::Builder::new()
        .prefix("backup")
        .suffix(".tar.gz")
        .tempfile_in(&work_dir)
        .map_err(|e| BackupError::Archive(format!("failed to create archive file: {e}")))?;
    // The archive outlives this function; cleanup is the orchestrator's job.
    let (file, output_path) = output
        .keep()
        .map_err(|e| BackupError::Archive(format!("failed to persist archive file: {e}")))?;

    let gz = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(gz);

    append_marker(&mut builder, backup_type, timestamp)?;
    append_tree(&mut builder, Path::new(&config.data_dir))?;

    // Flush both layers so a truncated archive can never look complete.
    let gz = builder
        .into_inner()
        .map_err(|e| BackupError::Archive(format!("failed to finish tar stream: {e}")))?;
    gz.finish()
        .map_err(|e| BackupError::Archive(format!("failed to finish gzip stream: {e}")))?;

    info!(path = %output_path.display(), "archive created");
    Ok(output_path)
}

/// Remove the per-run working directory. A missing directory is not an
/// error; anything else maps to a cleanup failure.
pub fn remove_work_dir(config: &BackupConfig) -> Result<()> {
    let work_dir = config.work_dir();
    match fs::remove_dir_all(&work_dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(BackupError::Cleanup {
            path: work_dir,
            source,
        }),
    }
}

/// Write the `BACKUP_DATE` marker as the first archive entry:
/// one line `{backup_type}/{timestamp}\n`.
fn append_marker<W: std::io::Write>(
    builder: &mut tar::Builder<W>,
    backup_type: BackupType,
    timestamp: &str,
) -> Result<()> {
    let line = format!("{backup_type}/{timestamp}\n");
    let mut header = tar::Header::new_gnu();
    header.set_size(line.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(Utc::now().timestamp().max(0) as u64);
    header.set_cksum();
    builder.append_data(&mut header, MARKER_NAME, line.as_bytes())
        .map_err(|e| BackupError::Archive(format!("failed to write backup marker: {e}")))?;
    Ok(())
}

/// Walk `source` in deterministic lexical order and append every regular
/// file as a tar entry named by its source-relative path. Directories and
/// non-regular files produce no entries.
fn append_tree<W: std::io::Write>(builder: &mut tar::Builder<W>, source: &Path) -> Result<()> {
    if !source.is_dir() {
        return Err(BackupError::Archive(format!(
            "source directory does not exist: {}",
            source.display()
        )));
    }

    let mut walker = WalkBuilder::new(source);
    walker.follow_links(false);
    walker.hidden(false);
    walker.ignore(false);
    walker.git_global(false);
    walker.git_ignore(false);
    walker.git_exclude(false);
    walker.parents(false);
    walker.require_git(false);
    walker.sort_by_file_name(std::ffi::OsStr::cmp);

    for entry in walker.build() {
        let entry = entry.map_err(|e| BackupError::Archive(format!("walk error: {e}")))?;
        let file_type = match entry.file_type() {
            Some(ft) => ft,
            None => continue, // stdin entry; not produced by directory walks
        };
        if !file_type.is_file() {
            continue;
        }

        let rel = entry.path().strip_prefix(source).unwrap_or(entry.path());
        let mut file = File::open(entry.path()).map_err(|e| {
            BackupError::Archive(format!("failed to open {}: {e}", entry.path().display()))
        })?;
        debug!(file = %rel.display(), "adding file");
        // Header (size, mode, mtime) comes from file metadata; content is
        // streamed, never buffered whole.
        builder.append_file(rel, &mut file).map_err(|e| {
            BackupError::Archive(format!("failed to archive {}: {e}", entry.path().display()))
        })?;
    }

    Ok(())
}
