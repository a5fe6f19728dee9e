use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Backup cadence tier. Selects both the remote key prefix and the
/// retention count applied during pruning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl BackupType {
    /// Total mapping from an invocation string to a tier.
    ///
    /// Unrecognized values fall back to `Hourly`. This is a deliberate
    /// default, and it applies to everything derived from the tier: an
    /// unknown string uploads under the `hourly/` key prefix, prunes the
    /// `hourly/` prefix, and uses the hourly retention count, rather than
    /// erroring out.
    pub fn parse(s: &str) -> Self {
        match s {
            "daily" => BackupType::Daily,
            "weekly" => BackupType::Weekly,
            "monthly" => BackupType::Monthly,
            _ => BackupType::Hourly,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackupType::Hourly => "hourly",
            BackupType::Daily => "daily",
            BackupType::Weekly => "weekly",
            BackupType::Monthly => "monthly",
        }
    }
}

impl fmt::Display for BackupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maximum number of archives kept per tier. A count of N means "keep at
/// most the N newest objects under that tier's prefix"; 0 deletes all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_hourly")]
    pub hourly: usize,
    #[serde(default = "default_daily")]
    pub daily: usize,
    #[serde(default = "default_weekly")]
    pub weekly: usize,
    #[serde(default = "default_monthly")]
    pub monthly: usize,
}

impl RetentionConfig {
    /// Explicit tier → count mapping.
    pub fn retained(&self, backup_type: BackupType) -> usize {
        match backup_type {
            BackupType::Hourly => self.hourly,
            BackupType::Daily => self.daily,
            BackupType::Weekly => self.weekly,
            BackupType::Monthly => self.monthly,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            hourly: default_hourly(),
            daily: default_daily(),
            weekly: default_weekly(),
            monthly: default_monthly(),
        }
    }
}

fn default_hourly() -> usize {
    24
}

fn default_daily() -> usize {
    7
}

fn default_weekly() -> usize {
    4
}

fn default_monthly() -> usize {
    12
}

/// Configuration consumed by one backup run. Constructed once per run by
/// the caller (loading and validation are external concerns) and read-only
/// thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Remote bucket identifier.
    pub bucket: String,
    /// Key prefix prepended to every remote object.
    pub prefix: String,
    /// Local directory tree to archive.
    pub data_dir: String,
    /// Root for per-run working directories.
    /// Default: system temp dir + "backups".
    #[serde(default)]
    pub work_dir: Option<String>,
    #[serde(default)]
    pub retention: RetentionConfig,
}

impl BackupConfig {
    /// The per-run working directory. Created fresh by the archiver and
    /// removed during cleanup; must not pre-exist when a run starts.
    pub fn work_dir(&self) -> PathBuf {
        match &self.work_dir {
            Some(dir) => PathBuf::from(dir),
            None => std::env::temp_dir().join("backups"),
        }
    }
}
