pub mod local_backend;
pub mod s3_backend;

use std::io::Read;

use crate::error::Result;

pub use local_backend::LocalBackend;
pub use s3_backend::S3Backend;

/// Narrow object-store surface needed by the backup pipeline.
///
/// Kept to exactly the three operations the pipeline performs so pruning
/// and upload logic can be tested against an in-memory fake and ported to
/// any blob-storage backend without touching pipeline code.
pub trait StorageBackend: Send + Sync {
    /// List all object keys starting with `prefix`.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Store `len` bytes read from `reader` under `key` as a single
    /// logical put. The backend may chunk internally, but the operation
    /// either fully succeeds or fails.
    fn put_stream(&self, key: &str, reader: &mut dyn Read, len: u64) -> Result<()>;

    /// Delete the given keys as one logical batch. A partial failure is
    /// surfaced as an error naming the keys that could not be deleted.
    fn delete_batch(&self, keys: &[String]) -> Result<()>;
}
