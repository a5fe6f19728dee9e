use std::io::Read;
use std::time::Duration;

use rusty_s3::actions::{ListObjectsV2, S3Action};
use rusty_s3::{Bucket, Credentials, UrlStyle};
use tracing::debug;

use crate::error::{BackupError, Result};
use crate::storage::StorageBackend;

/// Duration for presigned URL validity.
const PRESIGN_DURATION: Duration = Duration::from_secs(3600);

/// S3-compatible backend using presigned requests over a blocking agent.
///
/// No retry layer: a single failure is surfaced immediately to the caller.
pub struct S3Backend {
    bucket: Bucket,
    credentials: Credentials,
    agent: ureq::Agent,
}

impl S3Backend {
    pub fn new(
        bucket_name: &str,
        region: &str,
        endpoint: &str,
        access_key_id: &str,
        secret_access_key: &str,
    ) -> Result<Self> {
        let base_url = endpoint.parse().map_err(|e| {
            BackupError::Config(format!("invalid S3 endpoint URL '{endpoint}': {e}"))
        })?;

        // Endpoint is always explicit; use path-style addressing.
        let bucket = Bucket::new(
            base_url,
            UrlStyle::Path,
            bucket_name.to_string(),
            region.to_string(),
        )
        .map_err(|e| BackupError::Config(format!("failed to create S3 bucket handle: {e}")))?;

        let credentials = Credentials::new(access_key_id, secret_access_key);

        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(30))
            .timeout_read(Duration::from_secs(300))
            .timeout_write(Duration::from_secs(300))
            .build();

        Ok(Self {
            bucket,
            credentials,
            agent,
        })
    }
}

impl StorageBackend for S3Backend {
    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut action = self.bucket.list_objects_v2(Some(&self.credentials));
            action.query_mut().insert("prefix", prefix);
            if let Some(ref token) = continuation_token {
                action.query_mut().insert("continuation-token", token);
            }
            let url = action.sign(PRESIGN_DURATION);

            let resp = self
                .agent
                .get(url.as_str())
                .call()
                .map_err(|e| BackupError::Other(format!("S3 LIST {prefix}: {e}")))?;
            let mut body = String::new();
            resp.into_reader()
                .read_to_string(&mut body)
                .map_err(|e| BackupError::Other(format!("S3 LIST {prefix}: {e}")))?;
            let parsed = ListObjectsV2::parse_response(&body).map_err(|e| {
                BackupError::Other(format!("S3 LIST {prefix}: failed to parse response: {e}"))
            })?;

            for obj in &parsed.contents {
                // Skip directory markers
                if obj.key.ends_with('/') {
                    continue;
                }
                keys.push(obj.key.clone());
            }

            match parsed.next_continuation_token {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }

        Ok(keys)
    }

    fn put_stream(&self, key: &str, reader: &mut dyn Read, len: u64) -> Result<()> {
        let url = self
            .bucket
            .put_object(Some(&self.credentials), key)
            .sign(PRESIGN_DURATION);

        // Explicit Content-Length keeps ureq from falling back to chunked
        // transfer encoding, which S3 does not accept for plain PUTs.
        self.agent
            .put(url.as_str())
            .set("Content-Length", &len.to_string())
            .send(reader)
            .map_err(|e| BackupError::Other(format!("S3 PUT {key}: {e}")))?;
        Ok(())
    }

    fn delete_batch(&self, keys: &[String]) -> Result<()> {
        // One logical batch from the caller's viewpoint; issued as per-key
        // presigned DELETEs with failures collected into a single error.
        let mut failed: Vec<String> = Vec::new();
        for key in keys {
            let url = self
                .bucket
                .delete_object(Some(&self.credentials), key)
                .sign(PRESIGN_DURATION);

            match self.agent.delete(url.as_str()).call() {
                Ok(_) => debug!(key = %key, "deleted remote object"),
                Err(e) => {
                    debug!(key = %key, error = %e, "remote delete failed");
                    failed.push(key.clone());
                }
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(BackupError::Other(format!(
                "S3 batch delete: {} of {} keys failed: {}",
                failed.len(),
                keys.len(),
                failed.join(", ")
            )))
        }
    }
}
