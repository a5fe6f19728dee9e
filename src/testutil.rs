use std::collections::HashMap;
use std::io::Read;
use std::sync::{Mutex, Once};

use crate::error::{BackupError, Result};
use crate::storage::StorageBackend;

static TRACING_INIT: Once = Once::new();

/// Route pipeline tracing through the test harness capture so `--nocapture`
/// shows stage logs. Filter defaults to `debug`, overridable via `RUST_LOG`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .with_test_writer()
            .init();
    });
}

/// Write a byte slice through a backend's streaming put.
pub fn put_bytes(backend: &dyn StorageBackend, key: &str, data: &[u8]) {
    let mut cursor = std::io::Cursor::new(data);
    backend
        .put_stream(key, &mut cursor, data.len() as u64)
        .expect("put_bytes failed");
}

/// In-memory storage backend for testing. Thread-safe via Mutex.
pub struct MemoryBackend {
    data: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let map = self.data.lock().unwrap();
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.data.lock().unwrap().get(key).cloned()
    }
}

impl StorageBackend for MemoryBackend {
    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let map = self.data.lock().unwrap();
        Ok(map
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn put_stream(&self, key: &str, reader: &mut dyn Read, _len: u64) -> Result<()> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        self.data.lock().unwrap().insert(key.to_string(), buf);
        Ok(())
    }

    fn delete_batch(&self, keys: &[String]) -> Result<()> {
        let mut map = self.data.lock().unwrap();
        for key in keys {
            map.remove(key);
        }
        Ok(())
    }
}

/// Backend wrapper that fails selected operations, for exercising the
/// pipeline's partial-failure paths. Delegates everything else to an inner
/// `MemoryBackend`.
pub struct FlakyBackend {
    inner: MemoryBackend,
    fail_list: bool,
    fail_put: bool,
    fail_delete: bool,
}

impl FlakyBackend {
    pub fn new() -> Self {
        Self {
            inner: MemoryBackend::new(),
            fail_list: false,
            fail_put: false,
            fail_delete: false,
        }
    }

    pub fn fail_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn fail_put(mut self) -> Self {
        self.fail_put = true;
        self
    }

    pub fn fail_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    pub fn inner(&self) -> &MemoryBackend {
        &self.inner
    }
}

impl StorageBackend for FlakyBackend {
    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        if self.fail_list {
            return Err(BackupError::Other("injected list failure".into()));
        }
        self.inner.list(prefix)
    }

    fn put_stream(&self, key: &str, reader: &mut dyn Read, len: u64) -> Result<()> {
        if self.fail_put {
            return Err(BackupError::Other("injected put failure".into()));
        }
        self.inner.put_stream(key, reader, len)
    }

    fn delete_batch(&self, keys: &[String]) -> Result<()> {
        if self.fail_delete {
            return Err(BackupError::Other("injected delete failure".into()));
        }
        self.inner.delete_batch(keys)
    }
}
