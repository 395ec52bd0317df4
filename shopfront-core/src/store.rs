//! Durable persistence for the single profile record.
//!
//! One JSON document at an injected path, created lazily on the first save.
//! Writes go through a sibling temp file and an atomic rename so a reader
//! never observes a half-written document; read-modify-write sequences run
//! under an exclusive advisory lock on a sibling `.lock` file.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::time::{sleep, Instant};

use crate::error::{CoreError, CoreResult};

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(25);
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_DOCUMENT_SIZE: u64 = 10 * 1024 * 1024; // 10MB

/// Holder metadata written into the lock file for diagnosing contention.
#[derive(Debug, Serialize)]
struct LockMetadata {
    pid: u32,
    acquired_at: chrono::DateTime<chrono::Utc>,
}

/// An exclusive advisory lock held for one read-modify-write sequence.
///
/// Released on drop, so every exit path (including a failing closure) gives
/// the lock back. The lock file itself persists between runs; only the
/// flock is released.
struct StoreLock {
    file: std::fs::File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Durable, concurrency-safe store for exactly one profile record.
///
/// The location is injected, never a module-level singleton, so tests can
/// point each run at an isolated directory.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
    lock_timeout: Duration,
}

impl ProfileStore {
    /// Create a store backed by the JSON document at `path`. Nothing is
    /// created on disk until the first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Override the bounded lock wait.
    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Path of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the current record.
    ///
    /// A missing document is an empty record, not an error. An unreadable
    /// document is surfaced as [`CoreError::StorageCorruption`] and left in
    /// place untouched.
    pub async fn load(&self) -> CoreResult<Value> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Value::Object(Map::new()));
            }
            Err(e) => {
                return Err(CoreError::StorageError(format!(
                    "failed to stat {}: {e}",
                    self.path.display()
                )));
            }
        };
        if metadata.len() > MAX_DOCUMENT_SIZE {
            return Err(CoreError::StorageError(format!(
                "profile document too large: {} bytes (max: {MAX_DOCUMENT_SIZE} bytes)",
                metadata.len()
            )));
        }

        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            CoreError::StorageError(format!("failed to read {}: {e}", self.path.display()))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            CoreError::StorageCorruption(format!(
                "{} is not valid JSON: {e}",
                self.path.display()
            ))
        })
    }

    /// Persist the full record atomically: write a sibling temp file, then
    /// rename into place. Directory creation is implicit and idempotent.
    pub async fn save(&self, record: &Value) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                CoreError::StorageError(format!(
                    "failed to create {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|e| CoreError::SerializationError(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await.map_err(|e| {
            CoreError::StorageError(format!("failed to write {}: {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            CoreError::StorageError(format!(
                "failed to replace {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(())
    }

    /// Remove the backing document entirely. A missing document is fine.
    pub async fn reset(&self) -> CoreResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::StorageError(format!(
                "failed to remove {}: {e}",
                self.path.display()
            ))),
        }
    }

    /// Run `f` under the exclusive advisory lock.
    ///
    /// The lock is released on every exit path, including when `f` fails.
    /// Acquisition waits at most the configured timeout; exceeding it is a
    /// retryable [`CoreError::LockTimeout`].
    pub async fn with_lock<T, F, Fut>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = CoreResult<T>>,
    {
        let _lock = self.acquire_lock().await?;
        f().await
    }

    fn lock_path(&self) -> PathBuf {
        let mut raw = self.path.as_os_str().to_owned();
        raw.push(".lock");
        PathBuf::from(raw)
    }

    async fn acquire_lock(&self) -> CoreResult<StoreLock> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                CoreError::StorageError(format!(
                    "failed to create {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| {
                CoreError::StorageError(format!(
                    "failed to open lock file {}: {e}",
                    lock_path.display()
                ))
            })?;

        let deadline = Instant::now() + self.lock_timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if Instant::now() >= deadline {
                        return Err(CoreError::LockTimeout(format!(
                            "exclusive lock on {} not acquired within {:?}",
                            lock_path.display(),
                            self.lock_timeout
                        )));
                    }
                    sleep(LOCK_POLL_INTERVAL).await;
                }
                Err(e) => {
                    return Err(CoreError::StorageError(format!(
                        "failed to lock {}: {e}",
                        lock_path.display()
                    )));
                }
            }
        }

        // Holder metadata is best effort, for contention diagnostics only.
        let metadata = LockMetadata {
            pid: std::process::id(),
            acquired_at: chrono::Utc::now(),
        };
        if let Ok(json) = serde_json::to_vec(&metadata) {
            let mut handle = &file;
            let _ = file.set_len(0);
            let _ = handle.seek(SeekFrom::Start(0));
            let _ = handle.write_all(&json);
        }

        Ok(StoreLock { file })
    }
}
