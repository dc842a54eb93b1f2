//! JSON record stores and the background flusher that writes them.
//!
//! `trusted.json` and `pages.json` are plain JSON arrays.  The application
//! layer never writes them directly: it hands each new snapshot to a
//! [`SnapshotFlusher`] (through the [`SnapshotSink`] trait) and carries on.
//! The flusher task writes snapshots in the order received, skipping any
//! that were already superseded by a newer one, and retries a failed write
//! until it succeeds or a newer snapshot replaces it.
//!
//! [`SnapshotFlusher::flush`] waits until everything scheduled so far is on
//! disk; the host calls it on shutdown.  A flush makes one more attempt at
//! a failing write instead of waiting out the retry delay.
//!
//! Writes go to a temporary file that is renamed over the target, so a crash
//! mid-write leaves the previous file intact.

use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::application::state::SnapshotSink;

/// Default delay before retrying a failed write.
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Error type for record store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The blocking write task was cancelled or panicked.
    #[error("storage task failed: {0}")]
    Task(String),
}

/// Durable storage for one value.
pub trait RecordStore<T>: Send + Sync {
    /// Returns `None` if nothing has been stored yet.
    fn load(&self) -> Result<Option<T>, StorageError>;
    fn save(&self, value: &T) -> Result<(), StorageError>;
}

/// Stores a value as pretty-printed JSON in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl<T: Serialize + DeserializeOwned> RecordStore<T> for JsonFileStore {
    fn load(&self) -> Result<Option<T>, StorageError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StorageError::Json {
                path: self.path.clone(),
                source,
            })
    }

    fn save(&self, value: &T) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;
        }
        let json = serde_json::to_vec_pretty(value).map_err(|source| StorageError::Json {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }
}

/// In-memory store used by tests.
pub struct MemoryStore<T> {
    value: Mutex<Option<T>>,
    saves: AtomicUsize,
    failures_left: AtomicUsize,
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self {
            value: Mutex::new(None),
            saves: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
        }
    }
}

impl<T: Clone> MemoryStore<T> {
    pub fn value(&self) -> Option<T> {
        self.value.lock().expect("lock poisoned").clone()
    }

    /// Number of successful saves.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Makes the next `n` saves fail.
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }
}

impl<T: Clone + Send> RecordStore<T> for MemoryStore<T> {
    fn load(&self) -> Result<Option<T>, StorageError> {
        Ok(self.value())
    }

    fn save(&self, value: &T) -> Result<(), StorageError> {
        let injected = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StorageError::Io {
                path: PathBuf::from("<memory>"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "injected failure"),
            });
        }
        *self.value.lock().expect("lock poisoned") = Some(value.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Loads the stored value, falling back to `default` when the store is empty
/// or unreadable.  An unreadable store is logged and left untouched until
/// the next successful write.
pub fn load_or_else<T, S>(store: &S, what: &str, default: impl FnOnce() -> T) -> T
where
    S: RecordStore<T> + ?Sized,
{
    match store.load() {
        Ok(Some(value)) => value,
        Ok(None) => {
            debug!("no stored {what}; using defaults");
            default()
        }
        Err(e) => {
            warn!("failed to load {what}: {e}; using defaults");
            default()
        }
    }
}

enum Job<T> {
    Save(T),
    Flush(oneshot::Sender<()>),
}

/// Queues snapshots for a background writer task.
pub struct SnapshotFlusher<T> {
    tx: mpsc::UnboundedSender<Job<T>>,
}

impl<T> Clone for SnapshotFlusher<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> SnapshotFlusher<T>
where
    T: Clone + Send + 'static,
{
    /// Starts the writer task for `store`.  The task ends once every
    /// flusher handle has been dropped and the queue is drained.
    pub fn spawn(store: Arc<dyn RecordStore<T>>, what: &'static str) -> (Self, JoinHandle<()>) {
        Self::spawn_with_retry(store, what, RETRY_DELAY)
    }

    pub fn spawn_with_retry(
        store: Arc<dyn RecordStore<T>>,
        what: &'static str,
        retry_delay: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(flush_loop(store, what, retry_delay, rx));
        (Self { tx }, task)
    }

    /// Resolves once every snapshot scheduled before this call has been
    /// written, or its final attempt has failed.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Job::Flush(done)).is_err() {
            return;
        }
        let _ = wait.await;
    }
}

impl<T: Send> SnapshotSink<T> for SnapshotFlusher<T> {
    fn schedule(&self, snapshot: T) {
        if self.tx.send(Job::Save(snapshot)).is_err() {
            error!("snapshot writer has stopped; change not persisted");
        }
    }
}

async fn flush_loop<T>(
    store: Arc<dyn RecordStore<T>>,
    what: &'static str,
    retry_delay: Duration,
    mut rx: mpsc::UnboundedReceiver<Job<T>>,
) where
    T: Clone + Send + 'static,
{
    let mut closing = false;
    while let Some(first) = rx.recv().await {
        let mut latest = None;
        let mut waiters = Vec::new();
        let mut next = Some(first);
        while let Some(job) = next {
            match job {
                Job::Save(snapshot) => latest = Some(snapshot),
                Job::Flush(done) => waiters.push(done),
            }
            next = rx.try_recv().ok();
        }

        if let Some(mut snapshot) = latest {
            loop {
                match write_blocking(Arc::clone(&store), snapshot.clone()).await {
                    Ok(()) => {
                        debug!("{what} saved");
                        break;
                    }
                    Err(e) if closing || !waiters.is_empty() => {
                        error!("giving up on saving {what}: {e}");
                        break;
                    }
                    Err(e) => warn!("failed to save {what}: {e}; retrying"),
                }

                tokio::select! {
                    job = rx.recv() => match job {
                        Some(Job::Save(newer)) => snapshot = newer,
                        Some(Job::Flush(done)) => waiters.push(done),
                        None => closing = true,
                    },
                    _ = tokio::time::sleep(retry_delay) => {}
                }
            }
        }

        for done in waiters {
            let _ = done.send(());
        }
        if closing {
            return;
        }
    }
}

async fn write_blocking<T>(store: Arc<dyn RecordStore<T>>, snapshot: T) -> Result<(), StorageError>
where
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || store.save(&snapshot))
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
}

// ── Tests ─────────────────────────────────────────────────────────────────────
