use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::{CompilationState, STATE_VERSION};
use crate::error::StoreError;

/// Durable task key → state mapping. Values are always replaced whole.
pub trait StateStore: Send + Sync {
    /// Unreadable or corrupt state comes back as `None`; callers then treat
    /// every source as new.
    fn get(&self, task_key: &str) -> impl Future<Output = Option<CompilationState>> + Send;

    fn put(
        &self,
        task_key: &str,
        state: &CompilationState,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Decodes stored bytes, discarding anything that isn't a current-version
/// state.
fn decode(task_key: &str, bytes: &[u8]) -> Option<CompilationState> {
    match CompilationState::from_bytes(bytes) {
        Ok(state) if state.version == STATE_VERSION => Some(state),
        Ok(state) => {
            warn!(
                task = task_key,
                found = state.version,
                expected = STATE_VERSION,
                "discarding state with unknown version"
            );
            None
        }
        Err(e) => {
            warn!(task = task_key, error = %e, "discarding corrupt state");
            None
        }
    }
}

fn encode(task_key: &str, state: &CompilationState) -> Result<Vec<u8>, StoreError> {
    state.to_bytes().map_err(|source| StoreError::Encode {
        task: task_key.to_string(),
        source,
    })
}

/// One bincode file per task under a state directory.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `task_key`. Keys are hashed since task paths contain
    /// separators.
    pub fn path_for(&self, task_key: &str) -> PathBuf {
        let digest = blake3::hash(task_key.as_bytes()).to_hex();
        self.dir.join(format!("{}.bin", &digest[..16]))
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let tmp = path.with_extension("bin.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await
    }
}

impl StateStore for FileStateStore {
    async fn get(&self, task_key: &str) -> Option<CompilationState> {
        let path = self.path_for(task_key);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(task = task_key, "no recorded state");
                return None;
            }
            Err(e) => {
                warn!(task = task_key, path = %path.display(), error = %e, "unreadable state");
                return None;
            }
        };

        decode(task_key, &bytes)
    }

    async fn put(&self, task_key: &str, state: &CompilationState) -> Result<(), StoreError> {
        let bytes = encode(task_key, state)?;
        let path = self.path_for(task_key);

        self.write_atomic(&path, &bytes)
            .await
            .map_err(|source| StoreError::Write {
                task: task_key.to_string(),
                source,
            })?;

        debug!(task = task_key, bytes = bytes.len(), "stored state");
        Ok(())
    }
}

/// Keeps encoded states in memory. Values still go through the byte
/// encoding so behavior matches the file store.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    states: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_raw(&self, task_key: &str, bytes: Vec<u8>) {
        if let Ok(mut states) = self.states.lock() {
            states.insert(task_key.to_string(), bytes);
        }
    }

    pub fn contains(&self, task_key: &str) -> bool {
        self.states
            .lock()
            .map(|states| states.contains_key(task_key))
            .unwrap_or(false)
    }
}

impl StateStore for MemoryStateStore {
    async fn get(&self, task_key: &str) -> Option<CompilationState> {
        let bytes = self.states.lock().ok()?.get(task_key).cloned()?;
        decode(task_key, &bytes)
    }

    async fn put(&self, task_key: &str, state: &CompilationState) -> Result<(), StoreError> {
        let bytes = encode(task_key, state)?;
        let mut states = self.states.lock().map_err(|_| StoreError::Write {
            task: task_key.to_string(),
            source: io::Error::other("state map poisoned"),
        })?;
        states.insert(task_key.to_string(), bytes);
        Ok(())
    }
}
