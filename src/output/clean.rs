use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{EngineError, Result};

pub const OBJECT_EXTENSION: &str = "o";

/// Object file for `source` under `object_dir`.
///
/// Objects sit in a directory named after a hash of the source path so two
/// sources with the same file name never share an object.
pub fn object_file_for(object_dir: &Path, source: &Path) -> PathBuf {
    let digest = blake3::hash(source.to_string_lossy().as_bytes()).to_hex();
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());

    object_dir
        .join(&digest[..8])
        .join(format!("{}.{}", stem, OBJECT_EXTENSION))
}

/// Deletes compiled outputs from an object directory.
#[derive(Debug, Clone)]
pub struct StaleOutputCleaner {
    object_dir: PathBuf,
}

impl StaleOutputCleaner {
    pub fn new(object_dir: impl Into<PathBuf>) -> Self {
        Self {
            object_dir: object_dir.into(),
        }
    }

    /// Removes everything under the object directory. Returns whether
    /// anything was deleted.
    pub async fn clean_all(&self) -> Result<bool> {
        let mut entries = match tokio::fs::read_dir(&self.object_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(self.clean_error(e)),
        };

        let mut deleted = false;

        while let Some(entry) = entries.next_entry().await.map_err(|e| self.clean_error(e))? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(|e| self.clean_error(e))?;

            let removed = if file_type.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            removed.map_err(|e| self.clean_error(e))?;

            debug!(path = %path.display(), "deleted output");
            deleted = true;
        }

        Ok(deleted)
    }

    /// Removes the objects of sources that are no longer part of the build.
    pub async fn remove_objects(&self, removed: &BTreeSet<PathBuf>) -> Result<usize> {
        let mut count = 0;

        for source in removed {
            let object = object_file_for(&self.object_dir, source);

            match tokio::fs::remove_file(&object).await {
                Ok(()) => {
                    debug!(source = %source.display(), object = %object.display(), "deleted stale object");
                    count += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(self.clean_error(e)),
            }

            if let Some(parent) = object.parent() {
                let _ = tokio::fs::remove_dir(parent).await;
            }
        }

        Ok(count)
    }

    fn clean_error(&self, source: io::Error) -> EngineError {
        EngineError::Clean {
            path: self.object_dir.clone(),
            source,
        }
    }
}
