mod types;

pub use types::FileState;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Bumped whenever the persisted layout changes. A stored state with another
/// version is discarded.
pub const STATE_VERSION: u32 = 1;

/// Everything one compile task knew after its last build.
///
/// `files` covers sources and every header reached from them. Each present
/// `resolved_path` is itself a key, so the include graph can be walked
/// without touching disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationState {
    pub version: u32,
    pub source_files: BTreeSet<PathBuf>,
    pub files: BTreeMap<PathBuf, FileState>,
}

impl Default for CompilationState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            source_files: BTreeSet::new(),
            files: BTreeMap::new(),
        }
    }
}

impl CompilationState {
    pub fn get(&self, path: &Path) -> Option<&FileState> {
        self.files.get(path)
    }

    pub fn is_source(&self, path: &Path) -> bool {
        self.source_files.contains(path)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn header_count(&self) -> usize {
        self.files
            .keys()
            .filter(|path| !self.source_files.contains(*path))
            .count()
    }

    /// Paths referenced by some entry but missing as keys. Empty for any
    /// state the processor produced.
    pub fn dangling_paths(&self) -> Vec<&Path> {
        let mut dangling: Vec<&Path> = self
            .files
            .values()
            .flat_map(|state| state.resolved_paths())
            .filter(|path| !self.files.contains_key(*path))
            .collect();
        dangling.sort();
        dangling.dedup();
        dangling
    }

    pub fn to_bytes(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> bincode::Result<Self> {
        bincode::deserialize(bytes)
    }
}
