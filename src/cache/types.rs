use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::extract::includes::ResolvedInclude;
use crate::fingerprint::Fingerprint;

/// One source or header as observed by a specific build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileState {
    pub path: PathBuf,
    pub fingerprint: Fingerprint,
    pub resolved_includes: Vec<ResolvedInclude>,
}

impl FileState {
    pub fn resolved_paths(&self) -> impl Iterator<Item = &Path> {
        self.resolved_includes
            .iter()
            .filter_map(|include| include.resolved_path.as_deref())
    }

    /// Equal content and the same set of resolved include paths. Differences
    /// in reference spelling alone do not count.
    pub fn is_equivalent(&self, other: &FileState) -> bool {
        if self.fingerprint != other.fingerprint {
            return false;
        }

        let ours: BTreeSet<&Path> = self.resolved_paths().collect();
        let theirs: BTreeSet<&Path> = other.resolved_paths().collect();
        ours == theirs
    }
}
