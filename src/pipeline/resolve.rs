use std::path::{Component, Path, PathBuf};

use crate::extract::includes::{IncludeReference, ResolvedInclude};

/// Maps one include reference, seen from one including directory, to a file.
pub trait IncludeResolver: Send + Sync {
    fn resolve(&self, reference: &IncludeReference, including_dir: &Path) -> Option<PathBuf>;

    fn resolve_all(
        &self,
        references: Vec<IncludeReference>,
        including_dir: &Path,
    ) -> Vec<ResolvedInclude> {
        references
            .into_iter()
            .map(|reference| {
                let resolved_path = self.resolve(&reference, including_dir);
                ResolvedInclude {
                    reference,
                    resolved_path,
                }
            })
            .collect()
    }
}

/// Searches the including file's directory (quoted form only), then each
/// include root in configured order. The first existing file wins.
#[derive(Debug, Clone, Default)]
pub struct DefaultIncludeResolver {
    include_roots: Vec<PathBuf>,
}

impl DefaultIncludeResolver {
    pub fn new(include_roots: Vec<PathBuf>) -> Self {
        Self { include_roots }
    }

    pub fn include_roots(&self) -> &[PathBuf] {
        &self.include_roots
    }

    fn candidates<'a>(
        &'a self,
        reference: &IncludeReference,
        including_dir: &'a Path,
    ) -> impl Iterator<Item = &'a Path> {
        let local = (!reference.is_system).then_some(including_dir);
        local
            .into_iter()
            .chain(self.include_roots.iter().map(PathBuf::as_path))
    }
}

impl IncludeResolver for DefaultIncludeResolver {
    fn resolve(&self, reference: &IncludeReference, including_dir: &Path) -> Option<PathBuf> {
        let target = Path::new(&reference.text);

        if target.is_absolute() {
            return target.is_file().then(|| normalize(target));
        }

        self.candidates(reference, including_dir)
            .map(|dir| dir.join(target))
            .find(|candidate| candidate.is_file())
            .map(|found| normalize(&found))
    }
}

/// Folds `.` and `..` components so one header reached through different
/// spellings gets one key. A `..` directly after a symlink is kept, because
/// the OS resolves it against the link target rather than the link's parent.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let after_dir = matches!(out.components().next_back(), Some(Component::Normal(_)));
                let at_root = matches!(out.components().next_back(), Some(Component::RootDir));
                if after_dir && !is_symlink(&out) {
                    out.pop();
                } else if !at_root {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }

    out
}

fn is_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_symlink())
}
