use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::Result;

pub const DEFAULT_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx", "c++", "m", "mm"];

pub struct WalkResult {
    pub files: BTreeSet<PathBuf>,
}

/// Finds source files under `dirs`, honoring ignore files. Anything under one
/// of `excluded` is skipped.
pub async fn find_sources(
    dirs: Vec<PathBuf>,
    extensions: Vec<String>,
    excluded: Vec<PathBuf>,
) -> Result<WalkResult> {
    let result =
        tokio::task::spawn_blocking(move || find_sources_sync(&dirs, &extensions, &excluded))
            .await?;
    Ok(result)
}

fn find_sources_sync(dirs: &[PathBuf], extensions: &[String], excluded: &[PathBuf]) -> WalkResult {
    let files = Mutex::new(BTreeSet::new());

    let Some((first, rest)) = dirs.split_first() else {
        return WalkResult {
            files: BTreeSet::new(),
        };
    };

    let mut builder = WalkBuilder::new(first);
    for dir in rest {
        builder.add(dir);
    }

    let walker = builder
        .hidden(false)
        .ignore(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .parents(true)
        .threads(num_cpus::get())
        .build_parallel();

    walker.run(|| {
        let files = &files;

        Box::new(move |entry| {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => return ignore::WalkState::Continue,
            };

            let path = entry.path();

            if excluded.iter().any(|dir| path.starts_with(dir)) {
                return ignore::WalkState::Skip;
            }

            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                return ignore::WalkState::Continue;
            }

            if has_source_extension(path, extensions) {
                if let Ok(mut files) = files.lock() {
                    files.insert(path.to_path_buf());
                }
            }

            ignore::WalkState::Continue
        })
    });

    let files = files.into_inner().unwrap_or_else(PoisonError::into_inner);

    WalkResult { files }
}

fn has_source_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|wanted| wanted == ext))
}
