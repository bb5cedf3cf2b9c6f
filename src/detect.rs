use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::config::CONFIG_FILE;

/// Nearest ancestor holding `recompile.toml`, else the enclosing git
/// checkout, else the starting directory.
pub async fn find_project_root(path: Option<PathBuf>) -> Result<PathBuf> {
    let start = match path {
        Some(p) => {
            if p.is_absolute() {
                p
            } else {
                std::env::current_dir()?.join(p)
            }
        }
        None => std::env::current_dir()?,
    };

    let start = fs::canonicalize(&start)
        .await
        .with_context(|| format!("Failed to canonicalize path: {}", start.display()))?;

    if let Some(config_root) = find_ancestor_with(&start, CONFIG_FILE).await {
        return Ok(config_root);
    }

    if let Some(git_root) = find_ancestor_with(&start, ".git").await {
        return Ok(git_root);
    }

    Ok(start)
}

async fn find_ancestor_with(start: &Path, marker: &str) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if fs::metadata(current.join(marker)).await.is_ok() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}
