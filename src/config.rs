use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cli::Overrides;
use recompile::pipeline::DEFAULT_EXTENSIONS;

pub const CONFIG_FILE: &str = "recompile.toml";
pub const STATE_DIR: &str = ".recompile";

/// `recompile.toml`. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub task: Option<String>,
    pub sources: Vec<PathBuf>,
    pub extensions: Vec<String>,
    pub include_roots: Vec<PathBuf>,
    pub object_dir: Option<PathBuf>,
    pub compiler: Option<String>,
    pub args: Vec<String>,
    pub jobs: Option<usize>,
}

/// Fully resolved settings for one invocation. Paths are absolute.
#[derive(Debug, Clone)]
pub struct Settings {
    pub root: PathBuf,
    pub task: String,
    pub sources: Vec<PathBuf>,
    pub extensions: Vec<String>,
    pub include_roots: Vec<PathBuf>,
    pub object_dir: PathBuf,
    pub compiler: String,
    pub args: Vec<String>,
    pub jobs: usize,
}

impl Settings {
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }
}

pub async fn load_config(root: &Path) -> Result<ConfigFile> {
    let path = root.join(CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ConfigFile::default()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn resolve_settings(root: &Path, file: ConfigFile, overrides: &Overrides) -> Settings {
    let absolute = |p: &PathBuf| {
        if p.is_absolute() {
            p.clone()
        } else {
            root.join(p)
        }
    };

    let pick = |cli: &[PathBuf], file: &[PathBuf]| -> Vec<PathBuf> {
        let chosen = if cli.is_empty() { file } else { cli };
        chosen.iter().map(absolute).collect()
    };

    let mut sources = pick(overrides.sources.as_slice(), file.sources.as_slice());
    if sources.is_empty() {
        sources.push(root.to_path_buf());
    }

    let extensions = if file.extensions.is_empty() {
        DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
    } else {
        file.extensions
    };

    let object_dir = overrides
        .object_dir
        .as_ref()
        .or(file.object_dir.as_ref())
        .map(absolute)
        .unwrap_or_else(|| root.join(STATE_DIR).join("objs"));

    let task = overrides
        .task
        .clone()
        .or(file.task)
        .unwrap_or_else(|| root.to_string_lossy().replace('\\', "/"));

    Settings {
        root: root.to_path_buf(),
        task,
        sources,
        extensions,
        include_roots: pick(overrides.include_roots.as_slice(), file.include_roots.as_slice()),
        object_dir,
        compiler: overrides
            .compiler
            .clone()
            .or(file.compiler)
            .unwrap_or_else(|| "cc".to_string()),
        args: file.args,
        jobs: overrides.jobs.or(file.jobs).unwrap_or_else(num_cpus::get),
    }
}
