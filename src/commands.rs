use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use recompile::compiler::{IncrementalNativeCompiler, NativeCompileSpec, ProcessCompiler};
use recompile::output::StaleOutputCleaner;
use recompile::pipeline::{
    DefaultIncludeResolver, IncrementalCompilation, IncrementalCompileProcessor, find_sources,
};
use recompile::store::{FileStateStore, StateStore};
use recompile::CompilationState;

use crate::cli::Overrides;
use crate::config::{self, Settings};

async fn prepare(root: &Path, overrides: &Overrides) -> Result<Settings> {
    let file = config::load_config(root).await?;
    let settings = config::resolve_settings(root, file, overrides);

    let state_dir = settings.state_dir();
    tokio::fs::create_dir_all(&state_dir)
        .await
        .with_context(|| format!("Failed to create {}", state_dir.display()))?;

    let gitignore_path = state_dir.join(".gitignore");
    if !gitignore_path.exists() {
        tokio::fs::write(&gitignore_path, "*\n").await?;
    }

    Ok(settings)
}

fn state_store(settings: &Settings) -> FileStateStore {
    FileStateStore::new(settings.state_dir().join("state"))
}

async fn discover_sources(settings: &Settings) -> Result<BTreeSet<PathBuf>> {
    let walk = find_sources(
        settings.sources.clone(),
        settings.extensions.clone(),
        vec![settings.state_dir(), settings.object_dir.clone()],
    )
    .await?;
    Ok(walk.files)
}

pub async fn build(root: &Path, clean: bool, overrides: &Overrides) -> Result<()> {
    let settings = prepare(root, overrides).await?;
    let sources = discover_sources(&settings).await?;

    let spec = NativeCompileSpec {
        task_path: settings.task.clone(),
        source_files: sources,
        include_roots: settings.include_roots.clone(),
        object_file_dir: settings.object_dir.clone(),
        args: settings.args.clone(),
        incremental: !clean,
        ..NativeCompileSpec::default()
    };

    let delegate = ProcessCompiler::new(&settings.compiler).jobs(settings.jobs);
    let compiler = IncrementalNativeCompiler::new(delegate, state_store(&settings));

    let outcome = compiler
        .execute(&spec)
        .await
        .with_context(|| format!("Build of task {} failed", settings.task))?;

    write_meta(&settings, &outcome.compilation).await?;
    print_summary(root, &outcome.compilation, outcome.work.did_work);

    Ok(())
}

pub async fn status(root: &Path, json: bool, overrides: &Overrides) -> Result<()> {
    let settings = prepare(root, overrides).await?;
    let sources = discover_sources(&settings).await?;

    let previous = state_store(&settings)
        .get(&settings.task)
        .await
        .unwrap_or_default();
    let processor =
        IncrementalCompileProcessor::new(DefaultIncludeResolver::new(settings.include_roots.clone()));
    let (compilation, _) = processor.process(&sources, &previous).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&compilation)?);
        return Ok(());
    }

    print_classification(root, &compilation);
    for unresolved in &compilation.stats.unresolved {
        println!(
            "  unresolved: {} in {}",
            unresolved.reference,
            display_path(root, &unresolved.file)
        );
    }

    Ok(())
}

pub async fn clean(root: &Path, overrides: &Overrides) -> Result<()> {
    let settings = prepare(root, overrides).await?;

    let deleted = StaleOutputCleaner::new(&settings.object_dir)
        .clean_all()
        .await?;
    state_store(&settings)
        .put(&settings.task, &CompilationState::default())
        .await?;

    if deleted {
        println!("Cleaned {}", display_path(root, &settings.object_dir));
    } else {
        println!("Nothing to clean");
    }

    Ok(())
}

fn display_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn print_classification(root: &Path, compilation: &IncrementalCompilation) {
    let total = compilation.recompile.len() + compilation.unchanged.len();

    if compilation.is_up_to_date() {
        println!("Up to date ({} sources)", total);
    } else {
        println!(
            "{} of {} sources to compile, {} removed",
            compilation.recompile.len(),
            total,
            compilation.removed.len()
        );
    }

    for path in &compilation.recompile {
        println!("  compile: {}", display_path(root, path));
    }
    for path in &compilation.removed {
        println!("  removed: {}", display_path(root, path));
    }
}

fn print_summary(root: &Path, compilation: &IncrementalCompilation, did_work: bool) {
    println!();

    if did_work {
        print_classification(root, compilation);
    } else {
        println!(
            "Up to date ({} sources)",
            compilation.recompile.len() + compilation.unchanged.len()
        );
    }

    let stats = &compilation.stats;
    println!(
        "  files: {}, parsed: {}, reused: {}, unresolved includes: {}",
        stats.visited,
        stats.parsed,
        stats.reused,
        stats.unresolved.len()
    );
}

#[derive(Serialize, Deserialize)]
struct Meta {
    timestamp: String,
    compiled: usize,
    unchanged: usize,
    removed: usize,
    files: usize,
}

async fn write_meta(settings: &Settings, compilation: &IncrementalCompilation) -> Result<()> {
    let meta = Meta {
        timestamp: chrono::Utc::now().to_rfc3339(),
        compiled: compilation.recompile.len(),
        unchanged: compilation.unchanged.len(),
        removed: compilation.removed.len(),
        files: compilation.stats.visited,
    };

    let content = serde_json::to_string_pretty(&meta)?;
    tokio::fs::write(settings.state_dir().join("meta.json"), content).await?;
    Ok(())
}
