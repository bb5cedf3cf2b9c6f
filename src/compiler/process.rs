use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

use super::{Compiler, NativeCompileSpec, WorkResult};
use crate::error::{EngineError, Result};
use crate::output::object_file_for;

/// Runs an external compiler once per source:
/// `<program> <args> -I<root>... -c <source> -o <object>`.
#[derive(Debug, Clone)]
pub struct ProcessCompiler {
    program: String,
    jobs: usize,
    show_progress: bool,
}

impl ProcessCompiler {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            jobs: num_cpus::get(),
            show_progress: true,
        }
    }

    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        pb.set_style(style);
        pb
    }
}

impl Compiler for ProcessCompiler {
    async fn execute(&self, spec: &NativeCompileSpec) -> Result<WorkResult> {
        if spec.source_files.is_empty() {
            return Ok(WorkResult::default());
        }

        let pb = self.progress_bar(spec.source_files.len());
        let semaphore = Arc::new(Semaphore::new(self.jobs));
        let mut join_set = JoinSet::new();

        for source in &spec.source_files {
            let semaphore = Arc::clone(&semaphore);
            let command = compile_command(&self.program, spec, source);
            let object = object_file_for(&spec.object_file_dir, source);
            let source = source.clone();
            let pb = pb.clone();

            join_set.spawn(async move {
                let _permit = semaphore.acquire().await;
                let result = compile_one(command, &source, &object).await;
                pb.inc(1);
                result
            });
        }

        while let Some(joined) = join_set.join_next().await {
            joined??;
        }

        pb.finish_and_clear();

        Ok(WorkResult { did_work: true })
    }
}

fn compile_command(program: &str, spec: &NativeCompileSpec, source: &Path) -> Command {
    let object = object_file_for(&spec.object_file_dir, source);

    let mut command = Command::new(program);
    command.args(&spec.args);
    for root in &spec.include_roots {
        command.arg(format!("-I{}", root.display()));
    }
    command.arg("-c").arg(source).arg("-o").arg(object);
    command
}

async fn compile_one(mut command: Command, source: &Path, object: &Path) -> Result<()> {
    if let Some(parent) = object.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| EngineError::Compiler(format!("{}: {}", parent.display(), e)))?;
    }

    debug!(source = %source.display(), "compiling");

    let output = command
        .output()
        .await
        .map_err(|e| EngineError::Compiler(format!("{}: {}", source.display(), e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(EngineError::Compiler(format!(
            "{} ({}):\n{}",
            source.display(),
            output.status,
            stderr.trim_end()
        )));
    }

    Ok(())
}
