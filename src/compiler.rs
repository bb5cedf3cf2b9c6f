mod process;

pub use process::ProcessCompiler;

use std::collections::BTreeSet;
use std::future::Future;
use std::path::PathBuf;
use tracing::info;

use crate::error::Result;
use crate::output::StaleOutputCleaner;
use crate::pipeline::{DefaultIncludeResolver, IncrementalCompilation, IncrementalCompileProcessor};
use crate::store::StateStore;

/// Everything a compiler delegate needs for one compile task.
#[derive(Debug, Clone, Default)]
pub struct NativeCompileSpec {
    /// Stable identity the task's state is stored under.
    pub task_path: String,
    pub source_files: BTreeSet<PathBuf>,
    pub removed_source_files: BTreeSet<PathBuf>,
    pub include_roots: Vec<PathBuf>,
    pub object_file_dir: PathBuf,
    pub args: Vec<String>,
    pub incremental: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkResult {
    pub did_work: bool,
}

/// Compiles the sources named in a spec.
pub trait Compiler: Send + Sync {
    fn execute(&self, spec: &NativeCompileSpec) -> impl Future<Output = Result<WorkResult>> + Send;
}

#[derive(Debug)]
pub struct BuildOutcome {
    pub work: WorkResult,
    pub compilation: IncrementalCompilation,
}

/// Front for a compiler delegate that narrows each build to the sources that
/// actually need compiling, and records state for the next build.
pub struct IncrementalNativeCompiler<C, S> {
    delegate: C,
    store: S,
}

impl<C: Compiler, S: StateStore> IncrementalNativeCompiler<C, S> {
    pub fn new(delegate: C, store: S) -> Self {
        Self { delegate, store }
    }

    pub fn delegate(&self) -> &C {
        &self.delegate
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn execute(&self, spec: &NativeCompileSpec) -> Result<BuildOutcome> {
        let processor = IncrementalCompileProcessor::new(DefaultIncludeResolver::new(
            spec.include_roots.clone(),
        ));

        if spec.incremental {
            self.incremental_compile(&processor, spec).await
        } else {
            self.clean_compile(&processor, spec).await
        }
    }

    async fn incremental_compile(
        &self,
        processor: &IncrementalCompileProcessor,
        spec: &NativeCompileSpec,
    ) -> Result<BuildOutcome> {
        let previous = self.store.get(&spec.task_path).await.unwrap_or_default();
        let (compilation, new_state) = processor.process(&spec.source_files, &previous).await?;

        let cleaner = StaleOutputCleaner::new(&spec.object_file_dir);
        let stale = cleaner.remove_objects(&compilation.removed).await?;

        let narrowed = NativeCompileSpec {
            source_files: compilation.recompile.clone(),
            removed_source_files: compilation.removed.clone(),
            ..spec.clone()
        };

        let work = if narrowed.source_files.is_empty() {
            WorkResult::default()
        } else {
            self.delegate.execute(&narrowed).await?
        };

        self.store.put(&spec.task_path, &new_state).await?;

        info!(
            task = %spec.task_path,
            compiled = narrowed.source_files.len(),
            stale_objects = stale,
            "incremental compile finished"
        );

        Ok(BuildOutcome {
            work: WorkResult {
                did_work: work.did_work || stale > 0,
            },
            compilation,
        })
    }

    async fn clean_compile(
        &self,
        processor: &IncrementalCompileProcessor,
        spec: &NativeCompileSpec,
    ) -> Result<BuildOutcome> {
        let previous = self.store.get(&spec.task_path).await.unwrap_or_default();
        let (mut compilation, new_state) = processor.process(&spec.source_files, &previous).await?;

        let deleted = StaleOutputCleaner::new(&spec.object_file_dir)
            .clean_all()
            .await?;
        let work = self.delegate.execute(spec).await?;

        self.store.put(&spec.task_path, &new_state).await?;

        compilation.recompile = spec.source_files.clone();
        compilation.unchanged.clear();

        info!(
            task = %spec.task_path,
            compiled = spec.source_files.len(),
            deleted_outputs = deleted,
            "clean compile finished"
        );

        Ok(BuildOutcome {
            work: WorkResult {
                did_work: work.did_work || deleted,
            },
            compilation,
        })
    }
}
