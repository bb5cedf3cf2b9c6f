mod parse;
mod read;
mod resolve;
mod walk;

pub use parse::{parse_bytes, parse_file, parse_includes};
pub use resolve::{DefaultIncludeResolver, IncludeResolver, normalize};
pub use walk::{DEFAULT_EXTENSIONS, WalkResult, find_sources};

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::cache::{CompilationState, FileState};
use crate::error::Result;
use crate::extract::includes::IncludeReference;
use crate::fingerprint::Fingerprint;

const SEMAPHORE_PERMITS: usize = 256;

/// Classification of one build's sources.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IncrementalCompilation {
    pub recompile: BTreeSet<PathBuf>,
    pub removed: BTreeSet<PathBuf>,
    pub unchanged: BTreeSet<PathBuf>,
    pub stats: ProcessStats,
}

impl IncrementalCompilation {
    pub fn is_up_to_date(&self) -> bool {
        self.recompile.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessStats {
    pub visited: usize,
    pub parsed: usize,
    pub reused: usize,
    pub unresolved: Vec<UnresolvedInclude>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct UnresolvedInclude {
    pub file: PathBuf,
    pub reference: String,
}

struct VisitedFile {
    state: FileState,
    reused: bool,
}

pub struct IncrementalCompileProcessor {
    resolver: Arc<dyn IncludeResolver>,
}

impl IncrementalCompileProcessor {
    pub fn new(resolver: impl IncludeResolver + 'static) -> Self {
        Self {
            resolver: Arc::new(resolver),
        }
    }

    pub fn with_resolver(resolver: Arc<dyn IncludeResolver>) -> Self {
        Self { resolver }
    }

    /// Walks the include closure of `sources`, diffs it against `previous`
    /// and returns the classification together with the state to persist.
    ///
    /// `previous` is never modified. Pass `CompilationState::default()` when
    /// nothing was recorded.
    pub async fn process(
        &self,
        sources: &BTreeSet<PathBuf>,
        previous: &CompilationState,
    ) -> Result<(IncrementalCompilation, CompilationState)> {
        let mut stats = ProcessStats::default();
        let files = self.walk_closure(sources, previous, &mut stats).await?;

        let new_state = CompilationState {
            source_files: sources.clone(),
            files,
            ..CompilationState::default()
        };

        let dirty = dirty_files(&new_state, previous);

        let mut compilation = IncrementalCompilation {
            stats,
            ..IncrementalCompilation::default()
        };

        for source in sources {
            if dirty.contains(source.as_path()) {
                compilation.recompile.insert(source.clone());
            } else {
                compilation.unchanged.insert(source.clone());
            }
        }

        compilation.removed = previous
            .source_files
            .difference(sources)
            .cloned()
            .collect();

        compilation.stats.unresolved.sort();

        info!(
            recompile = compilation.recompile.len(),
            unchanged = compilation.unchanged.len(),
            removed = compilation.removed.len(),
            visited = compilation.stats.visited,
            parsed = compilation.stats.parsed,
            "classified sources"
        );

        Ok((compilation, new_state))
    }

    /// Visits every file reachable from `sources` in waves. The visited set
    /// stays on this task; only per-file work is spread over workers.
    async fn walk_closure(
        &self,
        sources: &BTreeSet<PathBuf>,
        previous: &CompilationState,
        stats: &mut ProcessStats,
    ) -> Result<BTreeMap<PathBuf, FileState>> {
        let semaphore = Arc::new(Semaphore::new(SEMAPHORE_PERMITS));
        let mut seen: HashSet<PathBuf> = sources.iter().cloned().collect();
        let mut frontier: Vec<PathBuf> = sources.iter().cloned().collect();
        let mut files = BTreeMap::new();

        while !frontier.is_empty() {
            let mut join_set = JoinSet::new();

            for path in frontier.drain(..) {
                let semaphore = Arc::clone(&semaphore);
                let resolver = Arc::clone(&self.resolver);
                let recorded = previous.get(&path).cloned();

                join_set.spawn(async move {
                    let _permit = semaphore.acquire().await;
                    visit_file(path, recorded, resolver).await
                });
            }

            while let Some(joined) = join_set.join_next().await {
                let visited = joined??;
                stats.visited += 1;
                if visited.reused {
                    stats.reused += 1;
                } else {
                    stats.parsed += 1;
                }

                for include in &visited.state.resolved_includes {
                    match &include.resolved_path {
                        Some(next) => {
                            if seen.insert(next.clone()) {
                                frontier.push(next.clone());
                            }
                        }
                        None => {
                            debug!(
                                file = %visited.state.path.display(),
                                include = %include.reference,
                                "unresolved include"
                            );
                            stats.unresolved.push(UnresolvedInclude {
                                file: visited.state.path.clone(),
                                reference: include.reference.to_string(),
                            });
                        }
                    }
                }

                files.insert(visited.state.path.clone(), visited.state);
            }
        }

        Ok(files)
    }
}

async fn visit_file(
    path: PathBuf,
    recorded: Option<FileState>,
    resolver: Arc<dyn IncludeResolver>,
) -> Result<VisitedFile> {
    let content = read::read_file(&path).await?;

    let visited = tokio::task::spawn_blocking(move || {
        let fingerprint = Fingerprint::of(&content);

        if let Some(recorded) = recorded.filter(|r| can_reuse(r, fingerprint)) {
            debug!(file = %path.display(), "reusing recorded includes");
            return VisitedFile {
                state: FileState {
                    path,
                    fingerprint,
                    resolved_includes: recorded.resolved_includes,
                },
                reused: true,
            };
        }

        debug!(file = %path.display(), %fingerprint, "parsing includes");
        let references: Vec<IncludeReference> = parse::parse_bytes(&content);
        let including_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let resolved_includes = resolver.resolve_all(references, &including_dir);

        VisitedFile {
            state: FileState {
                path,
                fingerprint,
                resolved_includes,
            },
            reused: false,
        }
    })
    .await?;

    Ok(visited)
}

/// Recorded includes are reused only for identical content whose previously
/// resolved headers all still exist. A vanished header forces re-resolution
/// so the closure never points at a missing file.
fn can_reuse(recorded: &FileState, fingerprint: Fingerprint) -> bool {
    recorded.fingerprint == fingerprint && recorded.resolved_paths().all(Path::is_file)
}

/// Files that differ from their recorded state, plus everything that
/// includes them directly or transitively.
fn dirty_files<'a>(current: &'a CompilationState, previous: &CompilationState) -> HashSet<&'a Path> {
    let mut includers: HashMap<&Path, Vec<&Path>> = HashMap::new();
    for (path, state) in &current.files {
        for included in state.resolved_paths() {
            includers.entry(included).or_default().push(path.as_path());
        }
    }

    let mut dirty: HashSet<&Path> = HashSet::new();
    let mut queue: VecDeque<&Path> = VecDeque::new();

    for (path, state) in &current.files {
        let changed = previous
            .get(path)
            .is_none_or(|recorded| !recorded.is_equivalent(state));
        if changed && dirty.insert(path.as_path()) {
            debug!(file = %path.display(), "changed since last build");
            queue.push_back(path.as_path());
        }
    }

    while let Some(path) = queue.pop_front() {
        for &includer in includers.get(path).into_iter().flatten() {
            if dirty.insert(includer) {
                queue.push_back(includer);
            }
        }
    }

    dirty
}
