use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use recompile::pipeline::{DefaultIncludeResolver, IncludeResolver, IncrementalCompileProcessor};
use recompile::{CompilationState, EngineError, IncludeReference, IncrementalCompilation};

struct Project {
    dir: tempfile::TempDir,
}

impl Project {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    fn remove(&self, relative: &str) {
        std::fs::remove_file(self.path(relative)).unwrap();
    }

    fn sources(&self, relatives: &[&str]) -> BTreeSet<PathBuf> {
        relatives.iter().map(|r| self.path(r)).collect()
    }

    fn processor(&self, roots: &[&str]) -> IncrementalCompileProcessor {
        IncrementalCompileProcessor::new(DefaultIncludeResolver::new(
            roots.iter().map(|r| self.path(r)).collect(),
        ))
    }
}

/// Runs one build and returns its classification along with the state the
/// next build should start from.
async fn build(
    processor: &IncrementalCompileProcessor,
    sources: &BTreeSet<PathBuf>,
    previous: &CompilationState,
) -> (IncrementalCompilation, CompilationState) {
    processor.process(sources, previous).await.expect("process")
}

fn set(paths: &[PathBuf]) -> BTreeSet<PathBuf> {
    paths.iter().cloned().collect()
}

#[tokio::test]
async fn three_build_scenario() {
    let project = Project::new();
    let a = project.write("a.c", "#include \"b.h\"\nint main() { return b; }\n");
    project.write("b.h", "int b = 1;\n");
    let sources = set(&[a.clone()]);
    let processor = project.processor(&[]);

    let (first, state) = build(&processor, &sources, &CompilationState::default()).await;
    assert_eq!(first.recompile, set(&[a.clone()]));
    assert!(first.unchanged.is_empty());

    let (second, state) = build(&processor, &sources, &state).await;
    assert!(second.recompile.is_empty());
    assert_eq!(second.unchanged, set(&[a.clone()]));

    project.write("b.h", "int b = 2;\n");
    let (third, _) = build(&processor, &sources, &state).await;
    assert_eq!(third.recompile, set(&[a]));
    assert!(third.unchanged.is_empty());
}

#[tokio::test]
async fn rebuilding_without_changes_is_a_no_op() {
    let project = Project::new();
    project.write("include/common.h", "#pragma once\n#include <util.h>\n");
    project.write("include/util.h", "#pragma once\n");
    project.write("src/local.h", "#include <common.h>\n");
    let sources = set(&[
        project.write("src/a.c", "#include \"local.h\"\n#include <stdio.h>\n"),
        project.write("src/b.c", "#include <common.h>\n"),
        project.write("src/c.c", "int c;\n"),
    ]);
    let processor = project.processor(&["include"]);

    let (_, state) = build(&processor, &sources, &CompilationState::default()).await;
    let (again, next_state) = build(&processor, &sources, &state).await;

    assert!(again.recompile.is_empty());
    assert!(again.removed.is_empty());
    assert_eq!(again.unchanged, sources);
    assert_eq!(next_state, state);
}

#[tokio::test]
async fn change_deep_in_the_closure_recompiles_dependents_only() {
    let project = Project::new();
    let s = project.write("s.c", "#include \"h1.h\"\n");
    let other = project.write("other.c", "#include \"unrelated.h\"\n");
    project.write("h1.h", "#include \"h2.h\"\n");
    project.write("h2.h", "#define H2 1\n");
    project.write("unrelated.h", "\n");
    let sources = set(&[s.clone(), other.clone()]);
    let processor = project.processor(&[]);

    let (_, state) = build(&processor, &sources, &CompilationState::default()).await;

    project.write("h2.h", "#define H2 2\n");
    let (result, _) = build(&processor, &sources, &state).await;

    assert_eq!(result.recompile, set(&[s]));
    assert_eq!(result.unchanged, set(&[other]));
}

#[tokio::test]
async fn dropped_sources_are_reported_removed() {
    let project = Project::new();
    let a = project.write("a.c", "int a;\n");
    let b = project.write("b.c", "int b;\n");
    let processor = project.processor(&[]);

    let (_, state) = build(&processor, &set(&[a.clone(), b.clone()]), &CompilationState::default()).await;
    let (result, new_state) = build(&processor, &set(&[a.clone()]), &state).await;

    assert_eq!(result.removed, set(&[b.clone()]));
    assert!(!result.recompile.contains(&b));
    assert!(!result.unchanged.contains(&b));
    assert_eq!(result.unchanged, set(&[a]));
    assert!(!new_state.is_source(&b));
}

#[tokio::test]
async fn headers_leaving_the_closure_are_not_removed_sources() {
    let project = Project::new();
    let a = project.write("a.c", "#include \"a.h\"\n");
    project.write("a.h", "\n");
    let processor = project.processor(&[]);

    let (_, state) = build(&processor, &set(&[a.clone()]), &CompilationState::default()).await;

    project.write("a.c", "int a;\n");
    let (result, new_state) = build(&processor, &set(&[a.clone()]), &state).await;

    assert!(result.removed.is_empty());
    assert_eq!(result.recompile, set(&[a]));
    assert!(new_state.get(&project.path("a.h")).is_none());
}

#[tokio::test]
async fn new_sources_always_compile() {
    let project = Project::new();
    let a = project.write("a.c", "int a;\n");
    let processor = project.processor(&[]);

    let (_, state) = build(&processor, &set(&[a.clone()]), &CompilationState::default()).await;

    let b = project.write("b.c", "int b;\n");
    let (result, _) = build(&processor, &set(&[a.clone(), b.clone()]), &state).await;

    assert_eq!(result.recompile, set(&[b]));
    assert_eq!(result.unchanged, set(&[a]));
}

#[tokio::test]
async fn quoted_include_prefers_the_including_directory() {
    let project = Project::new();
    let a = project.write("src/a.c", "#include \"x.h\"\n#include <y.h>\n");
    project.write("src/x.h", "// local\n");
    project.write("src/y.h", "// local, never used for <y.h>\n");
    project.write("A/x.h", "// root A\n");
    project.write("A/y.h", "// root A\n");
    project.write("B/x.h", "// root B\n");
    let processor = project.processor(&["A", "B"]);

    let (_, state) = build(&processor, &set(&[a.clone()]), &CompilationState::default()).await;

    let resolved: Vec<PathBuf> = state
        .get(&a)
        .unwrap()
        .resolved_paths()
        .map(Path::to_path_buf)
        .collect();
    assert_eq!(resolved, vec![project.path("src/x.h"), project.path("A/y.h")]);
}

#[tokio::test]
async fn include_cycles_terminate() {
    let project = Project::new();
    let main = project.write("main.c", "#include \"a.h\"\n");
    project.write("a.h", "#include \"b.h\"\n");
    project.write("b.h", "#include \"a.h\"\n#include \"b.h\"\n");
    let sources = set(&[main.clone()]);
    let processor = project.processor(&[]);

    let (first, state) = build(&processor, &sources, &CompilationState::default()).await;
    assert_eq!(first.recompile, sources);
    assert_eq!(state.files.len(), 3);

    let (second, state) = build(&processor, &sources, &state).await;
    assert_eq!(second.unchanged, sources);

    project.write("b.h", "#include \"a.h\"\n#define B\n");
    let (third, _) = build(&processor, &sources, &state).await;
    assert_eq!(third.recompile, sources);
}

/// Records every reference the processor asks to resolve.
struct RecordingResolver {
    inner: DefaultIncludeResolver,
    calls: Arc<Mutex<Vec<String>>>,
}

impl IncludeResolver for RecordingResolver {
    fn resolve(&self, reference: &IncludeReference, including_dir: &Path) -> Option<PathBuf> {
        self.calls.lock().unwrap().push(reference.text.clone());
        self.inner.resolve(reference, including_dir)
    }
}

#[tokio::test]
async fn unchanged_files_reuse_recorded_includes() {
    let project = Project::new();
    let a = project.write("a.c", "#include \"b.h\"\n");
    project.write("b.h", "#include \"c.h\"\n");
    project.write("c.h", "\n");
    let sources = set(&[a.clone()]);

    let calls = Arc::new(Mutex::new(Vec::new()));
    let processor = IncrementalCompileProcessor::with_resolver(Arc::new(RecordingResolver {
        inner: DefaultIncludeResolver::default(),
        calls: Arc::clone(&calls),
    }));

    let (_, state) = build(&processor, &sources, &CompilationState::default()).await;
    let mut first_calls = calls.lock().unwrap().drain(..).collect::<Vec<_>>();
    first_calls.sort();
    assert_eq!(first_calls, vec!["b.h", "c.h"]);

    let (second, state) = build(&processor, &sources, &state).await;
    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(second.stats.reused, 3);
    assert_eq!(second.stats.parsed, 0);

    project.write("b.h", "#include \"c.h\"\n#define CHANGED\n");
    let (third, state) = build(&processor, &sources, &state).await;
    assert_eq!(*calls.lock().unwrap(), vec!["c.h"]);
    assert_eq!(third.stats.parsed, 1);
    assert_eq!(third.recompile, sources);

    let previous_a = state.get(&a).unwrap().clone();
    let (_, state) = build(&processor, &sources, &state).await;
    assert_eq!(state.get(&a), Some(&previous_a));
}

#[tokio::test]
async fn deleted_header_forces_recompile_without_failing() {
    let project = Project::new();
    let a = project.write("src/a.c", "#include \"gone.h\"\n#include \"moved.h\"\n");
    let b = project.write("src/b.c", "int b;\n");
    project.write("src/gone.h", "\n");
    project.write("src/moved.h", "// local\n");
    project.write("include/moved.h", "// fallback\n");
    let sources = set(&[a.clone(), b.clone()]);
    let processor = project.processor(&["include"]);

    let (_, state) = build(&processor, &sources, &CompilationState::default()).await;

    project.remove("src/gone.h");
    project.remove("src/moved.h");
    let (result, new_state) = build(&processor, &sources, &state).await;

    assert_eq!(result.recompile, set(&[a.clone()]));
    assert_eq!(result.unchanged, set(&[b]));
    assert!(new_state.dangling_paths().is_empty());
    assert!(new_state.get(&project.path("src/gone.h")).is_none());

    let resolved: Vec<PathBuf> = new_state
        .get(&a)
        .unwrap()
        .resolved_paths()
        .map(Path::to_path_buf)
        .collect();
    assert_eq!(resolved, vec![project.path("include/moved.h")]);
    assert_eq!(result.stats.unresolved.len(), 1);
    assert_eq!(result.stats.unresolved[0].reference, "\"gone.h\"");
}

#[tokio::test]
async fn unresolved_includes_do_not_block_classification() {
    let project = Project::new();
    let a = project.write("a.c", "#include <stdio.h>\n#include \"missing.h\"\n");
    let sources = set(&[a.clone()]);
    let processor = project.processor(&[]);

    let (first, state) = build(&processor, &sources, &CompilationState::default()).await;
    assert_eq!(first.recompile, sources);
    assert_eq!(first.stats.unresolved.len(), 2);
    assert_eq!(state.files.len(), 1);

    let (second, _) = build(&processor, &sources, &state).await;
    assert_eq!(second.unchanged, sources);
}

#[tokio::test]
async fn header_appearing_for_an_unresolved_include_is_picked_up_on_source_change() {
    let project = Project::new();
    let a = project.write("a.c", "#include \"late.h\"\n");
    let sources = set(&[a.clone()]);
    let processor = project.processor(&[]);

    let (_, state) = build(&processor, &sources, &CompilationState::default()).await;

    project.write("late.h", "\n");
    project.write("a.c", "#include \"late.h\"\n// touched\n");
    let (result, new_state) = build(&processor, &sources, &state).await;

    assert_eq!(result.recompile, sources);
    assert!(new_state.get(&project.path("late.h")).is_some());
}

#[tokio::test]
async fn disabled_branches_still_count_as_dependencies() {
    let project = Project::new();
    let a = project.write(
        "a.c",
        "#if 0\n#include \"disabled.h\"\n#endif\n/* #include \"commented.h\" */\n",
    );
    project.write("disabled.h", "\n");
    project.write("commented.h", "\n");
    let sources = set(&[a.clone()]);
    let processor = project.processor(&[]);

    let (_, state) = build(&processor, &sources, &CompilationState::default()).await;
    assert!(state.get(&project.path("disabled.h")).is_some());
    assert!(state.get(&project.path("commented.h")).is_none());

    project.write("commented.h", "int x;\n");
    let (untouched, state) = build(&processor, &sources, &state).await;
    assert_eq!(untouched.unchanged, sources);

    project.write("disabled.h", "int x;\n");
    let (touched, _) = build(&processor, &sources, &state).await;
    assert_eq!(touched.recompile, sources);
}

#[tokio::test]
async fn comment_markers_in_string_literals_keep_later_includes() {
    let project = Project::new();
    let a = project.write(
        "a.c",
        "static const char *glob = \"lib/*.so\";\n#include \"config.h\"\nint main() { return 0; }\n",
    );
    project.write("config.h", "#define PLUGINS 1\n");
    let sources = set(&[a.clone()]);
    let processor = project.processor(&[]);

    let (_, state) = build(&processor, &sources, &CompilationState::default()).await;
    assert!(state.get(&project.path("config.h")).is_some());

    project.write("config.h", "#define PLUGINS 2\n");
    let (result, _) = build(&processor, &sources, &state).await;
    assert_eq!(result.recompile, sources);
}

#[cfg(unix)]
#[tokio::test]
async fn parent_reference_through_a_symlinked_directory_resolves_to_the_real_file() {
    let project = Project::new();
    project.write("vendor/config.h", "int vendored;\n");
    project.write("vendor/lib/entry.c", "#include \"../config.h\"\n");
    std::fs::create_dir_all(project.path("src")).unwrap();
    std::os::unix::fs::symlink(project.path("vendor/lib"), project.path("src/lib")).unwrap();

    let linked = project.path("src/lib/entry.c");
    let sources = set(&[linked]);
    let processor = project.processor(&[]);

    let (first, state) = build(&processor, &sources, &CompilationState::default()).await;
    assert_eq!(first.recompile, sources);
    assert!(first.stats.unresolved.is_empty());
    assert!(state.dangling_paths().is_empty());

    project.write("vendor/config.h", "long vendored;\n");
    let (second, _) = build(&processor, &sources, &state).await;
    assert_eq!(second.recompile, sources);
}

#[tokio::test]
async fn new_state_is_self_contained() {
    let project = Project::new();
    project.write("include/a.h", "#include <b.h>\n#include \"../src/c.h\"\n");
    project.write("include/b.h", "\n");
    project.write("src/c.h", "\n");
    let sources = set(&[project.write("src/main.c", "#include <a.h>\n")]);
    let processor = project.processor(&["include"]);

    let (_, state) = build(&processor, &sources, &CompilationState::default()).await;

    assert!(state.dangling_paths().is_empty());
    assert_eq!(state.source_files, sources);
    assert_eq!(state.files.len(), 4);
    assert!(state.get(&project.path("src/c.h")).is_some());
}

#[tokio::test]
async fn missing_source_is_an_error() {
    let project = Project::new();
    let processor = project.processor(&[]);
    let sources = project.sources(&["nope.c"]);

    let err = processor
        .process(&sources, &CompilationState::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Read { .. }));
}
