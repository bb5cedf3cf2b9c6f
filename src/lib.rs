//! Decides which C/C++ sources need recompiling.
//!
//! Every build walks the transitive `#include` closure of the task's sources,
//! fingerprints each file, and compares the result with the state recorded by
//! the previous build. A source is recompiled when it, or anything it reaches
//! through includes, changed, appeared, or disappeared. Files whose content is
//! unchanged keep their recorded include lists and are never re-parsed.
//!
//! ```no_run
//! # async fn run() -> recompile::error::Result<()> {
//! use recompile::cache::CompilationState;
//! use recompile::pipeline::{DefaultIncludeResolver, IncrementalCompileProcessor};
//! use std::collections::BTreeSet;
//! use std::path::PathBuf;
//!
//! let processor =
//!     IncrementalCompileProcessor::new(DefaultIncludeResolver::new(vec![PathBuf::from("include")]));
//! let sources = BTreeSet::from([PathBuf::from("src/main.c")]);
//! let (compilation, next_state) = processor.process(&sources, &CompilationState::default()).await?;
//! assert_eq!(compilation.recompile, sources);
//! # let _ = next_state;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod compiler;
pub mod error;
pub mod extract;
pub mod fingerprint;
pub mod output;
pub mod pipeline;
pub mod store;

pub use cache::{CompilationState, FileState};
pub use compiler::{BuildOutcome, Compiler, IncrementalNativeCompiler, NativeCompileSpec, WorkResult};
pub use error::{EngineError, StoreError};
pub use extract::includes::{IncludeReference, ResolvedInclude};
pub use fingerprint::Fingerprint;
pub use pipeline::{IncludeResolver, IncrementalCompilation, IncrementalCompileProcessor};
pub use store::{FileStateStore, MemoryStateStore, StateStore};
