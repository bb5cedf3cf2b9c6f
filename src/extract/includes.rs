use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A raw `#include` directive as written in a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncludeReference {
    pub text: String,
    /// `<x.h>` form. Skips the including-file-relative lookup.
    pub is_system: bool,
}

impl IncludeReference {
    pub fn quoted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_system: false,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_system: true,
        }
    }
}

impl fmt::Display for IncludeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_system {
            write!(f, "<{}>", self.text)
        } else {
            write!(f, "\"{}\"", self.text)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedInclude {
    pub reference: IncludeReference,
    pub resolved_path: Option<PathBuf>,
}

impl ResolvedInclude {
    pub fn is_resolved(&self) -> bool {
        self.resolved_path.is_some()
    }
}
