//! Source positions attached to tokens, syntax nodes and diagnostics

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a code element within its source file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Path or display name of the source
    pub file: String,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
}

impl Location {
    /// Creates a new location
    pub fn new(file: impl Into<String>, line: usize, column: usize) -> Self {
        Location {
            file: file.into(),
            line,
            column,
        }
    }

    /// Location used for compiler-synthesized elements that have no source position
    pub fn builtin() -> Self {
        Location::new("<builtin>", 0, 0)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File \"{}\" at {}:{}", self.file, self.line, self.column)
    }
}
