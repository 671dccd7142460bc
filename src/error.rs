use thiserror::Error;

/// A line/column pair derived from a byte offset into template source.
///
/// Lines are 1-based; columns are 1-based byte offsets within the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Derive a location from a byte offset into `source`.
    pub fn from_offset(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let before = &source[..offset];
        let line = 1 + before.matches('\n').count();
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        Self {
            line,
            column: offset - line_start + 1,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// All errors produced by the engine.
///
/// Lexical and syntax failures both surface as `Parse`; the render-time
/// variants carry the filename and line of the offending node.
#[derive(Error, Debug)]
pub enum TsumugiError {
    #[error("{message}")]
    Config { message: String },

    #[error("template: {filename}:{line}: {message}")]
    Parse {
        message: String,
        filename: String,
        line: usize,
        column: usize,
    },

    #[error("{filename}:{line}: undefined variable '{name}'")]
    Undefined {
        name: String,
        filename: String,
        line: usize,
    },

    #[error("{filename}:{line}: type error: {message}")]
    Type {
        message: String,
        filename: String,
        line: usize,
    },

    #[error("{filename}:{line}: {message}")]
    Arithmetic {
        message: String,
        filename: String,
        line: usize,
    },

    #[error("loader error: {message}")]
    Loader { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TsumugiError>;
