//! Error type shared by readers, configuration and the annotation engine.

use std::io;
use thiserror::Error;

/// Errors that can occur while configuring or running an annotation.
///
/// Every variant is fatal: the run stops at the first error and no partial
/// output is recovered.
#[derive(Error, Debug)]
pub enum AnnoError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Type mismatch: '{op}' requires numeric values, got '{value}'")]
    TypeMismatch { op: String, value: String },

    #[error("Script error: {0}")]
    Script(String),

    #[error("Input not sorted: {0}")]
    Unsorted(String),

    #[error("{file}: {source}")]
    Source {
        file: String,
        source: Box<AnnoError>,
    },

    #[error("{file}: failed to compute '{name}' with op '{op}': {source}")]
    Reduce {
        file: String,
        name: String,
        op: String,
        source: Box<AnnoError>,
    },
}

impl AnnoError {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        AnnoError::Config(message.into())
    }

    /// Attach the input name to an error raised while reading it.
    ///
    /// Errors that already name an input are returned unchanged.
    pub fn in_file(self, file: impl Into<String>) -> Self {
        match self {
            AnnoError::Source { .. } => self,
            other => AnnoError::Source {
                file: file.into(),
                source: Box::new(other),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, AnnoError>;
