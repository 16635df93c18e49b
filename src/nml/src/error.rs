// nml/src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for namelist operations.
pub type Result<T> = std::result::Result<T, NmlError>;

/// Errors raised while parsing, converting or writing Fortran namelists.
#[derive(Debug, Error)]
pub enum NmlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("cannot convert '{value}' to {expected}")]
    TypeConversion { value: String, expected: String },

    #[error("file already exists: {0}")]
    FileAlreadyExists(PathBuf),
}

impl NmlError {
    pub fn parse<S: Into<String>>(message: S, line: usize) -> Self {
        NmlError::Parse {
            line,
            message: message.into(),
        }
    }
}
