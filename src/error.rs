use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CovmergeError {
    #[error("Missing report artifact: '{}'. Is this an llvm-cov HTML report?", .0.display())]
    MissingRoot(PathBuf),

    #[error("Format error in {}: {message}", .path.display())]
    Format { path: PathBuf, message: String },

    #[error("Parse error in {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Output location {} already exists", .0.display())]
    DuplicateOutput(PathBuf),

    #[error("Invalid merge input: {0}")]
    InvalidMerge(String),

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CovmergeError {
    pub(crate) fn format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        CovmergeError::Format {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        CovmergeError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CovmergeError>;
