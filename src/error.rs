use std::path::PathBuf;

use thiserror::Error;

use crate::dsl::CompileFailure;

/// Process-level failures. Diagnostics inside a source file are not errors
/// at this level; a file that fails to compile surfaces as [`AppError::Compile`].
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
    #[error("{}: {failure}", path.display())]
    Compile {
        path: PathBuf,
        #[source]
        failure: CompileFailure,
    },
}

impl AppError {
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Read { path: path.into(), source }
    }
}

/// Allow converting AppError to String for printing at the process boundary.
impl From<AppError> for String {
    fn from(e: AppError) -> String {
        e.to_string()
    }
}
