use std::path::PathBuf;

use g3drem::HeaderError;
use thiserror::Error;

/// Export failures.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("could not write g3drem header: {0}")]
    Header(#[from] HeaderError),

    #[error("export I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no G-code to export; slice the model first")]
    NoGcode,

    #[error("unusable thumbnail {path}: {reason}")]
    Thumbnail { path: PathBuf, reason: String },
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, ExportError>;
