use std::path::PathBuf;

use thiserror::Error;

use crate::data::schema::CanonicalField;

/// Errors produced by the data pipeline.
///
/// Empty results are never errors; callers get an empty table instead.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("could not parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("unsupported file extension: .{0}")]
    UnsupportedFormat(String),

    #[error("dataset is missing a `{field}` column (available columns: {})", available.join(", "))]
    MissingField {
        field: CanonicalField,
        available: Vec<String>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DataError {
    pub(crate) fn parse(path: &std::path::Path, message: impl ToString) -> Self {
        DataError::Parse {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
