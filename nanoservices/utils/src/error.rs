use arrow::error::ArrowError;
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("SQLite Error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("Arrow Error: {0}")]
    ArrowError(#[from] ArrowError),

    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML Error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Glob Error: {0}")]
    GlobError(#[from] globset::Error),

    #[error("Schema Error: {0}")]
    SchemaError(String),

    #[error("no intake files match '{0}'")]
    EmptyIntake(String),

    #[error("Invalid Config: {0}")]
    InvalidConfig(String),

    #[error("Object Store Error: {0}")]
    ObjectStoreError(String),

    #[error("Task Error: {0}")]
    TaskError(String),
}

impl Error {
    /// Infrastructure failures that may succeed on a later attempt.
    ///
    /// Everything else (bad schema, bad casts, bad config) reproduces
    /// deterministically and is not worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::IoError(_) => true,
            Error::SqliteError(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
                    | ErrorCode::CannotOpen
                    | ErrorCode::SystemIoFailure
            ),
            _ => false,
        }
    }
}
