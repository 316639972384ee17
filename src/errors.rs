use thiserror::Error;

/// Errors that can occur during code graph operations.
#[derive(Error, Debug)]
pub enum CodeGraphError {
    #[error("file error: {message} (path: {path})")]
    File { message: String, path: String },

    #[error("parse error: {message} (path: {path}, line: {line:?})")]
    Parse {
        message: String,
        path: String,
        line: Option<u32>,
    },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("watch error: {message}")]
    Watch { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<notify::Error> for CodeGraphError {
    fn from(e: notify::Error) -> Self {
        CodeGraphError::Watch {
            message: e.to_string(),
        }
    }
}

/// Convenience alias for results using `CodeGraphError`.
pub type Result<T> = std::result::Result<T, CodeGraphError>;
