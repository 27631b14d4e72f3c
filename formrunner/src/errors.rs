use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by an [`crate::Actuator`] for a single command.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActuatorError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Action rejected by target: {0}")]
    Rejected(String),

    #[error("Browser bridge error: {0}")]
    Bridge(String),
}

/// Failures of the subprocess helper.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Helper interpreter not found: {0}")]
    InterpreterNotFound(String),

    #[error("Helper script not found: {0}")]
    ScriptNotFound(PathBuf),

    #[error("Helper timed out after {0} ms")]
    Timeout(u64),

    #[error("Helper exited with status {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("Helper output could not be parsed: {0}")]
    InvalidOutput(String),

    #[error("Failed to spawn helper: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Per-cell errors. These never abort a run; the interpreter records them
/// and moves on to the next cell.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CellError {
    #[error("No mapping entry for key '{key}'")]
    MissingMapping { key: String },

    #[error("Actuator failed: {0}")]
    ActuatorFailure(#[from] ActuatorError),

    #[error("Cannot parse '{value}' as {expected}")]
    ParseFailure { value: String, expected: &'static str },
}

/// Why a save did not go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceKind {
    Locked,
    PermissionDenied,
    Io,
}

impl std::fmt::Display for PersistenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistenceKind::Locked => write!(f, "file is locked"),
            PersistenceKind::PermissionDenied => write!(f, "permission denied"),
            PersistenceKind::Io => write!(f, "I/O error"),
        }
    }
}

/// Run-level errors: setup and persistence failures surface here and stop the run.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Document not found: {0}")]
    DocumentNotFound(PathBuf),

    #[error("Sheet '{sheet}' missing from {path}")]
    SheetMissing { path: PathBuf, sheet: String },

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Failed to load mapping table: {0}")]
    MappingLoad(String),

    #[error("Failed to save {path}: {kind}")]
    Persistence {
        path: PathBuf,
        kind: PersistenceKind,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RunnerError {
    /// Classify an I/O error raised while writing `path`.
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let kind = match source.kind() {
            std::io::ErrorKind::PermissionDenied => PersistenceKind::PermissionDenied,
            // ERROR_SHARING_VIOLATION / ERROR_LOCK_VIOLATION on Windows
            _ if matches!(source.raw_os_error(), Some(32) | Some(33)) && cfg!(windows) => {
                PersistenceKind::Locked
            }
            std::io::ErrorKind::WouldBlock => PersistenceKind::Locked,
            _ => PersistenceKind::Io,
        };
        RunnerError::Persistence {
            path: path.into(),
            kind,
            source,
        }
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, RunnerError::Persistence { .. })
    }
}
