use std::fmt;

use serde::{Deserialize, Serialize};

/// Machine-checkable category of a sync failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request never reached the server or the connection dropped.
    Network,
    /// The server failed to process the request.
    Server,
    NotFound,
    Conflict,
    Validation,
    Unauthorized,
    Unknown,
}

impl ErrorCode {
    /// Map an HTTP-style status code to an error category.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => ErrorCode::Validation,
            401 | 403 => ErrorCode::Unauthorized,
            404 => ErrorCode::NotFound,
            409 => ErrorCode::Conflict,
            500..=599 => ErrorCode::Server,
            _ => ErrorCode::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Network => "network",
            ErrorCode::Server => "server",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Conflict => "conflict",
            ErrorCode::Validation => "validation",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured descriptor of a failed remote operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncError {
    pub message: String,
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl SyncError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            context: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Network, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Server, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }

    /// Attach free-form context (request ticket, endpoint, ...).
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{} error: {} ({})", self.code, self.message, context),
            None => write!(f, "{} error: {}", self.code, self.message),
        }
    }
}

impl std::error::Error for SyncError {}

/// Errors from the local side: persistence, configuration and the runtime.
#[derive(Debug)]
pub enum StoreError {
    LockPoisoned(&'static str),
    Storage(String),
    Serde(String),
    Io(std::io::Error),
    Config(String),
    /// The store runtime has shut down.
    Stopped,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::LockPoisoned(operation) => {
                write!(f, "storage lock poisoned during {}", operation)
            }
            StoreError::Storage(msg) => write!(f, "storage error: {}", msg),
            StoreError::Serde(msg) => write!(f, "snapshot serialization error: {}", msg),
            StoreError::Io(err) => write!(f, "io error: {}", err),
            StoreError::Config(msg) => write!(f, "invalid config: {}", msg),
            StoreError::Stopped => write!(f, "store runtime stopped"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serde(err.to_string())
    }
}

/// Why the dispatcher resolved a command locally without a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// An add for the same natural key is still waiting on the server.
    DuplicatePending,
    /// The target record is not in the collection.
    UnknownRecord,
    /// The target record has not been confirmed by the server yet.
    AwaitingCreate,
    /// Retry or dismiss was asked for a record that is not in error.
    NotInError,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::DuplicatePending => write!(f, "duplicate submission while pending"),
            DropReason::UnknownRecord => write!(f, "unknown record"),
            DropReason::AwaitingCreate => write!(f, "record awaiting server confirmation"),
            DropReason::NotInError => write!(f, "record is not in error"),
        }
    }
}
