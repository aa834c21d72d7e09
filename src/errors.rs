//! Typed error hierarchy for agent-board.
//!
//! - `DirectoryError`: agent directory service failures (surfaced as the board banner)
//! - `StorageError`: local key-value persistence failures (logged and swallowed)
//! - `BoardError`: top-level errors for the HTTP API and CLI commands

use thiserror::Error;

/// Errors from the remote agent directory service.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Request to agent service failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Agent service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode agent service response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("No API key configured (set AGENT_BOARD_API_KEY)")]
    MissingCredential,
}

impl DirectoryError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status_code(), Some(401) | Some(403))
            || matches!(self, Self::MissingCredential)
    }
}

/// Errors from the local key-value store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to access state file at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize stored value: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Top-level errors for board operations.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Agent {id} not found")]
    AgentNotFound { id: String },

    #[error("Draft {id} not found")]
    DraftNotFound { id: String },

    #[error("Invalid column '{column}'")]
    InvalidColumn { column: String },

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
