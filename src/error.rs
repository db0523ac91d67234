//! Unified error type for the LOB store, scanner, push-state cache, and transfer coordinator.

use thiserror::Error;

/// All errors that can occur while operating on the LOB store or syncing with a remote.
#[derive(Error, Debug)]
pub enum GitLobError {
    /// Malformed CLI input (bad refspec operator, wrong arity).
    #[error("usage error: {0}")]
    Usage(String),

    /// Missing or invalid provider/remote configuration.
    #[error("config error for remote '{remote}': {detail}")]
    Config { remote: String, detail: String },

    /// A `git` subprocess invocation failed.
    #[error("git {command} failed (exit {exit_status}): {stderr}")]
    Git {
        command: String,
        exit_status: i32,
        stderr: String,
    },

    /// One or more LOBs are not present in the local store.
    #[error("{} LOB(s) not found locally: {}", .shas.len(), .shas.join(", "))]
    NotFoundForShas { shas: Vec<String> },

    /// A LOB's on-disk representation failed integrity checks.
    #[error("integrity error for LOB {sha}: {reason}")]
    Integrity { sha: String, reason: String },

    /// A provider I/O failure during upload/download.
    #[error("transfer of '{file}' failed: {cause}")]
    Transfer { file: String, cause: String },

    /// Local filesystem error not otherwise classified.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The caller requested cancellation mid-operation.
    #[error("operation cancelled")]
    Cancelled,
}

impl GitLobError {
    /// Maps an error to the CLI exit code it should produce.
    pub fn exit_code(&self) -> i32 {
        match self {
            GitLobError::Usage(_) => 9,
            GitLobError::Config { .. } => 6,
            GitLobError::Git { .. } => 12,
            GitLobError::NotFoundForShas { .. } => 12,
            GitLobError::Integrity { .. } => 12,
            GitLobError::Transfer { .. } => 12,
            GitLobError::Io(_) => 12,
            GitLobError::Cancelled => 12,
        }
    }
}
