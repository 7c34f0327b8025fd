//! Structured error types for delos
//!
//! Uses thiserror for ergonomic error definitions with automatic Display
//! and Error trait implementations. Session-state misuse and invalid scoring
//! inputs are programmer errors in the host and always surface to the caller;
//! delegation failures are ordinary events and never appear here.

use std::path::PathBuf;
use thiserror::Error;

/// All possible errors in delos
#[derive(Error, Debug)]
pub enum MetricsError {
    /// start_session called while another session is still open
    #[error("Session '{0}' is already active. Call end_session first")]
    SessionAlreadyActive(String),

    /// track_agent or end_session called with no open session
    #[error("No active session. Call start_session first")]
    NoActiveSession,

    /// Setter or finalize called on a tracker that already produced its event
    #[error("Delegation tracker for agent '{0}' was already finalized")]
    TrackerAlreadyFinalized(String),

    /// Contribution kind not present in the XP award table
    #[error(
        "Unknown contribution kind '{0}'. Expected one of: commit, pr_created, pr_merged, \
         test_written, ticket_completed, file_created, file_modified, issue_created"
    )]
    UnknownContributionKind(String),

    /// Level outside the supported 1-8 range
    #[error("Invalid level {0}. Levels range from 1 to 8")]
    InvalidLevel(u32),

    /// Metrics file could not be written durably
    #[error("Failed to write metrics file {path}: {source}")]
    StoreWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using MetricsError
pub type Result<T> = std::result::Result<T, MetricsError>;
