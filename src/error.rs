//! Error types shared by the scheduler and the session layer.

use thiserror::Error;

/// Failure reported by a playback session call.
///
/// The scheduler never retries on these; they are handed back to whoever
/// awaits the [`Completion`](crate::audio::session::Completion).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The node refused the player update
    #[error("Player update rejected by node: {0}")]
    Rejected(String),

    /// The node is gone or not accepting requests
    #[error("Audio node unavailable: {0}")]
    NodeUnavailable(String),

    /// The task driving the call was cancelled or panicked
    #[error("Session call aborted")]
    Aborted,
}

/// Errors returned by the scheduler's mutating operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Configured queue limit reached
    #[error("Queue is full (maximum {limit} tracks)")]
    QueueFull { limit: usize },
}
