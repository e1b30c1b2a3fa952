//! Error types for the chat server
//!
//! Defines application-level errors and message send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::types::Role;

/// Application-level errors
///
/// Covers both session-fatal errors (connection termination), the
/// process-fatal `ResourceExhausted`, and business errors that are turned
/// into a reply line for the issuing client.
#[derive(Debug, Error)]
pub enum AppError {
    /// Handle already held by a connected client
    #[error("Handle '{0}' is already taken")]
    DuplicateHandle(String),

    /// Handle empty, too long or containing whitespace
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// Room not found with the given name
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Configured room cap reached
    #[error("Room limit of {0} reached")]
    RoomLimitExceeded(usize),

    /// Caller's role is below the required one
    #[error("Permission denied: {0} role required")]
    PermissionDenied(Role),

    /// Governance commands are disabled in the default room
    #[error("Not available in {0}")]
    DefaultRoomLocked(String),

    /// No member with that handle in the caller's room
    #[error("No member named '{0}' in this room")]
    MemberNotFound(String),

    /// Room name too long
    #[error("Invalid room name: {0}")]
    InvalidRoomName(String),

    /// Target already holds the highest role
    #[error("{0} already has the highest role")]
    RoleCeiling(String),

    /// Caller is already in the requested room
    #[error("Already in {0}")]
    AlreadyInRoom(String),

    /// Malformed command arguments
    #[error("Usage: {0}")]
    Usage(&'static str),

    /// Host cannot hold more state (fatal to the process)
    #[error("Resource exhausted")]
    ResourceExhausted,

    /// IO error (fatal to the session)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (fatal - server actor is gone)
    #[error("Channel send error")]
    ChannelSend,

    /// Server or session task panicked or was cancelled
    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Configuration file could not be parsed
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration values rejected
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AppError {
    /// Whether the error must stop the whole server rather than one command
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::ResourceExhausted)
    }
}

/// Message send errors
///
/// Occurs when a message cannot be queued for a client.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The client's outbound queue is full
    #[error("Outbound queue full")]
    QueueFull,
}
