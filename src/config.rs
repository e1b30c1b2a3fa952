//! Server configuration
//!
//! Every field has a default, so an empty JSON object is a valid config
//! file. Command line flags in `main.rs` override file values.

use std::path::Path;

use serde::Deserialize;

use crate::error::AppError;
use crate::types::RoomName;

/// Runtime limits and names
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Name of the permanent room every client starts in
    pub default_room: String,
    /// Cap on the number of rooms, default room included
    pub max_rooms: Option<usize>,
    /// Longest accepted input line in bytes; longer lines are truncated
    pub max_line_length: usize,
    /// Longest handle or room name in bytes
    pub max_name_length: usize,
    /// Per-client outbound queue size
    pub outbox_capacity: usize,
    /// Session → server command channel size
    pub command_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            default_room: "lobby".to_string(),
            max_rooms: Some(64),
            max_line_length: 1024,
            max_name_length: 32,
            outbox_capacity: 64,
            command_buffer: 256,
        }
    }
}

impl ServerConfig {
    /// Load a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path)?;
        let config: ServerConfig = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<(), AppError> {
        if self.default_room.trim().is_empty() {
            return Err(AppError::Config("default_room cannot be empty".to_string()));
        }
        if self.default_room.len() > self.max_name_length {
            return Err(AppError::Config(
                "default_room is longer than max_name_length".to_string(),
            ));
        }
        if self.max_rooms == Some(0) {
            return Err(AppError::Config("max_rooms must be at least 1".to_string()));
        }
        if self.max_line_length == 0 || self.max_name_length == 0 {
            return Err(AppError::Config("length limits must be positive".to_string()));
        }
        if self.outbox_capacity == 0 || self.command_buffer == 0 {
            return Err(AppError::Config("channel sizes must be positive".to_string()));
        }
        Ok(())
    }

    pub fn default_room_name(&self) -> RoomName {
        RoomName::new(self.default_room.clone())
    }
}
