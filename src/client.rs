//! Client struct definition
//!
//! Represents a connected client with a negotiated handle and its
//! outbound message channel.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::{ClientId, RoomName};

/// Connected client information
///
/// Holds all state related to a named client: its unique ID, handle,
/// message sender channel, and the room it currently belongs to.
#[derive(Debug)]
pub struct Client {
    /// Unique identifier for this connection
    pub id: ClientId,
    /// Negotiated handle
    pub handle: String,
    /// Server → Client message channel
    pub sender: mpsc::Sender<ServerMessage>,
    /// Current room (None only while moving between rooms)
    pub room: Option<RoomName>,
}

impl Client {
    /// Create a new client with the given ID, handle and sender channel
    pub fn new(id: ClientId, handle: String, sender: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id,
            handle,
            sender,
            room: None,
        }
    }

    /// Queue a message for this client
    ///
    /// Never waits: a full queue or a closed channel is reported and the
    /// message is dropped.
    pub fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        deliver(&self.sender, msg)
    }

    /// Name of the current room, if any
    pub fn room(&self) -> Option<&RoomName> {
        self.room.as_ref()
    }
}

/// Non-blocking delivery shared by direct replies and room fan-out
pub(crate) fn deliver(
    sender: &mpsc::Sender<ServerMessage>,
    msg: ServerMessage,
) -> Result<(), SendError> {
    sender.try_send(msg).map_err(|e| match e {
        TrySendError::Full(_) => SendError::QueueFull,
        TrySendError::Closed(_) => SendError::ChannelClosed,
    })
}
