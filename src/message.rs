//! Message protocol definitions
//!
//! Line-based text protocol. Every client line is parsed into a
//! `ClientMessage`; every server notification is a `ServerMessage` whose
//! `Display` output is the exact text written to the socket.

use std::fmt;

use crate::error::AppError;
use crate::types::{Role, RoomName};

/// Client → Server message
///
/// The first whitespace-separated token selects the command (case-sensitive,
/// exact match). Anything that is not a recognized command is chat text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Close the session
    Exit,
    /// List existing rooms
    Channels,
    /// Move to a room, creating it on demand
    Join { room: Option<String> },
    /// Server local date and time
    Date,
    /// Send a member of the current room back to the default room
    Kick { handle: Option<String> },
    /// Raise a member of the current room one tier
    Promote { handle: Option<String> },
    /// Empty the current room into the default room
    Destroy,
    /// List members of the current room
    Who,
    /// Command summary
    Help,
    /// Plain chat text
    Chat { text: String },
}

impl ClientMessage {
    /// Parse one line of client input
    ///
    /// Never fails: unknown commands and empty lines become chat.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };
        let arg = (!rest.is_empty()).then(|| rest.to_string());

        match command {
            "/exit" => ClientMessage::Exit,
            "/channels" => ClientMessage::Channels,
            "/join" => ClientMessage::Join { room: arg },
            "/date" => ClientMessage::Date,
            "/kick" => ClientMessage::Kick { handle: arg },
            "/promote" => ClientMessage::Promote { handle: arg },
            "/destroy" => ClientMessage::Destroy,
            "/who" => ClientMessage::Who,
            "/help" => ClientMessage::Help,
            _ => ClientMessage::Chat {
                text: line.to_string(),
            },
        }
    }
}

const HELP_TEXT: &str = "Commands:
/join <room>      move to a room (created if missing, you become its admin)
/channels         list rooms
/who              list members of your room
/date             server date and time
/kick <handle>    moderators: send a member back to the default room
/promote <handle> moderators: raise a member one role
/destroy          admins: close the room
/exit             leave the server";

/// Server → Client message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Handle negotiation prompt (written without a trailing newline)
    Prompt,
    /// Handle accepted
    Welcome { handle: String, room: RoomName },
    /// The receiving client entered a room
    Entered { room: RoomName, role: Role },
    /// Another member joined the room
    Joined { handle: String, room: RoomName },
    /// Another member left the room
    Left { handle: String, room: RoomName },
    /// Room listing
    RoomList { rooms: Vec<RoomName> },
    /// Member listing with roles, in join order
    MemberList {
        room: RoomName,
        members: Vec<(String, Role)>,
    },
    /// Server local date/time
    Date { now: String },
    /// Chat line from another member
    Chat {
        handle: String,
        role: Role,
        text: String,
    },
    /// The receiving client was kicked
    Kicked { room: RoomName, by: String },
    /// A member was kicked
    KickAnnounced {
        handle: String,
        room: RoomName,
        by: String,
    },
    /// A member's role was raised
    Promoted {
        handle: String,
        role: Role,
        by: String,
    },
    /// The room was destroyed
    Destroyed { room: RoomName, by: String },
    /// Command summary
    Help,
    /// Reply to /exit
    Goodbye,
    /// Server is stopping
    Shutdown,
    /// Error occurred
    Error { message: String },
}

impl ServerMessage {
    /// Whether the rendered message is terminated by a newline
    pub fn ends_line(&self) -> bool {
        !matches!(self, ServerMessage::Prompt)
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Prompt => write!(f, "Enter handle: "),
            ServerMessage::Welcome { handle, room } => {
                write!(f, "Welcome, {}! You are in {}.", handle, room)
            }
            ServerMessage::Entered { room, role } => {
                write!(f, "You joined {} as {}.", room, role)
            }
            ServerMessage::Joined { handle, room } => write!(f, "{} joined {}.", handle, room),
            ServerMessage::Left { handle, room } => write!(f, "{} left {}.", handle, room),
            ServerMessage::RoomList { rooms } => {
                write!(f, "Rooms:")?;
                for room in rooms {
                    write!(f, "\n- {}", room)?;
                }
                Ok(())
            }
            ServerMessage::MemberList { room, members } => {
                write!(f, "Members of {}:", room)?;
                for (handle, role) in members {
                    write!(f, "\n- {}{}", role.prefix(), handle)?;
                }
                Ok(())
            }
            ServerMessage::Date { now } => write!(f, "{}", now),
            ServerMessage::Chat { handle, role, text } => {
                write!(f, "{}{}: {}", role.prefix(), handle, text)
            }
            ServerMessage::Kicked { room, by } => {
                write!(f, "You were kicked from {} by {}.", room, by)
            }
            ServerMessage::KickAnnounced { handle, room, by } => {
                write!(f, "{} was kicked from {} by {}.", handle, room, by)
            }
            ServerMessage::Promoted { handle, role, by } => {
                write!(f, "{} is now {} (promoted by {}).", handle, role, by)
            }
            ServerMessage::Destroyed { room, by } => {
                write!(f, "Room {} was destroyed by {}.", room, by)
            }
            ServerMessage::Help => f.write_str(HELP_TEXT),
            ServerMessage::Goodbye => f.write_str("Goodbye."),
            ServerMessage::Shutdown => f.write_str("Server is shutting down."),
            ServerMessage::Error { message } => write!(f, "Error: {}", message),
        }
    }
}

/// Convert AppError to ServerMessage for client notification
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        let message = match &err {
            // Transport and process faults are not meant for the peer
            AppError::Io(_)
            | AppError::Task(_)
            | AppError::ChannelSend
            | AppError::ResourceExhausted => {
                "Internal error".to_string()
            }
            _ => err.to_string(),
        };
        ServerMessage::Error { message }
    }
}
