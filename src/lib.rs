//! Room-based Text Chat Server Library
//!
//! A line-oriented TCP chat server built on tokio, using the Actor pattern
//! for shared state.
//!
//! # Features
//! - Unique handle negotiation
//! - Permanent default room every client starts in
//! - Rooms created on demand by `/join`, destroyed when empty
//! - Per-room roles (user, moderator, admin) gating `/kick`, `/promote`
//!   and `/destroy`
//! - Room and member listings, server date
//! - Plain chat broadcast for anything that is not a command
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor owning `ClientRegistry` and
//!   `RoomRegistry`
//! - Each connection runs a session task (`handle_connection`) that reads
//!   lines and forwards them to the actor
//! - `serve` accepts connections and waits for sessions on shutdown
//! - Outbound messages are queued per client and never block the actor
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use salon_chat::{serve, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), salon_chat::AppError> {
//!     let listener = TcpListener::bind("0.0.0.0:4000").await?;
//!     let shutdown = async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     };
//!     serve(listener, Arc::new(ServerConfig::default()), shutdown).await
//! }
//! ```

pub mod client;
pub mod client_registry;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod listener;
pub mod message;
pub mod room;
pub mod room_registry;
pub mod server;
pub mod state;
pub mod types;

// Re-export main types for convenience
pub use client::Client;
pub use client_registry::ClientRegistry;
pub use codec::LineCodec;
pub use config::ServerConfig;
pub use dispatch::Flow;
pub use error::{AppError, SendError};
pub use handler::handle_connection;
pub use listener::serve;
pub use message::{ClientMessage, ServerMessage};
pub use room::{Member, Room};
pub use room_registry::RoomRegistry;
pub use server::{ChatServer, ServerCommand};
pub use state::ChatState;
pub use types::{ClientId, Role, RoomName};
