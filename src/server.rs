//! ChatServer Actor implementation
//!
//! The central actor that owns all shared state: the client registry and the
//! room registry. Sessions talk to it over an mpsc channel, so every
//! mutation and the notifications it triggers run as one uninterrupted step,
//! and broadcasts within a room follow command order.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::dispatch::Flow;
use crate::error::AppError;
use crate::message::ServerMessage;
use crate::state::ChatState;
use crate::types::ClientId;

/// Commands sent from session handlers to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// Claim a handle and enter the default room
    Register {
        client_id: ClientId,
        handle: String,
        sender: mpsc::Sender<ServerMessage>,
        respond_to: oneshot::Sender<Result<(), AppError>>,
    },
    /// One line of input from a registered client
    Input {
        client_id: ClientId,
        line: String,
        respond_to: oneshot::Sender<Flow>,
    },
    /// Session ended (idempotent)
    Disconnect { client_id: ClientId },
    /// Notify everyone and stop
    Shutdown,
}

/// The main ChatServer actor
pub struct ChatServer {
    state: ChatState,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a new ChatServer with the given config and command receiver
    pub fn new(config: ServerConfig, receiver: mpsc::Receiver<ServerCommand>) -> Self {
        Self {
            state: ChatState::new(config),
            receiver,
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Processes commands until a shutdown is requested or all senders are
    /// dropped. Returns an error only for process-fatal conditions.
    pub async fn run(mut self) -> Result<(), AppError> {
        info!(
            "ChatServer started (default room: {})",
            self.state.rooms.default_name()
        );

        while let Some(cmd) = self.receiver.recv().await {
            match self.handle_command(cmd) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    error!("ChatServer stopping: {}", e);
                    return Err(e);
                }
            }
        }

        info!("ChatServer shutting down");
        Ok(())
    }

    /// Process a single command; false means stop
    fn handle_command(&mut self, cmd: ServerCommand) -> Result<bool, AppError> {
        match cmd {
            ServerCommand::Register {
                client_id,
                handle,
                sender,
                respond_to,
            } => match self.state.register(client_id, handle, sender) {
                Err(e) if e.is_fatal() => return Err(e),
                result => {
                    if let Err(e) = &result {
                        debug!("Registration for {} refused: {}", client_id, e);
                    }
                    let _ = respond_to.send(result);
                }
            },
            ServerCommand::Input {
                client_id,
                line,
                respond_to,
            } => {
                let flow = self.state.dispatch(client_id, &line)?;
                let _ = respond_to.send(flow);
            }
            ServerCommand::Disconnect { client_id } => {
                self.state.disconnect(client_id);
            }
            ServerCommand::Shutdown => {
                self.state.shutdown();
                return Ok(false);
            }
        }
        Ok(true)
    }
}
