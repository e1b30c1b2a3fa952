//! Shared chat state
//!
//! Both registries live here and are only ever touched by the `ChatServer`
//! actor, one command at a time. Session-level operations (handle
//! negotiation, teardown, shutdown) are defined in this file; the command
//! grammar is handled in `dispatch.rs`.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client_registry::{validate_handle, ClientRegistry};
use crate::config::ServerConfig;
use crate::error::AppError;
use crate::message::ServerMessage;
use crate::room_registry::RoomRegistry;
use crate::types::{ClientId, Role, RoomName};

#[derive(Debug)]
pub struct ChatState {
    pub clients: ClientRegistry,
    pub rooms: RoomRegistry,
    pub config: ServerConfig,
}

impl ChatState {
    pub fn new(config: ServerConfig) -> Self {
        let rooms = RoomRegistry::new(config.default_room_name(), config.max_rooms);
        Self {
            clients: ClientRegistry::new(),
            rooms,
            config,
        }
    }

    /// Claim a handle and place the client in the default room as User
    pub fn register(
        &mut self,
        client_id: ClientId,
        handle: String,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<(), AppError> {
        validate_handle(&handle, self.config.max_name_length)?;

        // Reserve the membership slot before the registry changes
        self.rooms.default_room_mut().reserve_members(1)?;
        let client = self.clients.register(client_id, handle, sender)?;
        self.rooms.default_room_mut().join(client, Role::User)?;
        let handle = client.handle.clone();

        let room = self.rooms.default_name().clone();
        self.reply(
            client_id,
            ServerMessage::Welcome {
                handle: handle.clone(),
                room,
            },
        );

        info!("Client {} registered as '{}'", client_id, handle);
        debug!(
            "Total clients: {}, Total rooms: {}",
            self.clients.len(),
            self.rooms.len()
        );
        Ok(())
    }

    /// Leave the current room, unregister, and drop the client record
    ///
    /// Every way a session can end goes through here. Calling it again for
    /// the same client, or for one that never registered, does nothing.
    pub fn disconnect(&mut self, client_id: ClientId) -> bool {
        self.leave_current(client_id);
        let Some(client) = self.clients.unregister(client_id) else {
            return false;
        };

        info!("Client {} ('{}') disconnected", client_id, client.handle);
        debug!(
            "Total clients: {}, Total rooms: {}",
            self.clients.len(),
            self.rooms.len()
        );
        true
    }

    /// Tell every connected client the server is stopping
    pub fn shutdown(&self) {
        for client in self.clients.iter() {
            if let Err(e) = client.send(ServerMessage::Shutdown) {
                warn!("Could not notify {} of shutdown: {}", client.handle, e);
            }
        }
    }

    /// Queue a reply for one client
    pub(crate) fn reply(&self, client_id: ClientId, msg: ServerMessage) {
        let Some(client) = self.clients.get(client_id) else {
            return;
        };
        if let Err(e) = client.send(msg) {
            warn!("Dropped reply for {}: {}", client.handle, e);
        }
    }

    /// Name of the client's current room
    pub(crate) fn current_room(&self, client_id: ClientId) -> Result<RoomName, AppError> {
        self.clients
            .get(client_id)
            .and_then(|c| c.room().cloned())
            .ok_or_else(|| AppError::RoomNotFound(self.rooms.default_name().to_string()))
    }

    /// Leave the current room with an announcement and collect it if empty
    pub(crate) fn leave_current(&mut self, client_id: ClientId) -> Option<RoomName> {
        let client = self.clients.get_mut(client_id)?;
        let name = client.room()?.clone();
        if let Some(room) = self.rooms.find_by_name_mut(name.as_str()) {
            room.leave(client);
        }
        self.rooms.destroy_if_empty(&name);
        Some(name)
    }

    /// Put a roomless client into `name` with `role` and confirm to it
    pub(crate) fn enter(
        &mut self,
        client_id: ClientId,
        name: &RoomName,
        role: Role,
    ) -> Result<(), AppError> {
        let Some(client) = self.clients.get_mut(client_id) else {
            return Ok(());
        };
        let room = self
            .rooms
            .find_by_name_mut(name.as_str())
            .ok_or_else(|| AppError::RoomNotFound(name.to_string()))?;
        room.join(client, role)?;
        self.reply(
            client_id,
            ServerMessage::Entered {
                room: name.clone(),
                role,
            },
        );
        Ok(())
    }
}
