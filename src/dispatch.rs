//! Command dispatcher
//!
//! Turns one line of client input into a state change plus notifications.
//! Authorization is checked against the issuer's role in its current room.
//! Per-command failures become an error line for the issuer; only a fatal
//! error leaves `dispatch`.

use chrono::Local;
use tracing::{debug, info};

use crate::error::AppError;
use crate::message::{ClientMessage, ServerMessage};
use crate::state::ChatState;
use crate::types::{ClientId, Role, RoomName};

/// What the session should do after a line was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

impl ChatState {
    /// Handle one line from `client_id`
    pub fn dispatch(&mut self, client_id: ClientId, line: &str) -> Result<Flow, AppError> {
        if self.clients.get(client_id).is_none() {
            return Ok(Flow::Exit);
        }

        let result = match ClientMessage::parse(line) {
            ClientMessage::Exit => {
                self.reply(client_id, ServerMessage::Goodbye);
                return Ok(Flow::Exit);
            }
            ClientMessage::Channels => self.handle_channels(client_id),
            ClientMessage::Join { room } => self.handle_join(client_id, room),
            ClientMessage::Date => self.handle_date(client_id),
            ClientMessage::Kick { handle } => self.handle_kick(client_id, handle),
            ClientMessage::Promote { handle } => self.handle_promote(client_id, handle),
            ClientMessage::Destroy => self.handle_destroy(client_id),
            ClientMessage::Who => self.handle_who(client_id),
            ClientMessage::Help => {
                self.reply(client_id, ServerMessage::Help);
                Ok(())
            }
            ClientMessage::Chat { text } => self.handle_chat(client_id, text),
        };

        match result {
            Ok(()) => Ok(Flow::Continue),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                debug!("Command from {} rejected: {}", client_id, e);
                self.reply(client_id, e.into());
                Ok(Flow::Continue)
            }
        }
    }

    /// Current room of the issuer, provided it is not the default room and
    /// the issuer holds at least `required` in it
    fn governed_room(
        &self,
        client_id: ClientId,
        required: Role,
    ) -> Result<(RoomName, Role), AppError> {
        let name = self.current_room(client_id)?;
        if self.rooms.is_default(&name) {
            return Err(AppError::DefaultRoomLocked(name.to_string()));
        }
        let role = self
            .rooms
            .find_by_name(name.as_str())
            .map(|room| room.role_of(client_id))
            .unwrap_or_default();
        if !role.allows(required) {
            return Err(AppError::PermissionDenied(required));
        }
        Ok((name, role))
    }

    fn handle_of(&self, client_id: ClientId) -> String {
        self.clients
            .get(client_id)
            .map(|c| c.handle.clone())
            .unwrap_or_default()
    }

    fn handle_channels(&mut self, client_id: ClientId) -> Result<(), AppError> {
        let rooms = self.rooms.list_names();
        self.reply(client_id, ServerMessage::RoomList { rooms });
        Ok(())
    }

    fn handle_who(&mut self, client_id: ClientId) -> Result<(), AppError> {
        let name = self.current_room(client_id)?;
        let room = self
            .rooms
            .find_by_name(name.as_str())
            .ok_or_else(|| AppError::RoomNotFound(name.to_string()))?;
        let members = room.list_members();
        self.reply(client_id, ServerMessage::MemberList { room: name, members });
        Ok(())
    }

    fn handle_date(&mut self, client_id: ClientId) -> Result<(), AppError> {
        let now = Local::now().format("%A %d %B %Y, %H:%M:%S").to_string();
        self.reply(client_id, ServerMessage::Date { now });
        Ok(())
    }

    fn handle_join(&mut self, client_id: ClientId, room: Option<String>) -> Result<(), AppError> {
        let name = room.ok_or(AppError::Usage("/join <room>"))?;
        if name.len() > self.config.max_name_length {
            return Err(AppError::InvalidRoomName(format!(
                "longer than {} bytes",
                self.config.max_name_length
            )));
        }
        let target = RoomName::new(name);
        let current = self.current_room(client_id)?;
        if current == target {
            return Err(AppError::AlreadyInRoom(target.to_string()));
        }

        // Create (or find) the target first so a refused join leaves the
        // client where it was
        let (_, created) = self.rooms.get_or_create_replacing(&target, Some(&current))?;
        self.leave_current(client_id);
        let role = if created { Role::Admin } else { Role::User };
        self.enter(client_id, &target, role)?;

        info!("Client {} moved from {} to {} as {}", client_id, current, target, role);
        Ok(())
    }

    fn handle_chat(&mut self, client_id: ClientId, text: String) -> Result<(), AppError> {
        let name = self.current_room(client_id)?;
        let handle = self.handle_of(client_id);
        let room = self
            .rooms
            .find_by_name(name.as_str())
            .ok_or_else(|| AppError::RoomNotFound(name.to_string()))?;

        debug!("[{}] {}: {}", name, handle, text);
        let role = room.role_of(client_id);
        room.broadcast(ServerMessage::Chat { handle, role, text }, Some(client_id));
        Ok(())
    }

    fn handle_kick(&mut self, client_id: ClientId, target: Option<String>) -> Result<(), AppError> {
        let target = target.ok_or(AppError::Usage("/kick <handle>"))?;
        let (name, _) = self.governed_room(client_id, Role::Moderator)?;
        let by = self.handle_of(client_id);

        self.rooms.default_room_mut().reserve_members(1)?;
        let room = self
            .rooms
            .find_by_name_mut(name.as_str())
            .ok_or_else(|| AppError::RoomNotFound(name.to_string()))?;
        let target_id = room
            .find_by_handle(&target)
            .map(|m| m.client_id)
            .ok_or_else(|| AppError::MemberNotFound(target.clone()))?;
        let Some(target_client) = self.clients.get_mut(target_id) else {
            return Err(AppError::MemberNotFound(target));
        };

        room.remove_member(target_client);
        room.broadcast(
            ServerMessage::KickAnnounced {
                handle: target.clone(),
                room: name.clone(),
                by: by.clone(),
            },
            None,
        );
        self.reply(
            target_id,
            ServerMessage::Kicked {
                room: name.clone(),
                by: by.clone(),
            },
        );
        self.rooms.destroy_if_empty(&name);

        let lobby = self.rooms.default_name().clone();
        self.enter(target_id, &lobby, Role::User)?;

        info!("'{}' kicked '{}' from {}", by, target, name);
        Ok(())
    }

    fn handle_promote(
        &mut self,
        client_id: ClientId,
        target: Option<String>,
    ) -> Result<(), AppError> {
        let target = target.ok_or(AppError::Usage("/promote <handle>"))?;
        let (name, issuer_role) = self.governed_room(client_id, Role::Moderator)?;
        let by = self.handle_of(client_id);

        let room = self
            .rooms
            .find_by_name_mut(name.as_str())
            .ok_or_else(|| AppError::RoomNotFound(name.to_string()))?;
        let member = room
            .find_by_handle(&target)
            .ok_or_else(|| AppError::MemberNotFound(target.clone()))?;
        let (target_id, current) = (member.client_id, member.role);

        let Some(next) = current.next() else {
            return Err(AppError::RoleCeiling(target));
        };
        // Moderators may only turn users into moderators
        if issuer_role < Role::Admin && next > Role::Moderator {
            return Err(AppError::PermissionDenied(Role::Admin));
        }

        room.set_role(target_id, next);
        room.broadcast(
            ServerMessage::Promoted {
                handle: target.clone(),
                role: next,
                by: by.clone(),
            },
            None,
        );

        info!("'{}' promoted '{}' to {} in {}", by, target, next, name);
        Ok(())
    }

    fn handle_destroy(&mut self, client_id: ClientId) -> Result<(), AppError> {
        let (name, _) = self.governed_room(client_id, Role::Admin)?;
        let by = self.handle_of(client_id);

        let count = self
            .rooms
            .find_by_name(name.as_str())
            .map_or(0, |room| room.member_count());
        self.rooms.default_room_mut().reserve_members(count)?;
        let room = self
            .rooms
            .find_by_name_mut(name.as_str())
            .ok_or_else(|| AppError::RoomNotFound(name.to_string()))?;
        room.broadcast(
            ServerMessage::Destroyed {
                room: name.clone(),
                by: by.clone(),
            },
            None,
        );

        let members = room.member_ids();
        for member_id in &members {
            if let Some(client) = self.clients.get_mut(*member_id) {
                room.remove_member(client);
            }
        }
        self.rooms.destroy_if_empty(&name);

        let lobby = self.rooms.default_name().clone();
        for member_id in members {
            self.enter(member_id, &lobby, Role::User)?;
        }

        info!("'{}' destroyed room {}", by, name);
        Ok(())
    }
}
