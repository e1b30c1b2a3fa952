//! Room struct definition
//!
//! A named group of members with per-member roles. The room owns its
//! broadcast fan-out since delivery is always scoped to its membership.

use tokio::sync::mpsc;
use tracing::warn;

use crate::client::{deliver, Client};
use crate::error::AppError;
use crate::message::ServerMessage;
use crate::types::{ClientId, Role, RoomName};

/// A (client, role) pair scoped to one room
#[derive(Debug, Clone)]
pub struct Member {
    pub client_id: ClientId,
    pub handle: String,
    pub role: Role,
    sender: mpsc::Sender<ServerMessage>,
}

/// Discussion room
///
/// Members are kept in join order, which is also the fan-out order.
#[derive(Debug)]
pub struct Room {
    /// Room name for identification
    pub name: RoomName,
    /// Current members in join order
    members: Vec<Member>,
}

impl Room {
    /// Create an empty room
    pub fn new(name: RoomName) -> Self {
        Self {
            name,
            members: Vec::new(),
        }
    }

    /// Add `client` with `role` and point its current room here
    ///
    /// Existing members are told about the newcomer; the newcomer is not.
    pub fn join(&mut self, client: &mut Client, role: Role) -> Result<(), AppError> {
        if self.contains(client.id) {
            return Ok(());
        }
        self.reserve_members(1)?;

        self.broadcast(
            ServerMessage::Joined {
                handle: client.handle.clone(),
                room: self.name.clone(),
            },
            None,
        );
        self.members.push(Member {
            client_id: client.id,
            handle: client.handle.clone(),
            role,
            sender: client.sender.clone(),
        });
        client.room = Some(self.name.clone());
        Ok(())
    }

    /// Make room for `additional` more members without touching membership
    pub fn reserve_members(&mut self, additional: usize) -> Result<(), AppError> {
        self.members
            .try_reserve(additional)
            .map_err(|_| AppError::ResourceExhausted)
    }

    /// Remove `client` and tell the remaining members
    ///
    /// Returns the role the client held, or None if it was not a member.
    pub fn leave(&mut self, client: &mut Client) -> Option<Role> {
        let role = self.remove_member(client)?;
        self.broadcast(
            ServerMessage::Left {
                handle: client.handle.clone(),
                room: self.name.clone(),
            },
            None,
        );
        Some(role)
    }

    /// Remove `client` without telling anyone
    ///
    /// Used when the caller sends its own announcement (kick, destroy).
    pub fn remove_member(&mut self, client: &mut Client) -> Option<Role> {
        let index = self.members.iter().position(|m| m.client_id == client.id)?;
        let member = self.members.remove(index);
        if client.room.as_ref() == Some(&self.name) {
            client.room = None;
        }
        Some(member.role)
    }

    /// Send `msg` to every member except `exclude`
    ///
    /// Best-effort: a failed delivery is logged and skipped.
    pub fn broadcast(&self, msg: ServerMessage, exclude: Option<ClientId>) {
        for member in &self.members {
            if Some(member.client_id) == exclude {
                continue;
            }
            if let Err(e) = deliver(&member.sender, msg.clone()) {
                warn!(
                    "Dropped message for {} in {}: {}",
                    member.handle, self.name, e
                );
            }
        }
    }

    /// Role of a member, `User` for non-members
    pub fn role_of(&self, client_id: ClientId) -> Role {
        self.member(client_id).map(|m| m.role).unwrap_or_default()
    }

    /// Overwrite a member's role; ignored for non-members
    pub fn set_role(&mut self, client_id: ClientId, role: Role) {
        if let Some(member) = self.members.iter_mut().find(|m| m.client_id == client_id) {
            member.role = role;
        }
    }

    pub fn contains(&self, client_id: ClientId) -> bool {
        self.member(client_id).is_some()
    }

    pub fn member(&self, client_id: ClientId) -> Option<&Member> {
        self.members.iter().find(|m| m.client_id == client_id)
    }

    /// Linear lookup by handle
    pub fn find_by_handle(&self, handle: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.handle == handle)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member handles in join order
    pub fn list_member_handles(&self) -> Vec<String> {
        self.members.iter().map(|m| m.handle.clone()).collect()
    }

    /// Member handles with roles in join order
    pub fn list_members(&self) -> Vec<(String, Role)> {
        self.members
            .iter()
            .map(|m| (m.handle.clone(), m.role))
            .collect()
    }

    /// Member IDs in join order
    pub fn member_ids(&self) -> Vec<ClientId> {
        self.members.iter().map(|m| m.client_id).collect()
    }
}
