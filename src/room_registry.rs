//! Room registry
//!
//! Creates, finds and destroys rooms by name, and owns the permanent
//! default room.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::AppError;
use crate::room::Room;
use crate::types::RoomName;

/// All existing rooms
///
/// The default room is held outside the map so it cannot be removed.
/// `max_rooms` counts it too.
#[derive(Debug)]
pub struct RoomRegistry {
    default_room: Room,
    rooms: HashMap<RoomName, Room>,
    max_rooms: Option<usize>,
}

impl RoomRegistry {
    /// Create a registry holding only the default room
    pub fn new(default_room: RoomName, max_rooms: Option<usize>) -> Self {
        Self {
            default_room: Room::new(default_room),
            rooms: HashMap::new(),
            max_rooms,
        }
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Room> {
        if name == self.default_room.name.as_str() {
            return Some(&self.default_room);
        }
        self.rooms.get(name)
    }

    pub fn find_by_name_mut(&mut self, name: &str) -> Option<&mut Room> {
        if name == self.default_room.name.as_str() {
            return Some(&mut self.default_room);
        }
        self.rooms.get_mut(name)
    }

    /// Return the room called `name`, creating it if needed
    ///
    /// The flag is true when the room was created by this call; the caller
    /// joins as Admin in that case and as User otherwise. The returned room
    /// already has space reserved for one more member.
    pub fn get_or_create(&mut self, name: &RoomName) -> Result<(&mut Room, bool), AppError> {
        self.get_or_create_replacing(name, None)
    }

    /// Like `get_or_create`, for a client about to leave `leaving`
    ///
    /// If that client is the last member of `leaving`, its room will be
    /// destroyed right after, so its slot does not count against the cap.
    pub fn get_or_create_replacing(
        &mut self,
        name: &RoomName,
        leaving: Option<&RoomName>,
    ) -> Result<(&mut Room, bool), AppError> {
        if self.is_default(name) {
            self.default_room.reserve_members(1)?;
            return Ok((&mut self.default_room, false));
        }

        let created = !self.rooms.contains_key(name);
        if created {
            let freed = leaving.is_some_and(|old| self.frees_slot(old));
            if let Some(max) = self.max_rooms {
                if self.len() - usize::from(freed) >= max {
                    return Err(AppError::RoomLimitExceeded(max));
                }
            }
            let mut room = Room::new(name.clone());
            room.reserve_members(1)?;
            self.rooms
                .try_reserve(1)
                .map_err(|_| AppError::ResourceExhausted)?;
            self.rooms.insert(name.clone(), room);
            info!("Room {} created", name);
        }

        let room = self
            .rooms
            .get_mut(name)
            .ok_or_else(|| AppError::RoomNotFound(name.to_string()))?;
        if !created {
            room.reserve_members(1)?;
        }
        Ok((room, created))
    }

    /// A single remaining member leaving `name` would destroy it
    fn frees_slot(&self, name: &RoomName) -> bool {
        !self.is_default(name) && self.rooms.get(name).is_some_and(|r| r.member_count() == 1)
    }

    /// Remove `name` if it is empty and not the default room
    ///
    /// Returns true if the room was removed.
    pub fn destroy_if_empty(&mut self, name: &RoomName) -> bool {
        if self.is_default(name) {
            return false;
        }
        let empty = self.rooms.get(name).is_some_and(Room::is_empty);
        if empty {
            self.rooms.remove(name);
            info!("Room {} destroyed (empty)", name);
            debug!("Total rooms: {}", self.len());
        }
        empty
    }

    pub fn default_name(&self) -> &RoomName {
        &self.default_room.name
    }

    pub fn is_default(&self, name: &RoomName) -> bool {
        *name == self.default_room.name
    }

    pub fn default_room(&self) -> &Room {
        &self.default_room
    }

    pub fn default_room_mut(&mut self) -> &mut Room {
        &mut self.default_room
    }

    /// Room names, default room first then alphabetical
    pub fn list_names(&self) -> Vec<RoomName> {
        let mut others: Vec<RoomName> = self.rooms.keys().cloned().collect();
        others.sort();

        let mut names = Vec::with_capacity(others.len() + 1);
        names.push(self.default_room.name.clone());
        names.extend(others);
        names
    }

    /// Number of rooms, default room included
    pub fn len(&self) -> usize {
        self.rooms.len() + 1
    }

    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        std::iter::once(&self.default_room).chain(self.rooms.values())
    }
}
