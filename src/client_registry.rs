//! Client registry
//!
//! Tracks every named client and enforces handle uniqueness.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::client::Client;
use crate::error::AppError;
use crate::message::ServerMessage;
use crate::types::ClientId;

/// Registry of connected, named clients
///
/// Owns the `Client` records for their connected lifetime. A second index
/// maps handles to IDs so uniqueness checks and lookups by handle are O(1).
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<ClientId, Client>,
    handles: HashMap<String, ClientId>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `handle` for the connection `id`
    ///
    /// The uniqueness check and the insertion happen in the same call on
    /// exclusively borrowed state, so two sessions can never both win.
    pub fn register(
        &mut self,
        id: ClientId,
        handle: String,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<&mut Client, AppError> {
        if self.handles.contains_key(&handle) {
            return Err(AppError::DuplicateHandle(handle));
        }

        // Reserve before touching either map so a failure leaves no trace
        self.clients
            .try_reserve(1)
            .map_err(|_| AppError::ResourceExhausted)?;
        self.handles
            .try_reserve(1)
            .map_err(|_| AppError::ResourceExhausted)?;

        self.handles.insert(handle.clone(), id);
        let client = self
            .clients
            .entry(id)
            .or_insert_with(|| Client::new(id, handle, sender));
        Ok(client)
    }

    /// Remove a client; unknown IDs are ignored
    pub fn unregister(&mut self, id: ClientId) -> Option<Client> {
        let client = self.clients.remove(&id)?;
        self.handles.remove(&client.handle);
        Some(client)
    }

    /// Check whether a handle is currently claimed
    pub fn exists(&self, handle: &str) -> bool {
        self.handles.contains_key(handle)
    }

    pub fn get(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(&id)
    }

    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut Client> {
        self.clients.get_mut(&id)
    }

    pub fn id_of(&self, handle: &str) -> Option<ClientId> {
        self.handles.get(handle).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// Check a candidate handle before it is offered to the registry
pub fn validate_handle(handle: &str, max_length: usize) -> Result<(), AppError> {
    if handle.is_empty() {
        return Err(AppError::InvalidHandle("handle cannot be empty".to_string()));
    }
    if handle.len() > max_length {
        return Err(AppError::InvalidHandle(format!(
            "handle longer than {} bytes",
            max_length
        )));
    }
    if handle.chars().any(char::is_whitespace) {
        return Err(AppError::InvalidHandle(
            "handle cannot contain spaces".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> mpsc::Sender<ServerMessage> {
        mpsc::channel(8).0
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ClientRegistry::new();
        let id = ClientId::new();

        registry.register(id, "alice".to_string(), sender()).unwrap();

        assert!(registry.exists("alice"));
        assert_eq!(registry.id_of("alice"), Some(id));
        assert_eq!(registry.get(id).unwrap().handle, "alice");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_handle_rejected() {
        let mut registry = ClientRegistry::new();
        let first = ClientId::new();
        registry.register(first, "alice".to_string(), sender()).unwrap();

        let err = registry
            .register(ClientId::new(), "alice".to_string(), sender())
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateHandle(h) if h == "alice"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.id_of("alice"), Some(first));
    }

    #[test]
    fn test_handles_are_case_sensitive() {
        let mut registry = ClientRegistry::new();
        registry.register(ClientId::new(), "alice".to_string(), sender()).unwrap();
        assert!(registry
            .register(ClientId::new(), "Alice".to_string(), sender())
            .is_ok());
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let mut registry = ClientRegistry::new();
        let id = ClientId::new();
        registry.register(id, "alice".to_string(), sender()).unwrap();

        assert!(registry.unregister(id).is_some());
        assert!(registry.unregister(id).is_none());
        assert!(!registry.exists("alice"));
        assert!(registry.is_empty());

        // Handle is free again
        assert!(registry
            .register(ClientId::new(), "alice".to_string(), sender())
            .is_ok());
    }

    #[test]
    fn test_validate_handle() {
        assert!(validate_handle("alice", 32).is_ok());
        assert!(validate_handle("", 32).is_err());
        assert!(validate_handle("al ice", 32).is_err());
        assert!(validate_handle(&"x".repeat(33), 32).is_err());
        assert!(validate_handle(&"x".repeat(32), 32).is_ok());
    }
}
