use crate::message::{ClientMessage, ServerMessage};
use crate::{ConnectionId, Snapshot};
use std::collections::BTreeSet;
use std::num::Wrapping;

/// Every `ConnectionId` value can be handed out once at a time.
pub const MAX_CONNECTIONS: usize = ConnectionId::MAX as usize + 1;

/// A message the transport must hand to one connection.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub to: ConnectionId,
    pub message: ServerMessage,
}

/// Authoritative state of the shared surface.
///
/// The store only ever *replaces* the current snapshot: there is no merge or
/// patch operation, so concurrent edits resolve to whichever arrived last.
/// Clearing everyone's surface is the only authority-gated action, and
/// requesting authority always succeeds, silently demoting the previous holder.
///
/// The store does no I/O. Every operation returns the deliveries the caller
/// must perform, in order.
pub struct SessionStore {
    connection_id_source: Wrapping<ConnectionId>,
    connections: BTreeSet<ConnectionId>,
    connection_limit: usize,
    current_snapshot: Option<Snapshot>,
    clear_authority_holder: Option<ConnectionId>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_connection_limit(MAX_CONNECTIONS)
    }

    /// `limit` is capped at [`MAX_CONNECTIONS`].
    pub fn with_connection_limit(limit: usize) -> Self {
        Self {
            connection_id_source: Wrapping(0),
            connections: BTreeSet::new(),
            connection_limit: limit.min(MAX_CONNECTIONS),
            current_snapshot: None,
            clear_authority_holder: None,
        }
    }

    pub fn current_snapshot(&self) -> Option<&Snapshot> {
        self.current_snapshot.as_ref()
    }

    pub fn clear_authority_holder(&self) -> Option<ConnectionId> {
        self.clear_authority_holder
    }

    /// Connected ids in ascending order.
    pub fn connections(&self) -> impl ExactSizeIterator<Item = ConnectionId> + '_ {
        self.connections.iter().copied()
    }

    pub fn is_connected(&self, connection_id: ConnectionId) -> bool {
        self.connections.contains(&connection_id)
    }

    /// Registers a connection and syncs it to the current surface. Nobody else is notified.
    ///
    /// Returns `None` when the store is full; the caller must refuse the connection.
    pub fn connect(&mut self) -> Option<(ConnectionId, Vec<Delivery>)> {
        let connection_id = match self.new_connection_id() {
            Some(connection_id) => connection_id,
            None => {
                log::warn!(
                    "Refusing connection: {} of {} slots in use",
                    self.connections.len(),
                    self.connection_limit
                );
                return None;
            }
        };
        self.connections.insert(connection_id);
        log::info!(
            "Connection {} joined ({} connected)",
            connection_id,
            self.connections.len()
        );
        let init = Delivery {
            to: connection_id,
            message: ServerMessage::Init(self.current_snapshot.clone()),
        };
        Some((connection_id, vec![init]))
    }

    pub fn handle(&mut self, from: ConnectionId, message: ClientMessage) -> Vec<Delivery> {
        if !self.is_connected(from) {
            log::warn!("Ignoring message from unknown connection {}", from);
            return Vec::new();
        }
        match message {
            ClientMessage::Snapshot(snapshot) => self.receive_snapshot(from, snapshot),
            ClientMessage::RegisterAuthority => {
                self.register_authority(from);
                Vec::new()
            }
            ClientMessage::ClearRequest => self.request_clear(from),
        }
    }

    /// Last write wins: the snapshot replaces the shared state unconditionally and
    /// is relayed to everyone except the sender.
    pub fn receive_snapshot(&mut self, from: ConnectionId, snapshot: Snapshot) -> Vec<Delivery> {
        log::debug!("Snapshot from {} ({} bytes)", from, snapshot.len());
        self.current_snapshot = Some(snapshot.clone());
        self.connections
            .iter()
            .filter(|id| **id != from)
            .map(|id| Delivery {
                to: *id,
                message: ServerMessage::Snapshot(snapshot.clone()),
            })
            .collect()
    }

    pub fn register_authority(&mut self, from: ConnectionId) {
        if !self.is_connected(from) {
            log::warn!("Ignoring authority request from unknown connection {}", from);
            return;
        }
        match self.clear_authority_holder.replace(from) {
            Some(previous) if previous != from => {
                log::info!("Clear authority moved from {} to {}", previous, from)
            }
            _ => log::info!("Clear authority registered: {}", from),
        }
    }

    /// Clears the shared surface for everyone, requester included, if `from` holds
    /// authority. Otherwise nothing happens and nothing is reported back.
    pub fn request_clear(&mut self, from: ConnectionId) -> Vec<Delivery> {
        if self.clear_authority_holder != Some(from) {
            log::warn!("Unauthorized clear request from: {}", from);
            return Vec::new();
        }
        log::info!("Surface cleared by {}", from);
        self.current_snapshot = None;
        self.connections
            .iter()
            .map(|id| Delivery {
                to: *id,
                message: ServerMessage::ClearApplied,
            })
            .collect()
    }

    pub fn disconnect(&mut self, connection_id: ConnectionId) {
        self.connections.remove(&connection_id);
        log::info!("Connection {} left", connection_id);
        if self.clear_authority_holder == Some(connection_id) {
            self.clear_authority_holder = None;
            log::info!("Clear authority released: holder {} disconnected", connection_id);
        }
    }

    // Terminates because fewer than MAX_CONNECTIONS ids are taken.
    fn new_connection_id(&mut self) -> Option<ConnectionId> {
        if self.connections.len() >= self.connection_limit {
            return None;
        }
        loop {
            self.connection_id_source += Wrapping(1);
            let candidate = self.connection_id_source.0;
            if !self.connections.contains(&candidate) {
                break Some(candidate);
            }
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;

    fn snapshot(color: Color) -> Snapshot {
        Snapshot::encode(1, 1, &[color]).expect("")
    }

    fn recipients(deliveries: &[Delivery]) -> Vec<ConnectionId> {
        deliveries.iter().map(|d| d.to).collect()
    }

    #[test]
    fn it_sends_empty_init_to_first_connection() {
        let mut store = SessionStore::new();
        let (id, deliveries) = store.connect().expect("");
        assert_eq!(recipients(&deliveries), vec![id]);
        assert!(matches!(deliveries[0].message, ServerMessage::Init(None)));
    }

    #[test]
    fn it_relays_snapshots_to_everyone_but_the_sender() {
        let mut store = SessionStore::new();
        let (a, _) = store.connect().expect("");
        let (b, _) = store.connect().expect("");
        let (c, _) = store.connect().expect("");

        let deliveries = store.receive_snapshot(b, snapshot(Color::WHITE));
        assert_eq!(recipients(&deliveries), vec![a, c]);
        assert!(deliveries
            .iter()
            .all(|d| matches!(d.message, ServerMessage::Snapshot(_))));
    }

    #[test]
    fn it_only_lets_the_holder_clear() {
        let mut store = SessionStore::new();
        let (a, _) = store.connect().expect("");
        let (b, _) = store.connect().expect("");
        store.receive_snapshot(a, snapshot(Color::WHITE));

        assert!(store.request_clear(a).is_empty());
        assert!(store.current_snapshot().is_some());

        store.register_authority(b);
        let deliveries = store.request_clear(b);
        assert_eq!(recipients(&deliveries), vec![a, b]);
        assert!(store.current_snapshot().is_none());
    }

    #[test]
    fn it_ignores_traffic_from_unknown_connections() {
        let mut store = SessionStore::new();
        let (a, _) = store.connect().expect("");
        store.disconnect(a);

        assert!(store
            .handle(a, ClientMessage::Snapshot(snapshot(Color::WHITE)))
            .is_empty());
        store.handle(a, ClientMessage::RegisterAuthority);
        assert!(store.current_snapshot().is_none());
        assert_eq!(store.clear_authority_holder(), None);
    }

    #[test]
    fn it_skips_ids_still_in_use_when_wrapping() {
        let mut store = SessionStore::new();
        let (first, _) = store.connect().expect("");
        assert_eq!(first, 1);
        store.connection_id_source = Wrapping(ConnectionId::MAX);
        let (wrapped, _) = store.connect().expect("");
        assert_eq!(wrapped, 0);
        let (next, _) = store.connect().expect("");
        assert_eq!(next, 2);
    }

    #[test]
    fn it_refuses_connections_beyond_the_limit() {
        let mut store = SessionStore::with_connection_limit(2);
        let (a, _) = store.connect().expect("");
        store.connect().expect("");
        assert!(store.connect().is_none());
        assert_eq!(store.connections().len(), 2);

        store.disconnect(a);
        assert!(store.connect().is_some());
    }

    #[test]
    fn it_refuses_instead_of_spinning_when_every_id_is_taken() {
        let mut store = SessionStore::with_connection_limit(usize::MAX);
        for _ in 0..MAX_CONNECTIONS {
            store.connect().expect("");
        }
        assert!(store.connect().is_none());

        store.disconnect(7);
        let (id, _) = store.connect().expect("");
        assert_eq!(id, 7);
    }
}
