use crate::connection::ConnectionEvent;
use std::collections::HashMap;
use tokio::sync::mpsc::error::TrySendError;
use whiteboard_system::ConnectionId;

pub type ConnectionTx = tokio::sync::mpsc::Sender<ConnectionEvent>;

#[derive(Debug, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// The connection is not draining its queue; the event was not queued.
    Full,
    /// The connection actor is gone.
    Closed,
    Unknown,
}

pub struct ConnectionTxStorage {
    connection_txs: HashMap<ConnectionId, ConnectionTx>,
}

impl ConnectionTxStorage {
    pub fn new() -> Self {
        Self {
            connection_txs: HashMap::new(),
        }
    }

    pub fn insert(&mut self, connection_id: ConnectionId, tx: ConnectionTx) {
        self.connection_txs.insert(connection_id, tx);
    }

    /// Never waits: a slow connection must not hold up everybody else.
    pub fn send(&mut self, to: &ConnectionId, event: ConnectionEvent) -> SendOutcome {
        match self.connection_txs.get(to) {
            Some(tx) => match tx.try_send(event) {
                Ok(()) => SendOutcome::Sent,
                Err(TrySendError::Full(_)) => SendOutcome::Full,
                Err(TrySendError::Closed(_)) => SendOutcome::Closed,
            },
            None => {
                log::warn!("No channel for connection {}", to);
                SendOutcome::Unknown
            }
        }
    }

    /// Connections whose receiving side is gone.
    pub fn closed(&self) -> Vec<ConnectionId> {
        self.connection_txs
            .iter()
            .filter(|(_, tx)| tx.is_closed())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<ConnectionTx> {
        self.connection_txs.remove(connection_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::channel;

    #[test]
    fn it_reports_full_and_closed_channels() {
        let mut storage = ConnectionTxStorage::new();
        let (full_tx, _full_rx) = channel(1);
        let (closed_tx, closed_rx) = channel(1);
        storage.insert(1, full_tx);
        storage.insert(2, closed_tx);
        drop(closed_rx);

        let connected = |connection_id| ConnectionEvent::Connected { connection_id };
        assert_eq!(storage.send(&1, connected(1)), SendOutcome::Sent);
        assert_eq!(storage.send(&1, connected(1)), SendOutcome::Full);
        assert_eq!(storage.send(&2, connected(2)), SendOutcome::Closed);
        assert_eq!(storage.send(&3, connected(3)), SendOutcome::Unknown);
        assert_eq!(storage.closed(), vec![2]);
    }
}
