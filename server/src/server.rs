use tokio::sync::mpsc::{channel, Sender};

use whiteboard_system::{ConnectionId, Delivery, SessionStore};

use super::connection::{ConnectionCommand, ConnectionEvent};
use crate::connection_tx_storage::{ConnectionTxStorage, SendOutcome};

pub type ServerTx = Sender<ConnectionCommand>;

/// Capacity of the queue every connection feeds its commands into.
const SERVER_QUEUE: usize = 256;

/// Owns the session store and applies its deliveries. Runs on a single task,
/// so commands are handled one at a time in arrival order.
struct Server {
    store: SessionStore,
    connections: ConnectionTxStorage,
}

impl Server {
    fn new(max_connections: usize) -> Self {
        Self {
            store: SessionStore::with_connection_limit(max_connections),
            connections: ConnectionTxStorage::new(),
        }
    }

    fn handle_connection_command(&mut self, command: ConnectionCommand) {
        self.reap_closed();
        match command {
            ConnectionCommand::Connect { tx } => {
                // Dropping `tx` tells the connection it was refused.
                let (connection_id, deliveries) = match self.store.connect() {
                    Some(connected) => connected,
                    None => return,
                };
                self.connections.insert(connection_id, tx);
                self.send(connection_id, ConnectionEvent::Connected { connection_id });
                self.deliver(deliveries);
            }
            ConnectionCommand::Disconnect { from } => self.disconnect(from),
            ConnectionCommand::ClientMessage { from, message } => {
                let deliveries = self.store.handle(from, message);
                self.deliver(deliveries);
            }
        }
    }

    fn deliver(&mut self, deliveries: Vec<Delivery>) {
        for Delivery { to, message } in deliveries {
            self.send(to, ConnectionEvent::ServerMessage(message));
        }
    }

    /// A connection that cannot take an event is dropped: skipping events would
    /// leave it out of sync for good. Removing its sender closes the socket.
    fn send(&mut self, to: ConnectionId, event: ConnectionEvent) {
        match self.connections.send(&to, event) {
            SendOutcome::Sent | SendOutcome::Unknown => {}
            SendOutcome::Full => {
                log::warn!("Connection {} is not keeping up, dropping it", to);
                self.disconnect(to);
            }
            SendOutcome::Closed => {
                log::info!("Connection {} went away without saying goodbye", to);
                self.disconnect(to);
            }
        }
    }

    fn reap_closed(&mut self) {
        for connection_id in self.connections.closed() {
            log::info!("Reaping closed connection {}", connection_id);
            self.disconnect(connection_id);
        }
    }

    fn disconnect(&mut self, connection_id: ConnectionId) {
        if self.connections.remove(&connection_id).is_some() {
            self.store.disconnect(connection_id);
        }
    }
}

pub fn spawn_server(max_connections: usize) -> ServerTx {
    let (srv_tx, mut srv_rx) = channel::<ConnectionCommand>(SERVER_QUEUE);

    tokio::spawn(async move {
        let mut server = Box::new(Server::new(max_connections));

        while let Some(command) = srv_rx.recv().await {
            server.handle_connection_command(command);
        }
        log::info!("Server loop terminated");
    });

    srv_tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::Receiver;
    use whiteboard_system::{ClientMessage, ServerMessage, Snapshot, MAX_CONNECTIONS};

    async fn connect(srv_tx: &ServerTx) -> (ConnectionId, Receiver<ConnectionEvent>) {
        let (tx, mut rx) = channel(16);
        srv_tx
            .send(ConnectionCommand::Connect { tx })
            .await
            .expect("");
        let connection_id = match rx.recv().await {
            Some(ConnectionEvent::Connected { connection_id }) => connection_id,
            other => panic!("unexpected {:?}", other),
        };
        (connection_id, rx)
    }

    async fn next_message(rx: &mut Receiver<ConnectionEvent>) -> ServerMessage {
        match rx.recv().await {
            Some(ConnectionEvent::ServerMessage(message)) => message,
            other => panic!("unexpected {:?}", other),
        }
    }

    async fn send(srv_tx: &ServerTx, from: ConnectionId, message: ClientMessage) {
        srv_tx
            .send(ConnectionCommand::ClientMessage { from, message })
            .await
            .expect("");
    }

    fn snapshot() -> Snapshot {
        Snapshot::encode(1, 1, &[whiteboard_system::Color::WHITE]).expect("")
    }

    #[tokio::test]
    async fn it_syncs_late_joiners_and_relays_to_others() {
        let srv_tx = spawn_server(MAX_CONNECTIONS);
        let (a, mut a_rx) = connect(&srv_tx).await;
        assert!(matches!(next_message(&mut a_rx).await, ServerMessage::Init(None)));

        srv_tx
            .send(ConnectionCommand::ClientMessage {
                from: a,
                message: ClientMessage::Snapshot(snapshot()),
            })
            .await
            .expect("");

        let (_b, mut b_rx) = connect(&srv_tx).await;
        assert!(matches!(
            next_message(&mut b_rx).await,
            ServerMessage::Init(Some(_))
        ));
        assert!(a_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn it_clears_everyone_once_authorized() {
        let srv_tx = spawn_server(MAX_CONNECTIONS);
        let (_a, mut a_rx) = connect(&srv_tx).await;
        let (b, mut b_rx) = connect(&srv_tx).await;
        next_message(&mut a_rx).await;
        next_message(&mut b_rx).await;

        for message in vec![
            ClientMessage::ClearRequest,
            ClientMessage::RegisterAuthority,
            ClientMessage::ClearRequest,
        ] {
            srv_tx
                .send(ConnectionCommand::ClientMessage { from: b, message })
                .await
                .expect("");
        }

        assert!(matches!(
            next_message(&mut a_rx).await,
            ServerMessage::ClearApplied
        ));
        assert!(matches!(
            next_message(&mut b_rx).await,
            ServerMessage::ClearApplied
        ));
    }

    #[tokio::test]
    async fn it_forgets_connections_whose_channel_closed() {
        let srv_tx = spawn_server(MAX_CONNECTIONS);
        let (a, a_rx) = connect(&srv_tx).await;
        drop(a_rx);
        let (b, mut b_rx) = connect(&srv_tx).await;
        next_message(&mut b_rx).await;

        srv_tx
            .send(ConnectionCommand::ClientMessage {
                from: b,
                message: ClientMessage::Snapshot(snapshot()),
            })
            .await
            .expect("");
        // a's channel is closed, so relaying to it unregisters a; its id is then unknown.
        srv_tx
            .send(ConnectionCommand::ClientMessage {
                from: a,
                message: ClientMessage::RegisterAuthority,
            })
            .await
            .expect("");
        srv_tx
            .send(ConnectionCommand::ClientMessage {
                from: a,
                message: ClientMessage::ClearRequest,
            })
            .await
            .expect("");

        let (_c, mut c_rx) = connect(&srv_tx).await;
        assert!(matches!(
            next_message(&mut c_rx).await,
            ServerMessage::Init(Some(_))
        ));
        assert!(b_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn it_refuses_connections_beyond_the_limit() {
        let srv_tx = spawn_server(1);
        let (_a, mut a_rx) = connect(&srv_tx).await;
        next_message(&mut a_rx).await;

        let (tx, mut rx) = channel(16);
        srv_tx
            .send(ConnectionCommand::Connect { tx })
            .await
            .expect("");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn it_drops_connections_that_stop_draining() {
        let srv_tx = spawn_server(MAX_CONNECTIONS);
        let (a, mut a_rx) = connect(&srv_tx).await;
        next_message(&mut a_rx).await;
        send(&srv_tx, a, ClientMessage::Snapshot(snapshot())).await;

        // Room for `Connected` only; `Init` does not fit.
        let (tx, mut slow_rx) = channel(1);
        srv_tx
            .send(ConnectionCommand::Connect { tx })
            .await
            .expect("");
        let slow = match slow_rx.recv().await {
            Some(ConnectionEvent::Connected { connection_id }) => connection_id,
            other => panic!("unexpected {:?}", other),
        };
        assert!(slow_rx.recv().await.is_none());

        send(&srv_tx, slow, ClientMessage::RegisterAuthority).await;
        send(&srv_tx, slow, ClientMessage::ClearRequest).await;
        let (_c, mut c_rx) = connect(&srv_tx).await;
        assert!(matches!(
            next_message(&mut c_rx).await,
            ServerMessage::Init(Some(_))
        ));
        assert!(a_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn it_reaps_vanished_connections_before_handling_commands() {
        let srv_tx = spawn_server(MAX_CONNECTIONS);
        let (a, mut a_rx) = connect(&srv_tx).await;
        next_message(&mut a_rx).await;
        send(&srv_tx, a, ClientMessage::Snapshot(snapshot())).await;
        send(&srv_tx, a, ClientMessage::RegisterAuthority).await;

        // Gone without a `Disconnect`; its authority must not outlive it.
        drop(a_rx);
        send(&srv_tx, a, ClientMessage::ClearRequest).await;

        let (_b, mut b_rx) = connect(&srv_tx).await;
        assert!(matches!(
            next_message(&mut b_rx).await,
            ServerMessage::Init(Some(_))
        ));
    }
}
