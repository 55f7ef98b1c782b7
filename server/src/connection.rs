use std::time::Instant;

use actix::{Actor, ActorContext, AsyncContext, Handler, Message, Running, StreamHandler};
use tokio::task::JoinHandle;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use actix_web_actors::ws::{CloseCode, CloseReason};

use whiteboard_system::{ClientMessage, ConnectionId, ServerMessage};

use crate::connection_tx_storage::ConnectionTx;
use crate::server::ServerTx;
use crate::settings::Settings;

/// Capacity of the queue of events the server pushes to one connection.
const CONNECTION_QUEUE: usize = 64;

/// Messages a connection may send before the server has registered it.
const PENDING_LIMIT: usize = 16;

#[derive(Debug)]
pub enum ConnectionCommand {
    Connect {
        tx: ConnectionTx,
    },
    Disconnect {
        from: ConnectionId,
    },
    ClientMessage {
        from: ConnectionId,
        message: ClientMessage,
    },
}

#[derive(Debug)]
pub enum ConnectionEvent {
    Connected { connection_id: ConnectionId },
    /// The server dropped this connection, or refused it.
    Disconnected,
    ServerMessage(ServerMessage),
}

#[derive(Message)]
#[rtype(result = "()")]
struct ConnectionActorMessage(ConnectionEvent);

#[derive(Debug)]
enum ConnectionState {
    /// Waiting for `Connected`. Messages received meanwhile are held back.
    Idle { pending: Vec<ClientMessage> },
    Connected(ConnectionId),
    Closed,
}

#[derive(Debug)]
enum Ingress {
    Forward(ConnectionCommand),
    Held,
    Overflow,
    Dropped,
}

impl ConnectionState {
    fn new() -> Self {
        ConnectionState::Idle {
            pending: Vec::new(),
        }
    }

    fn accept(&mut self, message: ClientMessage) -> Ingress {
        match self {
            ConnectionState::Connected(from) => Ingress::Forward(ConnectionCommand::ClientMessage {
                from: *from,
                message,
            }),
            ConnectionState::Idle { pending } if pending.len() >= PENDING_LIMIT => {
                Ingress::Overflow
            }
            ConnectionState::Idle { pending } => {
                pending.push(message);
                Ingress::Held
            }
            ConnectionState::Closed => Ingress::Dropped,
        }
    }

    /// Switches to `Connected` and returns the held-back messages, oldest first.
    fn register(&mut self, connection_id: ConnectionId) -> Vec<ConnectionCommand> {
        let previous = std::mem::replace(self, ConnectionState::Connected(connection_id));
        match previous {
            ConnectionState::Idle { pending } => pending
                .into_iter()
                .map(|message| ConnectionCommand::ClientMessage {
                    from: connection_id,
                    message,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

struct ConnectionActor {
    state: ConnectionState,
    srv_tx: ServerTx,
    settings: web::Data<Settings>,
    last_heard: Instant,
    forwarder: Option<JoinHandle<()>>,
}

impl ConnectionActor {
    fn new(srv_tx: ServerTx, settings: web::Data<Settings>) -> Self {
        Self {
            state: ConnectionState::new(),
            srv_tx,
            settings,
            last_heard: Instant::now(),
            forwarder: None,
        }
    }

    fn close(&mut self, reason: CloseReason, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.close(Some(reason));
        ctx.stop();
    }

    fn send_command(&self, command: ConnectionCommand, ctx: &mut ws::WebsocketContext<Self>) {
        if let Err(err) = self.srv_tx.try_send(command) {
            // Commands must not be skipped; close and let the participant resync.
            log::error!("Server queue unavailable, closing connection: {}", err);
            ctx.stop();
        }
    }

    /// Pings on every tick; stops the actor once the client has been silent too long.
    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(self.settings.heartbeat_interval(), |act, ctx| {
            if act.last_heard.elapsed() > act.settings.client_timeout() {
                log::info!("Connection timed out");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<ConnectionEvent>(CONNECTION_QUEUE);

        self.send_command(ConnectionCommand::Connect { tx }, ctx);
        self.start_heartbeat(ctx);

        let addr = ctx.address();

        self.forwarder = Some(tokio::spawn(async move {
            log::debug!("connection green thread - started");
            while let Some(event) = rx.recv().await {
                if !addr.connected() {
                    break;
                }
                addr.do_send(ConnectionActorMessage(event));
            }
            // The server let go of this connection.
            if addr.connected() {
                addr.do_send(ConnectionActorMessage(ConnectionEvent::Disconnected));
            }
            log::debug!("connection green thread - terminated");
        }));
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        if let ConnectionState::Connected(from) = self.state {
            let srv_tx = self.srv_tx.clone();
            tokio::spawn(async move {
                if srv_tx
                    .send(ConnectionCommand::Disconnect { from })
                    .await
                    .is_err()
                {
                    log::warn!("Server gone, cannot report disconnect of {}", from);
                }
            });
        }
        self.state = ConnectionState::Closed;

        Running::Stop
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        // Dropping the receiver marks this connection closed on the server side.
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        self.last_heard = Instant::now();
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Pong(_)) => (),
            Ok(ws::Message::Binary(bin)) => {
                log::debug!("Ingress size: {}", bin.len());
                let message = match ClientMessage::decode(&bin) {
                    Ok(message) => message,
                    Err(err) => {
                        log::warn!("Closing connection ({:?}): {}", self.state, err);
                        self.close(
                            CloseReason {
                                code: CloseCode::Invalid,
                                description: None,
                            },
                            ctx,
                        );
                        return;
                    }
                };
                match self.state.accept(message) {
                    Ingress::Forward(command) => self.send_command(command, ctx),
                    Ingress::Held => log::debug!("Holding message until registered"),
                    Ingress::Overflow => {
                        log::warn!("Too many messages before registration, closing");
                        self.close(
                            CloseReason {
                                code: CloseCode::Policy,
                                description: Some("not registered yet".into()),
                            },
                            ctx,
                        );
                    }
                    Ingress::Dropped => {}
                }
            }
            Ok(ws::Message::Text(_)) | Ok(ws::Message::Continuation(_)) => {
                self.close(
                    CloseReason {
                        code: CloseCode::Unsupported,
                        description: Some("binary frames only".into()),
                    },
                    ctx,
                );
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Nop) => (),
            Err(err) => {
                log::warn!("WebSocket protocol error: {}", err);
                ctx.stop();
            }
        }
    }
}

/// Egress
impl Handler<ConnectionActorMessage> for ConnectionActor {
    type Result = ();

    fn handle(
        &mut self,
        msg: ConnectionActorMessage,
        ctx: &mut ws::WebsocketContext<Self>,
    ) -> Self::Result {
        match msg.0 {
            ConnectionEvent::Connected { connection_id } => {
                log::info!("Connected: {}", connection_id);
                for command in self.state.register(connection_id) {
                    self.send_command(command, ctx);
                }
            }
            ConnectionEvent::Disconnected => {
                log::info!("Dropped by the server ({:?})", self.state);
                self.state = ConnectionState::Closed;
                ctx.close(None);
                ctx.stop();
            }
            ConnectionEvent::ServerMessage(message) => match message.encode() {
                Ok(bytes) => ctx.binary(bytes),
                Err(err) => log::error!("Cannot encode {:?}: {}", message, err),
            },
        }
    }
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    srv_tx: web::Data<ServerTx>,
    settings: web::Data<Settings>,
) -> Result<HttpResponse, Error> {
    let max_frame_size = settings.max_frame_size;
    ws::WsResponseBuilder::new(
        ConnectionActor::new(srv_tx.get_ref().clone(), settings),
        &req,
        stream,
    )
    .frame_size(max_frame_size)
    .start()
}
