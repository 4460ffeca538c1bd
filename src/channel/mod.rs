// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Deployment Notification Channel
//!
//! Real-time subscription to deployment progress for one room on a
//! Socket.IO server. The enclave hands out the server URL and room in its
//! encrypted result; see [`crate::crypto::DeploymentMetadata`].
//!
//! ## Lifecycle
//!
//! 1. `connect` tears down any previous connection and resets the status to
//!    [`DeploymentStatus::Idle`].
//! 2. The Engine.IO / Socket.IO handshake completes on the namespace named by
//!    the server URL path and a `join` event is emitted for the room.
//! 3. A background reader applies `deployment_update_client` and
//!    `deployment_complete_client` events to the shared status, publishes
//!    `deployment_error_client` as a failure and answers transport pings.
//!    Packets for other namespaces are ignored.
//! 4. `disconnect` (or dropping the channel) cancels the reader, which sends
//!    a close frame. There is no automatic reconnection.

pub mod protocol;
pub mod status;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CleanRoomError;

pub use protocol::{Endpoint, Frame};
pub use status::{DeploymentEvent, DeploymentStatus, EnclaveDetails, Pcrs};

/// Upper bound on the open/connect exchange.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Subscription to deployment progress for a single room.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Connect to `server_url` and join `room`, replacing any previous
    /// connection.
    async fn connect(&mut self, server_url: &str, room: &str) -> Result<(), CleanRoomError>;

    fn status(&self) -> DeploymentStatus;

    fn subscribe(&self) -> watch::Receiver<DeploymentStatus>;

    /// Failure reported by the deployment service for the joined room.
    /// Cleared on every `connect`.
    fn failures(&self) -> watch::Receiver<Option<String>>;

    fn disconnect(&mut self);
}

struct ActiveConnection {
    room: String,
    namespace: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Socket.IO implementation of [`NotificationChannel`].
pub struct DeploymentChannel {
    status: Arc<watch::Sender<DeploymentStatus>>,
    failure: Arc<watch::Sender<Option<String>>>,
    active: Option<ActiveConnection>,
}

impl DeploymentChannel {
    pub fn new() -> Self {
        Self {
            status: Arc::new(watch::Sender::new(DeploymentStatus::Idle)),
            failure: Arc::new(watch::Sender::new(None)),
            active: None,
        }
    }

    /// Room of the live connection, if any.
    pub fn room(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.room.as_str())
    }

    /// Socket.IO namespace of the live connection, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.namespace.as_str())
    }

    pub fn is_connected(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.task.is_finished())
    }
}

impl Default for DeploymentChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DeploymentChannel {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
    }
}

#[async_trait]
impl NotificationChannel for DeploymentChannel {
    async fn connect(&mut self, server_url: &str, room: &str) -> Result<(), CleanRoomError> {
        self.disconnect();
        self.status.send_replace(DeploymentStatus::Idle);
        self.failure.send_replace(None);

        let Endpoint { url, namespace } = protocol::endpoint(server_url)?;
        info!(url = %url, namespace = %namespace, room = %room, "Connecting to deployment channel");

        let (socket, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| CleanRoomError::Channel(format!("Failed to connect to {url}: {e}")))?;
        let (mut sink, mut stream) = socket.split();

        tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake(&mut sink, &mut stream, &namespace))
            .await
            .map_err(|_| CleanRoomError::Channel("Socket.IO handshake timed out".to_string()))??;

        let join = protocol::event(&namespace, "join", &[Value::String(room.to_string())]);
        send_text(&mut sink, join).await?;
        debug!(room = %room, namespace = %namespace, "Joined deployment room");

        let cancel = CancellationToken::new();
        let task = tokio::spawn(read_loop(
            sink,
            stream,
            Reader {
                status: Arc::clone(&self.status),
                failure: Arc::clone(&self.failure),
                namespace: namespace.clone(),
                room: room.to_string(),
            },
            cancel.clone(),
        ));

        self.active = Some(ActiveConnection {
            room: room.to_string(),
            namespace,
            cancel,
            task,
        });
        Ok(())
    }

    fn status(&self) -> DeploymentStatus {
        self.status.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<DeploymentStatus> {
        self.status.subscribe()
    }

    fn failures(&self) -> watch::Receiver<Option<String>> {
        self.failure.subscribe()
    }

    fn disconnect(&mut self) {
        if let Some(active) = self.active.take() {
            info!(room = %active.room, "Disconnecting from deployment channel");
            active.cancel.cancel();
        }
    }
}

async fn send_text<S>(sink: &mut S, packet: impl Into<String>) -> Result<(), CleanRoomError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    sink.send(Message::text(packet.into()))
        .await
        .map_err(|e| CleanRoomError::Channel(e.to_string()))
}

/// Wait for the Engine.IO open packet, request `namespace` and wait for its
/// acknowledgement.
async fn handshake<S, R>(sink: &mut S, stream: &mut R, namespace: &str) -> Result<(), CleanRoomError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    let mut opened = false;
    loop {
        let message = stream
            .next()
            .await
            .ok_or_else(|| CleanRoomError::Channel("Connection closed during handshake".to_string()))?
            .map_err(|e| CleanRoomError::Channel(e.to_string()))?;

        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => {
                return Err(CleanRoomError::Channel(
                    "Connection closed during handshake".to_string(),
                ))
            }
            _ => continue,
        };

        match protocol::parse(text.as_str()) {
            Frame::Open if !opened => {
                opened = true;
                send_text(sink, protocol::connect(namespace)).await?;
            }
            Frame::Ping => send_text(sink, protocol::PONG).await?,
            Frame::Connected { namespace: acked } if opened && acked == namespace => return Ok(()),
            Frame::ConnectError { namespace: rejected, message } if rejected == namespace => {
                return Err(CleanRoomError::Channel(message))
            }
            Frame::Close => {
                return Err(CleanRoomError::Channel(
                    "Server closed the session during handshake".to_string(),
                ))
            }
            other => debug!(frame = ?other, "Ignoring frame during handshake"),
        }
    }
}

/// What the background reader publishes to, and for which namespace/room.
struct Reader {
    status: Arc<watch::Sender<DeploymentStatus>>,
    failure: Arc<watch::Sender<Option<String>>>,
    namespace: String,
    room: String,
}

async fn read_loop<S, R>(mut sink: S, mut stream: R, reader: Reader, cancel: CancellationToken)
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    let room = reader.room.as_str();
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                debug!(room = %room, "Deployment channel closed");
                return;
            }
            message = stream.next() => message,
        };

        let text = match message {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => {
                info!(room = %room, "Deployment channel closed by server");
                return;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                warn!(room = %room, error = %e, "Deployment channel error");
                return;
            }
        };

        match protocol::parse(text.as_str()) {
            Frame::Ping => {
                if let Err(e) = send_text(&mut sink, protocol::PONG).await {
                    warn!(room = %room, error = %e, "Failed to answer ping");
                    return;
                }
            }
            Frame::Event { namespace, name, .. } if namespace != reader.namespace => {
                debug!(room = %room, namespace = %namespace, event = %name, "Ignoring event from another namespace")
            }
            Frame::Event { name, args, .. } => match DeploymentEvent::from_socket_event(&name, &args) {
                Ok(Some(event)) => reader.apply(&event),
                Ok(None) => debug!(room = %room, event = %name, "Ignoring unrelated event"),
                Err(e) => warn!(room = %room, event = %name, error = %e, "Malformed deployment event"),
            },
            Frame::Disconnected { namespace } if namespace != reader.namespace => {
                debug!(room = %room, namespace = %namespace, "Ignoring disconnect from another namespace")
            }
            Frame::Close | Frame::Disconnected { .. } => {
                info!(room = %room, "Deployment session ended by server");
                return;
            }
            other => debug!(room = %room, frame = ?other, "Ignoring frame"),
        }
    }
}

impl Reader {
    fn apply(&self, event: &DeploymentEvent) {
        let room = self.room.as_str();
        match event {
            DeploymentEvent::Joined(ack) => {
                info!(room = %room, ack = %ack, "Room join acknowledged");
                return;
            }
            DeploymentEvent::Failed(message) => {
                warn!(room = %room, error = %message, "Deployment failed");
                self.failure.send_replace(Some(message.clone()));
                return;
            }
            DeploymentEvent::Update(_) | DeploymentEvent::Complete(_) => {}
        }

        let changed = self.status.send_if_modified(|current| match current.apply(event) {
            Some(next) => {
                *current = next;
                true
            }
            None => false,
        });

        if changed {
            match &*self.status.borrow() {
                DeploymentStatus::Completed { enclave_details } => info!(
                    room = %room,
                    enclave = %enclave_details.name,
                    domain = %enclave_details.domain,
                    "Deployment completed"
                ),
                other => info!(room = %room, status = ?other, "Deployment status changed"),
            }
        }
    }
}
