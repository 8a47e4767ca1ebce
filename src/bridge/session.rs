//! Per-connection upstream session.
//!
//! # Responsibilities
//! - Keep the command socket of one connection open, reconnecting when it drops
//! - Tag every command with the connection index and queue it in read order
//! - Offer queued commands one at a time on the shared handoff
//! - Write routed answers to whichever socket is current
//!
//! A command's pickup deadline counts from when it was read, so commands that
//! expire while queued are dropped without being offered. A lost socket is
//! redialed at once; backoff only applies to failed dials.
//!
//! # State machine
//! ```text
//! Connecting ──dial ok──▶ Listening ──command queued──▶ AwaitingPickup
//!     ▲                      │  ▲                            │
//!     └──socket lost─────────┘  └──claimed or expired────────┘
//!
//! any state ──shutdown──▶ Draining (close frame sent, tasks stopped)
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;

use crate::bridge::correlation::{CorrelatedMessage, Envelope};
use crate::bridge::handoff::{CommandHandoff, PickupPolicy};
use crate::observability::metrics;
use crate::upstream::{ServerConnection, SocketStream};

type SharedSink = Arc<Mutex<Option<SplitSink<SocketStream, Message>>>>;

/// A command waiting for delivery. Its pickup deadline runs from `received`.
struct QueuedCommand {
    received: Instant,
    message: CorrelatedMessage,
}

/// Session state enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Connecting = 0,
    Listening = 1,
    AwaitingPickup = 2,
    Draining = 3,
}

impl From<u8> for SessionState {
    fn from(val: u8) -> Self {
        match val {
            1 => SessionState::Listening,
            2 => SessionState::AwaitingPickup,
            3 => SessionState::Draining,
            _ => SessionState::Connecting,
        }
    }
}

/// Shared view of a session's state.
#[derive(Debug, Clone)]
pub struct SessionStateCell {
    connection: usize,
    state: Arc<AtomicU8>,
}

impl SessionStateCell {
    pub fn new(connection: usize) -> Self {
        Self {
            connection,
            state: Arc::new(AtomicU8::new(SessionState::Connecting as u8)),
        }
    }

    pub fn get(&self) -> SessionState {
        SessionState::from(self.state.load(Ordering::Acquire))
    }

    fn set(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Release);
        metrics::record_session_state(self.connection, state as u8);
    }

    /// Move to `to` only if the session is currently in `from`.
    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        let moved = self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if moved {
            metrics::record_session_state(self.connection, to as u8);
        }
        moved
    }
}

/// Everything one connection's session needs.
pub struct UpstreamSession {
    index: usize,
    connection: ServerConnection,
    handoff: Arc<CommandHandoff>,
    outbound: mpsc::UnboundedReceiver<String>,
    pickup: PickupPolicy,
    state: SessionStateCell,
}

impl UpstreamSession {
    pub fn new(
        index: usize,
        connection: ServerConnection,
        handoff: Arc<CommandHandoff>,
        outbound: mpsc::UnboundedReceiver<String>,
        pickup: PickupPolicy,
    ) -> Self {
        Self {
            index,
            connection,
            handoff,
            outbound,
            pickup,
            state: SessionStateCell::new(index),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> SessionStateCell {
        self.state.clone()
    }

    /// Run until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let Self {
            index,
            connection,
            handoff,
            outbound,
            pickup,
            state,
        } = self;

        let sink: SharedSink = Arc::new(Mutex::new(None));
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_answers(index, outbound, sink.clone()));
        let delivery = tokio::spawn(deliver_commands(
            index,
            commands_rx,
            handoff,
            pickup,
            state.clone(),
        ));

        loop {
            state.set(SessionState::Connecting);
            let stream = tokio::select! {
                stream = connection.open_socket(index) => stream,
                _ = shutdown.recv() => break,
            };

            let (write, mut read) = stream.split();
            *sink.lock().await = Some(write);
            state.set(SessionState::Listening);

            let shutting_down = loop {
                tokio::select! {
                    frame = read.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            accept_command(index, text.as_str().as_bytes(), &commands_tx)
                        }
                        Some(Ok(Message::Binary(bytes))) => accept_command(index, &bytes[..], &commands_tx),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(connection = index, error = %e, "Upstream socket read failed");
                            break false;
                        }
                        None => {
                            tracing::warn!(connection = index, "Upstream socket closed by server");
                            break false;
                        }
                    },
                    _ = shutdown.recv() => break true,
                }
            };

            let write = sink.lock().await.take();
            if shutting_down {
                state.set(SessionState::Draining);
                if let Some(mut write) = write {
                    if let Err(e) = write.close().await {
                        tracing::debug!(connection = index, error = %e, "Closing upstream socket failed");
                    }
                }
                break;
            }
        }

        state.set(SessionState::Draining);
        writer.abort();
        delivery.abort();
        tracing::info!(connection = index, location = %connection.location(), "Upstream session stopped");
    }
}

fn accept_command(index: usize, bytes: &[u8], commands: &mpsc::UnboundedSender<QueuedCommand>) {
    match Envelope::decode(bytes) {
        Ok(envelope) => {
            let message = CorrelatedMessage::inbound(index, envelope);
            tracing::debug!(connection = index, id = %message.id, kind = %message.envelope.kind, "Received upstream command");
            let _ = commands.send(QueuedCommand {
                received: Instant::now(),
                message,
            });
        }
        Err(e) => {
            tracing::warn!(connection = index, error = %e, "Skipping malformed upstream frame");
        }
    }
}

async fn deliver_commands(
    index: usize,
    mut commands: mpsc::UnboundedReceiver<QueuedCommand>,
    handoff: Arc<CommandHandoff>,
    pickup: PickupPolicy,
    state: SessionStateCell,
) {
    let mut picked_up = false;
    while let Some(QueuedCommand { received, message }) = commands.recv().await {
        let deadline = pickup.deadline(picked_up);
        let remaining = deadline.saturating_sub(received.elapsed());
        if remaining.is_zero() {
            picked_up = false;
            metrics::record_offer_expired(index);
            tracing::warn!(
                connection = index,
                id = %message.id,
                waited = ?received.elapsed(),
                "Command expired while queued, dropping it"
            );
            continue;
        }

        let frame = match message.to_collector_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(connection = index, id = %message.id, error = %e, "Unable to encode command");
                continue;
            }
        };

        state.transition(SessionState::Listening, SessionState::AwaitingPickup);
        if handoff.offer(frame, remaining).await {
            picked_up = true;
            metrics::record_command_relayed(index);
            tracing::debug!(connection = index, id = %message.id, "Command picked up by collector");
        } else {
            picked_up = false;
            metrics::record_offer_expired(index);
            tracing::warn!(
                connection = index,
                id = %message.id,
                deadline = ?deadline,
                "Command not picked up by collector, dropping it"
            );
        }
        state.transition(SessionState::AwaitingPickup, SessionState::Listening);
    }
}

async fn write_answers(index: usize, mut outbound: mpsc::UnboundedReceiver<String>, sink: SharedSink) {
    while let Some(frame) = outbound.recv().await {
        let mut guard = sink.lock().await;
        let Some(write) = guard.as_mut() else {
            metrics::record_answer_dropped("no_socket");
            tracing::warn!(connection = index, "No upstream socket, dropping answer");
            continue;
        };
        if let Err(e) = write.send(Message::Text(frame.into())).await {
            metrics::record_answer_dropped("write_failed");
            tracing::warn!(connection = index, error = %e, "Unable to write answer to upstream socket");
        }
    }
}
