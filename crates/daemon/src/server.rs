// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC fan-out server.
//!
//! Listens on loopback TCP and serves any number of observer clients. Each
//! client gets a reader task (inbound command lines onto a shared channel)
//! and a writer task fed by a bounded per-client queue. New clients receive
//! `hello` then `snapshot` before any live event; each client observes
//! events in the order the server produced them.
//!
//! Slow-consumer policy: a client whose queue is full, or whose socket
//! write cannot complete within [`WRITE_TIMEOUT`], is disconnected and its
//! backlog discarded. Fast clients are never stalled by slow ones.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use fuel_core::{BoardSnapshot, Event};

use crate::protocol::{self, Command, ProtocolError, PROTOCOL_VERSION};

/// Outbound records queued per client before the slow-consumer policy
/// applies.
pub const CLIENT_QUEUE_CAPACITY: usize = 256;

/// Longest a single client socket write may take.
pub const WRITE_TIMEOUT: Duration = Duration::from_millis(100);

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("port {0} is already in use (is another consume daemon running?)")]
    PortInUse(u16),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Identifies one connected client for the lifetime of its connection.
pub type ClientId = u64;

/// Inbound traffic and connection lifecycle notices from client tasks.
#[derive(Debug)]
pub enum Inbound {
    Command { client: ClientId, command: Command },
    /// An unparseable line; the sender is dropped per protocol policy
    Malformed { client: ClientId, error: String },
    Disconnected { client: ClientId },
}

struct Client {
    id: ClientId,
    queue: mpsc::Sender<String>,
}

/// Loopback TCP listener with per-client fan-out.
pub struct IpcServer {
    listener: TcpListener,
    port: u16,
    instance_id: String,
    clients: Vec<Client>,
    next_client: ClientId,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
}

impl IpcServer {
    /// Bind `127.0.0.1:<port>`. A port already in use is the dedicated
    /// [`ServerError::PortInUse`] (the daemon treats it as "already
    /// running").
    pub async fn start(
        port: u16,
        instance_id: String,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Inbound>), ServerError> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AddrInUse => ServerError::PortInUse(port),
                _ => ServerError::Io(e),
            })?;
        let bound_port = listener.local_addr()?.port();
        info!(port = bound_port, "IPC server listening on loopback");

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Ok((
            Self {
                listener,
                port: bound_port,
                instance_id,
                clients: Vec::new(),
                next_client: 1,
                inbound_tx,
            },
            inbound_rx,
        ))
    }

    /// The bound port (useful when configured as 0 in tests).
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Await the next pending connection. Suitable as a `select!` arm.
    pub async fn accept(&self) -> std::io::Result<TcpStream> {
        let (stream, addr) = self.listener.accept().await?;
        debug!(%addr, "client connected");
        Ok(stream)
    }

    /// Admit a connection: spawn its reader/writer tasks and enqueue the
    /// `hello` + `snapshot` handshake ahead of any live event.
    pub fn admit(
        &mut self,
        stream: TcpStream,
        snapshot: BoardSnapshot,
    ) -> Result<ClientId, ServerError> {
        let id = self.next_client;
        self.next_client += 1;

        let hello = protocol::encode_event(
            &Event::Hello {
                version: PROTOCOL_VERSION.to_string(),
            },
            &self.instance_id,
        )?;
        let snapshot = protocol::encode_event(&Event::Snapshot { snapshot }, &self.instance_id)?;

        let (read_half, write_half) = stream.into_split();
        let (queue_tx, queue_rx) = mpsc::channel(CLIENT_QUEUE_CAPACITY);

        // Handshake goes into the queue before the client is visible to
        // broadcast, so its first two records are hello then snapshot.
        for line in [hello, snapshot] {
            if queue_tx.try_send(line).is_err() {
                return Err(ServerError::Io(std::io::Error::other(
                    "client queue rejected handshake",
                )));
            }
        }

        tokio::spawn(write_loop(id, write_half, queue_rx));
        tokio::spawn(read_loop(id, read_half, self.inbound_tx.clone()));

        self.clients.push(Client { id, queue: queue_tx });
        info!(client = id, clients = self.clients.len(), "client admitted");
        Ok(id)
    }

    /// Send an event to every connected client. Clients whose queue is
    /// full are disconnected (slow-consumer policy).
    pub fn broadcast(&mut self, event: &Event) -> Result<(), ProtocolError> {
        let line = protocol::encode_event(event, &self.instance_id)?;
        self.clients.retain(|client| {
            match client.queue.try_send(line.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(client = client.id, "dropping slow client");
                    false
                }
                // Writer task ended (socket error or timeout)
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(client = client.id, "dropping disconnected client");
                    false
                }
            }
        });
        Ok(())
    }

    /// Send an event to a single client (command responses).
    pub fn send_to(&mut self, id: ClientId, event: &Event) -> Result<(), ProtocolError> {
        let line = protocol::encode_event(event, &self.instance_id)?;
        if let Some(client) = self.clients.iter().find(|c| c.id == id) {
            if client.queue.try_send(line).is_err() {
                self.disconnect(id);
            }
        }
        Ok(())
    }

    /// Drop a client and discard its backlog.
    pub fn disconnect(&mut self, id: ClientId) {
        self.clients.retain(|c| c.id != id);
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Drop every client. Writer tasks end as their queues close.
    pub fn stop(&mut self) {
        self.clients.clear();
    }
}

/// Drain the client's queue into its socket. Ends on write error or
/// timeout (slow consumer) or when the server drops the queue sender.
async fn write_loop(id: ClientId, mut writer: OwnedWriteHalf, mut queue: mpsc::Receiver<String>) {
    while let Some(line) = queue.recv().await {
        match tokio::time::timeout(WRITE_TIMEOUT, writer.write_all(line.as_bytes())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(client = id, error = %e, "client write failed");
                break;
            }
            Err(_) => {
                warn!(client = id, "client write timed out, disconnecting");
                break;
            }
        }
    }
}

/// Parse inbound lines into commands. A malformed line or EOF ends the
/// connection; the daemon hears about both.
async fn read_loop(
    id: ClientId,
    read_half: tokio::net::tcp::OwnedReadHalf,
    inbound: mpsc::UnboundedSender<Inbound>,
) {
    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match protocol::decode_command(&line) {
                    Ok(command) => {
                        if inbound.send(Inbound::Command { client: id, command }).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = inbound.send(Inbound::Malformed {
                            client: id,
                            error: e.to_string(),
                        });
                        return;
                    }
                }
            }
            Ok(None) | Err(_) => {
                let _ = inbound.send(Inbound::Disconnected { client: id });
                return;
            }
        }
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
