// TCP order ingress
//
// Accepts client connections, reassembles fixed-size order frames from
// the byte stream, decodes them, and hands the resulting commands to the
// matcher over the SPSC ring. Everything here is non-blocking; the ring
// is the only coupling to the matcher thread. When the ring is full the
// frame is dropped and counted rather than blocking the socket loop.

use common::net::tcp::{TcpListener, TcpSocket};
use common::logging::Logger;
use common::spsc::SpscQueue;
use common::time::{nanos_since, now_nanos};
use common::{log_info, log_warn};
use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use crate::protocol::{OrderCommand, OrderFrame, ORDER_FRAME_SIZE};
use crate::telemetry::IngressTelemetry;

/// Default port for order ingress.
pub const DEFAULT_ORDER_PORT: u16 = 8080;

/// Ring capacity between ingress and matcher.
pub const ORDER_RING_CAPACITY: usize = 65536;

/// The SPSC ring carrying decoded commands to the matcher.
pub type OrderRing = SpscQueue<OrderCommand, ORDER_RING_CAPACITY>;

/// Per-connection buffer headroom: whole frames are consumed eagerly so
/// at most one partial frame accumulates, but bursts land in chunks.
const RECV_BUFFER_SIZE: usize = ORDER_FRAME_SIZE * 256;

/// Configuration for the order server.
#[derive(Debug, Clone)]
pub struct OrderServerConfig {
    /// IP address to listen on.
    pub listen_addr: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for OrderServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            port: DEFAULT_ORDER_PORT,
        }
    }
}

impl OrderServerConfig {
    pub fn new(listen_addr: &str, port: u16) -> Self {
        Self {
            listen_addr: listen_addr.to_string(),
            port,
        }
    }
}

/// A connected client and its frame-reassembly buffer.
struct ClientConnection {
    socket: TcpSocket,
    recv_buffer: Vec<u8>,
}

impl ClientConnection {
    fn new(socket: TcpSocket) -> Self {
        Self {
            socket,
            recv_buffer: Vec::with_capacity(RECV_BUFFER_SIZE),
        }
    }

    /// Pulls available bytes off the socket and feeds every complete
    /// frame into the ring. Returns the number of commands enqueued, or
    /// an error when the connection is gone.
    fn receive(&mut self, ring: &OrderRing, telemetry: &IngressTelemetry) -> io::Result<usize> {
        match self.socket.try_recv() {
            Ok(Some(data)) => {
                if data.is_empty() {
                    // Peer closed the connection
                    return Err(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        "client disconnected",
                    ));
                }
                self.recv_buffer.extend_from_slice(data);
            }
            Ok(None) => {}
            Err(e) => return Err(e),
        }

        let mut enqueued = 0;
        let mut offset = 0;
        while self.recv_buffer.len() - offset >= ORDER_FRAME_SIZE {
            let start = now_nanos();
            let frame_bytes = &self.recv_buffer[offset..offset + ORDER_FRAME_SIZE];
            offset += ORDER_FRAME_SIZE;

            // from_bytes cannot fail on an exact-size slice
            let Some(cmd) = OrderFrame::from_bytes(frame_bytes).and_then(OrderFrame::decode)
            else {
                telemetry.record_reject();
                continue;
            };

            if ring.push(cmd).is_err() {
                // Matcher is behind; shed load instead of blocking
                telemetry.record_drop();
                continue;
            }
            enqueued += 1;
            telemetry.record_message(nanos_since(start));
        }
        self.recv_buffer.drain(..offset);

        Ok(enqueued)
    }
}

/// The TCP gateway feeding the matcher.
///
/// Owns the listener and all client connections; `poll` is driven from
/// the ingress thread's event loop and never blocks.
pub struct OrderServer {
    listener: TcpListener,
    clients: HashMap<u32, ClientConnection>,
    next_client_id: u32,
    ring: Arc<OrderRing>,
    telemetry: Arc<IngressTelemetry>,
    logger: Arc<Logger>,
    config: OrderServerConfig,
}

impl OrderServer {
    /// Binds the listener and prepares to accept connections.
    pub fn new(
        config: OrderServerConfig,
        ring: Arc<OrderRing>,
        telemetry: Arc<IngressTelemetry>,
        logger: Arc<Logger>,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr, config.port)?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            listener,
            clients: HashMap::new(),
            next_client_id: 1,
            ring,
            telemetry,
            logger,
            config,
        })
    }

    /// One event-loop turn: accept pending connections, then drain every
    /// client socket into the ring. Returns the number of commands
    /// enqueued this turn.
    pub fn poll(&mut self) -> usize {
        self.accept_connections();

        let mut enqueued = 0;
        let mut disconnected = Vec::new();

        for (&client_id, connection) in self.clients.iter_mut() {
            match connection.receive(&self.ring, &self.telemetry) {
                Ok(n) => enqueued += n,
                Err(_) => disconnected.push(client_id),
            }
        }

        for client_id in disconnected {
            self.clients.remove(&client_id);
            log_info!(self.logger, "client disconnected", client_id as u64);
        }

        enqueued
    }

    fn accept_connections(&mut self) {
        loop {
            match self.listener.accept() {
                Ok(socket) => {
                    if socket.set_nonblocking(true).is_err() {
                        log_warn!(self.logger, "failed to set client nonblocking");
                        continue;
                    }
                    let client_id = self.next_client_id;
                    self.next_client_id += 1;
                    self.clients.insert(client_id, ClientConnection::new(socket));
                    log_info!(self.logger, "client connected", client_id as u64);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(_) => break,
            }
        }
    }

    /// Number of connected clients.
    #[inline]
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Drops all client connections (shutdown path).
    pub fn disconnect_all(&mut self) {
        self.clients.clear();
    }

    #[inline]
    pub fn config(&self) -> &OrderServerConfig {
        &self.config
    }

    /// The port actually bound; differs from the config when it asked
    /// for port 0.
    pub fn local_port(&self) -> io::Result<u16> {
        Ok(self.listener.local_addr()?.port())
    }
}
