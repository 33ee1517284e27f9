//! TCP socket wrappers for the order ingress path.
//!
//! Thin layer over socket2 for fine-grained control over the listening
//! and accepted sockets, with a pre-allocated receive buffer to avoid
//! per-read allocations.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::mem::MaybeUninit;
use std::net::{SocketAddr, ToSocketAddrs};

/// Receive buffer size (64KB).
const BUFFER_SIZE: usize = 65536;

/// A connected TCP socket with a pre-allocated receive buffer.
pub struct TcpSocket {
    socket: Socket,
    recv_buffer: Box<[MaybeUninit<u8>; BUFFER_SIZE]>,
}

impl TcpSocket {
    fn from_socket(socket: Socket) -> Self {
        Self {
            socket,
            // SAFETY: MaybeUninit doesn't require initialization
            recv_buffer: Box::new(unsafe {
                MaybeUninit::<[MaybeUninit<u8>; BUFFER_SIZE]>::uninit().assume_init()
            }),
        }
    }

    /// Connects to a remote address with TCP_NODELAY set.
    pub fn connect(addr: &str, port: u16) -> io::Result<Self> {
        let socket_addr = resolve(addr, port)?;
        let domain = if socket_addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_nodelay(true)?;
        socket.connect(&socket_addr.into())?;

        Ok(Self::from_socket(socket))
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        self.socket.set_nonblocking(nonblocking)
    }

    /// Sends raw bytes, returning the number of bytes written.
    pub fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        self.socket.send(data)
    }

    /// Receives into the internal buffer (blocking), returning the
    /// received bytes.
    pub fn recv(&mut self) -> io::Result<&[u8]> {
        let n = self.socket.recv(&mut self.recv_buffer[..])?;
        // SAFETY: recv() guarantees the first n bytes are initialized
        Ok(unsafe { std::slice::from_raw_parts(self.recv_buffer.as_ptr() as *const u8, n) })
    }

    /// Attempts to receive without blocking.
    ///
    /// Returns `Ok(None)` when no data is available. A zero-length slice
    /// means the peer closed the connection.
    pub fn try_recv(&mut self) -> io::Result<Option<&[u8]>> {
        match self.socket.recv(&mut self.recv_buffer[..]) {
            // SAFETY: recv() guarantees the first n bytes are initialized
            Ok(n) => Ok(Some(unsafe {
                std::slice::from_raw_parts(self.recv_buffer.as_ptr() as *const u8, n)
            })),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// A TCP listener that accepts ingress connections.
pub struct TcpListener {
    listener: Socket,
}

impl TcpListener {
    /// Binds to the given address and starts listening.
    pub fn bind(addr: &str, port: u16) -> io::Result<Self> {
        let socket_addr = resolve(addr, port)?;
        let domain = if socket_addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let listener = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

        // SO_REUSEADDR for quick rebinding after restart
        listener.set_reuse_address(true)?;
        listener.bind(&socket_addr.into())?;
        listener.listen(128)?;

        Ok(Self { listener })
    }

    /// Accepts an incoming connection with TCP_NODELAY set.
    pub fn accept(&self) -> io::Result<TcpSocket> {
        let (socket, _addr) = self.listener.accept()?;
        socket.set_nodelay(true)?;
        Ok(TcpSocket::from_socket(socket))
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        self.listener.set_nonblocking(nonblocking)
    }

    /// The locally bound address; useful when binding port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener
            .local_addr()?
            .as_socket()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "non-inet local address"))
    }
}

fn resolve(addr: &str, port: u16) -> io::Result<SocketAddr> {
    let address = format!("{}:{}", addr, port);
    address
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_bind() {
        // Port 0 lets the OS assign an available port
        let listener = TcpListener::bind("127.0.0.1", 0).unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[test]
    fn test_listener_nonblocking_accept() {
        let listener = TcpListener::bind("127.0.0.1", 0).unwrap();
        listener.set_nonblocking(true).unwrap();
        // No pending connection: accept must not block
        match listener.accept() {
            Err(e) => assert_eq!(e.kind(), io::ErrorKind::WouldBlock),
            Ok(_) => panic!("unexpected connection"),
        }
    }

    #[test]
    fn test_invalid_address_rejected() {
        assert!(TcpListener::bind("not an address", 0).is_err());
    }
}
