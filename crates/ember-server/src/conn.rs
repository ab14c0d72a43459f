use std::{
    io::{self, Read, Write},
    net::SocketAddr,
};

use ember_resp::{Command, Decoder};
use mio::{Interest, Registry, Token, net::TcpStream};
use tracing::{debug, warn};

/// Bytes pulled off the socket per read call.
const RECV_CHUNK: usize = 4 * 1024;

/// Outcome of servicing a connection.
///
/// `Alive` means the connection is still usable. `Disconnected` means the
/// peer is gone or unrecoverable and the caller must drop the state.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ConnState {
    Alive,
    Disconnected,
}

/// Per-connection state owned by the reactor: the stream, an incremental
/// request decoder, and the outbound reply queue.
///
/// Replies are written eagerly; whatever the kernel refuses stays queued and
/// WRITABLE interest is armed until the queue drains. Invariant:
/// `writable_armed == !outbound.is_empty()` between events.
pub(crate) struct Connection {
    stream: TcpStream,
    token: Token,
    peer_addr: SocketAddr,
    decoder: Decoder,
    outbound: Vec<u8>,
    writable_armed: bool,
}

impl Connection {
    pub(crate) fn new(stream: TcpStream, token: Token, peer_addr: SocketAddr) -> Self {
        Self {
            stream,
            token,
            peer_addr,
            decoder: Decoder::new(),
            outbound: Vec::new(),
            writable_armed: false,
        }
    }

    #[inline]
    pub(crate) fn token(&self) -> Token {
        self.token
    }

    #[inline]
    pub(crate) fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    #[inline]
    pub(crate) fn pending_bytes(&self) -> usize {
        self.outbound.len()
    }

    /// Reads until the socket would block, feeding the decoder and invoking
    /// `on_command` with every completed command and the outbound buffer to
    /// reply into. EOF and protocol faults disconnect.
    pub(crate) fn read_ready<F>(&mut self, on_command: &mut F) -> ConnState
    where
        F: FnMut(Command, &mut Vec<u8>),
    {
        let mut chunk = [0u8; RECV_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    debug!(peer = %self.peer_addr, "peer closed");
                    return ConnState::Disconnected;
                }
                Ok(n) => match self.decoder.feed(&chunk[..n]) {
                    Ok(commands) => {
                        for command in commands {
                            on_command(command, &mut self.outbound);
                        }
                    }
                    Err(err) => {
                        warn!(peer = %self.peer_addr, %err, "protocol error, disconnecting");
                        return ConnState::Disconnected;
                    }
                },
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return ConnState::Alive,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    debug!(peer = %self.peer_addr, %err, "read failed");
                    return ConnState::Disconnected;
                }
            }
        }
    }

    /// Writes queued bytes until drained or the kernel blocks, then arms or
    /// drops WRITABLE interest to match what is left.
    pub(crate) fn flush(&mut self, registry: &Registry) -> ConnState {
        while !self.outbound.is_empty() {
            match self.stream.write(&self.outbound) {
                Ok(0) => return ConnState::Disconnected,
                Ok(n) => {
                    self.outbound.drain(..n);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    debug!(peer = %self.peer_addr, %err, "write failed");
                    return ConnState::Disconnected;
                }
            }
        }

        if self.outbound.is_empty() {
            self.disarm_writable(registry)
        } else {
            self.arm_writable(registry)
        }
    }

    pub(crate) fn close(&mut self, registry: &Registry) {
        debug!(peer = %self.peer_addr, "closing connection");
        let _ = registry.deregister(&mut self.stream);
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }

    fn arm_writable(&mut self, registry: &Registry) -> ConnState {
        if !self.writable_armed {
            if let Err(err) = registry.reregister(
                &mut self.stream,
                self.token,
                Interest::READABLE | Interest::WRITABLE,
            ) {
                debug!(peer = %self.peer_addr, %err, "reregister for writable");
                return ConnState::Disconnected;
            }
            self.writable_armed = true;
        }
        ConnState::Alive
    }

    fn disarm_writable(&mut self, registry: &Registry) -> ConnState {
        if self.writable_armed {
            if let Err(err) = registry.reregister(&mut self.stream, self.token, Interest::READABLE)
            {
                debug!(peer = %self.peer_addr, %err, "reregister drop writable");
                return ConnState::Disconnected;
            }
            self.writable_armed = false;
        }
        ConnState::Alive
    }
}
