//! transport.rs — non-blocking UDP socket capability, abstracted behind a
//! trait so tests can swap in an in-memory transport (§4.2, §9).
//!
//! Converted from: myq2-sys's net_udp.rs, which builds a non-blocking UDP
//! socket with `socket2::{Socket, Domain, Type, Protocol}`. The global
//! `OnceLock<Mutex<NetState>>` singleton that file wraps the socket in is
//! deliberately not carried forward — each `UdpTransport` here owns its
//! socket directly, since nothing in this protocol needs process-wide
//! shared network state.

use std::collections::VecDeque;
use std::net::{SocketAddr, UdpSocket as StdUdpSocket};
use std::sync::Mutex;

use socket2::{Domain, Protocol, Socket, Type};

use crate::error::TransportError;

/// What the reliability/handshake layers need from a datagram socket.
/// Implemented by `UdpTransport` for real traffic and by `MemoryTransport`
/// for deterministic tests.
pub trait DatagramTransport {
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<(), TransportError>;

    /// Non-blocking receive. `Ok(None)` means no datagram was waiting.
    fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, TransportError>;

    fn local_addr(&self) -> Result<SocketAddr, TransportError>;
}

/// Real non-blocking UDP socket, bound once at construction.
pub struct UdpTransport {
    socket: StdUdpSocket,
}

impl UdpTransport {
    pub fn bind(addr: SocketAddr) -> Result<Self, TransportError> {
        let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        tracing::debug!(%addr, "bound non-blocking udp socket");
        Ok(Self { socket: socket.into() })
    }
}

impl DatagramTransport for UdpTransport {
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<(), TransportError> {
        self.socket.send_to(buf, target)?;
        Ok(())
    }

    fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, TransportError> {
        match self.socket.recv_from(buf) {
            Ok((n, from)) => Ok(Some((n, from))),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }
}

/// In-memory transport for unit/integration tests: datagrams sent to it are
/// queued and read back by `recv_from`, with no real socket involved.
pub struct MemoryTransport {
    local: SocketAddr,
    inbox: Mutex<VecDeque<(Vec<u8>, SocketAddr)>>,
    outbox: Mutex<VecDeque<(Vec<u8>, SocketAddr)>>,
}

impl MemoryTransport {
    pub fn new(local: SocketAddr) -> Self {
        Self {
            local,
            inbox: Mutex::new(VecDeque::new()),
            outbox: Mutex::new(VecDeque::new()),
        }
    }

    /// Test hook: inject a datagram as if it arrived from `from`.
    pub fn inject(&self, data: Vec<u8>, from: SocketAddr) {
        self.inbox.lock().unwrap().push_back((data, from));
    }

    /// Test hook: drain everything sent through this transport so far.
    pub fn sent(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        self.outbox.lock().unwrap().drain(..).collect()
    }
}

impl DatagramTransport for MemoryTransport {
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<(), TransportError> {
        self.outbox.lock().unwrap().push_back((buf.to_vec(), target));
        Ok(())
    }

    fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, TransportError> {
        let mut inbox = self.inbox.lock().unwrap();
        match inbox.pop_front() {
            Some((data, from)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(Some((n, from)))
            }
            None => Ok(None),
        }
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.local)
    }
}
