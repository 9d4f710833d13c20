//! addr.rs — peer address value type.
//!
//! Converted from: myq2-common's qcommon.rs `NetAdr`/`NetAdrType`, which
//! wrapped an IP/port pair with a transport-kind tag (loopback/IP/IPX).
//! This protocol is UDP/IP only, so the type collapses to a thin, `Copy`
//! wrapper over `std::net::SocketAddr` that the rest of the crate can use
//! as a map key and log field without importing `std::net` everywhere.

use std::fmt;
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerAddr(pub SocketAddr);

impl From<SocketAddr> for PeerAddr {
    fn from(addr: SocketAddr) -> Self {
        PeerAddr(addr)
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
