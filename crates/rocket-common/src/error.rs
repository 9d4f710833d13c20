//! error.rs — typed error taxonomy for the reliable-datagram core.
//!
//! Converted from: myq2-original's untyped `com_error`/`com_printf` call sites;
//! re-expressed here as `thiserror` enums so each layer can match on failure mode
//! instead of parsing a printed string.

use thiserror::Error;

/// Failures from the socket transport layer (§4.2).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("socket io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not resolve address: {0}")]
    AddressResolution(String),
}

/// Failures decoding or encoding a wire packet (§4.1).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("datagram too short: need {need} bytes, have {have}")]
    TooShort { need: usize, have: usize },
    #[error("crc mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    CrcMismatch { expected: u32, computed: u32 },
    #[error("unknown packet kind: {0}")]
    UnknownKind(u8),
    #[error("cursor overrun while reading field")]
    CursorOverrun,
}

/// Authentication-stage failures (§4.3/§4.4): salt mismatch, address mismatch,
/// or a packet kind that is not valid for the peer's current connection state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("connection salt mismatch")]
    SaltMismatch,
    #[error("packet source address does not match the known peer")]
    AddressMismatch,
    #[error("packet kind not valid for current connection state")]
    UnexpectedKind,
}

/// Handshake and clock-sync protocol timeouts (§4.4/§4.5).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("handshake leg timed out waiting for a reply")]
    Timeout,
    #[error("challenge carried a different client_salt than ours")]
    ChallengeSaltMismatch,
    #[error("server denied the connection")]
    Denied,
    #[error("clock sync collected no samples")]
    NoClockSamples,
}
