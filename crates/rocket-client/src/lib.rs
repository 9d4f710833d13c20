//! Client: a network thread that owns the socket and handshake/clock state,
//! and a prediction session that a frame loop drives with local input and
//! reconciles against authoritative snapshots (§4.4, §4.5, §4.8, §9).

pub mod network;
pub mod session;
