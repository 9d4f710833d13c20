//! Shared protocol core: wire codec, reliability/ack tracking, the salt
//! handshake, clock sync, the deterministic physics step, and the
//! transport/queue plumbing the server, client, and forwarder binaries
//! build on.

#![allow(clippy::too_many_arguments)]

pub mod addr;
pub mod clock;
pub mod config;
pub mod error;
pub mod handshake;
pub mod physics;
pub mod player;
pub mod queue;
pub mod reliability;
pub mod transport;
pub mod wire;
