//! player.rs — shared simulation types: per-player state, connection
//! lifecycle, and the authoritative snapshot exchanged between server and
//! client (§3, §4.1, §4.8).
//!
//! Converted from: original_source's RocketServer/GamePacket.h player fields
//! (position/velocity/rotation/speed/keyboard), flattened into one struct
//! shared verbatim by wire encoding, physics, and prediction.

use crate::wire::Keyboard;

/// One player's simulated state, identical on server and client so the same
/// `physics::step` function can advance either copy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerState {
    pub player_id: u8,
    pub pos: (f32, f32),
    pub vel: (f32, f32),
    pub speed: f32,
    pub rotation: f32,
    pub health: u8,
    pub keyboard: Keyboard,
    /// Seconds since the previous simulated step; not transmitted, filled in
    /// by whichever side is about to advance this state.
    pub delta_time: f32,
}

impl PlayerState {
    pub fn spawn(player_id: u8, pos: (f32, f32)) -> Self {
        Self {
            player_id,
            pos,
            vel: (0.0, 0.0),
            speed: 0.0,
            rotation: 0.0,
            health: 100,
            keyboard: Keyboard::empty(),
            delta_time: 0.0,
        }
    }
}

/// Connection lifecycle a peer (as seen by the server) or a session (as seen
/// by the client) moves through; see §4.3/§4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    AwaitingChallengeResponse,
    Connected,
    Disconnected,
}

/// Server-side bookkeeping for one connected peer: identity, salts, and the
/// reliability/timing state layered on top of the raw socket.
#[derive(Debug, Clone)]
pub struct Player {
    pub player_id: u8,
    pub connection_salt: u64,
    pub state: ConnectionState,
    pub game_state: PlayerState,
    pub last_packet_recv_ms: i64,
}

impl Player {
    pub fn new(player_id: u8, connection_salt: u64, spawn_pos: (f32, f32)) -> Self {
        Self {
            player_id,
            connection_salt,
            state: ConnectionState::AwaitingChallengeResponse,
            game_state: PlayerState::spawn(player_id, spawn_pos),
            last_packet_recv_ms: 0,
        }
    }
}
