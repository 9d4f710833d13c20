//! dispatcher.rs — the server's single-threaded event loop: receive, decode,
//! route by connection state, reply per inbound packet, evict idle peers
//! (§4.3, §4.4, §4.6, §4.9).
//!
//! The server owns no independent tick clock: each `InputFrame` drives one
//! authoritative physics step for its sender and an immediate `GameState`
//! reply to that sender alone, so a peer's simulation rate tracks its own
//! send rate rather than a server-wide frame timer.
//!
//! Converted from: myq2-server's `sv_drop_client` (peer eviction) and
//! myq2-sys's non-blocking recv loop shape — but single-threaded end to
//! end, since this protocol needs no worker pool the way a full Quake2
//! server's game DLL does.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rocket_common::addr::PeerAddr;
use rocket_common::config::{DISCONNECT_RESEND_COUNT, IDLE_SHUTDOWN_TICKS, IDLE_TICK_SECS, MAX_PLAYERS};
use rocket_common::handshake::ServerHandshake;
use rocket_common::physics;
use rocket_common::player::{ConnectionState, Player};
use rocket_common::reliability::ReliabilityState;
use rocket_common::transport::DatagramTransport;
use rocket_common::wire::Packet;

const MAX_DATAGRAM_SIZE: usize = 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(10);
const EVICT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

struct PendingHandshake {
    client_salt: u64,
    server_salt: u64,
}

struct ConnectedPeer {
    player: Player,
    reliability: ReliabilityState,
    last_remote_seq: u16,
    last_ack_bits: u32,
}

/// Owns every piece of mutable server state; `run` drives it to completion.
pub struct Server<T: DatagramTransport> {
    transport: T,
    pending: HashMap<PeerAddr, PendingHandshake>,
    peers: HashMap<PeerAddr, ConnectedPeer>,
    idle_elapsed: Duration,
    idle_ticks: u32,
    last_evict_check: Instant,
}

impl<T: DatagramTransport> Server<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            pending: HashMap::new(),
            peers: HashMap::new(),
            idle_elapsed: Duration::ZERO,
            idle_ticks: 0,
            last_evict_check: Instant::now(),
        }
    }

    /// Lowest player id in `1..=MAX_PLAYERS` not currently held by a
    /// connected peer, or `None` once every id in that range is taken.
    fn lowest_free_player_id(&self) -> Option<u8> {
        (1..=MAX_PLAYERS as u8).find(|id| !self.peers.values().any(|p| p.player.player_id == *id))
    }

    /// Runs until `running` is cleared (SIGINT/SIGTERM) or the server
    /// decides to shut itself down after too many idle ticks. No tick
    /// clock of its own: each inbound packet is answered in place.
    pub fn run(&mut self, running: Arc<AtomicBool>, now_ms: impl Fn() -> i64) {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        while running.load(Ordering::Relaxed) {
            let mut received_any = false;
            while let Ok(Some((n, from))) = self.transport.recv_from(&mut buf) {
                received_any = true;
                self.on_datagram(&buf[..n], from, now_ms());
            }

            if received_any {
                self.idle_elapsed = Duration::ZERO;
                self.idle_ticks = 0;
            } else {
                self.idle_elapsed += POLL_INTERVAL;
                if self.idle_elapsed >= Duration::from_secs(IDLE_TICK_SECS) {
                    self.idle_elapsed = Duration::ZERO;
                    self.idle_ticks += 1;
                    if self.peers.is_empty() && self.idle_ticks >= IDLE_SHUTDOWN_TICKS {
                        tracing::info!("server idle for too long with no players, shutting down");
                        running.store(false, Ordering::Relaxed);
                    }
                }
            }

            if self.last_evict_check.elapsed() >= EVICT_CHECK_INTERVAL {
                self.last_evict_check = Instant::now();
                self.evict_idle_peers(now_ms());
            }

            std::thread::sleep(POLL_INTERVAL);
        }
        self.shutdown();
    }

    /// Graceful shutdown: every connected peer gets ten loss-tolerant
    /// Disconnect packets before the process exits.
    fn shutdown(&mut self) {
        let addrs: Vec<_> = self.peers.keys().copied().collect();
        for addr in addrs {
            let connection_salt = self.peers[&addr].player.connection_salt;
            for _ in 0..DISCONNECT_RESEND_COUNT {
                self.send(addr, Packet::Disconnect { connection_salt });
            }
        }
        self.peers.clear();
    }

    fn on_datagram(&mut self, bytes: &[u8], from: SocketAddr, now_ms: i64) {
        let packet = match Packet::decode(bytes) {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!(%from, error = %e, "dropping undecodable datagram");
                return;
            }
        };
        let addr = PeerAddr::from(from);

        match packet {
            Packet::ConnectionRequest { client_salt } => self.on_connection_request(addr, client_salt),
            Packet::ChallengeResponse { .. } => self.on_challenge_response(addr, &packet),
            Packet::InputFrame { .. } => self.on_input_frame(addr, &packet, now_ms),
            Packet::Disconnect { connection_salt } => self.on_disconnect(addr, connection_salt),
            Packet::Clock { connection_salt, client_time_ms } => {
                self.on_clock(addr, connection_salt, client_time_ms, now_ms)
            }
            _ => tracing::debug!(%from, ?packet, "ignoring packet not valid from a client"),
        }
    }

    fn on_connection_request(&mut self, addr: PeerAddr, client_salt: u64) {
        if self.peers.len() >= MAX_PLAYERS {
            self.send(addr, Packet::ConnectionDenied);
            return;
        }
        let (challenge, server_salt) = ServerHandshake::challenge_for(client_salt);
        self.pending.insert(addr, PendingHandshake { client_salt, server_salt });
        self.send(addr, challenge);
    }

    fn on_challenge_response(&mut self, addr: PeerAddr, packet: &Packet) {
        let Some(pending) = self.pending.remove(&addr) else {
            tracing::debug!(%addr.0, "challenge response with no pending handshake");
            return;
        };
        match ServerHandshake::verify_response(packet, pending.client_salt, pending.server_salt) {
            Ok(connection_salt) => {
                let Some(player_id) = self.lowest_free_player_id() else {
                    self.send(addr, Packet::ConnectionDenied);
                    return;
                };
                let spawn_pos = ((player_id as f32) * 137.0 % physics::WORLD_WIDTH, 200.0);
                let mut player = Player::new(player_id, connection_salt, spawn_pos);
                player.state = ConnectionState::Connected;
                self.peers.insert(
                    addr,
                    ConnectedPeer {
                        player,
                        reliability: ReliabilityState::new(),
                        last_remote_seq: 0,
                        last_ack_bits: 0,
                    },
                );
                self.send(addr, Packet::ConnectionAccepted { player_id });
                tracing::info!(%addr.0, player_id, "player connected");
            }
            Err(e) => {
                tracing::debug!(%addr.0, error = %e, "rejecting challenge response");
                self.send(addr, Packet::ConnectionDenied);
            }
        }
    }

    /// Drives one authoritative physics step for the sending peer and
    /// immediately answers with a fresh `GameState` addressed to that peer
    /// alone — the server's simulation rate for a player is exactly that
    /// player's own send rate.
    fn on_input_frame(&mut self, addr: PeerAddr, packet: &Packet, now_ms: i64) {
        let Packet::InputFrame { connection_salt, local_seq, remote_ack, ack_bits, player } = packet else {
            return;
        };
        let Some(peer) = self.peers.get_mut(&addr) else { return };
        if peer.player.connection_salt != *connection_salt {
            tracing::debug!(%addr.0, "input frame with wrong connection salt, dropping");
            return;
        }
        let (highest, ack_bits_out) = peer.reliability.record_received(*local_seq);
        peer.last_remote_seq = highest;
        peer.last_ack_bits = ack_bits_out;
        peer.reliability.apply_ack(*remote_ack, *ack_bits, now_ms);
        peer.player.last_packet_recv_ms = now_ms;

        let mut input_state = peer.player.game_state;
        input_state.keyboard = player.keyboard;
        input_state.delta_time = player.delta_time;
        peer.player.game_state = physics::step(&input_state);

        let snapshot: Vec<_> = self.peers.values().map(|p| p.player.game_state).collect();
        let (out_seq, remote_ack, ack_bits) = {
            let peer = self.peers.get_mut(&addr).expect("peer present, just updated above");
            let (out_seq, _) = peer.reliability.next_outgoing(now_ms);
            (out_seq, peer.last_remote_seq, peer.last_ack_bits)
        };
        self.send(addr, Packet::GameState { local_seq: out_seq, remote_ack, ack_bits, players: snapshot });
    }

    fn on_disconnect(&mut self, addr: PeerAddr, connection_salt: u64) {
        if let Some(peer) = self.peers.get(&addr) {
            if peer.player.connection_salt == connection_salt {
                // TODO: notify remaining peers this player left.
                tracing::info!(%addr.0, "player disconnected");
                self.peers.remove(&addr);
            }
        }
    }

    fn on_clock(&mut self, addr: PeerAddr, connection_salt: u64, _client_time_ms: i64, now_ms: i64) {
        if let Some(peer) = self.peers.get(&addr) {
            if peer.player.connection_salt != connection_salt {
                return;
            }
        }
        self.send(addr, Packet::ClockResponse { server_time_ms: now_ms });
    }

    fn evict_idle_peers(&mut self, now_ms: i64) {
        let peer_idle_timeout_ms = (IDLE_TICK_SECS * 1000) as i64;
        let stale: Vec<_> = self
            .peers
            .iter()
            .filter(|(_, p)| now_ms - p.player.last_packet_recv_ms > peer_idle_timeout_ms)
            .map(|(addr, p)| (*addr, p.player.connection_salt))
            .collect();
        for (addr, connection_salt) in stale {
            tracing::info!(%addr.0, "evicting idle player");
            for _ in 0..DISCONNECT_RESEND_COUNT {
                self.send(addr, Packet::Disconnect { connection_salt });
            }
            self.peers.remove(&addr);
        }
    }

    fn send(&self, addr: PeerAddr, packet: Packet) {
        let bytes = packet.encode();
        if let Err(e) = self.transport.send_to(&bytes, addr.0) {
            tracing::warn!(%addr.0, error = %e, "send failed");
        }
    }
}
