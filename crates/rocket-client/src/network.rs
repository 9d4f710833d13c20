//! network.rs — the client's network thread: owns the socket, drives the
//! handshake and clock sync, and forwards inputs out / game state in across
//! a bounded SPSC ring buffer to the frame thread (§4.4, §4.5, §9).
//!
//! The wire `local_seq` on every `InputFrame` is assigned by the frame
//! thread, not here — it's the same number `PredictionSession` keys its
//! replay buffer with, so the server's ack of it and the buffer it prunes
//! must agree on what "seq 41" means. This thread only records that the
//! seq was sent (`ReliabilityState::record_sent`) for RTT/loss bookkeeping.
//!
//! Converted from: myq2-client's cl_main.rs network-frame pump, split here
//! into its own OS thread talking to the frame thread only through
//! `rocket_common::queue`, instead of myq2's single-threaded poll-every-frame
//! model — this protocol's spec calls for the socket never to block frame
//! pacing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rocket_common::addr::PeerAddr;
use rocket_common::clock::{ClockSample, ClockSync, SAMPLE_COUNT};
use rocket_common::error::HandshakeError;
use rocket_common::handshake::ClientHandshake;
use rocket_common::player::PlayerState;
use rocket_common::queue::{Receiver, Sender};
use rocket_common::reliability::ReliabilityState;
use rocket_common::transport::DatagramTransport;
use rocket_common::wire::Packet;

const MAX_DATAGRAM_SIZE: usize = 1024;
const HANDSHAKE_RETRY_INTERVAL: Duration = Duration::from_millis(500);
const HANDSHAKE_MAX_ATTEMPTS: u32 = 10;

/// Outbound command the frame thread sends to the network thread. The
/// frame thread assigns `local_seq` itself, since it's the same sequence
/// number `PredictionSession` keys its replay buffer with — the wire layer
/// must never hand out a different one.
pub enum ClientCommand {
    SendInput { local_seq: u16, player: PlayerState },
}

/// Inbound event the network thread delivers to the frame thread.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    Connected { player_id: u8 },
    Denied,
    GameState { remote_ack: u16, players: Vec<PlayerState> },
    ClockOffsetMs(f64),
    Disconnected,
}

/// Runs the full connect → stream loop against `server_addr`, pushing
/// `ServerEvent`s to `events_tx` and draining `commands_rx` for outbound
/// input. Returns once `running` is cleared or the server denies/drops us.
pub fn run<T: DatagramTransport>(
    transport: T,
    server_addr: SocketAddr,
    events_tx: Sender<ServerEvent>,
    commands_rx: Receiver<ClientCommand>,
    running: Arc<AtomicBool>,
) {
    let connection_salt = match connect(&transport, server_addr, &events_tx, &running) {
        Some(salt) => salt,
        None => return,
    };

    sync_clock(&transport, server_addr, connection_salt, &events_tx, &running);

    let mut reliability = ReliabilityState::new();
    let mut last_remote_seq: u16 = 0;
    let mut last_ack_bits: u32 = 0;
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];

    while running.load(Ordering::Relaxed) {
        for command in commands_rx.drain() {
            let ClientCommand::SendInput { local_seq, player } = command;
            reliability.record_sent(local_seq, now_ms());
            let packet = Packet::InputFrame {
                connection_salt,
                local_seq,
                remote_ack: last_remote_seq,
                ack_bits: last_ack_bits,
                player,
            };
            let _ = transport.send_to(&packet.encode(), server_addr);
        }

        while let Ok(Some((n, _))) = transport.recv_from(&mut buf) {
            let Ok(packet) = Packet::decode(&buf[..n]) else { continue };
            match packet {
                Packet::GameState { local_seq, remote_ack, ack_bits, players } => {
                    let (highest, ack_bits_out) = reliability.record_received(local_seq);
                    last_remote_seq = highest;
                    last_ack_bits = ack_bits_out;
                    reliability.apply_ack(remote_ack, ack_bits, now_ms());
                    if events_tx.try_send(ServerEvent::GameState { remote_ack, players }).is_err() {
                        tracing::warn!("frame thread queue full, dropping game state event");
                    }
                }
                Packet::Disconnect { .. } => {
                    let _ = events_tx.try_send(ServerEvent::Disconnected);
                    return;
                }
                _ => {}
            }
        }

        std::thread::sleep(Duration::from_millis(5));
    }
}

fn connect<T: DatagramTransport>(
    transport: &T,
    server_addr: SocketAddr,
    events_tx: &Sender<ServerEvent>,
    running: &Arc<AtomicBool>,
) -> Option<u64> {
    let mut client = ClientHandshake::new();
    let request = client.connection_request().encode();

    let mut buf = [0u8; MAX_DATAGRAM_SIZE];
    for _ in 0..HANDSHAKE_MAX_ATTEMPTS {
        if !running.load(Ordering::Relaxed) {
            return None;
        }
        let _ = transport.send_to(&request, server_addr);
        let deadline = Instant::now() + HANDSHAKE_RETRY_INTERVAL;
        while Instant::now() < deadline {
            if let Ok(Some((n, _))) = transport.recv_from(&mut buf) {
                if let Ok(packet) = Packet::decode(&buf[..n]) {
                    match client.on_challenge(&packet) {
                        Ok(response) => {
                            let _ = transport.send_to(&response.encode(), server_addr);
                            return await_accept(transport, server_addr, events_tx, client.connection_salt());
                        }
                        Err(HandshakeError::Timeout) => continue,
                        Err(e) => {
                            tracing::warn!(error = %e, "handshake failed");
                            let _ = events_tx.try_send(ServerEvent::Denied);
                            return None;
                        }
                    }
                }
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }
    let _ = events_tx.try_send(ServerEvent::Denied);
    None
}

fn await_accept<T: DatagramTransport>(
    transport: &T,
    server_addr: SocketAddr,
    events_tx: &Sender<ServerEvent>,
    connection_salt: u64,
) -> Option<u64> {
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if let Ok(Some((n, from))) = transport.recv_from(&mut buf) {
            if from != server_addr {
                continue;
            }
            if let Ok(packet) = Packet::decode(&buf[..n]) {
                match packet {
                    Packet::ConnectionAccepted { player_id } => {
                        let _ = events_tx.try_send(ServerEvent::Connected { player_id });
                        return Some(connection_salt);
                    }
                    Packet::ConnectionDenied => {
                        let _ = events_tx.try_send(ServerEvent::Denied);
                        return None;
                    }
                    _ => {}
                }
            }
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    let _ = events_tx.try_send(ServerEvent::Denied);
    None
}

/// Runs exactly `SAMPLE_COUNT` `Clock`/`ClockResponse` iterations, not
/// until `SAMPLE_COUNT` succeed — a lost response contributes no sample
/// but does not retry or abort the protocol (§4.5).
fn sync_clock<T: DatagramTransport>(
    transport: &T,
    server_addr: SocketAddr,
    connection_salt: u64,
    events_tx: &Sender<ServerEvent>,
    running: &Arc<AtomicBool>,
) {
    let mut sync = ClockSync::new();
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];

    for _ in 0..SAMPLE_COUNT {
        if !running.load(Ordering::Relaxed) {
            return;
        }
        let send_time = now_ms();
        let packet = Packet::Clock { connection_salt, client_time_ms: send_time };
        let _ = transport.send_to(&packet.encode(), server_addr);

        let deadline = Instant::now() + Duration::from_millis(500);
        while Instant::now() < deadline {
            if !running.load(Ordering::Relaxed) {
                return;
            }
            if let Ok(Some((n, _))) = transport.recv_from(&mut buf) {
                if let Ok(Packet::ClockResponse { server_time_ms }) = Packet::decode(&buf[..n]) {
                    sync.push(ClockSample {
                        client_send_ms: send_time,
                        client_recv_ms: now_ms(),
                        server_time_ms,
                    });
                    break;
                }
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    if let Ok(offset) = sync.offset_ms() {
        let _ = events_tx.try_send(ServerEvent::ClockOffsetMs(offset));
    }
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket_common::transport::MemoryTransport;

    #[test]
    fn connect_gives_up_and_reports_denied_after_retries_exhausted() {
        let transport = MemoryTransport::new("127.0.0.1:5000".parse().unwrap());
        let server_addr: SocketAddr = "127.0.0.1:5001".parse().unwrap();
        let (events_tx, events_rx) = rocket_common::queue::bounded();
        let running = Arc::new(AtomicBool::new(true));

        // No responses are ever injected, so every attempt times out.
        let result = connect(&transport, server_addr, &events_tx, &running);
        assert!(result.is_none());
        let events = events_rx.drain();
        assert!(matches!(events.last(), Some(ServerEvent::Denied)));
    }

    #[test]
    fn stopped_running_flag_aborts_connect_immediately() {
        let transport = MemoryTransport::new("127.0.0.1:5010".parse().unwrap());
        let server_addr: SocketAddr = "127.0.0.1:5011".parse().unwrap();
        let (events_tx, _events_rx) = rocket_common::queue::bounded();
        let running = Arc::new(AtomicBool::new(false));

        let result = connect(&transport, server_addr, &events_tx, &running);
        assert!(result.is_none());
    }

    #[test]
    fn sync_clock_gives_up_after_sample_count_iterations_even_with_no_replies() {
        let transport = MemoryTransport::new("127.0.0.1:5020".parse().unwrap());
        let server_addr: SocketAddr = "127.0.0.1:5021".parse().unwrap();
        let (events_tx, events_rx) = rocket_common::queue::bounded();
        let running = Arc::new(AtomicBool::new(true));

        // No ClockResponse is ever injected; the loop must still return
        // after SAMPLE_COUNT iterations rather than spinning forever.
        sync_clock(&transport, server_addr, 0, &events_tx, &running);

        // No samples collected, so no offset event is published.
        assert!(events_rx.drain().is_empty());
    }

    #[test]
    fn stopped_running_flag_aborts_sync_clock_immediately() {
        let transport = MemoryTransport::new("127.0.0.1:5030".parse().unwrap());
        let server_addr: SocketAddr = "127.0.0.1:5031".parse().unwrap();
        let (events_tx, _events_rx) = rocket_common::queue::bounded();
        let running = Arc::new(AtomicBool::new(false));

        sync_clock(&transport, server_addr, 0, &events_tx, &running);
    }
}
