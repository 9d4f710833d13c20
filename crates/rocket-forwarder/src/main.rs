//! rocket-forwarder — minimal UDP relay: forwards every datagram it
//! receives from one player to every other known player, with no decoding,
//! reliability, or authority of its own.
//!
//! Converted from: original_source's RocketServerCpp.cpp, which keeps an
//! `unordered_map<sockaddr_in, RocketPlayer>` of recently-seen senders and
//! fans each inbound packet out to the rest, sweeping out anyone idle past
//! a timeout once a second. This is a plain relay, not the authoritative
//! simulation server in `rocket-server` — it never inspects or steps the
//! game state, matching the original's "just forward bytes" design.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use rocket_common::config::DEFAULT_PORT;
use rocket_common::transport::{DatagramTransport, UdpTransport};

const MAX_DATAGRAM_SIZE: usize = 1024;
const PLAYER_IDLE_TIMEOUT: Duration = Duration::from_secs(5);
const CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

/// Minimal UDP packet forwarder for players that don't need the
/// authoritative simulation server.
#[derive(Parser, Debug)]
#[command(name = "rocket-forwarder")]
struct Args {
    /// Port to bind the UDP socket to, positionally overriding UDP_PORT.
    #[arg(env = "UDP_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,
}

struct KnownPlayer {
    last_seen: Instant,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let bind_addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;

    let running = Arc::new(AtomicBool::new(true));
    signal_hook::flag::register(signal_hook::consts::SIGINT, running.clone())?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, running.clone())?;

    let transport = UdpTransport::bind(bind_addr)?;
    tracing::info!(%bind_addr, "forwarder listening");
    run(transport, running);
    tracing::info!("forwarder shut down");
    Ok(())
}

fn run<T: DatagramTransport>(transport: T, running: Arc<AtomicBool>) {
    let mut players: HashMap<SocketAddr, KnownPlayer> = HashMap::new();
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];
    let mut last_cleanup = Instant::now();

    while running.load(Ordering::Relaxed) {
        while let Ok(Some((n, from))) = transport.recv_from(&mut buf) {
            players.entry(from).or_insert_with(|| {
                tracing::info!(%from, "new player seen");
                KnownPlayer { last_seen: Instant::now() }
            });
            if let Some(entry) = players.get_mut(&from) {
                entry.last_seen = Instant::now();
            }

            for &addr in players.keys() {
                if addr != from {
                    let _ = transport.send_to(&buf[..n], addr);
                }
            }
        }

        if last_cleanup.elapsed() >= CLEANUP_INTERVAL {
            last_cleanup = Instant::now();
            let before = players.len();
            players.retain(|_, p| p.last_seen.elapsed() < PLAYER_IDLE_TIMEOUT);
            if players.len() != before {
                tracing::info!(evicted = before - players.len(), "swept idle players");
            }
        }

        std::thread::sleep(Duration::from_millis(10));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket_common::transport::MemoryTransport;

    #[test]
    fn forwards_to_other_known_players_not_the_sender() {
        let transport = MemoryTransport::new("127.0.0.1:6000".parse().unwrap());
        let a: SocketAddr = "127.0.0.1:6001".parse().unwrap();
        let b: SocketAddr = "127.0.0.1:6002".parse().unwrap();

        transport.inject(vec![1, 2, 3], a);
        transport.inject(vec![4, 5, 6], b);

        let mut players: HashMap<SocketAddr, KnownPlayer> = HashMap::new();
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];

        while let Ok(Some((n, from))) = transport.recv_from(&mut buf) {
            players.entry(from).or_insert_with(|| KnownPlayer { last_seen: Instant::now() });
            for &addr in players.keys() {
                if addr != from {
                    transport.send_to(&buf[..n], addr).unwrap();
                }
            }
        }

        assert_eq!(players.len(), 2);
        assert!(players.contains_key(&a));
        assert!(players.contains_key(&b));
    }

    #[test]
    fn idle_players_are_swept_after_timeout() {
        let mut players: HashMap<SocketAddr, KnownPlayer> = HashMap::new();
        let stale_addr: SocketAddr = "127.0.0.1:7000".parse().unwrap();
        players.insert(
            stale_addr,
            KnownPlayer { last_seen: Instant::now() - Duration::from_secs(10) },
        );
        players.retain(|_, p| p.last_seen.elapsed() < PLAYER_IDLE_TIMEOUT);
        assert!(players.is_empty());
    }
}
