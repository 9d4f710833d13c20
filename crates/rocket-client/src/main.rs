//! Client binary: connects to a rocket-server, predicts its own ship
//! locally, and reconciles against the authoritative snapshots the network
//! thread forwards across a lock-free queue.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use rocket_client::network::{self, ClientCommand, ServerEvent};
use rocket_client::session::PredictionSession;
use rocket_common::config::DEFAULT_PORT;
use rocket_common::queue;
use rocket_common::transport::UdpTransport;
use rocket_common::wire::Keyboard;

const CLIENT_TICK_HZ: f32 = 60.0;

/// Rocket game client.
#[derive(Parser, Debug)]
#[command(name = "rocket-client")]
struct Args {
    /// Server host to connect to, positionally overriding UDP_SERVER.
    #[arg(env = "UDP_SERVER", default_value = "127.0.0.1")]
    server: String,

    /// Server port to connect to, positionally overriding UDP_PORT.
    #[arg(env = "UDP_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let server_addr: SocketAddr = format!("{}:{}", args.server, args.port).parse()?;
    let local_addr: SocketAddr = "0.0.0.0:0".parse()?;

    let running = Arc::new(AtomicBool::new(true));
    signal_hook::flag::register(signal_hook::consts::SIGINT, running.clone())?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, running.clone())?;

    let transport = UdpTransport::bind(local_addr)?;
    let (events_tx, events_rx) = queue::bounded::<ServerEvent>();
    let (commands_tx, commands_rx) = queue::bounded::<ClientCommand>();

    let network_running = running.clone();
    let network_thread = std::thread::spawn(move || {
        network::run(transport, server_addr, events_tx, commands_rx, network_running);
    });

    run_frame_loop(&running, &events_rx, &commands_tx);

    running.store(false, Ordering::Relaxed);
    let _ = network_thread.join();
    Ok(())
}

fn run_frame_loop(
    running: &Arc<AtomicBool>,
    events_rx: &queue::Receiver<ServerEvent>,
    commands_tx: &queue::Sender<ClientCommand>,
) {
    let frame_time = Duration::from_secs_f32(1.0 / CLIENT_TICK_HZ);
    let mut local_seq: u16 = 0;
    let mut player_id: Option<u8> = None;
    let mut session = PredictionSession::new(0, (960.0, 540.0));

    while running.load(Ordering::Relaxed) {
        let frame_start = Instant::now();

        for event in events_rx.drain() {
            match event {
                ServerEvent::Connected { player_id: id } => {
                    tracing::info!(player_id = id, "connected");
                    player_id = Some(id);
                }
                ServerEvent::Denied => {
                    tracing::warn!("connection denied by server");
                    return;
                }
                ServerEvent::Disconnected => {
                    tracing::info!("disconnected");
                    return;
                }
                ServerEvent::ClockOffsetMs(offset) => {
                    tracing::debug!(offset, "clock offset established");
                }
                ServerEvent::GameState { remote_ack, players } => {
                    if let Some(id) = player_id {
                        if let Some(authoritative) = players.into_iter().find(|p| p.player_id == id) {
                            session.reconcile(authoritative, remote_ack);
                        }
                    }
                }
            }
        }

        let keyboard = poll_local_input();
        session.apply_local_input(local_seq, keyboard, frame_time.as_secs_f32());
        if player_id.is_some() {
            let _ = commands_tx.try_send(ClientCommand::SendInput { local_seq, player: session.predicted });
        }
        local_seq = local_seq.wrapping_add(1);

        let elapsed = frame_start.elapsed();
        if elapsed < frame_time {
            std::thread::sleep(frame_time - elapsed);
        }
    }
}

/// Placeholder input source: this crate has no window/input backend, so the
/// frame loop always reports no keys held. A real front end swaps this out
/// for its own polling without touching `PredictionSession`.
fn poll_local_input() -> Keyboard {
    Keyboard::empty()
}
