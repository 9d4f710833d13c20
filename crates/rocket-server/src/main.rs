//! Authoritative server binary: parses CLI/env config, wires a real UDP
//! socket into the dispatcher, and runs until a signal asks it to stop.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use rocket_common::config::DEFAULT_PORT;
use rocket_common::transport::UdpTransport;
use rocket_server::dispatcher::Server;

/// Rocket game authoritative server.
#[derive(Parser, Debug)]
#[command(name = "rocket-server")]
struct Args {
    /// Port to bind the UDP socket to, positionally overriding UDP_PORT.
    #[arg(env = "UDP_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
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
    tracing::info!(%bind_addr, "server listening");
    let mut server = Server::new(transport);
    server.run(running, now_ms);

    tracing::info!("server shut down");
    Ok(())
}
