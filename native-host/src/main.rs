//! Native Messaging Host - thin relay to the match service
//!
//! This binary receives messages from the browser extension via stdin/stdout
//! and forwards them to the match service via Unix socket. Stdout carries the
//! protocol, so all logging goes to stderr.

mod relay;

use relay::Relay;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_SOCKET_PATH: &str = "/tmp/job-matcher.sock";
const SOCKET_ENV: &str = "JOB_MATCHER_SOCKET";
const SOCKET_TIMEOUT: Duration = Duration::from_secs(5);

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let socket_path = std::env::var(SOCKET_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_SOCKET_PATH));
    info!("Native host started, relaying to {:?}", socket_path);

    let relay = Relay::new(&socket_path, SOCKET_TIMEOUT);
    let mut stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();

    match relay::run(&relay, &mut stdin, &mut stdout) {
        Ok(handled) => info!("Connection closed after {} messages", handled),
        Err(e) => error!("Relay stopped: {}", e),
    }
}
