mod echo_peer;

use std::time::Duration;

use log::info;
use rtchannel::{ChannelConfig, LoopbackTransport};
use tokio::sync::oneshot;

const MESSAGE_COUNT: usize = 1024;
const MESSAGE_SIZE: usize = 16 * 1024; // 16 KB
const INBOUND_CAPACITY: usize = 64 * 1024;
const LOW_THRESHOLD: usize = 32 * 1024;
const HIGH_WATER: usize = 128 * 1024;
const FLUSH_INTERVAL: Duration = Duration::from_millis(1);

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ChannelConfig::default()
        .with_inbound_capacity(INBOUND_CAPACITY)
        .with_buffered_amount_low_threshold(LOW_THRESHOLD);
    let (client, server) = LoopbackTransport::pair(config);
    info!("Created loopback pair");

    let (stop_tx, stop_rx) = oneshot::channel();
    let io = tokio::spawn(echo_peer::drive(
        vec![client.clone(), server.clone()],
        FLUSH_INTERVAL,
        stop_rx,
    ));
    let echo = tokio::spawn(echo_peer::serve(server.channel()));

    let channel = client.channel();
    let run = tokio::spawn(echo_peer::run_client(
        channel.clone(),
        MESSAGE_COUNT,
        MESSAGE_SIZE,
        HIGH_WATER,
    ));

    client.open();
    info!("Channel opened");

    if let Err(e) = run.await {
        log::error!("Client task failed: {}", e);
    }

    channel.close();
    if let Err(e) = echo.await {
        log::error!("Echo task failed: {}", e);
    }
    let _ = stop_tx.send(());
    if let Err(e) = io.await {
        log::error!("I/O task failed: {}", e);
    }

    info!("Echo finished");
}
