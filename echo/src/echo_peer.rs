use std::sync::Arc;
use std::time::{Duration, Instant};

use log::*;
use rtchannel::{Channel, LoopbackTransport};
use tokio::sync::{Notify, mpsc, oneshot};

/// Echo endpoint in pull mode: drains `channel` whenever data becomes
/// available and sends every message straight back, until the channel
/// closes.
pub async fn serve(channel: Channel) {
    let wake = Arc::new(Notify::new());

    channel.on_open(|| info!("[echo] channel open"));
    channel.on_error(|error| error!("[echo] channel error: {}", error));
    channel.on_available({
        let wake = wake.clone();
        move || wake.notify_one()
    });
    channel.on_closed({
        let wake = wake.clone();
        move || wake.notify_one()
    });

    let mut echoed = 0usize;
    loop {
        while let Some(message) = channel.receive() {
            echoed += 1;
            if let Err(e) = channel.send(message) {
                warn!("[echo] reply failed: {}", e);
            }
        }
        if channel.is_closed() {
            break;
        }
        wake.notified().await;
    }

    info!("[echo] channel closed after {} messages", echoed);
}

/// Simulated I/O loop: drains every endpoint's outbound buffer on each tick
/// until `shutdown` fires.
pub async fn drive(
    endpoints: Vec<Arc<LoopbackTransport>>,
    interval: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    let mut moved = 0usize;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for endpoint in &endpoints {
                    moved += endpoint.flush();
                }
            }
            _ = &mut shutdown => break,
        }
    }

    debug!("[io] stopped after flushing {} buffered messages", moved);
}

/// Sends `count` messages of `size` bytes and waits for all echoes.
///
/// Pauses whenever the buffered amount exceeds `high_water` and resumes on
/// the buffered-amount-low event.
pub async fn run_client(channel: Channel, count: usize, size: usize, high_water: usize) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    channel.on_message(move |message| {
        let _ = tx.send(message.size());
    });

    let low = Arc::new(Notify::new());
    channel.on_buffered_amount_low({
        let low = low.clone();
        move || low.notify_one()
    });

    let opened = Arc::new(Notify::new());
    channel.on_open({
        let opened = opened.clone();
        move || opened.notify_one()
    });
    opened.notified().await;
    info!("[client] channel open, sending {} x {} bytes", count, size);

    let start = Instant::now();
    let payload = vec![0xAB; size];
    let mut stalls = 0usize;
    for _ in 0..count {
        if channel.buffered_amount() > high_water {
            stalls += 1;
            while channel.buffered_amount() > high_water {
                low.notified().await;
            }
        }
        if let Err(e) = channel.send(payload.clone()) {
            error!("[client] send failed: {}", e);
            return;
        }
    }
    let elapsed = start.elapsed();
    info!("=== Send Complete ===");
    info!("Total sent: {} KB", count * size / 1024);
    info!("Backpressure stalls: {}", stalls);
    info!("Time: {:.2} seconds", elapsed.as_secs_f64());

    let expected = count * size;
    let mut received = 0usize;
    while received < expected {
        match rx.recv().await {
            Some(n) => received += n,
            None => break,
        }
    }

    let elapsed = start.elapsed();
    let speed = (received as f64 / 1024.0) / elapsed.as_secs_f64();
    info!("=== Echo Complete ===");
    info!("Total echoed: {} KB", received / 1024);
    info!("Time: {:.2} seconds", elapsed.as_secs_f64());
    info!("Speed: {:.2} KB/s", speed);
}
