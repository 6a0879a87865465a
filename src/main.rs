use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, info, warn};

use calindex::config::Config;
use calindex::day_slots::DaySlotIndexer;
use calindex::protocol::{self, Response, Unit};
use calindex::scene::MonthScene;
use calindex::worker;

/// Longest accepted request line (a busy month of reservations fits comfortably).
const MAX_LINE_BYTES: usize = 64 * 1024 * 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let config = Config::from_env();
    calindex::observability::init(config.metrics_port);

    info!("calindex reading requests from stdin");
    info!("  time_zone: {}", config.time_zone);
    info!(
        "  grid: {} slots x {} min, lesson {} min",
        config.slot_count, config.step_minutes, config.lesson_minutes
    );

    let (resp_tx, mut resp_rx) = mpsc::channel::<Response>(config.channel_capacity);
    let day = worker::spawn(
        DaySlotIndexer::new(config.day_grid()),
        config.channel_capacity,
        resp_tx.clone(),
    );
    let month = worker::spawn(MonthScene::from_config(&config), config.channel_capacity, resp_tx);

    let writer = tokio::spawn(async move {
        let mut sink = FramedWrite::new(tokio::io::stdout(), LinesCodec::new());
        while let Some(response) = resp_rx.recv().await {
            let line = match serde_json::to_string(&response) {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!("failed to encode response: {e}");
                    continue;
                }
            };
            if let Err(e) = sink.send(line).await {
                tracing::error!("stdout closed: {e}");
                break;
            }
        }
    });

    // Stop on EOF, ctrl-c or SIGTERM; queued requests still get answered.
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    tokio::pin!(shutdown);

    let mut lines = FramedRead::new(
        tokio::io::stdin(),
        LinesCodec::new_with_max_length(MAX_LINE_BYTES),
    );
    loop {
        tokio::select! {
            line = lines.next() => {
                let line = match line {
                    Some(Ok(line)) => line,
                    Some(Err(e)) => {
                        warn!("skipping unreadable request line: {e}");
                        continue;
                    }
                    None => break,
                };
                if line.trim().is_empty() {
                    continue;
                }
                let envelope: Value = match serde_json::from_str(&line) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!("skipping malformed request line: {e}");
                        continue;
                    }
                };
                let handle = match protocol::route(&envelope) {
                    Some(Unit::DaySlots) => &day,
                    Some(Unit::MonthScene) => &month,
                    None => {
                        debug!("ignoring envelope without a known type");
                        calindex::observability::record_ignored("router");
                        continue;
                    }
                };
                if let Err(e) = handle.send(envelope).await {
                    tracing::error!("{e}");
                    break;
                }
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping");
                break;
            }
        }
    }

    // Dropping the handles lets each unit drain its queue and exit, which
    // closes the response channel and ends the writer.
    drop(day);
    drop(month);
    writer.await?;

    info!("calindex stopped");
    Ok(())
}
