use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use lodged::booking::MemoryStore;
use lodged::model::Booking;
use lodged::publish::QueuePublisher;
use lodged::scheduler::{Scheduler, SchedulerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("LODGED_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    lodged::observability::init(metrics_port);

    let check_period_secs: u64 = std::env::var("LODGED_CHECK_PERIOD_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3600);
    let booking_ttl_hours: u64 = std::env::var("LODGED_BOOKING_TTL_HOURS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(720);
    let queue_capacity: usize = std::env::var("LODGED_QUEUE_CAPACITY")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(256);

    let config = SchedulerConfig {
        check_period: Duration::from_secs(check_period_secs),
        booking_ttl: Duration::from_secs(booking_ttl_hours * 3600),
    };

    let store = Arc::new(MemoryStore::new());
    let (publisher, mut notifications) = QueuePublisher::new(queue_capacity);
    let scheduler = Scheduler::new(store, Arc::new(publisher), config);

    info!(
        check_period_secs,
        booking_ttl_hours, queue_capacity, "lodged scheduler starting"
    );

    // Drain the in-process queue. A broker consumer stands here in
    // deployments with a real transport.
    let drain = tokio::spawn(async move {
        while let Some(payload) = notifications.recv().await {
            match serde_json::from_slice::<Booking>(&payload) {
                Ok(b) => info!(booking_id = %b.id, suite_id = b.suite_id, "notification delivered"),
                Err(e) => tracing::warn!("undecodable notification payload: {e}"),
            }
        }
    });

    let shutdown = CancellationToken::new();
    let scheduler_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };

    // Graceful shutdown on SIGTERM/ctrl-c.
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
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

    info!("shutdown signal received");
    shutdown.cancel();
    scheduler_task.await?;
    drain.await?;

    info!("lodged stopped");
    Ok(())
}
