use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::booking::{BookingStore, StoreError};
use crate::model::{Interval, Ms, now_ms, truncate_to_minute};
use crate::observability;
use crate::publish::Publisher;

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Tick interval; also the width of the notification fetch window.
    pub check_period: Duration,
    /// Retention after a stay ends; older rows are purged.
    pub booking_ttl: Duration,
}

/// Background service that polls upcoming bookings and purges expired
/// ones. One timer, two sub-tasks per tick, failures isolated per
/// sub-task; only external cancellation stops the loop.
pub struct Scheduler {
    store: Arc<dyn BookingStore>,
    publisher: Arc<dyn Publisher>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn BookingStore>,
        publisher: Arc<dyn Publisher>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            config,
        }
    }

    /// Run until `shutdown` fires. The first tick lands one full period
    /// after start, and a tick never begins before the previous one's
    /// sub-tasks have both finished.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            period = ?self.config.check_period,
            ttl = ?self.config.booking_ttl,
            "scheduler started"
        );
        let mut ticker = time::interval_at(
            time::Instant::now() + self.config.check_period,
            self.config.check_period,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("scheduler stopped");
                    return;
                }
                _ = ticker.tick() => self.handle_tick().await,
            }
        }
    }

    /// One tick. The join is the barrier: both sub-tasks run
    /// concurrently and both must finish before the tick is done.
    async fn handle_tick(&self) {
        debug!("tick started");
        let started = std::time::Instant::now();

        let (notified, evicted) = tokio::join!(self.notify_upcoming(), self.evict_expired());
        if let Err(e) = notified {
            error!("notify sub-task failed: {e}");
        }
        if let Err(e) = evicted {
            error!("evict sub-task failed: {e}");
        }

        metrics::histogram!(observability::TICK_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        debug!("tick finished");
    }

    /// Publish every booking whose notification instant fell inside the
    /// last check period. A failed publish skips that booking only; a
    /// failed fetch abandons the batch until the next tick.
    async fn notify_upcoming(&self) -> Result<usize, StoreError> {
        let window = notify_window(now_ms(), self.config.check_period.as_millis() as Ms);
        let due = self.store.list_by_notify_window(window).await?;
        if due.is_empty() {
            debug!("no notifications due");
            return Ok(0);
        }

        let mut sent = 0usize;
        for booking in &due {
            let payload = match serde_json::to_vec(booking) {
                Ok(p) => p,
                Err(e) => {
                    warn!(booking_id = %booking.id, "failed to serialize booking: {e}");
                    continue;
                }
            };
            match self.publisher.publish(&payload).await {
                Ok(()) => {
                    sent += 1;
                    metrics::counter!(observability::NOTIFICATIONS_PUBLISHED_TOTAL).increment(1);
                }
                Err(e) => {
                    metrics::counter!(observability::NOTIFICATION_FAILURES_TOTAL).increment(1);
                    warn!(booking_id = %booking.id, "failed to publish notification: {e}");
                }
            }
        }
        debug!(sent, due = due.len(), "notifications handled");
        Ok(sent)
    }

    /// Purge bookings that ended more than the retention window ago.
    /// Idempotent; a failed tick is retried implicitly on the next.
    async fn evict_expired(&self) -> Result<u64, StoreError> {
        let cutoff = now_ms() - self.config.booking_ttl.as_millis() as Ms;
        let removed = self.store.delete_before(cutoff).await?;
        if removed > 0 {
            metrics::counter!(observability::BOOKINGS_EVICTED_TOTAL).increment(removed);
            info!(removed, "expired bookings evicted");
        }
        Ok(removed)
    }
}

/// Fetch window for a tick at `now`: `[end − period, end)` with `end`
/// truncated to the minute, so consecutive ticks tile the timeline.
fn notify_window(now: Ms, period: Ms) -> Interval {
    let end = truncate_to_minute(now);
    Interval::new(end - period, end)
}
