// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::review::ReviewService;

#[derive(Clone, Copy, Debug)]
pub struct ScrapeSchedulerCfg {
    pub first_delay: Duration,
    /// Zero disables the timer.
    pub interval: Duration,
}

impl ScrapeSchedulerCfg {
    pub fn every(interval: Duration) -> Self {
        Self {
            first_delay: Duration::from_secs(10),
            interval,
        }
    }
}

/// Periodic scrape: first run after `first_delay`, then every `interval`.
/// Overlap with a manual `/scrape` is serialized inside the pipeline.
pub fn spawn_scrape_scheduler(
    service: Arc<ReviewService>,
    cfg: ScrapeSchedulerCfg,
) -> Option<JoinHandle<()>> {
    if cfg.interval.is_zero() {
        tracing::info!("scheduled scraping disabled");
        return None;
    }
    tracing::info!(
        every_minutes = cfg.interval.as_secs() / 60,
        "scheduled scraping enabled"
    );

    Some(tokio::spawn(async move {
        let start = tokio::time::Instant::now() + cfg.first_delay;
        let mut ticker = tokio::time::interval_at(start, cfg.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            tracing::info!(target: "ingest", "scheduled scrape tick");
            service.run_scrape().await;
        }
    }))
}
