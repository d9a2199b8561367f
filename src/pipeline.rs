//! One scrape run end to end: sources → new feed entries → rewritten candidates.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use metrics::{counter, gauge};

use crate::article::Candidate;
use crate::config::{load_sources_default, FeedSource};
use crate::ingest::{self, seen::SeenSet, types::FeedFetcher};
use crate::rewrite::Rewriter;

/// Produces fresh candidates on demand (scheduled or manual scrape).
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn collect(&self) -> Result<Vec<Candidate>>;
}

/// Where feed sources come from on each run.
pub enum SourceList {
    Fixed(Vec<FeedSource>),
    /// Re-read before every run so edits apply without a restart.
    Config {
        explicit: Option<PathBuf>,
        dir: PathBuf,
    },
}

impl SourceList {
    fn load(&self) -> Result<Vec<FeedSource>> {
        match self {
            SourceList::Fixed(v) => Ok(v.clone()),
            SourceList::Config { explicit, dir } => load_sources_default(explicit.as_deref(), dir),
        }
    }
}

pub struct Pipeline {
    fetcher: Arc<dyn FeedFetcher>,
    sources: SourceList,
    rewriter: Rewriter,
    seen_path: PathBuf,
    // Serializes runs so SeenSet load/save never interleave.
    run_lock: tokio::sync::Mutex<()>,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn FeedFetcher>,
        sources: SourceList,
        rewriter: Rewriter,
        seen_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            sources,
            rewriter,
            seen_path: seen_path.into(),
            run_lock: tokio::sync::Mutex::new(()),
        }
    }
}

#[async_trait]
impl CandidateSource for Pipeline {
    async fn collect(&self) -> Result<Vec<Candidate>> {
        let _run = self.run_lock.lock().await;
        let now = Utc::now();

        let sources = self.sources.load()?;
        if sources.is_empty() {
            tracing::warn!("no feed sources configured");
        }

        let mut seen = SeenSet::load(&self.seen_path).await;
        let entries = ingest::run_once(self.fetcher.as_ref(), &sources, &mut seen, now).await;
        if let Err(e) = seen.save(&self.seen_path).await {
            tracing::warn!(error = ?e, path = %self.seen_path.display(), "failed to persist seen set");
        }

        let candidates = self.rewriter.rewrite_all(&entries, now.date_naive()).await;

        counter!("ingest_runs_total").increment(1);
        gauge!("ingest_last_run_ts").set(now.timestamp() as f64);
        tracing::info!(
            sources = sources.len(),
            entries = entries.len(),
            candidates = candidates.len(),
            seen = seen.len(),
            "scrape run finished"
        );
        Ok(candidates)
    }
}

/// Hands out pre-built batches in order; an `Err` batch fails that run.
#[derive(Default)]
pub struct StaticSource {
    batches: Mutex<VecDeque<std::result::Result<Vec<Candidate>, String>>>,
}

impl StaticSource {
    pub fn new<I>(batches: I) -> Self
    where
        I: IntoIterator<Item = std::result::Result<Vec<Candidate>, String>>,
    {
        Self {
            batches: Mutex::new(batches.into_iter().collect()),
        }
    }
}

#[async_trait]
impl CandidateSource for StaticSource {
    async fn collect(&self) -> Result<Vec<Candidate>> {
        let next = self
            .batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(Ok(batch)) => Ok(batch),
            Some(Err(reason)) => Err(anyhow!(reason)),
            None => Ok(Vec::new()),
        }
    }
}
