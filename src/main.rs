//! Tech Pulse pipeline bot: scheduled RSS scraping, rewriting, chat review
//! and publishing, plus a small health/status HTTP surface.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use tech_pulse_pipeline::{
    api::{self, AppState},
    config::Settings,
    geo::Gazetteer,
    ingest::{
        fetch::HttpFetcher,
        scheduler::{spawn_scrape_scheduler, ScrapeSchedulerCfg},
    },
    metrics::Metrics,
    pipeline::{Pipeline, SourceList},
    publish::{DryRunPublisher, GitHubRepo, Publisher, RepoPublisher},
    review::{
        store::InMemoryStore,
        telegram::{run_polling, TelegramBot},
        ReviewConfig, ReviewService,
    },
    rewrite::{OpenAiClient, Rewriter},
    throttle::FixedInterval,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let settings = Settings::from_env();
    tech_pulse_pipeline::init_tracing(settings.json_logs);
    settings.require_bot()?;

    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(error = ?e, "prometheus recorder not installed");
            None
        }
    };

    // --- Rewrite + ingest ---
    let gazetteer = Arc::new(Gazetteer::load_or_empty(&settings.geo_map_path));
    let llm = OpenAiClient::new(&settings.openai_api_key, &settings.openai_model)?;
    if settings.openai_api_key.is_empty() {
        tracing::warn!("OPENAI_API_KEY not set, every rewrite will fail");
    }
    let rewriter = Rewriter::new(
        Arc::new(llm),
        gazetteer,
        Arc::new(FixedInterval::new(settings.rewrite_delay)),
    );
    let pipeline = Pipeline::new(
        Arc::new(HttpFetcher::new()?),
        SourceList::Config {
            explicit: settings.sources_path.clone(),
            dir: settings.pipeline_dir.clone(),
        },
        rewriter,
        settings.seen_path.clone(),
    );

    // --- Publish ---
    let publisher: Arc<dyn Publisher> = if settings.auto_push {
        Arc::new(RepoPublisher::new(GitHubRepo::new(&settings.github)?))
    } else {
        tracing::info!("GIT_AUTO_PUSH=false, approved articles are rendered but not committed");
        Arc::new(DryRunPublisher)
    };

    // --- Review front-end ---
    let bot = Arc::new(TelegramBot::new(&settings.telegram_token)?);
    let review = Arc::new(ReviewService::new(
        ReviewConfig {
            admin_chat_id: settings.admin_chat_id,
            scrape_interval_minutes: settings.scrape_interval_minutes(),
            pending_ttl: settings.pending_ttl,
            edit_session_ttl: settings.edit_session_ttl,
        },
        bot.clone(),
        Arc::new(InMemoryStore::new()),
        publisher,
        Arc::new(pipeline),
        Arc::new(FixedInterval::new(Duration::from_secs(1))),
    ));

    // --- HTTP ---
    if settings.http_port != 0 {
        let app = api::router(
            AppState {
                review: review.clone(),
            },
            metrics.as_ref(),
        );
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", settings.http_port))
            .await
            .with_context(|| format!("binding HTTP port {}", settings.http_port))?;
        tracing::info!(port = settings.http_port, "health/status server listening");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = ?e, "http server stopped");
            }
        });
    }

    let _scheduler = spawn_scrape_scheduler(
        review.clone(),
        ScrapeSchedulerCfg::every(settings.scrape_interval),
    );

    tracing::info!("Tech Pulse bot is running. Press Ctrl+C to stop.");
    tokio::select! {
        _ = run_polling(bot, review) => {}
        res = tokio::signal::ctrl_c() => {
            res.context("listening for ctrl-c")?;
            tracing::info!("shutdown requested");
        }
    }
    Ok(())
}
