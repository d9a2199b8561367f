//! Editorial review over chat.
//!
//! Candidates move `pending → {published, rejected}`; a title edit re-keys a
//! pending candidate under a fresh id. Every action on one id runs under a
//! [`store::Claim`], so a double-pressed Approve cannot publish twice.

pub mod format;
pub mod messenger;
pub mod store;
pub mod telegram;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use html_escape::encode_text;
use metrics::{counter, gauge};
use serde::Serialize;

use crate::article::{disambiguated_id, make_article_id, Candidate, Category, GeoRef, ImageRef, SourceRef};
use crate::pipeline::CandidateSource;
use crate::publish::{Article, Publisher};
use crate::throttle::Throttle;
use format::{controls, format_candidate, help_text, status_text, Action};
use messenger::{Command, Inbound, MessageRef, Messenger};
use store::{CandidateStore, Claim, Claims, EditSessions, PublishedEntry, PublishedHistory};

const BUSY_NOTICE: &str = "⏳ Already being processed";
/// Publications listed in the status snapshot.
const RECENT_IN_STATUS: usize = 5;
/// Highest `-n` suffix tried when a title slugs to an id already pending.
const MAX_ID_SUFFIX: u32 = 50;
const GONE_NOTICE: &str = "⚠️ Article no longer available (expired or already processed).";

#[derive(Debug, Clone)]
pub struct ReviewConfig {
    /// Only this chat is served.
    pub admin_chat_id: i64,
    pub scrape_interval_minutes: u64,
    pub pending_ttl: Duration,
    pub edit_session_ttl: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub pending: usize,
    pub published: u64,
    pub scrape_interval_minutes: u64,
    /// Most recent publications, oldest first.
    pub recent: Vec<PublishedEntry>,
}

pub struct ReviewService {
    cfg: ReviewConfig,
    messenger: Arc<dyn Messenger>,
    store: Arc<dyn CandidateStore>,
    publisher: Arc<dyn Publisher>,
    source: Arc<dyn CandidateSource>,
    pacing: Arc<dyn Throttle>,
    sessions: EditSessions,
    claims: Claims,
    history: PublishedHistory,
}

impl ReviewService {
    pub fn new(
        cfg: ReviewConfig,
        messenger: Arc<dyn Messenger>,
        store: Arc<dyn CandidateStore>,
        publisher: Arc<dyn Publisher>,
        source: Arc<dyn CandidateSource>,
        pacing: Arc<dyn Throttle>,
    ) -> Self {
        crate::metrics::describe_metrics();
        Self {
            sessions: EditSessions::new(cfg.edit_session_ttl),
            claims: Claims::new(),
            history: PublishedHistory::with_capacity(500),
            cfg,
            messenger,
            store,
            publisher,
            source,
            pacing,
        }
    }

    pub fn history(&self) -> &PublishedHistory {
        &self.history
    }

    pub async fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            pending: self.store.len().await,
            published: self.history.total(),
            scrape_interval_minutes: self.cfg.scrape_interval_minutes,
            recent: self.history.snapshot_last_n(RECENT_IN_STATUS),
        }
    }

    /// Entry point for every inbound event. Errors are logged, never propagated.
    pub async fn handle(&self, event: Inbound) {
        if event.chat_id() != self.cfg.admin_chat_id {
            tracing::debug!(chat_id = event.chat_id(), "ignoring update from non-admin chat");
            return;
        }
        let res = match event {
            Inbound::Command { chat_id, command } => self.on_command(chat_id, command).await,
            Inbound::Button {
                callback_id,
                user_id,
                message,
                data,
                ..
            } => self.on_button(&callback_id, user_id, message, &data).await,
            Inbound::Text {
                chat_id,
                user_id,
                text,
            } => self.on_text(chat_id, user_id, &text).await,
        };
        if let Err(e) = res {
            tracing::warn!(error = ?e, "review handler failed");
        }
    }

    async fn on_command(&self, chat_id: i64, command: Command) -> Result<()> {
        match command {
            Command::Start => {
                self.messenger.send(chat_id, &help_text(), None).await?;
            }
            Command::Status => {
                let s = self.status().await;
                let text = status_text(s.pending, s.published, s.scrape_interval_minutes);
                self.messenger.send(chat_id, &text, None).await?;
            }
            Command::Scrape => {
                self.messenger.send(chat_id, "🔍 Scraping feeds...", None).await?;
                self.run_scrape().await;
            }
            Command::Test => {
                let c = test_candidate();
                self.store.put(c.clone()).await;
                self.update_pending_gauge().await;
                self.messenger
                    .send(chat_id, &format_candidate(&c), Some(&controls(&c.id)))
                    .await?;
            }
            Command::Other(name) => {
                tracing::debug!(command = %name, "unknown command");
            }
        }
        Ok(())
    }

    /// Purge expired candidates, collect fresh ones and announce each to the admin.
    pub async fn run_scrape(&self) {
        let ttl = chrono::Duration::from_std(self.cfg.pending_ttl).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now().checked_sub_signed(ttl).unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
        let purged = self.store.purge_older_than(cutoff).await;
        if purged > 0 {
            tracing::info!(purged, "expired pending candidates dropped");
        }

        let admin = self.cfg.admin_chat_id;
        let res = match self.source.collect().await {
            Ok(candidates) => self.announce(candidates).await,
            Err(e) => {
                tracing::error!(error = ?e, "scrape failed");
                self.messenger
                    .send(admin, &format!("⚠️ Scrape error: {}", encode_text(&format!("{e:#}"))), None)
                    .await
                    .map(|_| ())
            }
        };
        if let Err(e) = res {
            tracing::warn!(error = ?e, "failed to deliver scrape results");
        }
        self.update_pending_gauge().await;
    }

    async fn announce(&self, candidates: Vec<Candidate>) -> Result<()> {
        let admin = self.cfg.admin_chat_id;
        if candidates.is_empty() {
            self.messenger
                .send(admin, "🔍 Scrape complete — no new articles found.", None)
                .await?;
            return Ok(());
        }

        self.messenger
            .send(
                admin,
                &format!("🔍 Found <b>{}</b> new article(s):", candidates.len()),
                None,
            )
            .await?;

        for mut c in candidates {
            if c.id.trim().is_empty() {
                c.id = make_article_id(&c.title, Utc::now().date_naive());
            }
            let Some((id, _claim)) = self.reserve_id(&c.id).await else {
                tracing::warn!(id = %c.id, "no free id for scraped candidate, skipped");
                continue;
            };
            c.id = id;
            self.store.put(c.clone()).await;
            self.pacing.acquire().await;
            self.messenger
                .send(admin, &format_candidate(&c), Some(&controls(&c.id)))
                .await?;
        }
        Ok(())
    }

    async fn on_button(
        &self,
        callback_id: &str,
        user_id: i64,
        message: MessageRef,
        data: &str,
    ) -> Result<()> {
        let Some((action, id)) = Action::parse(data) else {
            tracing::debug!(data, "unrecognized button payload");
            return self.messenger.ack(callback_id, None).await;
        };

        let Some(_claim) = self.claims.try_claim(id) else {
            return self.messenger.ack(callback_id, Some(BUSY_NOTICE)).await;
        };
        self.messenger.ack(callback_id, None).await?;

        let Some(candidate) = self.store.get(id).await else {
            return self.messenger.edit(message, GONE_NOTICE, None).await;
        };

        match action {
            Action::Approve => self.approve(message, candidate).await,
            Action::Reject => {
                self.store.delete(id).await;
                self.update_pending_gauge().await;
                tracing::info!(id, "candidate rejected");
                self.messenger
                    .edit(
                        message,
                        &format!("❌ <b>Rejected:</b> {}", encode_text(&candidate.title)),
                        None,
                    )
                    .await
            }
            Action::Edit => {
                self.sessions.begin(user_id, id);
                self.messenger
                    .edit(
                        message,
                        &format!(
                            "✏️ <b>Editing:</b> {}\n\nSend me the new title:",
                            encode_text(&candidate.title)
                        ),
                        None,
                    )
                    .await
            }
        }
    }

    /// Runs with the candidate's claim held by the caller.
    async fn approve(&self, message: MessageRef, candidate: Candidate) -> Result<()> {
        let title = encode_text(&candidate.title).to_string();
        self.messenger
            .edit(message, &format!("⏳ Publishing: <b>{title}</b>..."), None)
            .await?;

        let article = Article::from_candidate(&candidate, Utc::now());
        match self.publisher.publish(&article).await {
            Ok(published) => {
                counter!("publish_success_total").increment(1);
                self.store.delete(&candidate.id).await;
                self.history
                    .push(&candidate.id, &candidate.title, published.url.clone());
                self.update_pending_gauge().await;
                tracing::info!(id = %candidate.id, path = %published.path, "candidate published");

                let link = published
                    .url
                    .as_deref()
                    .map(|u| format!("\n🔗 {}", encode_text(u)))
                    .unwrap_or_default();
                self.messenger
                    .edit(
                        message,
                        &format!(
                            "✅ <b>Published:</b> {title}\n\n🌐 Auto-deploy triggered. Live in ~60 seconds.{link}"
                        ),
                        None,
                    )
                    .await
            }
            Err(e) => {
                counter!("publish_failures_total").increment(1);
                tracing::warn!(error = %e, id = %candidate.id, "publish failed, candidate kept");
                self.messenger
                    .edit(
                        message,
                        &format!(
                            "❌ <b>Publish failed:</b> {title}\nError: {}",
                            encode_text(&e.to_string())
                        ),
                        Some(&controls(&candidate.id)),
                    )
                    .await
            }
        }
    }

    async fn on_text(&self, chat_id: i64, user_id: i64, text: &str) -> Result<()> {
        let Some(id) = self.sessions.take(user_id) else {
            return Ok(());
        };

        let new_title = text.trim();
        if new_title.is_empty() {
            self.sessions.begin(user_id, &id);
            self.messenger
                .send(chat_id, "Title cannot be empty. Send me the new title:", None)
                .await?;
            return Ok(());
        }

        let Some(_claim) = self.claims.try_claim(&id) else {
            self.sessions.begin(user_id, &id);
            self.messenger
                .send(chat_id, "⏳ Article is being processed, send the title again shortly.", None)
                .await?;
            return Ok(());
        };

        let Some(mut candidate) = self.store.get(&id).await else {
            self.messenger
                .send(chat_id, "⚠️ Article no longer available.", None)
                .await?;
            return Ok(());
        };

        candidate.retitle(new_title, Utc::now().date_naive());
        let _new_claim = if candidate.id == id {
            None
        } else {
            let Some((new_id, claim)) = self.reserve_id(&candidate.id).await else {
                self.sessions.begin(user_id, &id);
                self.messenger
                    .send(
                        chat_id,
                        "⚠️ Too many pending articles share that title. Send a different title:",
                        None,
                    )
                    .await?;
                return Ok(());
            };
            candidate.id = new_id;
            Some(claim)
        };
        self.store.delete(&id).await;
        self.store.put(candidate.clone()).await;
        tracing::info!(old_id = %id, new_id = %candidate.id, "candidate retitled");

        self.messenger
            .send(
                chat_id,
                &format!("✅ Title updated!\n\n{}", format_candidate(&candidate)),
                Some(&controls(&candidate.id)),
            )
            .await?;
        Ok(())
    }

    /// Claim the first id in `base`, `base-2`, `base-3`, ... that is neither
    /// pending nor held by another action. The claim covers the store insert.
    async fn reserve_id(&self, base: &str) -> Option<(String, Claim<'_>)> {
        for n in 1..=MAX_ID_SUFFIX {
            let id = if n == 1 {
                base.to_string()
            } else {
                disambiguated_id(base, n)
            };
            if let Some(claim) = self.claims.try_claim(&id) {
                if self.store.get(&id).await.is_none() {
                    return Some((id, claim));
                }
            }
        }
        None
    }

    async fn update_pending_gauge(&self) {
        gauge!("review_pending").set(self.store.len().await as f64);
    }
}

/// Fixed candidate used by `/test` to exercise the publish path.
pub fn test_candidate() -> Candidate {
    let now = Utc::now();
    Candidate {
        id: make_article_id("Test Article Pipeline Check", now.date_naive()),
        category: Category::Technology,
        title: "Test Article - Pipeline Check".into(),
        excerpt: "This is a test article to verify the pipeline is working correctly.".into(),
        content: "## Test Article\n\nThis is a test article generated by the Tech Pulse pipeline bot \
to verify that the publishing system works correctly.\n\n## Verification\n\nIf you see this on the \
website after approving, the pipeline is fully operational."
            .into(),
        tags: vec!["test".into(), "pipeline".into()],
        geo: Some(GeoRef {
            name: "Zagreb, Croatia".into(),
            lat: 45.815,
            lon: 15.9819,
            country_code: "HR".into(),
        }),
        source: SourceRef {
            name: "Tech Pulse Test".into(),
            url: "https://tech-pulse-delta.vercel.app".into(),
        },
        image: Some(ImageRef {
            url: "/images/articles/test.jpg".into(),
            alt: "Test article image".into(),
        }),
        date: now.to_rfc3339_opts(SecondsFormat::Secs, true),
        featured: false,
    }
}
