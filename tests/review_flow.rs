// tests/review_flow.rs
//
// Review front-end driven through the `Inbound` events a chat transport would
// produce, with in-process fakes for chat, storage, candidate source and the
// content repository.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tokio::sync::Notify;

use tech_pulse_pipeline::article::{make_article_id, Candidate};
use tech_pulse_pipeline::pipeline::StaticSource;
use tech_pulse_pipeline::publish::{
    Article, MemoryRepo, PublishError, Published, Publisher, RepoPublisher,
};
use tech_pulse_pipeline::review::messenger::{
    Command, Inbound, MessageRef, Outbound, RecordingMessenger,
};
use tech_pulse_pipeline::review::store::{CandidateStore, InMemoryStore};
use tech_pulse_pipeline::review::{ReviewConfig, ReviewService};
use tech_pulse_pipeline::throttle::Unthrottled;

const ADMIN: i64 = 42;
const REVIEWER: i64 = 7;

struct Harness {
    service: Arc<ReviewService>,
    chat: Arc<RecordingMessenger>,
    store: Arc<InMemoryStore>,
    repo: Arc<MemoryRepo>,
}

fn config() -> ReviewConfig {
    ReviewConfig {
        admin_chat_id: ADMIN,
        scrape_interval_minutes: 30,
        pending_ttl: Duration::from_secs(72 * 3600),
        edit_session_ttl: Duration::from_secs(15 * 60),
    }
}

fn harness_with(source: StaticSource) -> Harness {
    let chat = Arc::new(RecordingMessenger::new());
    let store = Arc::new(InMemoryStore::new());
    let repo = Arc::new(MemoryRepo::new());
    let service = Arc::new(ReviewService::new(
        config(),
        chat.clone(),
        store.clone(),
        Arc::new(RepoPublisher::new(repo.clone())),
        Arc::new(source),
        Arc::new(Unthrottled),
    ));
    Harness {
        service,
        chat,
        store,
        repo,
    }
}

fn harness() -> Harness {
    harness_with(StaticSource::default())
}

fn candidate(id: &str, title: &str) -> Candidate {
    serde_json::from_value(json!({
        "id": id,
        "category": "space",
        "title": title,
        "excerpt": "Rover data suggests ancient water.",
        "content": "## Clay\n\nBody.",
        "tags": ["mars", "nasa"],
        "geo": {"name": "Pasadena, USA", "lat": 34.1478, "lon": -118.1445, "countryCode": "US"},
        "source": {"name": "Ars Technica", "url": "https://news.example/mars-clay"},
        "date": "2025-09-02T09:30:00Z"
    }))
    .unwrap()
}

fn press(data: &str) -> Inbound {
    Inbound::Button {
        callback_id: format!("cb-{data}"),
        chat_id: ADMIN,
        user_id: REVIEWER,
        message: MessageRef {
            chat_id: ADMIN,
            message_id: 1,
        },
        data: data.to_string(),
    }
}

fn say(text: &str) -> Inbound {
    Inbound::Text {
        chat_id: ADMIN,
        user_id: REVIEWER,
        text: text.to_string(),
    }
}

#[tokio::test]
async fn scrape_announces_and_stores_candidates() {
    let h = harness_with(StaticSource::new([Ok(vec![
        candidate("2025-09-02-mars-clay", "Mars rover finds clay"),
        candidate("", "Untitled launch"),
    ])]));

    h.service.run_scrape().await;

    assert_eq!(h.store.len().await, 2);
    let generated = make_article_id("Untitled launch", Utc::now().date_naive());
    assert!(h.store.get(&generated).await.is_some());

    let out = h.chat.outbound();
    assert_eq!(out.len(), 3);
    assert!(matches!(&out[0], Outbound::Sent { text, controls: None, .. } if text.contains("Found <b>2</b>")));
    match &out[1] {
        Outbound::Sent {
            text,
            controls: Some(c),
            ..
        } => {
            assert!(text.contains("Mars rover finds clay"));
            assert_eq!(c[0][0].data, "approve_2025-09-02-mars-clay");
        }
        other => panic!("expected a card, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_and_failed_scrapes_are_reported() {
    let h = harness_with(StaticSource::new([Ok(vec![]), Err("feeds down".to_string())]));

    h.service.run_scrape().await;
    assert_eq!(
        h.chat.last_text().as_deref(),
        Some("🔍 Scrape complete — no new articles found.")
    );

    h.service.run_scrape().await;
    assert_eq!(h.chat.last_text().as_deref(), Some("⚠️ Scrape error: feeds down"));
    assert_eq!(h.store.len().await, 0);
}

#[tokio::test]
async fn expired_candidates_are_purged_before_a_scrape() {
    let h = harness();
    h.store.put_at(
        candidate("stale", "Old news"),
        Utc::now() - chrono::Duration::hours(100),
    );
    h.store.put(candidate("fresh", "New news")).await;

    h.service.run_scrape().await;

    assert!(h.store.get("stale").await.is_none());
    assert!(h.store.get("fresh").await.is_some());
}

#[tokio::test]
async fn approve_publishes_and_removes_candidate() {
    let h = harness();
    h.store.put(candidate("2025-09-02-mars-clay", "Mars rover finds clay")).await;

    h.service.handle(press("approve_2025-09-02-mars-clay")).await;

    assert!(h.store.get("2025-09-02-mars-clay").await.is_none());
    assert_eq!(h.service.history().total(), 1);
    let recent = h.service.status().await.recent;
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, "2025-09-02-mars-clay");
    assert_eq!(recent[0].title, "Mars rover finds clay");
    assert_eq!(
        recent[0].url.as_deref(),
        Some("memory://content/space/2025-09-02-mars-clay.mdx")
    );
    let doc = h
        .repo
        .content("content/space/2025-09-02-mars-clay.mdx")
        .expect("document written");
    assert!(doc.contains("title: \"Mars rover finds clay\""));
    assert!(doc.contains("approved: true"));
    assert_eq!(h.repo.commits(), vec!["Add article: Mars rover finds clay"]);

    let texts = h.chat.texts();
    assert!(texts[0].starts_with("⏳ Publishing: <b>Mars rover finds clay</b>"));
    assert!(texts[1].starts_with("✅ <b>Published:</b> Mars rover finds clay"));

    // A late second press finds nothing to publish.
    h.service.handle(press("approve_2025-09-02-mars-clay")).await;
    assert!(h.chat.last_text().unwrap().contains("no longer available"));
    assert_eq!(h.repo.commits().len(), 1);
}

#[tokio::test]
async fn failed_publish_keeps_candidate_and_reports_reason() {
    let h = harness();
    h.store.put(candidate("2025-09-02-mars-clay", "Mars rover finds clay")).await;
    h.repo.fail_with(500, "boom");

    h.service.handle(press("approve_2025-09-02-mars-clay")).await;

    assert!(h.store.get("2025-09-02-mars-clay").await.is_some());
    assert_eq!(h.service.history().total(), 0);
    let last = h.chat.outbound().pop().unwrap();
    match last {
        Outbound::Edited { text, controls, .. } => {
            assert!(text.starts_with("❌ <b>Publish failed:</b> Mars rover finds clay"));
            assert!(text.contains("boom"));
            // Controls stay so the reviewer can retry by hand.
            assert!(controls.is_some());
        }
        other => panic!("expected an edit, got {other:?}"),
    }

    // Fixing the backend and re-approving works.
    h.repo.recover();
    h.service.handle(press("approve_2025-09-02-mars-clay")).await;
    assert!(h.store.get("2025-09-02-mars-clay").await.is_none());
    assert_eq!(h.service.history().total(), 1);
}

#[tokio::test]
async fn reject_removes_candidate_without_writing() {
    let h = harness();
    h.store.put(candidate("2025-09-02-mars-clay", "Mars rover finds clay")).await;

    h.service.handle(press("reject_2025-09-02-mars-clay")).await;

    assert!(h.store.get("2025-09-02-mars-clay").await.is_none());
    assert!(h.repo.paths().is_empty());
    assert_eq!(
        h.chat.last_text().as_deref(),
        Some("❌ <b>Rejected:</b> Mars rover finds clay")
    );
}

#[tokio::test]
async fn title_edit_rekeys_and_preserves_other_fields() {
    let h = harness();
    let original = candidate("2025-09-02-mars-clay", "Mars rover finds clay");
    h.store.put(original.clone()).await;

    h.service.handle(press("edit_2025-09-02-mars-clay")).await;
    assert!(h.chat.last_text().unwrap().ends_with("Send me the new title:"));

    h.service.handle(say("  Clay on Mars points to ancient lakes ")).await;

    let new_id = make_article_id("Clay on Mars points to ancient lakes", Utc::now().date_naive());
    assert!(h.store.get("2025-09-02-mars-clay").await.is_none());
    let edited = h.store.get(&new_id).await.expect("re-keyed candidate");
    assert_eq!(edited.title, "Clay on Mars points to ancient lakes");
    assert_eq!(
        Candidate {
            id: original.id.clone(),
            title: original.title.clone(),
            ..edited.clone()
        },
        original
    );

    match h.chat.outbound().pop().unwrap() {
        Outbound::Sent {
            text,
            controls: Some(c),
            ..
        } => {
            assert!(text.starts_with("✅ Title updated!"));
            assert_eq!(c[0][0].data, format!("approve_{new_id}"));
        }
        other => panic!("expected re-presented card, got {other:?}"),
    }

    // Session is consumed: further chatter does nothing.
    let before = h.chat.outbound().len();
    h.service.handle(say("hello?")).await;
    assert_eq!(h.chat.outbound().len(), before);
}

#[tokio::test]
async fn edit_onto_a_pending_title_keeps_both_candidates() {
    let h = harness();
    let taken = make_article_id("Mars rover finds clay", Utc::now().date_naive());
    h.store.put(candidate(&taken, "Mars rover finds clay")).await;
    h.store.put(candidate("b-id", "Another rover story")).await;

    h.service.handle(press("edit_b-id")).await;
    h.service.handle(say("Mars rover finds clay")).await;

    assert_eq!(h.store.len().await, 2);
    assert_eq!(h.store.get(&taken).await.unwrap().title, "Mars rover finds clay");
    let moved = h.store.get(&format!("{taken}-2")).await.expect("disambiguated id");
    assert_eq!(moved.source.url, "https://news.example/mars-clay");
    assert!(h.store.get("b-id").await.is_none());
}

#[tokio::test]
async fn scraped_candidate_does_not_replace_a_pending_one() {
    let h = harness_with(StaticSource::new([Ok(vec![candidate(
        "2025-09-02-mars-clay",
        "Mars rover finds clay, again",
    )])]));
    h.store.put(candidate("2025-09-02-mars-clay", "Mars rover finds clay")).await;

    h.service.run_scrape().await;

    assert_eq!(h.store.len().await, 2);
    assert_eq!(
        h.store.get("2025-09-02-mars-clay").await.unwrap().title,
        "Mars rover finds clay"
    );
    let fresh = h.store.get("2025-09-02-mars-clay-2").await.expect("suffixed id");
    assert_eq!(fresh.title, "Mars rover finds clay, again");
    match h.chat.outbound().pop().unwrap() {
        Outbound::Sent { controls: Some(c), .. } => {
            assert_eq!(c[0][0].data, "approve_2025-09-02-mars-clay-2");
        }
        other => panic!("expected a card, got {other:?}"),
    }
}

#[tokio::test]
async fn edit_of_vanished_candidate_is_aborted() {
    let h = harness();
    h.store.put(candidate("2025-09-02-mars-clay", "Mars rover finds clay")).await;

    h.service.handle(press("edit_2025-09-02-mars-clay")).await;
    h.service.handle(press("reject_2025-09-02-mars-clay")).await;
    h.service.handle(say("Too late")).await;

    assert_eq!(
        h.chat.last_text().as_deref(),
        Some("⚠️ Article no longer available.")
    );
    assert_eq!(h.store.len().await, 0);
}

#[tokio::test]
async fn empty_title_keeps_session_open() {
    let h = harness();
    h.store.put(candidate("2025-09-02-mars-clay", "Mars rover finds clay")).await;

    h.service.handle(press("edit_2025-09-02-mars-clay")).await;
    h.service.handle(say("   ")).await;
    assert!(h.chat.last_text().unwrap().starts_with("Title cannot be empty"));
    assert!(h.store.get("2025-09-02-mars-clay").await.is_some());

    h.service.handle(say("Clay!")).await;
    assert_eq!(h.store.len().await, 1);
    assert!(h.store.get("2025-09-02-mars-clay").await.is_none());
}

#[tokio::test]
async fn other_chats_are_ignored() {
    let h = harness();
    h.store.put(candidate("x", "X")).await;

    h.service
        .handle(Inbound::Command {
            chat_id: 999,
            command: Command::Status,
        })
        .await;
    h.service
        .handle(Inbound::Button {
            callback_id: "cb".into(),
            chat_id: 999,
            user_id: 1,
            message: MessageRef {
                chat_id: 999,
                message_id: 1,
            },
            data: "reject_x".into(),
        })
        .await;

    assert!(h.chat.outbound().is_empty());
    assert!(h.store.get("x").await.is_some());
}

#[tokio::test]
async fn commands_status_and_test() {
    let h = harness();

    h.service
        .handle(Inbound::Command {
            chat_id: ADMIN,
            command: Command::Test,
        })
        .await;
    let pending = h.store.list().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].geo.as_ref().unwrap().country_code, "HR");

    h.service
        .handle(Inbound::Command {
            chat_id: ADMIN,
            command: Command::Status,
        })
        .await;
    let status = h.chat.last_text().unwrap();
    assert!(status.contains("Pending candidates: 1"));
    assert!(status.contains("Published this session: 0"));
    assert!(status.contains("Scrape interval: 30 min"));

    let snap = h.service.status().await;
    assert_eq!(snap.pending, 1);
}

/// Holds the first publish open until released.
struct GatedPublisher {
    entered: Notify,
    release: Notify,
    inner: RepoPublisher<Arc<MemoryRepo>>,
}

#[async_trait]
impl Publisher for GatedPublisher {
    async fn publish(&self, article: &Article) -> Result<Published, PublishError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.publish(article).await
    }
}

#[tokio::test]
async fn double_approve_publishes_once() {
    let chat = Arc::new(RecordingMessenger::new());
    let store = Arc::new(InMemoryStore::new());
    let repo = Arc::new(MemoryRepo::new());
    let publisher = Arc::new(GatedPublisher {
        entered: Notify::new(),
        release: Notify::new(),
        inner: RepoPublisher::new(repo.clone()),
    });
    let service = Arc::new(ReviewService::new(
        config(),
        chat.clone(),
        store.clone(),
        publisher.clone(),
        Arc::new(StaticSource::default()),
        Arc::new(Unthrottled),
    ));
    store.put(candidate("2025-09-02-mars-clay", "Mars rover finds clay")).await;

    let first = {
        let svc = service.clone();
        tokio::spawn(async move { svc.handle(press("approve_2025-09-02-mars-clay")).await })
    };
    publisher.entered.notified().await;

    // Second press while the first is still publishing.
    service.handle(press("approve_2025-09-02-mars-clay")).await;
    publisher.release.notify_one();
    first.await.unwrap();

    assert_eq!(repo.commits().len(), 1);
    assert!(chat.outbound().iter().any(|o| matches!(
        o,
        Outbound::Acked { notice: Some(n), .. } if n.contains("Already being processed")
    )));
    assert!(store.get("2025-09-02-mars-clay").await.is_none());
}
