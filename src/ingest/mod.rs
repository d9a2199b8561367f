// src/ingest/mod.rs
pub mod feed;
pub mod fetch;
pub mod scheduler;
pub mod seen;
pub mod types;

use chrono::{DateTime, Utc};
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::config::FeedSource;
use crate::ingest::feed::{normalize_published, parse_feed};
use crate::ingest::seen::SeenSet;
use crate::ingest::types::{FeedEntry, FeedFetcher};

/// Summary cap in characters; bounds the rewriter prompt.
pub const SUMMARY_CAP: usize = 2000;

/// HTML fragment → plain text, capped at [`SUMMARY_CAP`] chars.
///
/// Tags are stripped from the raw fragment before entities are decoded, so
/// text the feed escaped on purpose (`5 &lt; 10`) is kept as text.
pub fn normalize_text(s: &str) -> String {
    // 1) Strip tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)<[^>]*>").expect("static regex"));
    let stripped = re_tags.replace_all(s, " ");

    // 2) HTML entity decode
    let mut out = html_escape::decode_html_entities(&stripped).to_string();

    // 3) Collapse whitespace (incl. NBSP)
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"[\s\u{00A0}]+").expect("static regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 4) Length cap
    if out.chars().count() > SUMMARY_CAP {
        out = out.chars().take(SUMMARY_CAP).collect();
    }
    out
}

/// Fetch every source and emit entries whose link is not yet in `seen`.
///
/// Links are added to `seen` as they are emitted, so an item carried by two
/// overlapping feeds only comes out once. A failing source is logged and skipped.
/// Persisting `seen` is the caller's job.
pub async fn run_once(
    fetcher: &dyn FeedFetcher,
    sources: &[FeedSource],
    seen: &mut SeenSet,
    now: DateTime<Utc>,
) -> Vec<FeedEntry> {
    crate::metrics::describe_metrics();

    let mut out = Vec::new();
    for src in sources {
        if src.url.is_empty() {
            continue;
        }
        tracing::info!(source = %src.name, url = %src.url, "fetching feed");

        let items = match fetcher.fetch(&src.url).await.and_then(|body| parse_feed(&body)) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = ?e, source = %src.name, "feed error, skipping source");
                counter!("ingest_feed_errors_total").increment(1);
                continue;
            }
        };

        for it in items {
            let link = it.link.as_deref().map(str::trim).unwrap_or_default();
            if link.is_empty() || !seen.insert(link) {
                continue;
            }
            let title = it
                .title
                .as_deref()
                .map(normalize_text)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled".to_string());
            out.push(FeedEntry {
                source_name: src.name.clone(),
                source_url: src.url.clone(),
                title,
                link: link.to_string(),
                published: normalize_published(it.published.as_deref(), now),
                summary: normalize_text(it.summary.as_deref().unwrap_or_default()),
            });
        }
    }

    counter!("ingest_entries_total").increment(out.len() as u64);
    tracing::info!(new_entries = out.len(), "ingest pass complete");
    out
}
