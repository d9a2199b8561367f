// src/ingest/types.rs
use anyhow::Result;

/// One new item from a feed, normalized for the rewriter.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct FeedEntry {
    pub source_name: String,
    pub source_url: String,
    pub title: String,
    /// Unique key for deduplication.
    pub link: String,
    /// RFC 3339, UTC.
    pub published: String,
    /// Plain text, capped at [`crate::ingest::SUMMARY_CAP`] chars.
    pub summary: String,
}

/// Raw document retrieval for a feed URL.
#[async_trait::async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}
