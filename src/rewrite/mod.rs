//! Feed entry → article candidate via a generative text service.
//!
//! The service is asked for strict JSON; nothing about the schema is trusted.
//! The response is unwrapped from optional code fences, parsed leniently and
//! repaired: category coerced into the fixed set, excerpt clipped, tags
//! lowercased and capped, location resolved against the gazetteer.

pub mod llm;

use std::sync::Arc;

use chrono::NaiveDate;
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::{Map, Value};

use crate::article::{
    clip_chars, make_article_id, Candidate, Category, SourceRef, MAX_EXCERPT_CHARS, MAX_TAGS,
};
use crate::geo::{Gazetteer, GeoGuess};
use crate::ingest::types::FeedEntry;
use crate::throttle::Throttle;

pub use llm::{LlmClient, MockLlm, OpenAiClient};

#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("{0} not set")]
    MissingConfig(&'static str),
    #[error("upstream error: {0:#}")]
    Upstream(anyhow::Error),
    #[error("malformed model output: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub const SYSTEM_PROMPT: &str = "You are a senior tech journalist writing for Tech Pulse, a modern tech news portal. \
You rewrite source material into original, engaging tech news articles. \
Your writing is factual, concise, and accessible to a broad tech-savvy audience. \
Always write in English.";

/// Structured user prompt for one entry.
pub fn build_user_prompt(entry: &FeedEntry, locations_hint: &str) -> String {
    format!(
        r#"Rewrite the following RSS feed entry as a Tech Pulse article.

SOURCE: {source}
TITLE: {title}
LINK: {link}
PUBLISHED: {published}
SUMMARY:
{summary}

INSTRUCTIONS:
1. Choose the single best category from: {categories}
2. Write a new, compelling headline (title).
3. Write an excerpt of max {excerpt_max} characters summarising the key point.
4. Write the full article as 400-700 words in Markdown, factual and informative,
   in your own words (never copy the source verbatim). Use ## subheadings where useful.
5. Include 3-5 relevant hyperlinks in the body using Markdown [text](url) syntax.
   Only link real, well-known URLs (official sites, product pages, Wikipedia).
6. Generate 3-{tags_max} relevant tags (lowercase, no hashes).
7. Determine the primary geographic location relevant to this story.
   {locations_hint}
   If the article mentions a known company, map it to the company HQ.
   If you can identify a location, provide name, lat, lon, countryCode.
   If no location is relevant, set geo to null.

Respond with ONLY valid JSON (no markdown fences) in this exact schema:
{{
  "category": "string",
  "title": "string",
  "excerpt": "string",
  "content": "string (markdown)",
  "tags": ["string"],
  "geo": {{ "name": "string", "lat": number, "lon": number, "countryCode": "string" }} | null
}}"#,
        source = entry.source_name,
        title = entry.title,
        link = entry.link,
        published = entry.published,
        summary = entry.summary,
        categories = Category::prompt_list(),
        excerpt_max = MAX_EXCERPT_CHARS,
        tags_max = MAX_TAGS,
    )
}

/// Remove an optional ```json … ``` wrapper.
pub fn strip_code_fences(raw: &str) -> &str {
    static RE_FENCE: OnceCell<Regex> = OnceCell::new();
    let re = RE_FENCE.get_or_init(|| {
        Regex::new(r"(?s)^```[A-Za-z]*\s*(.*?)\s*```$").expect("static regex")
    });
    let trimmed = raw.trim();
    re.captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed)
}

/// Model output after validation and repair, before geo resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct RewriteOutput {
    pub category: Category,
    pub title: Option<String>,
    pub excerpt: String,
    pub content: String,
    pub tags: Vec<String>,
    pub geo: Option<GeoGuess>,
}

/// Parse and repair a raw completion. Only a non-object / non-JSON body is an error.
pub fn parse_response(raw: &str) -> Result<RewriteOutput, RewriteError> {
    let obj: Map<String, Value> = serde_json::from_str(strip_code_fences(raw))?;
    let text = |k: &str| obj.get(k).and_then(Value::as_str).map(str::trim);

    let tags = match obj.get("tags") {
        Some(Value::Array(items)) => items
            .iter()
            .take(MAX_TAGS)
            .map(|t| match t {
                Value::String(s) => s.trim().to_lowercase(),
                other => other.to_string().to_lowercase(),
            })
            .filter(|t| !t.is_empty())
            .collect(),
        _ => Vec::new(),
    };

    Ok(RewriteOutput {
        category: text("category")
            .map(Category::parse_or_default)
            .unwrap_or_default(),
        title: text("title").filter(|t| !t.is_empty()).map(str::to_string),
        excerpt: clip_chars(text("excerpt").unwrap_or_default(), MAX_EXCERPT_CHARS),
        content: text("content").unwrap_or_default().to_string(),
        tags,
        geo: obj.get("geo").and_then(GeoGuess::from_value),
    })
}

pub struct Rewriter {
    llm: Arc<dyn LlmClient>,
    gazetteer: Arc<Gazetteer>,
    throttle: Arc<dyn Throttle>,
}

impl Rewriter {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        gazetteer: Arc<Gazetteer>,
        throttle: Arc<dyn Throttle>,
    ) -> Self {
        Self {
            llm,
            gazetteer,
            throttle,
        }
    }

    pub async fn rewrite(
        &self,
        entry: &FeedEntry,
        today: NaiveDate,
    ) -> Result<Candidate, RewriteError> {
        self.throttle.acquire().await;

        let prompt = build_user_prompt(entry, &self.gazetteer.hint());
        let raw = self.llm.complete(SYSTEM_PROMPT, &prompt).await?;
        tracing::debug!(link = %entry.link, raw = %raw, "rewrite raw output");
        let out = parse_response(&raw)?;
        Ok(self.build_candidate(entry, out, today))
    }

    /// Rewrite a batch one entry at a time. Failures are logged and skipped.
    pub async fn rewrite_all(&self, entries: &[FeedEntry], today: NaiveDate) -> Vec<Candidate> {
        let mut out = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            tracing::info!(
                n = i + 1,
                of = entries.len(),
                provider = self.llm.provider_name(),
                title = %clip_chars(&entry.title, 80),
                "rewriting entry"
            );
            match self.rewrite(entry, today).await {
                Ok(c) => {
                    counter!("rewrite_success_total").increment(1);
                    out.push(c);
                }
                Err(e) => {
                    counter!("rewrite_failures_total").increment(1);
                    tracing::warn!(error = %e, link = %entry.link, "rewrite failed, skipping entry");
                }
            }
        }
        tracing::info!(candidates = out.len(), entries = entries.len(), "rewrite pass complete");
        out
    }

    fn build_candidate(&self, entry: &FeedEntry, out: RewriteOutput, today: NaiveDate) -> Candidate {
        let title = out.title.unwrap_or_else(|| entry.title.clone());
        Candidate {
            id: make_article_id(&title, today),
            category: out.category,
            title,
            excerpt: out.excerpt,
            content: out.content,
            tags: out.tags,
            geo: out.geo.as_ref().and_then(|g| self.gazetteer.resolve(g)),
            source: SourceRef {
                name: entry.source_name.clone(),
                url: entry.link.clone(),
            },
            image: None,
            date: entry.published.clone(),
            featured: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fences_are_stripped() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn bogus_category_and_too_many_tags_are_repaired() {
        let raw = r#"{"category":"bogus", "tags":["A","B","C","D","E","F","G","H"]}"#;
        let out = parse_response(raw).unwrap();
        assert_eq!(out.category, Category::Technology);
        assert_eq!(out.tags, vec!["a", "b", "c", "d", "e", "f", "g"]);
        assert!(out.title.is_none());
        assert!(out.geo.is_none());
    }

    #[test]
    fn excerpt_is_clipped_and_non_string_tags_coerced() {
        let raw = format!(
            r#"{{"category":"Space","excerpt":"{}","tags":[" Mars ", 42, true],"geo":null}}"#,
            "e".repeat(400)
        );
        let out = parse_response(&raw).unwrap();
        assert_eq!(out.category, Category::Space);
        assert_eq!(out.excerpt.chars().count(), MAX_EXCERPT_CHARS);
        assert_eq!(out.tags, vec!["mars", "42", "true"]);
    }

    #[test]
    fn tags_that_are_not_a_list_become_empty() {
        let out = parse_response(r#"{"tags":"ai, space"}"#).unwrap();
        assert!(out.tags.is_empty());
    }

    #[test]
    fn non_json_is_malformed() {
        assert!(matches!(
            parse_response("Sure! Here is your article"),
            Err(RewriteError::Malformed(_))
        ));
        assert!(matches!(parse_response("[1,2]"), Err(RewriteError::Malformed(_))));
    }

    #[test]
    fn prompt_carries_entry_and_hint() {
        let entry = FeedEntry {
            source_name: "Ars".into(),
            source_url: "https://ars/feed".into(),
            title: "Chip news".into(),
            link: "https://ars/1".into(),
            published: "2025-09-02T08:00:00Z".into(),
            summary: "A new chip.".into(),
        };
        let p = build_user_prompt(&entry, "Known locations: Zagreb");
        assert!(p.contains("TITLE: Chip news"));
        assert!(p.contains("Known locations: Zagreb"));
        assert!(p.contains("ai, gaming, space, technology, medicine, society, robotics"));
    }
}
