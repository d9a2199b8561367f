//! RSS 2.0 / Atom document parsing.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

/// Format-independent view of a feed item, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub published: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}
#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<AtomText>,
    content: Option<AtomText>,
}
#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}
#[derive(Debug, Default, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    text: String,
}

impl AtomEntry {
    fn alternate_link(&self) -> Option<String> {
        self.links
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| self.links.first())
            .and_then(|l| l.href.clone())
    }
}

/// Parse an RSS 2.0 or Atom document.
pub fn parse_feed(xml: &str) -> Result<Vec<RawItem>> {
    let xml_clean = scrub_html_entities_for_xml(xml);

    if let Ok(rss) = from_str::<Rss>(&xml_clean) {
        return Ok(rss
            .channel
            .item
            .into_iter()
            .map(|it| RawItem {
                title: it.title,
                link: it.link,
                published: it.pub_date,
                summary: it.description,
            })
            .collect());
    }

    if !xml_clean.contains("<feed") {
        return Err(anyhow!("document is neither RSS nor Atom"));
    }
    let atom: AtomFeed = from_str(&xml_clean).context("parsing atom xml")?;
    Ok(atom
        .entry
        .into_iter()
        .map(|e| {
            let link = e.alternate_link();
            RawItem {
                title: e.title.map(|t| t.text),
                link,
                published: e.published.or(e.updated),
                summary: e.summary.or(e.content).map(|t| t.text),
            }
        })
        .collect())
}

fn parse_to_unix(ts: &str) -> Option<i64> {
    let ts = ts.trim();
    OffsetDateTime::parse(ts, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(ts, &Rfc3339))
        .ok()
        .map(|dt| dt.unix_timestamp())
}

/// RFC 2822 or RFC 3339 input → RFC 3339 UTC; unparseable or missing → `now`.
pub fn normalize_published(raw: Option<&str>, now: DateTime<Utc>) -> String {
    raw.and_then(parse_to_unix)
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or(now)
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// XML has no named entities beyond the basic five; feeds still emit HTML ones.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
