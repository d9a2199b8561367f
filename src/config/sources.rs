// src/config/sources.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_SOURCES_PATH: &str = "RSS_SOURCES_PATH";

/// A configured feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedSource {
    #[serde(default = "unknown_name")]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

fn unknown_name() -> String {
    "Unknown".to_string()
}

#[derive(Deserialize)]
struct SourcesFile {
    #[serde(default)]
    sources: Vec<FeedSource>,
}

/// Load sources from an explicit path. Supports TOML or JSON formats.
pub fn load_sources_from(path: &Path) -> Result<Vec<FeedSource>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading feed sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
}

/// Lookup order:
/// 1) explicit path (from `$RSS_SOURCES_PATH`)
/// 2) `<dir>/rss_sources.toml`
/// 3) `<dir>/rss_sources.json`
pub fn load_sources_default(explicit: Option<&Path>, dir: &Path) -> Result<Vec<FeedSource>> {
    if let Some(p) = explicit {
        if p.exists() {
            return load_sources_from(p);
        }
        return Err(anyhow!("{ENV_SOURCES_PATH} points to non-existent path"));
    }
    let toml_p: PathBuf = dir.join("rss_sources.toml");
    if toml_p.exists() {
        return load_sources_from(&toml_p);
    }
    let json_p: PathBuf = dir.join("rss_sources.json");
    if json_p.exists() {
        return load_sources_from(&json_p);
    }
    Ok(Vec::new())
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<FeedSource>> {
    if hint_ext == "toml" {
        return parse_toml(s);
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    parse_toml(s).map_err(|_| anyhow!("unsupported feed sources format"))
}

fn parse_toml(s: &str) -> Result<Vec<FeedSource>> {
    let v: SourcesFile = toml::from_str(s)?;
    Ok(clean_list(v.sources))
}

fn parse_json(s: &str) -> Result<Vec<FeedSource>> {
    let v: SourcesFile = serde_json::from_str(s)?;
    Ok(clean_list(v.sources))
}

/// Drop entries without a URL; keep configured order.
fn clean_list(items: Vec<FeedSource>) -> Vec<FeedSource> {
    items
        .into_iter()
        .filter_map(|mut it| {
            it.url = it.url.trim().to_string();
            if it.url.is_empty() {
                return None;
            }
            if it.name.trim().is_empty() {
                it.name = unknown_name();
            }
            Some(it)
        })
        .collect()
}
