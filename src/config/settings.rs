// src/config/settings.rs
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};

/// Process configuration, read from the environment (after `.env` is loaded).
#[derive(Debug, Clone)]
pub struct Settings {
    pub telegram_token: String,
    pub admin_chat_id: i64,
    pub scrape_interval: Duration,
    pub openai_api_key: String,
    pub openai_model: String,
    pub github: GitHubSettings,
    pub auto_push: bool,
    pub sources_path: Option<PathBuf>,
    pub pipeline_dir: PathBuf,
    pub geo_map_path: PathBuf,
    pub seen_path: PathBuf,
    pub rewrite_delay: Duration,
    pub http_port: u16,
    pub pending_ttl: Duration,
    pub edit_session_ttl: Duration,
    pub json_logs: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GitHubSettings {
    pub token: String,
    /// `owner/name`
    pub repo: String,
    pub branch: String,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build settings from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let num = |k: &str, default: u64| get(k).and_then(|v| v.parse::<u64>().ok()).unwrap_or(default);

        let pipeline_dir = get("PIPELINE_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
        let geo_map_path = get("GEO_MAP_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| pipeline_dir.join("geo_map.json"));
        let seen_path = get("SEEN_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| pipeline_dir.join("seen_articles.json"));

        Self {
            telegram_token: get("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
            admin_chat_id: get("TELEGRAM_ADMIN_CHAT_ID")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            scrape_interval: Duration::from_secs(num("SCRAPE_INTERVAL_MINUTES", 30).saturating_mul(60)),
            openai_api_key: get("OPENAI_API_KEY").unwrap_or_default(),
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o".to_string()),
            github: GitHubSettings {
                token: get("GITHUB_TOKEN").unwrap_or_default(),
                repo: get("GITHUB_REPO").unwrap_or_default(),
                branch: get("GIT_BRANCH").unwrap_or_else(|| "main".to_string()),
            },
            auto_push: get("GIT_AUTO_PUSH")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(true),
            sources_path: get("RSS_SOURCES_PATH").map(PathBuf::from),
            pipeline_dir,
            geo_map_path,
            seen_path,
            rewrite_delay: Duration::from_secs(num("REWRITE_DELAY_SECS", 1)),
            http_port: get("HTTP_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            pending_ttl: Duration::from_secs(num("PENDING_TTL_HOURS", 72).saturating_mul(3600)),
            edit_session_ttl: Duration::from_secs(num("EDIT_SESSION_TTL_MINUTES", 15).saturating_mul(60)),
            json_logs: get("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
        }
    }

    /// The interactive front-end cannot start without bot credentials.
    pub fn require_bot(&self) -> Result<()> {
        if self.telegram_token.is_empty() {
            return Err(anyhow!("TELEGRAM_BOT_TOKEN not set"));
        }
        if self.admin_chat_id == 0 {
            return Err(anyhow!("TELEGRAM_ADMIN_CHAT_ID not set"));
        }
        Ok(())
    }

    pub fn scrape_interval_minutes(&self) -> u64 {
        self.scrape_interval.as_secs() / 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let s = settings(&[]);
        assert_eq!(s.scrape_interval_minutes(), 30);
        assert_eq!(s.openai_model, "gpt-4o");
        assert_eq!(s.github.branch, "main");
        assert!(s.auto_push);
        assert_eq!(s.http_port, 8080);
        assert_eq!(s.seen_path, PathBuf::from("./seen_articles.json"));
        assert_eq!(s.rewrite_delay, Duration::from_secs(1));
        assert!(s.require_bot().is_err());
    }

    #[test]
    fn explicit_values_win() {
        let s = settings(&[
            ("TELEGRAM_BOT_TOKEN", "tok"),
            ("TELEGRAM_ADMIN_CHAT_ID", "-100123"),
            ("SCRAPE_INTERVAL_MINUTES", "5"),
            ("GIT_AUTO_PUSH", "false"),
            ("PIPELINE_DIR", "/data"),
            ("HTTP_PORT", "0"),
            ("LOG_FORMAT", "JSON"),
        ]);
        assert!(s.require_bot().is_ok());
        assert_eq!(s.admin_chat_id, -100123);
        assert_eq!(s.scrape_interval, Duration::from_secs(300));
        assert!(!s.auto_push);
        assert_eq!(s.geo_map_path, PathBuf::from("/data/geo_map.json"));
        assert_eq!(s.http_port, 0);
        assert!(s.json_logs);
    }

    #[test]
    fn absurd_durations_saturate() {
        let s = settings(&[
            ("PENDING_TTL_HOURS", "99999999999999999"),
            ("EDIT_SESSION_TTL_MINUTES", "18446744073709551615"),
            ("SCRAPE_INTERVAL_MINUTES", "99999999999999999"),
        ]);
        assert_eq!(s.pending_ttl, Duration::from_secs(u64::MAX));
        assert_eq!(s.edit_session_ttl, Duration::from_secs(u64::MAX));
        assert_eq!(s.scrape_interval, Duration::from_secs(u64::MAX));
    }

    #[test]
    fn blank_token_counts_as_missing() {
        let s = settings(&[("TELEGRAM_BOT_TOKEN", "  "), ("TELEGRAM_ADMIN_CHAT_ID", "42")]);
        assert!(s.require_bot().unwrap_err().to_string().contains("TELEGRAM_BOT_TOKEN"));
    }
}
