//! Reviewer-facing message text and action controls.

use html_escape::encode_text;

use super::messenger::{Button, Controls};
use crate::article::{clip_chars, Candidate};

const CARD_EXCERPT_CHARS: usize = 200;
const CARD_TAGS: usize = 5;

/// Button payload verb. Encoded as `<verb>_<id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Approve,
    Reject,
    Edit,
}

impl Action {
    fn verb(self) -> &'static str {
        match self {
            Action::Approve => "approve",
            Action::Reject => "reject",
            Action::Edit => "edit",
        }
    }

    pub fn token(self, id: &str) -> String {
        format!("{}_{id}", self.verb())
    }

    /// Split on the first `_`; ids may contain further underscores.
    pub fn parse(data: &str) -> Option<(Action, &str)> {
        let (verb, id) = data.split_once('_')?;
        let action = match verb {
            "approve" => Action::Approve,
            "reject" => Action::Reject,
            "edit" => Action::Edit,
            _ => return None,
        };
        (!id.is_empty()).then_some((action, id))
    }
}

pub fn controls(id: &str) -> Controls {
    vec![
        vec![
            Button::new("✅ Approve", Action::Approve.token(id)),
            Button::new("❌ Reject", Action::Reject.token(id)),
        ],
        vec![Button::new("✏️ Edit Title", Action::Edit.token(id))],
    ]
}

pub fn format_candidate(c: &Candidate) -> String {
    let location = c
        .geo
        .as_ref()
        .map(|g| g.name.as_str())
        .unwrap_or("Global");
    let tags = c
        .tags
        .iter()
        .take(CARD_TAGS)
        .map(|t| format!("#{}", t.replace('-', "_")))
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        "📰 <b>NEW ARTICLE CANDIDATE</b>\n\n\
         Category: {emoji} <b>{category}</b>\n\
         Title: <b>{title}</b>\n\n\
         Excerpt: <i>{excerpt}</i>\n\n\
         Source: {source}\n\
         Location: 📍 {location}\n\
         Tags: {tags}\n",
        emoji = c.category.emoji(),
        category = c.category.as_str().to_uppercase(),
        title = encode_text(&c.title),
        excerpt = encode_text(&clip_chars(&c.excerpt, CARD_EXCERPT_CHARS)),
        source = encode_text(&c.source.name),
        location = encode_text(location),
        tags = encode_text(&tags),
    )
}

pub fn help_text() -> String {
    "🛰️ <b>Tech Pulse Pipeline Bot</b>\n\n\
     Commands:\n\
     /scrape - Manually trigger a scrape\n\
     /status - Show bot status\n\
     /test - Send a test article candidate\n\n\
     I will periodically scrape RSS feeds and send you article \
     candidates for approval. Approved articles are automatically \
     published to Tech Pulse."
        .to_string()
}

pub fn status_text(pending: usize, published: u64, interval_minutes: u64) -> String {
    let interval = if interval_minutes == 0 {
        "disabled".to_string()
    } else {
        format!("{interval_minutes} min")
    };
    format!(
        "📊 <b>Tech Pulse Status</b>\n\n\
         Pending candidates: {pending}\n\
         Published this session: {published}\n\
         Scrape interval: {interval}"
    )
}
