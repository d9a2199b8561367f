//! Article domain types shared by the rewriter, the review front-end and the publisher.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};
use unicode_normalization::UnicodeNormalization;

/// Slug length cap. Keeps `approve_<date>-<slug>` within Telegram's 64-byte callback payload.
pub const MAX_SLUG_LEN: usize = 44;

/// Excerpt length cap, in characters.
pub const MAX_EXCERPT_CHARS: usize = 250;

/// Upper bound on the tag list.
pub const MAX_TAGS: usize = 7;

/// Fixed editorial category set. Unknown values coerce to [`Category::Technology`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(from = "String")]
pub enum Category {
    Ai,
    Gaming,
    Space,
    #[default]
    Technology,
    Medicine,
    Society,
    Robotics,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Ai,
        Category::Gaming,
        Category::Space,
        Category::Technology,
        Category::Medicine,
        Category::Society,
        Category::Robotics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Ai => "ai",
            Category::Gaming => "gaming",
            Category::Space => "space",
            Category::Technology => "technology",
            Category::Medicine => "medicine",
            Category::Society => "society",
            Category::Robotics => "robotics",
        }
    }

    /// Case-insensitive parse; anything outside the fixed set falls back to the default.
    pub fn parse_or_default(raw: &str) -> Self {
        let wanted = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .unwrap_or_default()
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Category::Ai => "🧠",
            Category::Gaming => "🎮",
            Category::Space => "🚀",
            Category::Technology => "⚙️",
            Category::Medicine => "💊",
            Category::Society => "👥",
            Category::Robotics => "🤖",
        }
    }

    /// Comma-separated list used in the rewriter prompt.
    pub fn prompt_list() -> String {
        Self::ALL
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl From<String> for Category {
    fn from(raw: String) -> Self {
        Self::parse_or_default(&raw)
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical or best-guess location attached to an article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoRef {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(rename = "countryCode", default)]
    pub country_code: String,
}

/// Attribution back to the original story.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    #[serde(default = "default_image_alt")]
    pub alt: String,
}

impl Default for ImageRef {
    fn default() -> Self {
        Self {
            url: "/images/articles/placeholder.jpg".to_string(),
            alt: default_image_alt(),
        }
    }
}

fn default_image_alt() -> String {
    "Article image".to_string()
}

fn default_title() -> String {
    "Untitled".to_string()
}

/// An article awaiting editorial review.
///
/// Deserialization is lenient so hand-written JSON payloads (publisher CLI, test
/// fixtures) can omit optional fields; `published` is accepted as an alias of `date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub geo: Option<GeoRef>,
    #[serde(default)]
    pub source: SourceRef,
    #[serde(default)]
    pub image: Option<ImageRef>,
    /// RFC 3339 publish timestamp of the source entry.
    #[serde(default, alias = "published")]
    pub date: String,
    #[serde(default)]
    pub featured: bool,
}

impl Candidate {
    /// Replace the title and recompute the identifier. Every other field is kept.
    pub fn retitle(&mut self, new_title: &str, today: NaiveDate) {
        self.title = new_title.trim().to_string();
        self.id = make_article_id(&self.title, today);
    }
}

/// `<YYYY-MM-DD>-<ascii slug>`.
pub fn make_article_id(title: &str, date: NaiveDate) -> String {
    format!("{}-{}", date.format("%Y-%m-%d"), slugify(title))
}

/// `<id>-<n>` for a second article whose title slugs to an id already in use.
/// The base is trimmed so the result is never longer than a generated id.
pub fn disambiguated_id(id: &str, n: u32) -> String {
    let suffix = format!("-{n}");
    let max_len = "YYYY-MM-DD-".len() + MAX_SLUG_LEN;
    let keep = max_len.saturating_sub(suffix.len());
    let base: String = id.chars().take(keep).collect();
    format!("{}{suffix}", base.trim_end_matches('-'))
}

/// ASCII slug: accents folded to base letters, everything else non-alphanumeric
/// collapsed to single `-`, capped at [`MAX_SLUG_LEN`].
pub fn slugify(text: &str) -> String {
    let slug = fold_to_slug(text, Some(MAX_SLUG_LEN));
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

/// Re-sanitize an identifier that may contain non-ASCII characters. No length cap.
pub fn sanitize_id(id: &str) -> String {
    fold_to_slug(id, None)
}

fn fold_to_slug(text: &str, cap: Option<usize>) -> String {
    // NFKD splits "š" into "s" + combining caron; the mark is then dropped as non-ASCII.
    let folded: String = text
        .nfkd()
        .filter(char::is_ascii)
        .collect::<String>()
        .to_ascii_lowercase();

    let mut out = String::with_capacity(folded.len());
    let mut pending_sep = false;
    for c in folded.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('-');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }

    if let Some(cap) = cap {
        out.truncate(cap);
        while out.ends_with('-') {
            out.pop();
        }
    }
    out
}

/// Truncate to at most `max` characters (not bytes).
pub fn clip_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
