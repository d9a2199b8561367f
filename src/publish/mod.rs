//! Approved candidate → front-matter document committed to the content repository.

pub mod document;
pub mod github;
pub mod memory;
pub mod repo;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::article::{
    clip_chars, make_article_id, sanitize_id, Candidate, Category, GeoRef, ImageRef, SourceRef,
};
pub use github::GitHubRepo;
pub use memory::MemoryRepo;
pub use repo::{CommitResult, ContentRepo, RemoteFile};

/// Root directory of articles inside the content repository.
pub const CONTENT_ROOT: &str = "content";

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("{0} not set")]
    MissingConfig(&'static str),
    #[error("GitHub API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid article: {0}")]
    Invalid(String),
    #[error("Article not found: {0}")]
    NotFound(String),
}

/// Outbound payload: every field the document format needs, already filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub category: Category,
    /// RFC 3339
    pub date: String,
    pub excerpt: String,
    pub source: SourceRef,
    pub image: ImageRef,
    pub tags: Vec<String>,
    pub geo: Option<GeoRef>,
    pub featured: bool,
    pub content: String,
}

impl Article {
    /// Fill the optional candidate fields: missing date → `now`, missing source
    /// name → `Unknown`, missing image → placeholder.
    pub fn from_candidate(c: &Candidate, now: DateTime<Utc>) -> Self {
        let date = if c.date.trim().is_empty() {
            now.to_rfc3339_opts(SecondsFormat::Secs, true)
        } else {
            c.date.clone()
        };
        let source_name = if c.source.name.trim().is_empty() {
            "Unknown".to_string()
        } else {
            c.source.name.clone()
        };
        Self {
            id: c.id.clone(),
            title: if c.title.trim().is_empty() {
                "Untitled".to_string()
            } else {
                c.title.clone()
            },
            category: c.category,
            date,
            excerpt: c.excerpt.clone(),
            source: SourceRef {
                name: source_name,
                url: c.source.url.clone(),
            },
            image: c.image.clone().unwrap_or_default(),
            tags: c.tags.clone(),
            geo: c.geo.clone(),
            featured: c.featured,
            content: c.content.clone(),
        }
    }

    /// Generate the id when absent, otherwise re-sanitize it to ASCII.
    pub fn normalized(mut self, now: DateTime<Utc>) -> Self {
        self.id = if self.id.trim().is_empty() {
            make_article_id(&self.title, now.date_naive())
        } else {
            sanitize_id(&self.id)
        };
        if self.date.trim().is_empty() {
            self.date = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        }
        self
    }
}

/// Successful publication.
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub message: String,
    pub url: Option<String>,
    pub path: String,
    /// An existing document was overwritten.
    pub updated: bool,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, article: &Article) -> Result<Published, PublishError>;
}

/// `content/<category>/<id>.mdx`
pub fn document_path(root: &str, category: Category, id: &str) -> String {
    format!("{root}/{}/{id}.mdx", category.as_str())
}

/// Publishes through a [`ContentRepo`] with create-or-update semantics.
pub struct RepoPublisher<R> {
    repo: R,
    root: String,
}

impl<R: ContentRepo> RepoPublisher<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            root: CONTENT_ROOT.to_string(),
        }
    }

    pub async fn delete(&self, category: Category, id: &str) -> Result<String, PublishError> {
        let path = document_path(&self.root, category, id);
        let existing = self
            .repo
            .get_file(&path)
            .await?
            .ok_or_else(|| PublishError::NotFound(path.clone()))?;
        self.repo
            .delete_file(&path, &format!("Remove article: {id}"), &existing.sha)
            .await?;
        Ok(format!("Deleted: {path}"))
    }

    /// `<category>/<file>.mdx` across every category.
    pub async fn list(&self) -> Result<Vec<String>, PublishError> {
        let mut out = Vec::new();
        for cat in Category::ALL {
            let names = self.repo.list_dir(&format!("{}/{}", self.root, cat)).await?;
            out.extend(
                names
                    .into_iter()
                    .filter(|n| n.ends_with(".mdx"))
                    .map(|n| format!("{cat}/{n}")),
            );
        }
        Ok(out)
    }
}

#[async_trait]
impl<R: ContentRepo> Publisher for RepoPublisher<R> {
    async fn publish(&self, article: &Article) -> Result<Published, PublishError> {
        let article = article.clone().normalized(Utc::now());
        let doc = document::render(&article)?;
        let path = document_path(&self.root, article.category, &article.id);

        let existing = self.repo.get_file(&path).await?;
        let short = clip_chars(&article.title, 60);
        let (verb, commit_msg) = match existing {
            Some(_) => ("Updated", format!("Update article: {short}")),
            None => ("Published", format!("Add article: {short}")),
        };

        let res = self
            .repo
            .put_file(
                &path,
                &doc,
                &commit_msg,
                existing.as_ref().map(|f| f.sha.as_str()),
            )
            .await?;

        tracing::info!(path = %path, updated = existing.is_some(), "article committed");
        Ok(Published {
            message: format!("{verb}: {}", article.title),
            url: res.html_url,
            path,
            updated: existing.is_some(),
        })
    }
}

/// Renders the document and logs it instead of committing (auto-push off).
pub struct DryRunPublisher;

#[async_trait]
impl Publisher for DryRunPublisher {
    async fn publish(&self, article: &Article) -> Result<Published, PublishError> {
        let article = article.clone().normalized(Utc::now());
        let doc = document::render(&article)?;
        let path = document_path(CONTENT_ROOT, article.category, &article.id);
        tracing::info!(path = %path, bytes = doc.len(), "auto-push disabled, document rendered only");
        tracing::debug!(document = %doc, "rendered document");
        Ok(Published {
            message: format!("Rendered (auto-push disabled): {}", article.title),
            url: None,
            path,
            updated: false,
        })
    }
}
