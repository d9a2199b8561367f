//! GitHub Contents API backend.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::repo::{CommitResult, ContentRepo, RemoteFile};
use super::PublishError;
use crate::config::settings::GitHubSettings;

const API_BASE: &str = "https://api.github.com";

#[derive(Clone)]
pub struct GitHubRepo {
    client: Client,
    token: String,
    repo: String,
    branch: String,
    api_base: String,
}

impl GitHubRepo {
    pub fn new(settings: &GitHubSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent("tech-pulse-pipeline/0.1")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            token: settings.token.clone(),
            repo: settings.repo.clone(),
            branch: settings.branch.clone(),
            api_base: API_BASE.to_string(),
        })
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn ensure_configured(&self) -> Result<(), PublishError> {
        if self.token.is_empty() {
            return Err(PublishError::MissingConfig("GITHUB_TOKEN"));
        }
        if self.repo.is_empty() {
            return Err(PublishError::MissingConfig("GITHUB_REPO"));
        }
        Ok(())
    }

    fn contents_url(&self, path: &str) -> String {
        format!("{}/repos/{}/contents/{}", self.api_base, self.repo, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }
}

#[derive(Deserialize)]
struct ApiMessage {
    #[serde(default)]
    message: String,
}

async fn api_error(rsp: Response) -> PublishError {
    let status = rsp.status().as_u16();
    let body = rsp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiMessage>(&body)
        .map(|m| m.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.chars().take(200).collect());
    PublishError::Api { status, message }
}

#[derive(Deserialize)]
struct FileMeta {
    sha: String,
}

#[derive(Deserialize)]
struct DirEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Serialize)]
struct PutBody<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Deserialize)]
struct PutResponse {
    content: Option<PutContent>,
}

#[derive(Deserialize)]
struct PutContent {
    html_url: Option<String>,
}

#[derive(Serialize)]
struct DeleteBody<'a> {
    message: &'a str,
    sha: &'a str,
    branch: &'a str,
}

#[async_trait]
impl ContentRepo for GitHubRepo {
    async fn get_file(&self, path: &str) -> Result<Option<RemoteFile>, PublishError> {
        self.ensure_configured()?;
        let rsp = self
            .request(Method::GET, &self.contents_url(path))
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await?;
        match rsp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let meta: FileMeta = rsp.json().await?;
                Ok(Some(RemoteFile { sha: meta.sha }))
            }
            _ => Err(api_error(rsp).await),
        }
    }

    async fn put_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        sha: Option<&str>,
    ) -> Result<CommitResult, PublishError> {
        self.ensure_configured()?;
        let body = PutBody {
            message,
            content: BASE64.encode(content.as_bytes()),
            branch: &self.branch,
            sha,
        };
        let rsp = self
            .request(Method::PUT, &self.contents_url(path))
            .json(&body)
            .send()
            .await?;
        if !rsp.status().is_success() {
            return Err(api_error(rsp).await);
        }
        let parsed: PutResponse = rsp.json().await?;
        Ok(CommitResult {
            html_url: parsed.content.and_then(|c| c.html_url),
        })
    }

    async fn delete_file(&self, path: &str, message: &str, sha: &str) -> Result<(), PublishError> {
        self.ensure_configured()?;
        let rsp = self
            .request(Method::DELETE, &self.contents_url(path))
            .json(&DeleteBody {
                message,
                sha,
                branch: &self.branch,
            })
            .send()
            .await?;
        if !rsp.status().is_success() {
            return Err(api_error(rsp).await);
        }
        Ok(())
    }

    async fn list_dir(&self, dir: &str) -> Result<Vec<String>, PublishError> {
        self.ensure_configured()?;
        let rsp = self
            .request(Method::GET, &self.contents_url(dir))
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await?;
        match rsp.status() {
            StatusCode::NOT_FOUND => Ok(Vec::new()),
            s if s.is_success() => {
                let entries: Vec<DirEntry> = rsp.json().await?;
                Ok(entries
                    .into_iter()
                    .filter(|e| e.kind == "file")
                    .map(|e| e.name)
                    .collect())
            }
            _ => Err(api_error(rsp).await),
        }
    }
}
