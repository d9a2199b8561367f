//! Generative text providers behind a single completion call.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::RewriteError;

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One system + user turn, returning the raw assistant text.
    async fn complete(&self, system: &str, user: &str) -> Result<String, RewriteError>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

/// OpenAI Chat Completions.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("tech-pulse-pipeline/0.1")
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}
#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}
#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}
#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}
#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, RewriteError> {
        if self.api_key.is_empty() {
            return Err(RewriteError::MissingConfig("OPENAI_API_KEY"));
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.7,
            max_tokens: 2000,
        };

        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| RewriteError::Upstream(e.into()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(RewriteError::Upstream(anyhow!("openai HTTP {status}: {snippet}")));
        }

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| RewriteError::Upstream(e.into()))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .ok_or_else(|| RewriteError::Upstream(anyhow!("openai returned no choices")))
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Scripted provider for tests/local runs. Each call pops the next reply;
/// `None` (or an exhausted script) behaves like an upstream failure.
#[derive(Default)]
pub struct MockLlm {
    replies: Mutex<VecDeque<Option<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl MockLlm {
    pub fn scripted<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Option<String>>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// User prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn complete(&self, _system: &str, user: &str) -> Result<String, RewriteError> {
        if let Ok(mut p) = self.prompts.lock() {
            p.push(user.to_string());
        }
        let next = self.replies.lock().ok().and_then(|mut q| q.pop_front()).flatten();
        next.ok_or_else(|| RewriteError::Upstream(anyhow!("mock llm: no reply scripted")))
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
