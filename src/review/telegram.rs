//! Telegram Bot API over plain HTTPS.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use super::messenger::{Command, Controls, Inbound, MessageRef, Messenger};
use super::ReviewService;

const API_BASE: &str = "https://api.telegram.org";
const POLL_TIMEOUT_SECS: u64 = 30;

#[derive(Clone)]
pub struct TelegramBot {
    client: Client,
    base: String,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Serialize)]
struct InlineButton<'a> {
    text: &'a str,
    callback_data: &'a str,
}

fn reply_markup(controls: Option<&Controls>) -> Value {
    let rows: Vec<Vec<InlineButton<'_>>> = controls
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    row.iter()
                        .map(|b| InlineButton {
                            text: &b.label,
                            callback_data: &b.data,
                        })
                        .collect()
                })
                .collect()
        })
        .unwrap_or_default();
    json!({ "inline_keyboard": rows })
}

impl TelegramBot {
    pub fn new(token: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent("tech-pulse-pipeline/0.1")
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 15))
            .build()
            .context("building telegram http client")?;
        Ok(Self {
            client,
            base: format!("{API_BASE}/bot{token}"),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T> {
        let rsp = self
            .client
            .post(format!("{}/{method}", self.base))
            .json(body)
            .send()
            .await
            .with_context(|| format!("telegram {method} request failed"))?;
        let status = rsp.status();
        let parsed: ApiResponse<T> = rsp
            .json()
            .await
            .with_context(|| format!("telegram {method} returned HTTP {status} with unreadable body"))?;
        if !parsed.ok {
            return Err(anyhow!(
                "telegram {method} failed: {}",
                parsed.description.unwrap_or_else(|| status.to_string())
            ));
        }
        parsed
            .result
            .ok_or_else(|| anyhow!("telegram {method}: empty result"))
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": POLL_TIMEOUT_SECS,
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }
}

#[async_trait]
impl Messenger for TelegramBot {
    async fn send(&self, chat_id: i64, html: &str, controls: Option<&Controls>) -> Result<MessageRef> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": html,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        if controls.is_some() {
            body["reply_markup"] = reply_markup(controls);
        }
        let msg: TgMessage = self.call("sendMessage", &body).await?;
        Ok(MessageRef {
            chat_id: msg.chat.id,
            message_id: msg.message_id,
        })
    }

    async fn edit(&self, message: MessageRef, html: &str, controls: Option<&Controls>) -> Result<()> {
        let body = json!({
            "chat_id": message.chat_id,
            "message_id": message.message_id,
            "text": html,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
            "reply_markup": reply_markup(controls),
        });
        // `result` is the edited message, or `true` for inline messages.
        let _: Value = self.call("editMessageText", &body).await?;
        Ok(())
    }

    async fn ack(&self, callback_id: &str, notice: Option<&str>) -> Result<()> {
        let mut body = json!({ "callback_query_id": callback_id });
        if let Some(text) = notice {
            body["text"] = json!(text);
        }
        let _: bool = self.call("answerCallbackQuery", &body).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    message: Option<TgMessage>,
    #[serde(default)]
    callback_query: Option<TgCallback>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    message_id: i64,
    chat: TgChat,
    #[serde(default)]
    from: Option<TgUser>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TgCallback {
    id: String,
    from: TgUser,
    #[serde(default)]
    message: Option<TgMessage>,
    #[serde(default)]
    data: Option<String>,
}

impl Update {
    /// Map to a front-end event. Non-text messages and button presses
    /// without an attached message are dropped.
    pub fn route(self) -> Option<Routed> {
        if let Some(cb) = self.callback_query {
            let Some(msg) = cb.message else {
                return Some(Routed::AckOnly(cb.id));
            };
            return Some(Routed::Event(Inbound::Button {
                callback_id: cb.id,
                chat_id: msg.chat.id,
                user_id: cb.from.id,
                message: MessageRef {
                    chat_id: msg.chat.id,
                    message_id: msg.message_id,
                },
                data: cb.data.unwrap_or_default(),
            }));
        }

        let msg = self.message?;
        let text = msg.text?;
        let chat_id = msg.chat.id;
        if let Some(command) = Command::parse(&text) {
            return Some(Routed::Event(Inbound::Command { chat_id, command }));
        }
        Some(Routed::Event(Inbound::Text {
            chat_id,
            user_id: msg.from.map(|u| u.id).unwrap_or(chat_id),
            text,
        }))
    }
}

/// What the poller does with one update.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Event(Inbound),
    /// Button press on a message Telegram no longer delivers. Only answered,
    /// so the client stops its loading indicator.
    AckOnly(String),
}

/// Handle one update on its own task.
pub fn dispatch(
    update: Update,
    messenger: Arc<dyn Messenger>,
    service: Arc<ReviewService>,
) -> Option<JoinHandle<()>> {
    match update.route()? {
        Routed::Event(event) => Some(tokio::spawn(async move { service.handle(event).await })),
        Routed::AckOnly(callback_id) => Some(tokio::spawn(async move {
            tracing::debug!(callback_id = %callback_id, "callback without message, acknowledging only");
            if let Err(e) = messenger.ack(&callback_id, None).await {
                tracing::warn!(error = ?e, "answerCallbackQuery failed");
            }
        })),
    }
}

/// Poll forever, dispatching each event on its own task so a slow publish
/// never blocks other button presses.
pub async fn run_polling(bot: Arc<TelegramBot>, service: Arc<ReviewService>) {
    let mut offset = 0_i64;
    tracing::info!("telegram polling started");
    loop {
        match bot.get_updates(offset).await {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    dispatch(update, bot.clone(), service.clone());
                }
            }
            Err(e) => {
                tracing::warn!(error = ?e, "getUpdates failed, backing off");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::StaticSource;
    use crate::publish::DryRunPublisher;
    use crate::review::messenger::{Button, Outbound, RecordingMessenger};
    use crate::review::store::InMemoryStore;
    use crate::review::ReviewConfig;
    use crate::throttle::Unthrottled;

    fn update(v: Value) -> Update {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn command_message_maps_to_command() {
        let ev = update(json!({
            "update_id": 10,
            "message": {"message_id": 5, "chat": {"id": 42}, "from": {"id": 7}, "text": "/scrape@tp_bot"}
        }))
        .route();
        assert_eq!(
            ev,
            Some(Routed::Event(Inbound::Command {
                chat_id: 42,
                command: Command::Scrape
            }))
        );
    }

    #[test]
    fn callback_maps_to_button() {
        let ev = update(json!({
            "update_id": 11,
            "callback_query": {
                "id": "cb1",
                "from": {"id": 7},
                "data": "approve_2025-09-02-x",
                "message": {"message_id": 99, "chat": {"id": 42}}
            }
        }))
        .route();
        assert_eq!(
            ev,
            Some(Routed::Event(Inbound::Button {
                callback_id: "cb1".into(),
                chat_id: 42,
                user_id: 7,
                message: MessageRef {
                    chat_id: 42,
                    message_id: 99
                },
                data: "approve_2025-09-02-x".into(),
            }))
        );
    }

    #[test]
    fn callback_without_message_is_only_acknowledged() {
        let ev = update(json!({
            "update_id": 13,
            "callback_query": {"id": "cb2", "from": {"id": 7}, "data": "approve_old"}
        }))
        .route();
        assert_eq!(ev, Some(Routed::AckOnly("cb2".into())));
    }

    #[tokio::test]
    async fn dispatch_answers_orphan_callbacks() {
        let chat = Arc::new(RecordingMessenger::new());
        let service = Arc::new(ReviewService::new(
            ReviewConfig {
                admin_chat_id: 42,
                scrape_interval_minutes: 0,
                pending_ttl: Duration::from_secs(3600),
                edit_session_ttl: Duration::from_secs(60),
            },
            chat.clone(),
            Arc::new(InMemoryStore::new()),
            Arc::new(DryRunPublisher),
            Arc::new(StaticSource::default()),
            Arc::new(Unthrottled),
        ));
        let orphan = update(json!({
            "update_id": 14,
            "callback_query": {"id": "cb3", "from": {"id": 7}, "data": "approve_old"}
        }));

        dispatch(orphan, chat.clone(), service)
            .expect("task spawned")
            .await
            .unwrap();

        assert_eq!(
            chat.outbound(),
            vec![Outbound::Acked {
                callback_id: "cb3".into(),
                notice: None
            }]
        );
    }

    #[test]
    fn non_text_message_is_dropped() {
        let ev = update(json!({
            "update_id": 12,
            "message": {"message_id": 5, "chat": {"id": 42}}
        }))
        .route();
        assert!(ev.is_none());
    }

    #[test]
    fn reply_markup_shape() {
        let controls = vec![vec![Button::new("✅ Approve", "approve_x")]];
        assert_eq!(
            reply_markup(Some(&controls)),
            json!({"inline_keyboard": [[{"text": "✅ Approve", "callback_data": "approve_x"}]]})
        );
        assert_eq!(reply_markup(None), json!({"inline_keyboard": []}));
    }
}
