//! Chat front-end seam: outbound messages with inline controls, inbound events.

use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    /// Opaque payload echoed back on press.
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Rows of buttons.
pub type Controls = Vec<Vec<Button>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Status,
    Scrape,
    Test,
    Other(String),
}

impl Command {
    /// `/scrape@my_bot args` → `Scrape`.
    pub fn parse(text: &str) -> Option<Command> {
        let word = text.split_whitespace().next()?.strip_prefix('/')?;
        let name = word.split('@').next().unwrap_or(word);
        Some(match name {
            "start" | "help" => Command::Start,
            "status" => Command::Status,
            "scrape" => Command::Scrape,
            "test" => Command::Test,
            other => Command::Other(other.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Command {
        chat_id: i64,
        command: Command,
    },
    Text {
        chat_id: i64,
        user_id: i64,
        text: String,
    },
    Button {
        callback_id: String,
        chat_id: i64,
        user_id: i64,
        message: MessageRef,
        data: String,
    },
}

impl Inbound {
    pub fn chat_id(&self) -> i64 {
        match self {
            Inbound::Command { chat_id, .. }
            | Inbound::Text { chat_id, .. }
            | Inbound::Button { chat_id, .. } => *chat_id,
        }
    }
}

#[async_trait]
pub trait Messenger: Send + Sync {
    /// HTML-formatted message, optionally with controls.
    async fn send(&self, chat_id: i64, html: &str, controls: Option<&Controls>) -> Result<MessageRef>;
    /// Replace a message's text; `None` removes its controls.
    async fn edit(&self, message: MessageRef, html: &str, controls: Option<&Controls>) -> Result<()>;
    /// Acknowledge a button press, optionally with a short toast.
    async fn ack(&self, callback_id: &str, notice: Option<&str>) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Sent {
        message: MessageRef,
        text: String,
        controls: Option<Controls>,
    },
    Edited {
        message: MessageRef,
        text: String,
        controls: Option<Controls>,
    },
    Acked {
        callback_id: String,
        notice: Option<String>,
    },
}

/// Records everything instead of talking to a chat service.
#[derive(Default)]
pub struct RecordingMessenger {
    log: Mutex<Vec<Outbound>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outbound(&self) -> Vec<Outbound> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Text of every sent or edited message, in order.
    pub fn texts(&self) -> Vec<String> {
        self.outbound()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Sent { text, .. } | Outbound::Edited { text, .. } => Some(text),
                Outbound::Acked { .. } => None,
            })
            .collect()
    }

    pub fn last_text(&self) -> Option<String> {
        self.texts().pop()
    }

    fn record(&self, o: Outbound) {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).push(o);
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, chat_id: i64, html: &str, controls: Option<&Controls>) -> Result<MessageRef> {
        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        let message = MessageRef {
            chat_id,
            message_id: log.len() as i64 + 1,
        };
        log.push(Outbound::Sent {
            message,
            text: html.to_string(),
            controls: controls.cloned(),
        });
        Ok(message)
    }

    async fn edit(&self, message: MessageRef, html: &str, controls: Option<&Controls>) -> Result<()> {
        self.record(Outbound::Edited {
            message,
            text: html.to_string(),
            controls: controls.cloned(),
        });
        Ok(())
    }

    async fn ack(&self, callback_id: &str, notice: Option<&str>) -> Result<()> {
        self.record(Outbound::Acked {
            callback_id: callback_id.to_string(),
            notice: notice.map(str::to_string),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_strip_bot_suffix() {
        assert_eq!(Command::parse("/scrape@tech_pulse_bot"), Some(Command::Scrape));
        assert_eq!(Command::parse("/status now"), Some(Command::Status));
        assert_eq!(Command::parse("/nope"), Some(Command::Other("nope".into())));
        assert_eq!(Command::parse("hello"), None);
    }
}
