//! Telegram Bot API transport over plain HTTPS.
//!
//! Long-polls `getUpdates` for inbound events and implements
//! [`ChatTransport`] for replies. Only the handful of methods the bot needs
//! are wrapped.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::{ChatError, ChatTransport, Event, EventKind, Keyboard, Sender};

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Extra time allowed on top of the long-poll timeout before the HTTP request gives up.
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Telegram Bot API client bound to one bot token.
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    message: Option<Message>,
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
struct Message {
    chat: Chat,
    from: Option<User>,
    text: Option<String>,
    photo: Option<Vec<PhotoSize>>,
}

#[derive(Debug, Clone, Deserialize)]
struct CallbackQuery {
    id: String,
    from: User,
    message: Option<Message>,
    data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct User {
    id: i64,
    username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct PhotoSize {
    file_id: String,
    file_unique_id: String,
}

#[derive(Deserialize)]
struct File {
    file_path: Option<String>,
}

impl Update {
    /// Convert into a transport-neutral event. Updates the bot does not handle yield `None`.
    pub fn into_event(self) -> Option<Event> {
        if let Some(query) = self.callback_query {
            let chat_id = query.message.as_ref().map_or(query.from.id, |m| m.chat.id);
            return Some(Event {
                sender: Sender {
                    user_id: query.from.id,
                    chat_id,
                    username: query.from.username,
                },
                kind: EventKind::Callback {
                    id: query.id,
                    data: query.data.unwrap_or_default(),
                },
            });
        }

        let message = self.message?;
        let from = message.from?;
        let kind = if let Some(photo) = message.photo
            && let Some(largest) = photo.into_iter().last()
        {
            EventKind::Photo {
                file_id: largest.file_id,
                file_unique_id: largest.file_unique_id,
            }
        } else {
            let text = message.text?;
            match parse_command(&text) {
                Some(name) => EventKind::Command(name),
                None => EventKind::Text(text),
            }
        };

        Some(Event {
            sender: Sender {
                user_id: from.id,
                chat_id: message.chat.id,
                username: from.username,
            },
            kind,
        })
    }
}

/// `/start@my_bot arg` → `start`.
fn parse_command(text: &str) -> Option<String> {
    let word = text.strip_prefix('/')?.split_whitespace().next()?;
    let name = word.split('@').next().unwrap_or(word);
    (!name.is_empty()).then(|| name.to_string())
}

/// Escape text for a MarkdownV2 message body.
pub fn escape_markdown(text: &str) -> String {
    const SPECIAL: &str = "_*[]()~`>#+-=|{}.!\\";
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if SPECIAL.contains(ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Escape text for the inside of a MarkdownV2 pre block.
pub fn escape_code(text: &str) -> String {
    text.replace('\\', "\\\\").replace('`', "\\`")
}

fn table_message(caption: &str, table: &str) -> String {
    let mut text = String::new();
    if !caption.is_empty() {
        text.push_str(&escape_markdown(caption));
        text.push('\n');
    }
    text.push_str("```\n");
    text.push_str(&escape_code(table));
    text.push_str("\n```");
    text
}

impl TelegramClient {
    pub fn new(token: String) -> Self {
        Self::with_base_url(TELEGRAM_API.to_string(), token)
    }

    /// Point at a self-hosted Bot API server.
    pub fn with_base_url(base_url: String, token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: Value,
        timeout: Option<Duration>,
    ) -> Result<T, ChatError> {
        let url = format!("{}/bot{}/{}", self.base_url, self.token, method);
        debug!(method, "calling bot API");
        let mut req = self.client.post(&url).json(&body);
        if let Some(t) = timeout {
            req = req.timeout(t);
        }
        let resp: ApiResponse<T> = serde_json::from_str(&req.send().await?.text().await?)?;
        match resp.result {
            Some(result) if resp.ok => Ok(result),
            _ => Err(ChatError::Api {
                code: resp.error_code.unwrap_or_default(),
                description: resp.description.unwrap_or_default(),
            }),
        }
    }

    /// Long-poll for updates after `offset`, waiting up to `timeout` for one to arrive.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<Update>, ChatError> {
        let mut body = json!({
            "timeout": timeout.as_secs(),
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        self.call("getUpdates", body, Some(timeout + POLL_GRACE)).await
    }

    /// Identity check for the configured token; returns the bot's username.
    pub async fn get_me(&self) -> Result<String, ChatError> {
        let me: User = self.call("getMe", json!({}), None).await?;
        Ok(me.username.unwrap_or_default())
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), ChatError> {
        let _: Value = self
            .call("sendMessage", json!({ "chat_id": chat_id, "text": text }), None)
            .await?;
        Ok(())
    }

    async fn send_table(
        &self,
        chat_id: i64,
        caption: &str,
        table: &str,
        keyboard: &Keyboard,
    ) -> Result<(), ChatError> {
        let body = json!({
            "chat_id": chat_id,
            "text": table_message(caption, table),
            "parse_mode": "MarkdownV2",
            "reply_markup": keyboard,
        });
        let _: Value = self.call("sendMessage", body, None).await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), ChatError> {
        let _: Value = self
            .call(
                "answerCallbackQuery",
                json!({ "callback_query_id": callback_id }),
                None,
            )
            .await?;
        Ok(())
    }

    async fn download_file(&self, file_id: &str, dest: &Path) -> Result<(), ChatError> {
        let file: File = self
            .call("getFile", json!({ "file_id": file_id }), None)
            .await?;
        let file_path = file
            .file_path
            .ok_or_else(|| ChatError::NoFilePath(file_id.to_string()))?;

        let url = format!("{}/file/bot{}/{}", self.base_url, self.token, file_path);
        let resp = self.client.get(&url).send().await?.error_for_status()?;
        let bytes = resp.bytes().await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &bytes).await?;
        info!(path = %dest.display(), bytes = bytes.len(), "downloaded file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(json: &str) -> Update {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn start_command() {
        let ev = update(
            r#"{"update_id": 1, "message": {"message_id": 5, "chat": {"id": 77, "type": "private"},
                "from": {"id": 42, "is_bot": false, "first_name": "A", "username": "alice"},
                "text": "/start"}}"#,
        )
        .into_event()
        .unwrap();
        assert_eq!(ev.kind, EventKind::Command("start".into()));
        assert_eq!(ev.sender.user_id, 42);
        assert_eq!(ev.sender.chat_id, 77);
        assert_eq!(ev.display_name(), "alice");
    }

    #[test]
    fn photo_picks_largest_size() {
        let ev = update(
            r#"{"update_id": 2, "message": {"chat": {"id": 77}, "from": {"id": 42},
                "photo": [
                    {"file_id": "small", "file_unique_id": "s", "width": 90, "height": 160},
                    {"file_id": "big", "file_unique_id": "b", "width": 1080, "height": 1920}
                ]}}"#,
        )
        .into_event()
        .unwrap();
        assert_eq!(
            ev.kind,
            EventKind::Photo {
                file_id: "big".into(),
                file_unique_id: "b".into()
            }
        );
        assert_eq!(ev.display_name(), "?");
    }

    #[test]
    fn callback_uses_message_chat() {
        let ev = update(
            r#"{"update_id": 3, "callback_query": {"id": "cb1", "from": {"id": 42, "username": "alice"},
                "message": {"chat": {"id": 77}}, "data": "edit_bank"}}"#,
        )
        .into_event()
        .unwrap();
        assert_eq!(
            ev.kind,
            EventKind::Callback {
                id: "cb1".into(),
                data: "edit_bank".into()
            }
        );
        assert_eq!(ev.sender.chat_id, 77);
    }

    #[test]
    fn plain_text() {
        let ev = update(
            r#"{"update_id": 4, "message": {"chat": {"id": 77}, "from": {"id": 42}, "text": "12.5"}}"#,
        )
        .into_event()
        .unwrap();
        assert_eq!(ev.kind, EventKind::Text("12.5".into()));
    }

    #[test]
    fn unsupported_updates_are_skipped() {
        assert!(update(r#"{"update_id": 5}"#).into_event().is_none());
        assert!(
            update(r#"{"update_id": 6, "message": {"chat": {"id": 77}, "from": {"id": 42}}}"#)
                .into_event()
                .is_none()
        );
    }

    #[test]
    fn command_suffix_and_args_stripped() {
        assert_eq!(parse_command("/start@cash_bot now"), Some("start".into()));
        assert_eq!(parse_command("start"), None);
        assert_eq!(parse_command("/"), None);
    }

    #[test]
    fn markdown_escaping() {
        assert_eq!(escape_markdown("Updated table:"), "Updated table:");
        assert_eq!(escape_markdown("1.5 (x)"), "1\\.5 \\(x\\)");
        assert_eq!(escape_code("a`b\\c"), "a\\`b\\\\c");
    }

    #[test]
    fn table_message_wraps_in_pre_block() {
        assert_eq!(table_message("", "| a |"), "```\n| a |\n```");
        assert_eq!(table_message("Hi!", "t"), "Hi\\!\n```\nt\n```");
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = TelegramClient::with_base_url("http://localhost:8081/".into(), "t".into());
        assert_eq!(client.base_url, "http://localhost:8081");
    }
}
