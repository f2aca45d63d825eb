use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::Keyboard;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chat API error {code}: {description}")]
    Api { code: i64, description: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("file {0} has no download path")]
    NoFilePath(String),
}

/// Outbound side of the chat platform.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send plain text.
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), ChatError>;

    /// Send `caption` followed by `table` as a preformatted block, with a keyboard.
    async fn send_table(
        &self,
        chat_id: i64,
        caption: &str,
        table: &str,
        keyboard: &Keyboard,
    ) -> Result<(), ChatError>;

    /// Acknowledge a button press so the client stops its spinner.
    async fn answer_callback(&self, callback_id: &str) -> Result<(), ChatError>;

    /// Download a received file to `dest`, creating parent directories.
    async fn download_file(&self, file_id: &str, dest: &Path) -> Result<(), ChatError>;
}
