//! In-memory stand-ins for the external collaborators.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cashback_ai::{VisionError, VisionModel, VisionRequest};
use cashback_chat::{ChatError, ChatTransport, Keyboard};
use cashback_core::Row;
use cashback_store::{Gateway, RowId, StoreError};
use image::{Rgb, RgbImage};
use tempfile::TempDir;

/// Write a 200x100 image to `dir/name`.
pub fn sample_image(dir: &TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    write_image(&path);
    path
}

fn write_image(path: &Path) {
    RgbImage::from_pixel(200, 100, Rgb([20, 120, 220]))
        .save(path)
        .unwrap();
}

pub struct FakeGateway {
    categories: Vec<String>,
    fail_at: Option<usize>,
    attempts: Mutex<usize>,
    written: Mutex<Vec<Row>>,
}

impl FakeGateway {
    pub fn new(categories: &[&str]) -> Arc<Self> {
        Self::build(categories, None)
    }

    /// Fails the write attempt with zero-based number `n` (and every later one).
    pub fn failing_at(categories: &[&str], n: usize) -> Arc<Self> {
        Self::build(categories, Some(n))
    }

    fn build(categories: &[&str], fail_at: Option<usize>) -> Arc<Self> {
        Arc::new(Self {
            categories: categories.iter().map(|c| c.to_string()).collect(),
            fail_at,
            attempts: Mutex::new(0),
            written: Mutex::new(Vec::new()),
        })
    }

    pub fn written(&self) -> Vec<Row> {
        self.written.lock().unwrap().clone()
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn list_categories(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.categories.clone())
    }

    async fn write_row(&self, row: &Row) -> Result<RowId, StoreError> {
        if let Some(field) = row.missing_required() {
            return Err(StoreError::Validation { field });
        }
        let attempt = {
            let mut n = self.attempts.lock().unwrap();
            *n += 1;
            *n - 1
        };
        if self.fail_at.is_some_and(|f| attempt >= f) {
            return Err(StoreError::Server {
                status: 503,
                body: "unavailable".into(),
            });
        }
        let mut written = self.written.lock().unwrap();
        written.push(row.clone());
        Ok(RowId(format!("page-{}", written.len())))
    }
}

pub struct FakeModel {
    reply: Option<String>,
    stalled: bool,
    prompts: Mutex<Vec<String>>,
}

impl FakeModel {
    pub fn replying(text: &str) -> Arc<Self> {
        Self::build(Some(text.to_string()), false)
    }

    pub fn failing() -> Arc<Self> {
        Self::build(None, false)
    }

    /// Never answers.
    pub fn stalled() -> Arc<Self> {
        Self::build(None, true)
    }

    fn build(reply: Option<String>, stalled: bool) -> Arc<Self> {
        Arc::new(Self {
            reply,
            stalled,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionModel for FakeModel {
    async fn complete(&self, request: VisionRequest<'_>) -> Result<String, VisionError> {
        self.prompts.lock().unwrap().push(request.prompt.to_string());
        if self.stalled {
            std::future::pending::<()>().await;
        }
        self.reply.clone().ok_or(VisionError::Server {
            status: 500,
            body: "model down".into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text {
        chat_id: i64,
        text: String,
    },
    Table {
        chat_id: i64,
        caption: String,
        table: String,
        keyboard: Keyboard,
    },
}

#[derive(Default)]
pub struct FakeTransport {
    sent: Mutex<Vec<Sent>>,
    answered: Mutex<Vec<String>>,
    downloads: Mutex<Vec<(String, PathBuf)>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { text, .. } => Some(text),
                Sent::Table { .. } => None,
            })
            .collect()
    }

    pub fn tables(&self) -> Vec<(String, Keyboard)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Table {
                    table, keyboard, ..
                } => Some((table, keyboard)),
                Sent::Text { .. } => None,
            })
            .collect()
    }

    pub fn answered(&self) -> Vec<String> {
        self.answered.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> Vec<(String, PathBuf)> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl ChatTransport for FakeTransport {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), ChatError> {
        self.sent.lock().unwrap().push(Sent::Text {
            chat_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_table(
        &self,
        chat_id: i64,
        caption: &str,
        table: &str,
        keyboard: &Keyboard,
    ) -> Result<(), ChatError> {
        self.sent.lock().unwrap().push(Sent::Table {
            chat_id,
            caption: caption.to_string(),
            table: table.to_string(),
            keyboard: keyboard.clone(),
        });
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), ChatError> {
        self.answered.lock().unwrap().push(callback_id.to_string());
        Ok(())
    }

    async fn download_file(&self, file_id: &str, dest: &Path) -> Result<(), ChatError> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_image(dest);
        self.downloads
            .lock()
            .unwrap()
            .push((file_id.to_string(), dest.to_path_buf()));
        Ok(())
    }
}
