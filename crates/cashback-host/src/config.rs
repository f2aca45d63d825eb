//! Startup configuration, loaded once from a YAML file.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use cashback_ai::{DEFAULT_TARGET_SIZE, SamplingParams};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::pipeline::CATEGORIES_PLACEHOLDER;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bot: BotConfig,
    pub vlm: VlmConfig,
    pub db: DbConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub token: String,
    /// Directory received photos are saved to.
    pub images_path: PathBuf,
    /// Write rows as soon as they are extracted, in addition to on confirm.
    #[serde(default = "default_true")]
    pub save_on_extract: bool,
    /// Seconds a user's event lane may sit idle before it is torn down.
    #[serde(default = "default_lane_idle_secs")]
    pub lane_idle_secs: u64,
    #[serde(default)]
    pub users: Vec<UserEntry>,
    pub messages: Messages,
}

/// Allow-list entry: chat handle → person name used in the database.
#[derive(Debug, Clone, Deserialize)]
pub struct UserEntry {
    pub tg_username: String,
    pub db_username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VlmConfig {
    pub base_url: String,
    pub api_token: String,
    pub model_name: String,
    /// Prompt file containing the `{CASHBACK_CATEGORIES}` placeholder.
    pub prompt_template_file: PathBuf,
    #[serde(default = "default_image_size")]
    pub image_size: u32,
    #[serde(default)]
    pub sampling_params: SamplingParams,
    /// Contents of `prompt_template_file`, trimmed. Filled by [`Config::load`].
    #[serde(skip)]
    pub prompt_template: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub api_key: String,
    pub db_id: String,
}

/// User-facing strings. The first six must be configured; the edit workflow
/// strings have English defaults. `{row}` and `{error}` are substituted where
/// noted.
#[derive(Debug, Clone, Deserialize)]
pub struct Messages {
    pub start_message: String,
    pub refuse_message: String,
    pub processing_message: String,
    pub ok_message: String,
    pub continue_message: String,
    pub not_ok_message: String,

    #[serde(default = "defaults::no_session")]
    pub no_session_message: String,
    #[serde(default = "defaults::ask_bank")]
    pub ask_bank_message: String,
    /// `{row}`: one-based row number.
    #[serde(default = "defaults::ask_category")]
    pub ask_category_message: String,
    /// `{row}`: one-based row number.
    #[serde(default = "defaults::ask_percent")]
    pub ask_percent_message: String,
    #[serde(default = "defaults::invalid_percent")]
    pub invalid_percent_message: String,
    #[serde(default = "defaults::no_pending_edit")]
    pub no_pending_edit_message: String,
    #[serde(default = "defaults::invalid_button")]
    pub invalid_button_message: String,
    #[serde(default = "defaults::saved")]
    pub saved_message: String,
    /// `{error}`: the failure reported by the database.
    #[serde(default = "defaults::save_failed")]
    pub save_failed_message: String,
    #[serde(default = "defaults::cancelled")]
    pub cancelled_message: String,
    #[serde(default = "defaults::updated_table")]
    pub updated_table_header: String,
}

mod defaults {
    pub fn no_session() -> String {
        "No active edit session. Please start over.".into()
    }
    pub fn ask_bank() -> String {
        "Please send the correct bank name.".into()
    }
    pub fn ask_category() -> String {
        "Please send the correct category for row {row}.".into()
    }
    pub fn ask_percent() -> String {
        "Please send the correct percentage for row {row}.".into()
    }
    pub fn invalid_percent() -> String {
        "Please send a valid number for the percentage.".into()
    }
    pub fn no_pending_edit() -> String {
        "Pick a field to edit with the buttons above first.".into()
    }
    pub fn invalid_button() -> String {
        "That button no longer matches the table. Please use the latest one.".into()
    }
    pub fn saved() -> String {
        "✅ Changes saved successfully!".into()
    }
    pub fn save_failed() -> String {
        "❌ Error saving changes: {error}".into()
    }
    pub fn cancelled() -> String {
        "❌ Edit cancelled.".into()
    }
    pub fn updated_table() -> String {
        "Updated table:".into()
    }
}

fn default_true() -> bool {
    true
}

fn default_lane_idle_secs() -> u64 {
    600
}

fn default_image_size() -> u32 {
    DEFAULT_TARGET_SIZE
}

impl Messages {
    pub fn ask_category(&self, row: usize) -> String {
        self.ask_category_message.replace("{row}", &row.to_string())
    }

    pub fn ask_percent(&self, row: usize) -> String {
        self.ask_percent_message.replace("{row}", &row.to_string())
    }

    pub fn save_failed(&self, error: &str) -> String {
        self.save_failed_message.replace("{error}", error)
    }
}

impl Config {
    /// Read and validate the YAML config at `path`, then read the prompt template it names.
    ///
    /// A relative `prompt_template_file` is resolved against the current directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml(&raw).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;

        let template_path = &config.vlm.prompt_template_file;
        let template = std::fs::read_to_string(template_path).map_err(|source| ConfigError::Io {
            path: template_path.clone(),
            source,
        })?;
        config.vlm.prompt_template = template.trim().to_string();

        config.validate()?;
        info!(
            path = %path.display(),
            users = config.bot.users.len(),
            model = %config.vlm.model_name,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Parse the YAML document only; the prompt template is left empty.
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.vlm.prompt_template.contains(CATEGORIES_PLACEHOLDER) {
            return Err(ConfigError::Invalid(format!(
                "prompt template {} has no {CATEGORIES_PLACEHOLDER} placeholder",
                self.vlm.prompt_template_file.display()
            )));
        }
        if self.vlm.image_size == 0 {
            return Err(ConfigError::Invalid("vlm.image_size must be positive".into()));
        }
        let mut seen = HashSet::new();
        for user in &self.bot.users {
            if !seen.insert(user.tg_username.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "user {} listed more than once",
                    user.tg_username
                )));
            }
        }
        Ok(())
    }
}

/// Chat handles allowed to use the bot, mapped to their database identity.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    users: HashMap<String, String>,
}

impl AllowList {
    pub fn from_entries(entries: &[UserEntry]) -> Self {
        Self {
            users: entries
                .iter()
                .map(|u| (u.tg_username.clone(), u.db_username.clone()))
                .collect(),
        }
    }

    /// Database identity for `username`, if allowed. Accounts without a handle are never allowed.
    pub fn person(&self, username: Option<&str>) -> Option<&str> {
        username
            .and_then(|name| self.users.get(name))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
