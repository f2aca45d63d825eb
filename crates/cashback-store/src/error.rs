use cashback_core::RowField;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row has no \"{field}\" specified")]
    Validation { field: RowField },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database schema has no \"{0}\" property")]
    MissingProperty(String),
}
