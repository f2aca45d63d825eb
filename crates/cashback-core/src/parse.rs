//! Row parser for free-form model output.
//!
//! Models wrap the answer in prose or markdown fences more often than not, so
//! the parser takes everything from the first `[` to the last `]` and reads
//! that slice as a JSON array of rows. Brackets in the surrounding prose will
//! confuse it; the prompt asks for a single array, which keeps that rare.

use thiserror::Error;
use tracing::debug;

use crate::row::Row;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no bracketed array in model response")]
    NoArray,
    #[error("malformed row array: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse the row array embedded in `text`.
///
/// Only syntax is checked here; missing required fields surface when the row
/// is written.
pub fn parse_rows(text: &str) -> Result<Vec<Row>, ParseError> {
    let start = text.find('[').ok_or(ParseError::NoArray)?;
    let end = text.rfind(']').ok_or(ParseError::NoArray)?;
    if end < start {
        return Err(ParseError::NoArray);
    }

    let rows: Vec<Row> = serde_json::from_str(&text[start..=end])?;
    debug!(rows = rows.len(), "parsed model response");
    Ok(rows)
}
