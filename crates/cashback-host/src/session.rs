//! Per-user edit session: the correction workflow between extraction and save.
//!
//! A session starts in [`SessionState::AwaitingTarget`]. Picking a field moves
//! it to [`SessionState::AwaitingValue`]; the next text either applies the
//! edit (back to `AwaitingTarget`) or is rejected, leaving the pending target
//! in place so the user can retry. Confirm and cancel end the session; the
//! dispatcher drops it from the store at that point.

use std::path::{Path, PathBuf};

use cashback_core::Row;
use thiserror::Error;

/// Field a pending edit applies to. Row indices are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTarget {
    /// Bank name, applied to every row.
    Bank,
    Category(usize),
    Percent(usize),
}

impl EditTarget {
    pub fn row(&self) -> Option<usize> {
        match self {
            Self::Bank => None,
            Self::Category(i) | Self::Percent(i) => Some(*i),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingTarget,
    AwaitingValue(EditTarget),
}

/// Input that could not be applied. The session is left as it was.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("not a number: {0:?}")]
    NotANumber(String),
    /// One-based, as shown to the user.
    #[error("row {row} does not exist")]
    NoSuchRow { row: usize },
    #[error("no field selected for editing")]
    NothingSelected,
}

/// Result of feeding text into a session.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    Applied {
        target: EditTarget,
        old: String,
        new: String,
    },
    Rejected(InputError),
}

#[derive(Debug, Clone)]
pub struct EditSession {
    rows: Vec<Row>,
    edited_rows: Vec<Row>,
    current_edit: Option<EditTarget>,
    image_path: PathBuf,
    person: String,
}

impl EditSession {
    pub fn new(rows: Vec<Row>, image_path: PathBuf, person: impl Into<String>) -> Self {
        Self {
            edited_rows: rows.clone(),
            rows,
            current_edit: None,
            image_path,
            person: person.into(),
        }
    }

    pub fn state(&self) -> SessionState {
        match self.current_edit {
            None => SessionState::AwaitingTarget,
            Some(target) => SessionState::AwaitingValue(target),
        }
    }

    /// Rows as extracted, before any edit.
    pub fn original_rows(&self) -> &[Row] {
        &self.rows
    }

    /// Working copy with edits applied.
    pub fn edited_rows(&self) -> &[Row] {
        &self.edited_rows
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    /// Database identity rows are saved under.
    pub fn person(&self) -> &str {
        &self.person
    }

    /// Choose the field the next text applies to, replacing any pending choice.
    pub fn select(&mut self, target: EditTarget) -> Result<(), InputError> {
        if let Some(i) = target.row()
            && i >= self.edited_rows.len()
        {
            return Err(InputError::NoSuchRow { row: i + 1 });
        }
        self.current_edit = Some(target);
        Ok(())
    }

    /// Apply `text` to the pending target.
    pub fn apply_text(&mut self, text: &str) -> EditOutcome {
        let Some(target) = self.current_edit else {
            return EditOutcome::Rejected(InputError::NothingSelected);
        };
        let value = text.trim();

        let old = match target {
            EditTarget::Bank => {
                let old = self
                    .edited_rows
                    .first()
                    .and_then(|r| r.bank.clone())
                    .unwrap_or_default();
                for row in &mut self.edited_rows {
                    row.bank = Some(value.to_string());
                }
                old
            }
            EditTarget::Category(i) => {
                let row = &mut self.edited_rows[i];
                row.category.replace(value.to_string()).unwrap_or_default()
            }
            EditTarget::Percent(i) => {
                let percent = match parse_percent(value) {
                    Ok(p) => p,
                    Err(e) => return EditOutcome::Rejected(e),
                };
                let row = &mut self.edited_rows[i];
                row.percent
                    .replace(percent)
                    .map(|p| p.to_string())
                    .unwrap_or_default()
            }
        };

        self.current_edit = None;
        EditOutcome::Applied {
            target,
            old,
            new: value.to_string(),
        }
    }

    /// Working rows ready to write, with `Person` and `Date` filled where absent.
    pub fn confirmed_rows(&self, date: &str) -> Vec<Row> {
        self.edited_rows
            .iter()
            .cloned()
            .map(|mut row| {
                row.fill_identity(&self.person, date);
                row
            })
            .collect()
    }
}

/// Parse a user-typed percentage: `12.5`, `12.5%`, ` 7 `.
pub fn parse_percent(text: &str) -> Result<f64, InputError> {
    let cleaned = text.trim().trim_end_matches('%').trim_end();
    match cleaned.parse::<f64>() {
        Ok(p) if p.is_finite() => Ok(p),
        _ => Err(InputError::NotANumber(text.to_string())),
    }
}
