//! Rendering of the working table and its edit controls.

use cashback_chat::{Button, Keyboard};
use cashback_core::Row;
use comfy_table::{Cell, Table};

use crate::EditTarget;

/// What an inline button asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Select(EditTarget),
    Confirm,
    Cancel,
}

impl CallbackAction {
    /// Decode button data. Row numbers in the data are one-based.
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "edit_bank" => return Some(Self::Select(EditTarget::Bank)),
            "confirm_edit" => return Some(Self::Confirm),
            "cancel_edit" => return Some(Self::Cancel),
            _ => {}
        }
        if let Some(n) = data.strip_prefix("edit_category_") {
            return row_index(n).map(|i| Self::Select(EditTarget::Category(i)));
        }
        if let Some(n) = data.strip_prefix("edit_percent_") {
            return row_index(n).map(|i| Self::Select(EditTarget::Percent(i)));
        }
        None
    }

    pub fn data(&self) -> String {
        match self {
            Self::Select(EditTarget::Bank) => "edit_bank".into(),
            Self::Select(EditTarget::Category(i)) => format!("edit_category_{}", i + 1),
            Self::Select(EditTarget::Percent(i)) => format!("edit_percent_{}", i + 1),
            Self::Confirm => "confirm_edit".into(),
            Self::Cancel => "cancel_edit".into(),
        }
    }
}

fn row_index(n: &str) -> Option<usize> {
    n.parse::<usize>().ok()?.checked_sub(1)
}

/// Rows as a plain-text table with one-based numbering.
pub fn render_table(rows: &[Row]) -> String {
    let mut table = Table::new();
    table.set_header(vec!["#", "Category", "Percent", "Bank"]);
    for (i, row) in rows.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(row.category.as_deref().unwrap_or_default()),
            Cell::new(row.percent.map(|p| p.to_string()).unwrap_or_default()),
            Cell::new(row.bank.as_deref().unwrap_or_default()),
        ]);
    }
    table.to_string()
}

/// One bank button, a category/percent pair per row, then confirm/cancel.
pub fn edit_keyboard(row_count: usize) -> Keyboard {
    let button = |label: String, action: CallbackAction| Button::new(label, action.data());

    let mut kb = Keyboard::new().row(vec![button(
        "Edit Bank".into(),
        CallbackAction::Select(EditTarget::Bank),
    )]);
    for i in 0..row_count {
        kb = kb.row(vec![
            button(
                format!("Edit Category {}", i + 1),
                CallbackAction::Select(EditTarget::Category(i)),
            ),
            button(
                format!("Edit Percent {}", i + 1),
                CallbackAction::Select(EditTarget::Percent(i)),
            ),
        ]);
    }
    kb.row(vec![
        button("✅ Confirm".into(), CallbackAction::Confirm),
        button("❌ Cancel".into(), CallbackAction::Cancel),
    ])
}
