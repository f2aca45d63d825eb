use std::fmt;

use async_trait::async_trait;
use cashback_core::Row;

use crate::StoreError;

/// Identifier the store assigned to a written row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowId(pub String);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Typed access to the structured database holding cashback rows.
///
/// Every call is its own remote transaction. There is no batching and no
/// atomicity across rows.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Current category vocabulary.
    async fn list_categories(&self) -> Result<Vec<String>, StoreError>;

    /// Validate and insert one row.
    ///
    /// Fails with [`StoreError::Validation`] naming the first missing required
    /// field before anything is sent.
    async fn write_row(&self, row: &Row) -> Result<RowId, StoreError>;
}

/// Check the required fields of `row` in their fixed order.
pub(crate) fn validate(row: &Row) -> Result<(), StoreError> {
    match row.missing_required() {
        Some(field) => Err(StoreError::Validation { field }),
        None => Ok(()),
    }
}
