//! Storage layer: the typed gateway rows are written through, and its Notion implementation.

mod error;
pub use error::StoreError;

mod gateway;
pub use gateway::{Gateway, RowId};

mod notion;
pub use notion::NotionStore;
