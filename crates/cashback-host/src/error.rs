use cashback_ai::{ImageError, VisionError};
use cashback_core::ParseError;
use cashback_store::StoreError;
use thiserror::Error;

/// Why an extraction run failed. Any of these aborts the run as a whole.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to load category vocabulary: {0}")]
    Categories(#[source] StoreError),

    #[error("image preparation failed: {0}")]
    Image(#[from] ImageError),

    #[error("image worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("model call failed: {0}")]
    Upstream(#[from] VisionError),

    #[error("model response not understood: {0}")]
    Parse(#[from] ParseError),

    /// Rows before `index` may already be persisted; nothing is rolled back.
    #[error("failed to write row {}: {source}", index + 1)]
    Persist { index: usize, source: StoreError },
}
