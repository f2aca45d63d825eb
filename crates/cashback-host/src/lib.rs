//! Bot runtime: turns chat events into extractions, edit sessions and database writes.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod router;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{AllowList, Config, ConfigError, Messages};
pub use dispatcher::Dispatcher;
pub use error::ExtractError;
pub use pipeline::Pipeline;
pub use router::Router;
pub use session::{EditOutcome, EditSession, EditTarget, InputError, SessionState};
pub use store::SessionStore;
