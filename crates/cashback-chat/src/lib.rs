//! Chat layer: inbound events, outbound messages and keyboards, and the Telegram transport.

mod event;
pub use event::{Event, EventKind, Sender};

mod keyboard;
pub use keyboard::{Button, Keyboard};

mod transport;
pub use transport::{ChatError, ChatTransport};

pub mod telegram;
pub use telegram::TelegramClient;
