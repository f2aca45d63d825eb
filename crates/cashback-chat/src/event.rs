/// Who an event came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    /// Stable per-user id; sessions are keyed by it.
    pub user_id: i64,
    /// Conversation replies go to.
    pub chat_id: i64,
    /// Public handle checked against the allow-list. Not every account has one.
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// `/name` command, without the slash or any `@bot` suffix.
    Command(String),
    /// Photo message; ids refer to the largest available size.
    Photo {
        file_id: String,
        file_unique_id: String,
    },
    /// Inline button press.
    Callback { id: String, data: String },
    /// Plain text that is not a command.
    Text(String),
}

/// One inbound chat event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub sender: Sender,
    pub kind: EventKind,
}

impl Event {
    pub fn user_id(&self) -> i64 {
        self.sender.user_id
    }

    /// Username for log lines; `?` when the account has none.
    pub fn display_name(&self) -> &str {
        self.sender.username.as_deref().unwrap_or("?")
    }
}
