//! Long-poll loop feeding Telegram updates into the router.

use std::time::Duration;

use cashback_chat::TelegramClient;
use cashback_host::Router;
use tracing::{debug, warn};

const POLL_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Poll until the process is stopped. Transport errors are logged and retried.
pub async fn run(telegram: &TelegramClient, router: &Router) {
    let mut offset = None;
    loop {
        let updates = match telegram.get_updates(offset, POLL_TIMEOUT).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "getUpdates failed, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);
            let update_id = update.update_id;
            match update.into_event() {
                Some(event) => router.route(event),
                None => debug!(update_id, "skipping unsupported update"),
            }
        }
    }
}
