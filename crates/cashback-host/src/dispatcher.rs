//! Event dispatcher: the bot's behaviour for each inbound chat event.
//!
//! Events for one user must be handed in arrival order (see
//! [`Router`](crate::Router)); the dispatcher itself holds no per-user lock.

use std::path::PathBuf;
use std::sync::Arc;

use cashback_chat::{ChatError, ChatTransport, Event, EventKind};
use cashback_core::{Row, current_period};
use cashback_store::{Gateway, StoreError};
use tracing::{debug, error, info, warn};

use crate::config::{AllowList, BotConfig, Messages};
use crate::render::{CallbackAction, edit_keyboard, render_table};
use crate::session::{EditOutcome, EditSession, EditTarget, InputError};
use crate::{Pipeline, SessionStore};

pub struct Dispatcher {
    messages: Messages,
    allow: AllowList,
    images_path: PathBuf,
    save_on_extract: bool,
    pipeline: Pipeline,
    gateway: Arc<dyn Gateway>,
    transport: Arc<dyn ChatTransport>,
    sessions: SessionStore,
}

impl Dispatcher {
    pub fn new(
        bot: BotConfig,
        pipeline: Pipeline,
        gateway: Arc<dyn Gateway>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            allow: AllowList::from_entries(&bot.users),
            messages: bot.messages,
            images_path: bot.images_path,
            save_on_extract: bot.save_on_extract,
            pipeline,
            gateway,
            transport,
            sessions: SessionStore::new(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Handle one event. Only failures to talk to the chat platform are returned.
    pub async fn handle(&self, event: Event) -> Result<(), ChatError> {
        match &event.kind {
            EventKind::Command(name) if name == "start" => self.handle_start(&event).await,
            EventKind::Command(name) => {
                debug!(user = event.display_name(), command = %name, "ignoring command");
                Ok(())
            }
            EventKind::Photo {
                file_id,
                file_unique_id,
            } => self.handle_photo(&event, file_id, file_unique_id).await,
            EventKind::Callback { id, data } => {
                self.transport.answer_callback(id).await?;
                self.handle_callback(&event, data).await
            }
            EventKind::Text(text) => self.handle_text(&event, text).await,
        }
    }

    async fn reply(&self, event: &Event, text: &str) -> Result<(), ChatError> {
        self.transport.send_text(event.sender.chat_id, text).await
    }

    async fn show_table(
        &self,
        event: &Event,
        caption: &str,
        rows: &[Row],
    ) -> Result<(), ChatError> {
        self.transport
            .send_table(
                event.sender.chat_id,
                caption,
                &render_table(rows),
                &edit_keyboard(rows.len()),
            )
            .await
    }

    async fn handle_start(&self, event: &Event) -> Result<(), ChatError> {
        let user = event.display_name();
        if self.allow.person(event.sender.username.as_deref()).is_some() {
            info!(user, "start command");
            self.reply(event, &self.messages.start_message).await
        } else {
            info!(user, "refused start command");
            self.reply(event, &self.messages.refuse_message).await
        }
    }

    async fn handle_photo(
        &self,
        event: &Event,
        file_id: &str,
        file_unique_id: &str,
    ) -> Result<(), ChatError> {
        let user = event.display_name();
        let Some(person) = self.allow.person(event.sender.username.as_deref()) else {
            info!(user, "refused photo");
            return self.reply(event, &self.messages.refuse_message).await;
        };
        self.reply(event, &self.messages.processing_message).await?;

        let image_path = self
            .images_path
            .join(format!("{user}_{file_unique_id}.jpg"));
        if let Err(e) = self.transport.download_file(file_id, &image_path).await {
            error!(user, error = %e, "failed to download photo");
            return self.reply(event, &self.messages.not_ok_message).await;
        }
        info!(user, path = %image_path.display(), "received image");

        let extracted = if self.save_on_extract {
            self.pipeline.extract(&image_path, person).await
        } else {
            self.pipeline.recognize(&image_path, person).await
        };
        let rows = match extracted {
            Ok(rows) => rows,
            Err(e) => {
                error!(user, path = %image_path.display(), error = %e, "extraction failed");
                return self.reply(event, &self.messages.not_ok_message).await;
            }
        };

        self.reply(event, &self.messages.ok_message).await?;
        let session = EditSession::new(rows, image_path, person);
        let rows = session.edited_rows().to_vec();
        if self.sessions.put(event.user_id(), session).is_some() {
            info!(user, "replaced previous edit session");
        }
        self.show_table(event, "", &rows).await?;
        info!(user, rows = rows.len(), "edit session opened");
        self.reply(event, &self.messages.continue_message).await
    }

    async fn handle_callback(&self, event: &Event, data: &str) -> Result<(), ChatError> {
        let user = event.display_name();
        let user_id = event.user_id();
        let Some(mut session) = self.sessions.get(user_id) else {
            warn!(user, user_id, data, "button pressed without active session");
            return self.reply(event, &self.messages.no_session_message).await;
        };
        let Some(action) = CallbackAction::parse(data) else {
            warn!(user, data, "unrecognised button");
            return self.reply(event, &self.messages.invalid_button_message).await;
        };

        match action {
            CallbackAction::Select(target) => {
                if let Err(e) = session.select(target) {
                    warn!(user, error = %e, "stale edit button");
                    return self.reply(event, &self.messages.invalid_button_message).await;
                }
                self.sessions.put(user_id, session);
                info!(user, target = ?target, "edit started");
                let prompt = match target {
                    EditTarget::Bank => self.messages.ask_bank_message.clone(),
                    EditTarget::Category(i) => self.messages.ask_category(i + 1),
                    EditTarget::Percent(i) => self.messages.ask_percent(i + 1),
                };
                self.reply(event, &prompt).await
            }
            CallbackAction::Confirm => {
                self.sessions.delete(user_id);
                info!(user, "edits confirmed");
                let rows = session.confirmed_rows(&current_period());
                match self.save_rows(&rows).await {
                    Ok(()) => {
                        info!(user, rows = rows.len(), "edited rows saved");
                        self.reply(event, &self.messages.saved_message).await
                    }
                    Err(e) => {
                        error!(user, error = %e, "failed to save edited rows");
                        let text = self.messages.save_failed(&e.to_string());
                        self.reply(event, &text).await
                    }
                }
            }
            CallbackAction::Cancel => {
                self.sessions.delete(user_id);
                info!(user, "edits cancelled");
                self.reply(event, &self.messages.cancelled_message).await
            }
        }
    }

    async fn save_rows(&self, rows: &[Row]) -> Result<(), StoreError> {
        for row in rows {
            self.gateway.write_row(row).await?;
        }
        Ok(())
    }

    async fn handle_text(&self, event: &Event, text: &str) -> Result<(), ChatError> {
        let user = event.display_name();
        let user_id = event.user_id();
        let Some(mut session) = self.sessions.get(user_id) else {
            warn!(user, user_id, "text without active session");
            return self.reply(event, &self.messages.no_session_message).await;
        };

        match session.apply_text(text) {
            EditOutcome::Applied { target, old, new } => {
                info!(user, target = ?target, old = %old, new = %new, "field edited");
                let rows = session.edited_rows().to_vec();
                self.sessions.put(user_id, session);
                self.show_table(event, &self.messages.updated_table_header, &rows)
                    .await
            }
            EditOutcome::Rejected(InputError::NotANumber(value)) => {
                warn!(user, value = %value, "invalid percentage");
                self.reply(event, &self.messages.invalid_percent_message).await
            }
            EditOutcome::Rejected(InputError::NothingSelected) => {
                self.reply(event, &self.messages.no_pending_edit_message).await
            }
            EditOutcome::Rejected(e @ InputError::NoSuchRow { .. }) => {
                warn!(user, error = %e, "edit target vanished");
                self.reply(event, &self.messages.invalid_button_message).await
            }
        }
    }
}
