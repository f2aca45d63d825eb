//! In-memory session store keyed by chat user id.
//!
//! Sessions are not persisted; a restart drops any that are in flight.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::EditSession;

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<i64, EditSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i64, EditSession>> {
        // A panic while holding the lock cannot leave a half-written entry behind.
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the user's session.
    pub fn get(&self, user_id: i64) -> Option<EditSession> {
        self.lock().get(&user_id).cloned()
    }

    /// Store `session` for the user, returning the one it replaced.
    pub fn put(&self, user_id: i64, session: EditSession) -> Option<EditSession> {
        self.lock().insert(user_id, session)
    }

    /// Remove and return the user's session.
    pub fn delete(&self, user_id: i64) -> Option<EditSession> {
        self.lock().remove(&user_id)
    }

    pub fn contains(&self, user_id: i64) -> bool {
        self.lock().contains_key(&user_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
