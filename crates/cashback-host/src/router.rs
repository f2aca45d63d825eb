//! Per-user event lanes.
//!
//! Each user gets a task fed by an unbounded channel, so one user's events are
//! handled strictly in arrival order while different users proceed
//! concurrently. A lane that has seen no event for the idle timeout exits and
//! is removed; the next event for that user starts a fresh one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use cashback_chat::Event;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::Dispatcher;

struct Lane {
    id: u64,
    tx: mpsc::UnboundedSender<Event>,
}

type Lanes = Arc<Mutex<HashMap<i64, Lane>>>;

fn lock(lanes: &Lanes) -> MutexGuard<'_, HashMap<i64, Lane>> {
    lanes.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct Router {
    dispatcher: Arc<Dispatcher>,
    idle: Duration,
    lanes: Lanes,
    next_id: AtomicU64,
}

impl Router {
    pub fn new(dispatcher: Arc<Dispatcher>, idle: Duration) -> Self {
        Self {
            dispatcher,
            idle,
            lanes: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Queue `event` on its user's lane, starting the lane if needed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn route(&self, event: Event) {
        let user_id = event.user_id();
        let mut lanes = lock(&self.lanes);

        let event = match lanes.get(&user_id) {
            Some(lane) => match lane.tx.send(event) {
                Ok(()) => return,
                // Lane exited between its idle check and our send.
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        // Fresh channel with its receiver alive.
        let _ = tx.send(event);
        lanes.insert(user_id, Lane { id, tx });
        debug!(user_id, lane = id, "lane started");

        tokio::spawn(run_lane(
            user_id,
            id,
            rx,
            self.dispatcher.clone(),
            self.lanes.clone(),
            self.idle,
        ));
    }

    pub fn active_lanes(&self) -> usize {
        lock(&self.lanes).len()
    }
}

async fn run_lane(
    user_id: i64,
    id: u64,
    mut rx: mpsc::UnboundedReceiver<Event>,
    dispatcher: Arc<Dispatcher>,
    lanes: Lanes,
    idle: Duration,
) {
    loop {
        match tokio::time::timeout(idle, rx.recv()).await {
            Ok(Some(event)) => {
                if let Err(e) = dispatcher.handle(event).await {
                    error!(user_id, error = %e, "failed to reply");
                }
            }
            Ok(None) => break,
            Err(_) => {
                let mut map = lock(&lanes);
                // An event may have been queued after the timeout fired.
                if !rx.is_empty() {
                    continue;
                }
                if map.get(&user_id).is_some_and(|lane| lane.id == id) {
                    map.remove(&user_id);
                }
                break;
            }
        }
    }
    debug!(user_id, lane = id, "lane stopped");
}
