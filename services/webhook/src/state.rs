//! State handed to every request handler.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::dispatcher::Dispatcher;

/// Handler state: the shared dispatcher and the time the server started.
///
/// Cloning is cheap; every clone points at the same dispatcher, and so at
/// the same orchestration client.
#[derive(Clone)]
pub struct AppState {
    dispatcher: Arc<Dispatcher>,
    started_at: DateTime<Utc>,
}

impl AppState {
    /// Wrap an owned or already shared dispatcher.
    pub fn new(dispatcher: impl Into<Arc<Dispatcher>>) -> Self {
        Self {
            dispatcher: dispatcher.into(),
            started_at: Utc::now(),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Whole seconds since the state was created.
    pub fn uptime_seconds(&self) -> u64 {
        (Utc::now() - self.started_at).num_seconds().max(0) as u64
    }
}
