// ABOUTME: Change event broadcasting for committed settings transactions
// ABOUTME: Lets presentation collaborators subscribe instead of polling for changes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 StockPilot Software

//! Settings change events.
//!
//! After a transaction commits, a [`SettingsEvent::SectionChanged`] is
//! published on a broadcast channel. Subscribers that lag beyond the buffer
//! simply miss events; the snapshot API is the source of truth.

use crate::schema::SectionName;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

/// Buffered events per subscriber before lagging kicks in
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Events emitted by the settings engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SettingsEvent {
    /// A section committed; emitted exactly once per transaction, after the
    /// commit, listing only keys whose value actually changed.
    SectionChanged {
        /// The committed section
        section: SectionName,
        /// Keys whose value changed, in key order
        changed_keys: Vec<String>,
    },
}

/// Broadcast fan-out for settings events
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<SettingsEvent>,
}

impl EventBus {
    /// Create a bus with the default buffer size
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Subscribe to all future events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SettingsEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. A send error only means no subscriber is currently
    /// listening, which is not a failure.
    pub fn publish(&self, event: SettingsEvent) {
        if self.sender.send(event.clone()).is_err() {
            trace!(?event, "settings event dropped, no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
