//! # Notification Store
//!
//! Bounded, newest-first window of notifications plus a running unread
//! counter. Pure state: the async side lives in
//! [`NotificationFeed`](super::feed::NotificationFeed).
//!
//! Counter rules:
//! - an incoming unread notification adds one,
//! - a local false→true read transition subtracts one, floored at zero,
//! - `unread-count-updated` overwrites the counter unconditionally.

use std::num::NonZeroUsize;

use chrono::Utc;
use lru::LruCache;
use tracing::debug;

use crate::error::ClientError;
use crate::models::{Notification, NotificationPage, Pagination, RelatedEntity};
use crate::sync::sequence::{RequestSeq, RequestSequencer};

const MIN_SEEN_CAPACITY: usize = 16;

/// Lifecycle of the held data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing requested yet.
    Idle,
    /// First load in flight.
    Loading,
    Ready,
    /// A refresh failed; the previous data is still shown.
    Stale(String),
    /// The initial load failed; the window is empty.
    Failed(String),
}

/// What happened to a finished load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// A newer request was issued meanwhile; the response was dropped.
    Superseded,
    Failed,
}

/// Result of a notification list fetch plus the authoritative unread count.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedNotifications {
    pub page: NotificationPage,
    pub unread_count: u64,
}

pub struct NotificationStore {
    capacity: usize,
    items: Vec<Notification>,
    unread_count: u64,
    pagination: Option<Pagination>,
    seen: LruCache<String, ()>,
    sequencer: RequestSequencer,
    loaded_once: bool,
    state: LoadState,
}

impl NotificationStore {
    /// `capacity` bounds the held window (3 for the bell widget, the page size
    /// for a list page). `seen_capacity` bounds push de-duplication memory.
    pub fn new(capacity: usize, seen_capacity: usize) -> Self {
        let seen_capacity = NonZeroUsize::new(seen_capacity.max(capacity).max(MIN_SEEN_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            capacity: capacity.max(1),
            items: Vec::new(),
            unread_count: 0,
            pagination: None,
            seen: LruCache::new(seen_capacity),
            sequencer: RequestSequencer::new(),
            loaded_once: false,
            state: LoadState::Idle,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the window size to match the page size being requested.
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.items.truncate(self.capacity);
        if self.seen.cap().get() < self.capacity {
            if let Some(seen_capacity) = NonZeroUsize::new(self.capacity) {
                self.seen.resize(seen_capacity);
            }
        }
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn unread_count(&self) -> u64 {
        self.unread_count
    }

    pub fn pagination(&self) -> Option<&Pagination> {
        self.pagination.as_ref()
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn get(&self, notification_id: &str) -> Option<&Notification> {
        self.items.iter().find(|item| item.id == notification_id)
    }

    /// Tag a new load. Only the response to the newest tag will be applied.
    pub fn begin_load(&mut self) -> RequestSeq {
        if !self.loaded_once {
            self.state = LoadState::Loading;
        }
        self.sequencer.issue()
    }

    /// Apply a finished load. Success replaces the window wholesale. A failed
    /// initial load empties the window; a failed refresh keeps stale data.
    pub fn finish_load(
        &mut self,
        seq: RequestSeq,
        result: Result<LoadedNotifications, &ClientError>,
    ) -> LoadOutcome {
        if !self.sequencer.is_latest(seq) {
            debug!(seq = seq.value(), "discarding superseded notification load");
            return LoadOutcome::Superseded;
        }

        match result {
            Ok(loaded) => {
                let mut notifications = loaded.page.notifications;
                notifications.truncate(self.capacity);

                self.seen.clear();
                for notification in &notifications {
                    self.seen.put(notification.id.clone(), ());
                }

                self.items = notifications;
                self.unread_count = loaded.unread_count;
                self.pagination = loaded.page.pagination;
                self.loaded_once = true;
                self.state = LoadState::Ready;
                LoadOutcome::Applied
            }
            Err(err) => {
                if self.loaded_once {
                    self.state = LoadState::Stale(err.user_message());
                } else {
                    self.items.clear();
                    self.unread_count = 0;
                    self.pagination = None;
                    self.state = LoadState::Failed(err.user_message());
                }
                LoadOutcome::Failed
            }
        }
    }

    /// Prepend a pushed notification and keep the window bounded.
    ///
    /// Duplicate deliveries (same id seen before) are dropped, keeping the
    /// first copy. Returns `false` for a dropped duplicate.
    pub fn apply_incoming_notification(&mut self, notification: Notification) -> bool {
        if self.seen.contains(&notification.id) {
            debug!(notification_id = %notification.id, "dropping duplicate notification");
            return false;
        }
        self.seen.put(notification.id.clone(), ());

        if !notification.read {
            self.unread_count += 1;
        }
        self.items.insert(0, notification);
        self.items.truncate(self.capacity);
        true
    }

    /// Apply a read-state change for one notification. `read` is monotonic:
    /// `false` never un-reads a local entry. Returns `true` when a local
    /// false→true transition happened.
    pub fn apply_read_update(&mut self, notification_id: &str, read: bool) -> bool {
        if !read {
            return false;
        }

        let now = Utc::now();
        let transitioned = self
            .items
            .iter_mut()
            .find(|item| item.id == notification_id)
            .is_some_and(|item| item.mark_read(now));

        if transitioned {
            self.unread_count = self.unread_count.saturating_sub(1);
        }
        transitioned
    }

    /// Overwrite the counter with the server's authoritative value.
    pub fn apply_unread_count_update(&mut self, count: u64) {
        self.unread_count = count;
    }

    /// Mark every held notification referencing `entity` as read. Returns the
    /// number of entries that transitioned.
    pub fn apply_entity_read(&mut self, entity: &RelatedEntity) -> usize {
        let now = Utc::now();
        let transitioned = self
            .items
            .iter_mut()
            .filter(|item| item.refers_to(entity))
            .map(|item| item.mark_read(now))
            .filter(|changed| *changed)
            .count();

        self.unread_count = self.unread_count.saturating_sub(transitioned as u64);
        transitioned
    }

    /// Local effect of "mark all read".
    pub fn mark_all_read_local(&mut self) {
        let now = Utc::now();
        for item in &mut self.items {
            item.mark_read(now);
        }
        self.unread_count = 0;
    }
}
