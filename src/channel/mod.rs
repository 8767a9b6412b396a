//! # Transport Channel
//!
//! One logical push connection per authenticated session. Consumers register
//! handlers per event name and must remove them on teardown; handlers for one
//! event run in subscription order. The channel never replays missed events
//! and does not trigger a re-sync when it reconnects.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use metrics::counter;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::models::{EventName, PushEvent};

pub mod ws;

pub use ws::WsTransport;

/// Callback invoked for every event of the subscribed name.
pub type EventHandler = Arc<dyn Fn(&PushEvent) + Send + Sync>;

/// Handle returned by [`PushChannel::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Registered {
    id: SubscriptionId,
    event: EventName,
    handler: EventHandler,
}

/// Observer registry plus the shared `connected` flag.
pub struct PushChannel {
    handlers: Mutex<Vec<Registered>>,
    next_id: AtomicU64,
    connected: watch::Sender<bool>,
}

impl PushChannel {
    pub fn new() -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            handlers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            connected,
        }
    }

    /// Register `handler` for `event`. Several handlers per event are allowed.
    pub fn subscribe<F>(&self, event: EventName, handler: F) -> SubscriptionId
    where
        F: Fn(&PushEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock_handlers().push(Registered {
            id,
            event,
            handler: Arc::new(handler),
        });
        debug!(event = %event, subscription = id.0, "push handler subscribed");
        id
    }

    /// Like [`subscribe`](Self::subscribe) but removes the handler when the
    /// returned guard is dropped.
    pub fn subscribe_scoped<F>(self: &Arc<Self>, event: EventName, handler: F) -> Subscription
    where
        F: Fn(&PushEvent) + Send + Sync + 'static,
    {
        let id = self.subscribe(event, handler);
        Subscription {
            channel: Arc::downgrade(self),
            id,
        }
    }

    /// Remove a handler. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.lock_handlers();
        let before = handlers.len();
        handlers.retain(|registered| registered.id != id);
        let removed = handlers.len() != before;
        if removed {
            debug!(subscription = id.0, "push handler unsubscribed");
        }
        removed
    }

    pub fn handler_count(&self, event: EventName) -> usize {
        self.lock_handlers()
            .iter()
            .filter(|registered| registered.event == event)
            .count()
    }

    /// Deliver `event` to its handlers in subscription order. Returns the
    /// number of handlers invoked.
    pub fn dispatch(&self, event: &PushEvent) -> usize {
        let name = event.name();
        // Snapshot so handlers may subscribe or unsubscribe while running.
        let targets: Vec<EventHandler> = self
            .lock_handlers()
            .iter()
            .filter(|registered| registered.event == name)
            .map(|registered| Arc::clone(&registered.handler))
            .collect();

        for handler in &targets {
            handler(event);
        }

        counter!("push_events_dispatched_total", "event" => name.as_str()).increment(1);
        targets.len()
    }

    /// Decode and deliver one raw text frame. Malformed frames are dropped.
    pub fn dispatch_frame(&self, frame: &str) -> usize {
        match PushEvent::decode(frame) {
            Ok(Some(event)) => self.dispatch(&event),
            Ok(None) => {
                debug!("ignoring push frame for unconsumed event");
                0
            }
            Err(err) => {
                warn!(error = %err, "dropping malformed push frame");
                0
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    pub fn watch_connected(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    /// Update the connection flag; observers are only woken on a change.
    pub fn set_connected(&self, connected: bool) {
        let changed = self.connected.send_if_modified(|current| {
            if *current == connected {
                false
            } else {
                *current = connected;
                true
            }
        });
        if changed {
            debug!(connected, "push channel connection state changed");
        }
    }

    fn lock_handlers(&self) -> std::sync::MutexGuard<'_, Vec<Registered>> {
        self.handlers
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

impl Default for PushChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard that unsubscribes its handler on drop.
pub struct Subscription {
    channel: Weak<PushChannel>,
    id: SubscriptionId,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.upgrade() {
            channel.unsubscribe(self.id);
        }
    }
}
