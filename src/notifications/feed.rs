//! Async side of the notification views.
//!
//! A [`NotificationFeed`] binds one [`NotificationStore`] to the REST API, the
//! push channel and the toast sink. The bell widget and the list page each
//! own a feed with their own capacity and filter.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::store::{LoadOutcome, LoadState, LoadedNotifications, NotificationStore};
use crate::api::PortalApi;
use crate::channel::{PushChannel, Subscription};
use crate::error::{ClientError, ClientResult, ErrorKind};
use crate::feedback::Toaster;
use crate::models::{
    EventName, Notification, NotificationFilter, Pagination, PushEvent, RelatedEntity,
};
use crate::sync::poller::PollTarget;

type SharedStore = Arc<Mutex<NotificationStore>>;

pub struct NotificationFeed {
    store: SharedStore,
    api: Arc<dyn PortalApi>,
    toaster: Arc<dyn Toaster>,
    filter: Mutex<NotificationFilter>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl NotificationFeed {
    /// A feed holding the newest `capacity` notifications.
    pub fn new(
        api: Arc<dyn PortalApi>,
        toaster: Arc<dyn Toaster>,
        capacity: usize,
        seen_capacity: usize,
    ) -> Self {
        let limit = u32::try_from(capacity).unwrap_or(u32::MAX);
        Self {
            store: Arc::new(Mutex::new(NotificationStore::new(capacity, seen_capacity))),
            api,
            toaster,
            filter: Mutex::new(NotificationFilter::window(limit)),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn items(&self) -> Vec<Notification> {
        lock(&self.store).items().to_vec()
    }

    pub fn unread_count(&self) -> u64 {
        lock(&self.store).unread_count()
    }

    pub fn pagination(&self) -> Option<Pagination> {
        lock(&self.store).pagination().cloned()
    }

    pub fn state(&self) -> LoadState {
        lock(&self.store).state().clone()
    }

    pub fn filter(&self) -> NotificationFilter {
        lock(&self.filter).clone()
    }

    pub fn capacity(&self) -> usize {
        lock(&self.store).capacity()
    }

    /// Replace the filter and load from scratch. A `limit` in the filter
    /// becomes the size of the held window.
    pub async fn load_initial(&self, filter: NotificationFilter) -> LoadOutcome {
        if let Some(limit) = filter.limit {
            lock(&self.store).resize(limit as usize);
        }
        *lock(&self.filter) = filter;
        self.load(true).await
    }

    /// Re-fetch with the current filter. A failure keeps the shown data.
    pub async fn refresh(&self) -> LoadOutcome {
        self.load(false).await
    }

    pub async fn set_page(&self, page: u32) -> LoadOutcome {
        lock(&self.filter).page = Some(page.max(1));
        self.load(true).await
    }

    #[instrument(skip(self))]
    async fn load(&self, user_initiated: bool) -> LoadOutcome {
        let filter = self.filter();
        let seq = lock(&self.store).begin_load();

        let fetched = tokio::try_join!(
            self.api.list_notifications(&filter),
            self.api.unread_count()
        );

        match fetched {
            Ok((page, unread_count)) => {
                let loaded = LoadedNotifications { page, unread_count };
                let outcome = lock(&self.store).finish_load(seq, Ok(loaded));
                debug!(?outcome, seq = seq.value(), "notification load finished");
                outcome
            }
            Err(err) => {
                let outcome = lock(&self.store).finish_load(seq, Err(&err));
                if outcome == LoadOutcome::Failed {
                    if user_initiated {
                        self.report(&err);
                    } else {
                        warn!(error = %err, "notification refresh failed; keeping previous data");
                    }
                }
                outcome
            }
        }
    }

    /// Mark one notification read. The local update is applied first and is
    /// kept even if the server call fails.
    #[instrument(skip(self))]
    pub async fn mark_read(&self, notification_id: &str) -> ClientResult<()> {
        let transitioned = lock(&self.store).apply_read_update(notification_id, true);
        debug!(transitioned, "optimistic read update applied");

        self.api
            .mark_notification_read(notification_id)
            .await
            .inspect_err(|err| self.report(err))
    }

    pub async fn mark_all_read(&self) -> ClientResult<()> {
        self.api
            .mark_all_notifications_read()
            .await
            .inspect_err(|err| self.report(err))?;
        lock(&self.store).mark_all_read_local();
        self.toaster.success("All notifications marked as read");
        Ok(())
    }

    pub fn apply_entity_read(&self, entity: &RelatedEntity) -> usize {
        lock(&self.store).apply_entity_read(entity)
    }

    /// Register push handlers on `channel`. Calling it again replaces the
    /// previous registrations.
    pub fn attach(&self, channel: &Arc<PushChannel>) {
        let incoming = Arc::clone(&self.store);
        let updated = Arc::clone(&self.store);
        let counted = Arc::clone(&self.store);

        let subscriptions = vec![
            channel.subscribe_scoped(EventName::NewNotification, move |event| {
                if let PushEvent::NewNotification(notification) = event {
                    lock(&incoming).apply_incoming_notification(notification.clone());
                }
            }),
            channel.subscribe_scoped(EventName::NotificationUpdated, move |event| {
                if let PushEvent::NotificationUpdated(update) = event {
                    lock(&updated).apply_read_update(&update.id, update.read);
                }
            }),
            channel.subscribe_scoped(EventName::UnreadCountUpdated, move |event| {
                if let PushEvent::UnreadCountUpdated(unread) = event {
                    lock(&counted).apply_unread_count_update(unread.count);
                }
            }),
        ];

        *lock(&self.subscriptions) = subscriptions;
    }

    /// Remove every push handler registered by [`attach`](Self::attach).
    pub fn detach(&self) {
        lock(&self.subscriptions).clear();
    }

    /// Apply entity read-marks broadcast by the read-state synchronizer until
    /// the sender side closes.
    pub fn watch_entity_reads(
        &self,
        mut receiver: broadcast::Receiver<RelatedEntity>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(entity) => {
                        let marked = lock(&store).apply_entity_read(&entity);
                        debug!(entity = %entity, marked, "applied entity read-mark");
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "entity read-marks dropped; badge may lag until refresh");
                    }
                    Err(RecvError::Closed) => {
                        info!("entity read-mark stream closed");
                        break;
                    }
                }
            }
        })
    }

    fn report(&self, err: &ClientError) {
        match err.kind() {
            ErrorKind::Request => self.toaster.failure(err),
            ErrorKind::Validation | ErrorKind::Transport => {
                debug!(error = %err, "notification operation rejected")
            }
        }
    }
}

#[async_trait]
impl PollTarget for NotificationFeed {
    async fn poll(&self) {
        self.refresh().await;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poison| poison.into_inner())
}
