//! # Read-State Synchronizer
//!
//! Viewing an entity marks every notification that references it as read:
//! one batch request to the server, then a broadcast so each locally held
//! view can zero its own badge. Failures are logged and swallowed; viewing
//! never depends on read-marking. A push that races the request can leave a
//! badge non-zero right after viewing.

use std::sync::Arc;

use metrics::counter;
use tokio::sync::broadcast;
use tracing::{debug, instrument, warn};

use crate::api::PortalApi;
use crate::models::RelatedEntity;

const BROADCAST_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMarkOutcome {
    Marked,
    Failed,
}

#[derive(Clone)]
pub struct ReadStateSynchronizer {
    api: Arc<dyn PortalApi>,
    marked: broadcast::Sender<RelatedEntity>,
}

impl ReadStateSynchronizer {
    pub fn new(api: Arc<dyn PortalApi>) -> Self {
        let (marked, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { api, marked }
    }

    /// Receives every entity whose notifications were marked read on the server.
    pub fn subscribe(&self) -> broadcast::Receiver<RelatedEntity> {
        self.marked.subscribe()
    }

    #[instrument(skip(self), fields(entity = %entity))]
    pub async fn entity_viewed(&self, entity: &RelatedEntity) -> ReadMarkOutcome {
        match self.api.mark_read_by_related_entity(entity).await {
            Ok(()) => {
                counter!("read_state_batches_total", "outcome" => "marked").increment(1);
                // No receivers is fine: nothing local to zero.
                let receivers = self.marked.send(entity.clone()).unwrap_or(0);
                debug!(receivers, "notifications marked read for entity");
                ReadMarkOutcome::Marked
            }
            Err(err) => {
                counter!("read_state_batches_total", "outcome" => "failed").increment(1);
                warn!(error = %err, "failed to mark notifications read for entity");
                ReadMarkOutcome::Failed
            }
        }
    }
}
