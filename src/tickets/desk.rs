//! Ticket desk: network side of the ticket chat.
//!
//! Opening a ticket fetches its history and then marks every notification
//! about it as read. Sends are serialized by the stream's busy flag and
//! followed by a reload of the ticket. Status and assignment changes are
//! limited to privileged roles and checked before any request is made.

use std::sync::{Arc, Mutex, MutexGuard};

use metrics::counter;
use tracing::{debug, info, instrument, warn};

use super::stream::{Delivery, OpenTicket, TicketMessageStream};
use crate::api::PortalApi;
use crate::channel::{PushChannel, Subscription};
use crate::error::{ClientError, ClientResult, ErrorKind};
use crate::feedback::Toaster;
use crate::models::{
    EventName, NewTicket, PushEvent, RelatedEntity, Role, Ticket, TicketMessage, TicketStatus,
};
use crate::sync::read_state::{ReadMarkOutcome, ReadStateSynchronizer};

type SharedStream = Arc<Mutex<TicketMessageStream>>;

pub struct TicketDesk {
    stream: SharedStream,
    api: Arc<dyn PortalApi>,
    toaster: Arc<dyn Toaster>,
    read_state: ReadStateSynchronizer,
    role: Role,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl TicketDesk {
    pub fn new(
        api: Arc<dyn PortalApi>,
        toaster: Arc<dyn Toaster>,
        read_state: ReadStateSynchronizer,
        role: Role,
    ) -> Self {
        Self {
            stream: Arc::new(Mutex::new(TicketMessageStream::new())),
            api,
            toaster,
            read_state,
            role,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn current(&self) -> Option<OpenTicket> {
        lock(&self.stream).current().cloned()
    }

    pub fn messages(&self) -> Vec<TicketMessage> {
        lock(&self.stream).messages().to_vec()
    }

    pub fn tickets(&self) -> Vec<Ticket> {
        lock(&self.stream).tickets().to_vec()
    }

    pub fn ticket(&self, ticket_id: &str) -> Option<Ticket> {
        lock(&self.stream).ticket(ticket_id).cloned()
    }

    pub fn draft(&self) -> String {
        lock(&self.stream).draft().to_string()
    }

    pub fn set_draft(&self, text: &str) {
        lock(&self.stream).set_draft(text);
    }

    pub fn is_sending(&self) -> bool {
        lock(&self.stream).is_sending()
    }

    pub fn scroll_requests(&self) -> u64 {
        lock(&self.stream).scroll_requests()
    }

    pub async fn load_tickets(&self) -> ClientResult<()> {
        let seq = lock(&self.stream).begin_list_load();
        let tickets = self
            .api
            .list_tickets()
            .await
            .inspect_err(|err| self.report(err))?;
        let applied = lock(&self.stream).finish_list_load(seq, tickets);
        debug!(applied, "ticket list load finished");
        Ok(())
    }

    /// Show `ticket_id` and mark its notifications read.
    #[instrument(skip(self))]
    pub async fn open(&self, ticket_id: &str) -> ClientResult<()> {
        let seq = lock(&self.stream).begin_open();
        let details = self
            .api
            .ticket_details(ticket_id)
            .await
            .inspect_err(|err| self.report(err))?;
        if !lock(&self.stream).finish_open(seq, details) {
            return Ok(());
        }

        let entity = RelatedEntity::ticket(ticket_id);
        if self.read_state.entity_viewed(&entity).await == ReadMarkOutcome::Marked {
            lock(&self.stream).zero_unread(ticket_id);
        }
        Ok(())
    }

    /// Send `text` on the open ticket. Blank text is rejected before any
    /// request; the draft is kept if sending fails.
    #[instrument(skip(self, text))]
    pub async fn send(&self, text: &str) -> ClientResult<()> {
        let outgoing = {
            let mut stream = lock(&self.stream);
            stream.set_draft(text);
            stream.begin_send(text)
        }
        .inspect_err(|err| self.report(err))?;

        let sent = self
            .api
            .send_ticket_message(&outgoing.ticket_id, &outgoing.body)
            .await;
        lock(&self.stream).finish_send(sent.is_ok());

        match sent {
            Ok(()) => {
                counter!("ticket_messages_sent_total").increment(1);
                if !self.reload(&outgoing.ticket_id).await {
                    self.toaster
                        .info("Message sent. Reopen the ticket if it does not appear.");
                }
                Ok(())
            }
            Err(err) => {
                self.report(&err);
                Err(err)
            }
        }
    }

    /// File a new ticket, list it and open it.
    pub async fn create_ticket(&self, request: &NewTicket) -> ClientResult<Ticket> {
        request
            .validate()
            .map_err(ClientError::Validation)
            .inspect_err(|err| self.report(err))?;

        let ticket = self
            .api
            .create_ticket(request)
            .await
            .inspect_err(|err| self.report(err))?;
        info!(ticket_id = %ticket.id, "ticket created");
        lock(&self.stream).apply_new_ticket(ticket.clone());
        self.toaster.success("Ticket created");

        self.open(&ticket.id).await?;
        Ok(ticket)
    }

    /// Set the open ticket's status. Any status may follow any other.
    pub async fn update_status(&self, status: TicketStatus) -> ClientResult<()> {
        let ticket_id = self
            .privileged_target("change ticket status")
            .inspect_err(|err| self.report(err))?;

        self.api
            .update_ticket_status(&ticket_id, status)
            .await
            .inspect_err(|err| self.report(err))?;
        info!(%ticket_id, %status, "ticket status updated");
        self.toaster.success("Ticket status updated");
        self.reload(&ticket_id).await;
        Ok(())
    }

    pub async fn assign(&self, assignee_user_id: &str) -> ClientResult<()> {
        let ticket_id = self
            .privileged_target("assign tickets")
            .inspect_err(|err| self.report(err))?;

        self.api
            .assign_ticket(&ticket_id, assignee_user_id)
            .await
            .inspect_err(|err| self.report(err))?;
        info!(%ticket_id, assignee_user_id, "ticket assigned");
        self.toaster.success("Ticket assigned");
        self.reload(&ticket_id).await;
        Ok(())
    }

    /// Register push handlers on `channel`, replacing earlier ones.
    pub fn attach(&self, channel: &Arc<PushChannel>) {
        let messages = Arc::clone(&self.stream);
        let tickets = Arc::clone(&self.stream);

        let subscriptions = vec![
            channel.subscribe_scoped(EventName::TicketMessage, move |event| {
                if let PushEvent::TicketMessage(incoming) = event {
                    let delivery =
                        lock(&messages).receive(&incoming.ticket_id, incoming.message.clone());
                    if delivery == Delivery::Ignored {
                        debug!(ticket_id = %incoming.ticket_id, "ticket message not shown");
                    }
                }
            }),
            channel.subscribe_scoped(EventName::NewTicket, move |event| {
                if let PushEvent::NewTicket(ticket) = event {
                    lock(&tickets).apply_new_ticket(ticket.clone());
                }
            }),
        ];

        *lock(&self.subscriptions) = subscriptions;
    }

    pub fn detach(&self) {
        lock(&self.subscriptions).clear();
    }

    fn privileged_target(&self, action: &'static str) -> ClientResult<String> {
        if !self.role.is_privileged() {
            return Err(ClientError::Forbidden {
                role: self.role,
                action,
            });
        }
        lock(&self.stream)
            .current_ticket_id()
            .map(str::to_string)
            .ok_or(ClientError::NoOpenTicket)
    }

    /// Refresh the open ticket after a mutation. Failures leave the shown
    /// state alone and return `false`.
    async fn reload(&self, ticket_id: &str) -> bool {
        let Some(seq) = lock(&self.stream).begin_reload(ticket_id) else {
            return true;
        };
        match self.api.ticket_details(ticket_id).await {
            Ok(details) => {
                lock(&self.stream).finish_open(seq, details);
                true
            }
            Err(err) => {
                warn!(%ticket_id, error = %err, "failed to reload ticket");
                false
            }
        }
    }

    fn report(&self, err: &ClientError) {
        match err.kind() {
            ErrorKind::Request => self.toaster.failure(err),
            ErrorKind::Validation | ErrorKind::Transport => {
                debug!(error = %err, "ticket operation rejected")
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poison| poison.into_inner())
}
