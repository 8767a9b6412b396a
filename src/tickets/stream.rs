//! # Ticket Message Stream
//!
//! Chat history of the one open ticket plus the visible ticket list with
//! per-ticket unread badges. Pure state; the network side lives in
//! [`TicketDesk`](super::desk::TicketDesk).
//!
//! Messages are appended in arrival order and never reordered. A message for
//! a ticket that is not open only bumps that ticket's badge.

use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::models::{Ticket, TicketDetails, TicketMessage};
use crate::sync::sequence::{RequestSeq, RequestSequencer};

/// The ticket currently shown in the chat pane.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenTicket {
    pub ticket: Ticket,
    pub messages: Vec<TicketMessage>,
}

/// Where an incoming message ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Appended to the open ticket's history.
    Appended,
    /// Counted on the ticket's unread badge.
    Badged,
    /// Already held, or for a ticket this viewer has no row for.
    Ignored,
}

/// Message accepted for sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub ticket_id: String,
    pub body: String,
}

#[derive(Debug, Default)]
pub struct TicketMessageStream {
    current: Option<OpenTicket>,
    tickets: Vec<Ticket>,
    draft: String,
    sending: bool,
    scroll_requests: u64,
    open_seq: RequestSequencer,
    list_seq: RequestSequencer,
}

impl TicketMessageStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&OpenTicket> {
        self.current.as_ref()
    }

    pub fn current_ticket_id(&self) -> Option<&str> {
        self.current.as_ref().map(|open| open.ticket.id.as_str())
    }

    pub fn messages(&self) -> &[TicketMessage] {
        self.current
            .as_ref()
            .map(|open| open.messages.as_slice())
            .unwrap_or_default()
    }

    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    pub fn ticket(&self, ticket_id: &str) -> Option<&Ticket> {
        self.tickets.iter().find(|ticket| ticket.id == ticket_id)
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    /// Bumped every time the view should scroll to the newest message.
    pub fn scroll_requests(&self) -> u64 {
        self.scroll_requests
    }

    pub fn begin_list_load(&mut self) -> RequestSeq {
        self.list_seq.issue()
    }

    /// Replace the ticket list. Returns `false` for a superseded response.
    pub fn finish_list_load(&mut self, seq: RequestSeq, tickets: Vec<Ticket>) -> bool {
        if !self.list_seq.is_latest(seq) {
            debug!(seq = seq.value(), "discarding superseded ticket list");
            return false;
        }
        self.tickets = tickets;
        true
    }

    pub fn begin_open(&mut self) -> RequestSeq {
        self.open_seq.issue()
    }

    /// Tag a reload of `ticket_id`, only if it is still the open ticket.
    pub fn begin_reload(&mut self, ticket_id: &str) -> Option<RequestSeq> {
        if self.current_ticket_id() == Some(ticket_id) {
            Some(self.open_seq.issue())
        } else {
            None
        }
    }

    /// Replace the open ticket with fetched details. Returns `false` when a
    /// newer open or reload was issued meanwhile.
    pub fn finish_open(&mut self, seq: RequestSeq, details: TicketDetails) -> bool {
        if !self.open_seq.is_latest(seq) {
            debug!(ticket_id = %details.ticket.id, "discarding superseded ticket details");
            return false;
        }

        self.upsert_row(&details.ticket);
        self.current = Some(OpenTicket {
            ticket: details.ticket,
            messages: details.messages,
        });
        self.scroll_requests += 1;
        true
    }

    /// Validate and claim the send slot for `text`. Nothing is claimed on error.
    pub fn begin_send(&mut self, text: &str) -> ClientResult<OutgoingMessage> {
        let body = text.trim();
        if body.is_empty() {
            return Err(ClientError::Validation(
                "Message cannot be empty".to_string(),
            ));
        }
        let ticket_id = self
            .current_ticket_id()
            .ok_or(ClientError::NoOpenTicket)?
            .to_string();
        if self.sending {
            return Err(ClientError::Busy);
        }

        self.sending = true;
        Ok(OutgoingMessage {
            ticket_id,
            body: body.to_string(),
        })
    }

    /// Release the send slot. The draft is cleared only after a successful send.
    pub fn finish_send(&mut self, delivered: bool) {
        self.sending = false;
        if delivered {
            self.draft.clear();
        }
    }

    /// Route one pushed message.
    pub fn receive(&mut self, ticket_id: &str, message: TicketMessage) -> Delivery {
        if let Some(open) = self
            .current
            .as_mut()
            .filter(|open| open.ticket.id == ticket_id)
        {
            // A reload after our own send may already hold it.
            if open.messages.iter().any(|held| held.id == message.id) {
                return Delivery::Ignored;
            }
            open.messages.push(message);
            self.scroll_requests += 1;
            return Delivery::Appended;
        }

        match self.tickets.iter_mut().find(|ticket| ticket.id == ticket_id) {
            Some(row) => {
                row.unread_count = row.unread_count.saturating_add(1);
                Delivery::Badged
            }
            None => Delivery::Ignored,
        }
    }

    /// Prepend a ticket that appeared on the server. Returns `false` if it is
    /// already listed.
    pub fn apply_new_ticket(&mut self, ticket: Ticket) -> bool {
        if self.ticket(&ticket.id).is_some() {
            return false;
        }
        self.tickets.insert(0, ticket);
        true
    }

    /// Clear the unread badge of `ticket_id`. Returns `true` if one was set.
    pub fn zero_unread(&mut self, ticket_id: &str) -> bool {
        let mut cleared = false;
        if let Some(row) = self.tickets.iter_mut().find(|ticket| ticket.id == ticket_id) {
            cleared = row.unread_count > 0;
            row.unread_count = 0;
        }
        if let Some(open) = self
            .current
            .as_mut()
            .filter(|open| open.ticket.id == ticket_id)
        {
            open.ticket.unread_count = 0;
        }
        cleared
    }

    fn upsert_row(&mut self, ticket: &Ticket) {
        match self.tickets.iter_mut().find(|row| row.id == ticket.id) {
            Some(row) => *row = ticket.clone(),
            None => self.tickets.insert(0, ticket.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, TicketStatus, TicketType};
    use chrono::{TimeZone, Utc};

    fn ticket(id: &str, unread: u32) -> Ticket {
        Ticket {
            id: id.to_string(),
            ticket_type: TicketType::It,
            subject: Some(format!("subject {id}")),
            description: "laptop will not boot".to_string(),
            status: TicketStatus::Open,
            created_by_user_id: "u1".to_string(),
            assigned_to_user_id: None,
            unread_count: unread,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            updated_at: None,
        }
    }

    fn message(id: &str, ticket_id: &str, second: u32) -> TicketMessage {
        TicketMessage {
            id: id.to_string(),
            ticket_id: ticket_id.to_string(),
            sent_by_user_id: "u2".to_string(),
            sent_by_user_type: Role::Hr.into(),
            message: format!("body {id}"),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, second).unwrap(),
        }
    }

    fn opened(id: &str, messages: Vec<TicketMessage>) -> TicketMessageStream {
        let mut stream = TicketMessageStream::new();
        let seq = stream.begin_list_load();
        stream.finish_list_load(seq, vec![ticket("A", 0), ticket("B", 0)]);
        let seq = stream.begin_open();
        assert!(stream.finish_open(
            seq,
            TicketDetails {
                ticket: ticket(id, 0),
                messages,
            }
        ));
        stream
    }

    #[test]
    fn message_for_open_ticket_appends_other_ticket_badges() {
        let mut stream = opened("A", vec![message("m1", "A", 1)]);

        assert_eq!(stream.receive("A", message("m2", "A", 2)), Delivery::Appended);
        assert_eq!(stream.receive("B", message("m3", "B", 3)), Delivery::Badged);

        assert_eq!(stream.messages().len(), 2);
        assert_eq!(stream.ticket("B").unwrap().unread_count, 1);
        assert_eq!(stream.current_ticket_id(), Some("A"));
    }

    #[test]
    fn messages_keep_arrival_order() {
        let mut stream = opened("A", vec![message("m1", "A", 1), message("m2", "A", 2)]);
        // Arrival order wins even when timestamps disagree.
        stream.receive("A", message("m4", "A", 9));
        stream.receive("A", message("m3", "A", 5));

        let ids: Vec<&str> = stream.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m4", "m3"]);
    }

    #[test]
    fn pushed_copy_of_reloaded_message_is_ignored() {
        let mut stream = opened("A", vec![message("m1", "A", 1)]);
        assert_eq!(stream.receive("A", message("m1", "A", 1)), Delivery::Ignored);
        assert_eq!(stream.messages().len(), 1);
    }

    #[test]
    fn unknown_ticket_message_is_ignored() {
        let mut stream = opened("A", Vec::new());
        assert_eq!(stream.receive("Z", message("m1", "Z", 1)), Delivery::Ignored);
    }

    #[test]
    fn empty_message_is_rejected_without_claiming_send() {
        let mut stream = opened("A", Vec::new());
        stream.set_draft("   ");
        assert!(matches!(
            stream.begin_send("  \n\t "),
            Err(ClientError::Validation(_))
        ));
        assert!(!stream.is_sending());
        assert!(stream.messages().is_empty());
        assert_eq!(stream.draft(), "   ");
    }

    #[test]
    fn concurrent_send_is_busy() {
        let mut stream = opened("A", Vec::new());
        let outgoing = stream.begin_send("  hello ").unwrap();
        assert_eq!(outgoing.body, "hello");
        assert_eq!(outgoing.ticket_id, "A");
        assert!(matches!(stream.begin_send("again"), Err(ClientError::Busy)));

        stream.finish_send(false);
        assert!(stream.begin_send("again").is_ok());
    }

    #[test]
    fn draft_survives_failed_send() {
        let mut stream = opened("A", Vec::new());
        stream.set_draft("hello");
        stream.begin_send("hello").unwrap();
        stream.finish_send(false);
        assert_eq!(stream.draft(), "hello");

        stream.begin_send("hello").unwrap();
        stream.finish_send(true);
        assert_eq!(stream.draft(), "");
    }

    #[test]
    fn send_without_open_ticket_fails() {
        let mut stream = TicketMessageStream::new();
        assert!(matches!(
            stream.begin_send("hi"),
            Err(ClientError::NoOpenTicket)
        ));
    }

    #[test]
    fn stale_open_response_is_discarded() {
        let mut stream = TicketMessageStream::new();
        let first = stream.begin_open();
        let second = stream.begin_open();

        assert!(stream.finish_open(
            second,
            TicketDetails {
                ticket: ticket("B", 0),
                messages: Vec::new(),
            }
        ));
        assert!(!stream.finish_open(
            first,
            TicketDetails {
                ticket: ticket("A", 0),
                messages: Vec::new(),
            }
        ));
        assert_eq!(stream.current_ticket_id(), Some("B"));
    }

    #[test]
    fn reload_only_targets_open_ticket() {
        let mut stream = opened("A", Vec::new());
        assert!(stream.begin_reload("B").is_none());
        assert!(stream.begin_reload("A").is_some());
    }

    #[test]
    fn scroll_requested_on_open_and_append() {
        let mut stream = opened("A", Vec::new());
        let after_open = stream.scroll_requests();
        assert!(after_open >= 1);
        stream.receive("A", message("m1", "A", 1));
        assert_eq!(stream.scroll_requests(), after_open + 1);
        stream.receive("B", message("m2", "B", 2));
        assert_eq!(stream.scroll_requests(), after_open + 1);
    }

    #[test]
    fn zero_unread_clears_row_and_open_ticket() {
        let mut stream = TicketMessageStream::new();
        let seq = stream.begin_list_load();
        stream.finish_list_load(seq, vec![ticket("A", 4)]);
        let seq = stream.begin_open();
        stream.finish_open(
            seq,
            TicketDetails {
                ticket: ticket("A", 4),
                messages: Vec::new(),
            },
        );

        assert!(stream.zero_unread("A"));
        assert_eq!(stream.ticket("A").unwrap().unread_count, 0);
        assert_eq!(stream.current().unwrap().ticket.unread_count, 0);
        assert!(!stream.zero_unread("A"));
    }

    #[test]
    fn new_ticket_is_prepended_once() {
        let mut stream = opened("A", Vec::new());
        assert!(stream.apply_new_ticket(ticket("C", 0)));
        assert!(!stream.apply_new_ticket(ticket("C", 0)));
        assert_eq!(stream.tickets()[0].id, "C");
        assert_eq!(stream.tickets().len(), 3);
    }
}
