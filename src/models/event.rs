//! Push events delivered over the transport channel.
//!
//! Frames are JSON text: `{"event": "<name>", "data": <payload>}`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::notification::{Notification, NotificationReadUpdate};
use super::ticket::{IncomingTicketMessage, Ticket};

/// Names of the events a consumer can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventName {
    NewNotification,
    NotificationUpdated,
    UnreadCountUpdated,
    NewTicket,
    TicketMessage,
}

impl EventName {
    pub const ALL: [EventName; 5] = [
        EventName::NewNotification,
        EventName::NotificationUpdated,
        EventName::UnreadCountUpdated,
        EventName::NewTicket,
        EventName::TicketMessage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::NewNotification => "new-notification",
            EventName::NotificationUpdated => "notification-updated",
            EventName::UnreadCountUpdated => "unread-count-updated",
            EventName::NewTicket => "new-ticket",
            EventName::TicketMessage => "ticket-message",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| format!("unknown event '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum PushEvent {
    #[serde(rename = "new-notification")]
    NewNotification(Notification),
    #[serde(rename = "notification-updated")]
    NotificationUpdated(NotificationReadUpdate),
    #[serde(rename = "unread-count-updated")]
    UnreadCountUpdated(UnreadCount),
    #[serde(rename = "new-ticket")]
    NewTicket(Ticket),
    #[serde(rename = "ticket-message")]
    TicketMessage(IncomingTicketMessage),
}

#[derive(Deserialize)]
struct FrameHeader {
    event: String,
}

impl PushEvent {
    pub fn name(&self) -> EventName {
        match self {
            PushEvent::NewNotification(_) => EventName::NewNotification,
            PushEvent::NotificationUpdated(_) => EventName::NotificationUpdated,
            PushEvent::UnreadCountUpdated(_) => EventName::UnreadCountUpdated,
            PushEvent::NewTicket(_) => EventName::NewTicket,
            PushEvent::TicketMessage(_) => EventName::TicketMessage,
        }
    }

    /// Decode one text frame. Frames naming an event this client does not
    /// consume decode to `Ok(None)`.
    pub fn decode(frame: &str) -> Result<Option<PushEvent>, serde_json::Error> {
        let header: FrameHeader = serde_json::from_str(frame)?;
        if header.event.parse::<EventName>().is_err() {
            return Ok(None);
        }
        serde_json::from_str(frame).map(Some)
    }
}
