//! # Data Models
//!
//! Wire types shared by the REST client, the push channel and the in-memory
//! stores.

pub mod event;
pub mod notification;
pub mod role;
pub mod ticket;

pub use event::{EventName, PushEvent};
pub use notification::{
    Notification, NotificationFilter, NotificationKind, NotificationPage, NotificationReadUpdate,
    Pagination, RelatedEntity, RelatedEntityType,
};
pub use role::{Role, SenderType};
pub use ticket::{
    IncomingTicketMessage, NewTicket, Ticket, TicketDetails, TicketMessage, TicketStatus,
    TicketType,
};
