//! Ticket chat: the message stream state and the desk that drives it.

pub mod desk;
pub mod stream;

pub use desk::TicketDesk;
pub use stream::{Delivery, OpenTicket, OutgoingMessage, TicketMessageStream};
