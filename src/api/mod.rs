//! Portal REST API boundary
//!
//! Every network call the stores depend on goes through [`PortalApi`], so the
//! feed, ticket desk and read-state synchronizer can be exercised against an
//! in-process fake or a mock HTTP server.

use async_trait::async_trait;

use crate::error::ClientResult;
use crate::models::{
    NewTicket, NotificationFilter, NotificationPage, RelatedEntity, Ticket, TicketDetails,
    TicketStatus,
};

pub mod http;

pub use http::HttpPortalApi;

/// Operations exposed by the portal backend to an authenticated viewer.
#[async_trait]
pub trait PortalApi: Send + Sync {
    /// `GET /notifications?unreadOnly&limit&page`
    async fn list_notifications(&self, filter: &NotificationFilter)
    -> ClientResult<NotificationPage>;

    /// `GET /notifications/unread-count`
    async fn unread_count(&self) -> ClientResult<u64>;

    /// `PUT /notifications/:id/read`
    async fn mark_notification_read(&self, notification_id: &str) -> ClientResult<()>;

    /// `PUT /notifications/read-all`
    async fn mark_all_notifications_read(&self) -> ClientResult<()>;

    /// `PUT /notifications/read-by-related-entity`
    async fn mark_read_by_related_entity(&self, entity: &RelatedEntity) -> ClientResult<()>;

    /// `GET /tickets`
    async fn list_tickets(&self) -> ClientResult<Vec<Ticket>>;

    /// `POST /tickets`
    async fn create_ticket(&self, ticket: &NewTicket) -> ClientResult<Ticket>;

    /// `GET /tickets/:id`
    async fn ticket_details(&self, ticket_id: &str) -> ClientResult<TicketDetails>;

    /// `POST /tickets/:id/messages`
    async fn send_ticket_message(&self, ticket_id: &str, message: &str) -> ClientResult<()>;

    /// `PUT /tickets/:id/status`
    async fn update_ticket_status(&self, ticket_id: &str, status: TicketStatus)
    -> ClientResult<()>;

    /// `PUT /tickets/:id/assign`
    async fn assign_ticket(&self, ticket_id: &str, assignee_user_id: &str) -> ClientResult<()>;
}
