//! Notification model
//!
//! Notifications are private to one recipient and reference the domain object
//! they are about through an optional, non-owning related entity pair.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display and routing tag of a notification.
///
/// The server does not treat this as a closed set, so unknown tags are kept
/// verbatim in [`NotificationKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationKind {
    InterviewScheduled,
    InterviewUpdated,
    JobRequestAssigned,
    JobRequestUpdated,
    CandidatePushed,
    CandidateReviewed,
    TicketCreated,
    TicketMessage,
    TicketStatusChanged,
    InvitationReceived,
    DocumentSubmitted,
    Other(String),
}

impl NotificationKind {
    pub fn as_str(&self) -> &str {
        match self {
            NotificationKind::InterviewScheduled => "interview_scheduled",
            NotificationKind::InterviewUpdated => "interview_updated",
            NotificationKind::JobRequestAssigned => "job_request_assigned",
            NotificationKind::JobRequestUpdated => "job_request_updated",
            NotificationKind::CandidatePushed => "candidate_pushed",
            NotificationKind::CandidateReviewed => "candidate_reviewed",
            NotificationKind::TicketCreated => "ticket_created",
            NotificationKind::TicketMessage => "ticket_message",
            NotificationKind::TicketStatusChanged => "ticket_status_changed",
            NotificationKind::InvitationReceived => "invitation_received",
            NotificationKind::DocumentSubmitted => "document_submitted",
            NotificationKind::Other(tag) => tag,
        }
    }
}

impl From<String> for NotificationKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "interview_scheduled" => NotificationKind::InterviewScheduled,
            "interview_updated" => NotificationKind::InterviewUpdated,
            "job_request_assigned" => NotificationKind::JobRequestAssigned,
            "job_request_updated" => NotificationKind::JobRequestUpdated,
            "candidate_pushed" => NotificationKind::CandidatePushed,
            "candidate_reviewed" => NotificationKind::CandidateReviewed,
            "ticket_created" => NotificationKind::TicketCreated,
            "ticket_message" => NotificationKind::TicketMessage,
            "ticket_status_changed" => NotificationKind::TicketStatusChanged,
            "invitation_received" => NotificationKind::InvitationReceived,
            "document_submitted" => NotificationKind::DocumentSubmitted,
            _ => NotificationKind::Other(value),
        }
    }
}

impl From<NotificationKind> for String {
    fn from(value: NotificationKind) -> Self {
        match value {
            NotificationKind::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

/// Kind of domain object a notification can point at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RelatedEntityType {
    Ticket,
    JobRequest,
    Interview,
    Candidate,
    Organization,
    Invitation,
    Other(String),
}

impl RelatedEntityType {
    pub fn as_str(&self) -> &str {
        match self {
            RelatedEntityType::Ticket => "ticket",
            RelatedEntityType::JobRequest => "job_request",
            RelatedEntityType::Interview => "interview",
            RelatedEntityType::Candidate => "candidate",
            RelatedEntityType::Organization => "organization",
            RelatedEntityType::Invitation => "invitation",
            RelatedEntityType::Other(tag) => tag,
        }
    }
}

impl From<String> for RelatedEntityType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ticket" => RelatedEntityType::Ticket,
            "job_request" | "jobRequest" => RelatedEntityType::JobRequest,
            "interview" => RelatedEntityType::Interview,
            "candidate" => RelatedEntityType::Candidate,
            "organization" => RelatedEntityType::Organization,
            "invitation" => RelatedEntityType::Invitation,
            _ => RelatedEntityType::Other(value),
        }
    }
}

impl From<RelatedEntityType> for String {
    fn from(value: RelatedEntityType) -> Self {
        match value {
            RelatedEntityType::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for RelatedEntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weak reference to a domain object: a type plus an id, with no guarantee
/// the object still exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedEntity {
    #[serde(rename = "relatedEntityType")]
    pub entity_type: RelatedEntityType,
    #[serde(rename = "relatedEntityId")]
    pub entity_id: String,
}

impl RelatedEntity {
    pub fn new(entity_type: RelatedEntityType, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.into(),
        }
    }

    pub fn ticket(ticket_id: impl Into<String>) -> Self {
        Self::new(RelatedEntityType::Ticket, ticket_id)
    }
}

impl fmt::Display for RelatedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.entity_id)
    }
}

/// A notification as delivered by the REST API or the push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_entity_type: Option<RelatedEntityType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_entity_id: Option<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// The related entity, present only when both halves of the pair are set.
    pub fn related_entity(&self) -> Option<RelatedEntity> {
        match (&self.related_entity_type, &self.related_entity_id) {
            (Some(entity_type), Some(entity_id)) => {
                Some(RelatedEntity::new(entity_type.clone(), entity_id.clone()))
            }
            _ => None,
        }
    }

    pub fn refers_to(&self, entity: &RelatedEntity) -> bool {
        self.related_entity_type.as_ref() == Some(&entity.entity_type)
            && self.related_entity_id.as_deref() == Some(entity.entity_id.as_str())
    }

    /// Transition to read. Returns `true` only on an actual false→true change;
    /// `read_at` is stamped exactly once.
    pub fn mark_read(&mut self, at: DateTime<Utc>) -> bool {
        if self.read {
            return false;
        }
        self.read = true;
        if self.read_at.is_none() {
            self.read_at = Some(at);
        }
        true
    }
}

/// Server-side pagination metadata. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub total_pages: Option<u32>,
}

/// One page of notifications, newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationPage {
    #[serde(default)]
    pub notifications: Vec<Notification>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// Query accepted by `GET /notifications`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationFilter {
    pub unread_only: bool,
    pub limit: Option<u32>,
    pub page: Option<u32>,
}

impl NotificationFilter {
    pub fn window(limit: u32) -> Self {
        Self {
            unread_only: false,
            limit: Some(limit),
            page: Some(1),
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if self.unread_only {
            pairs.push(("unreadOnly", "true".to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        pairs
    }
}

/// Payload of the `notification-updated` push event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationReadUpdate {
    pub id: String,
    pub read: bool,
}
