//! Deep-link routing for notifications.
//!
//! The destination is a function of the related entity type and the viewer's
//! role, resolved by one exhaustive match so adding an entity type or a role
//! is a compile error until every pairing is decided.

use crate::models::{Notification, RelatedEntityType, Role};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    Ticket(String),
    JobRequest(String),
    Interview(String),
    Interviews,
    CandidateProfile(String),
    OwnProfile,
    Organization(String),
    OwnOrganization,
    Invitation(String),
    Invitations,
    Notifications,
}

/// A resolved destination for one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub role: Role,
    pub target: RouteTarget,
}

impl Route {
    pub fn path(&self) -> String {
        let prefix = match self.role {
            Role::Admin => "/admin",
            Role::Hr => "/hr",
            Role::Client => "/client",
            Role::Candidate => "/staff",
        };

        match &self.target {
            RouteTarget::Ticket(id) => format!("{prefix}/tickets/{id}"),
            RouteTarget::JobRequest(id) => format!("{prefix}/job-requests/{id}"),
            RouteTarget::Interview(id) => format!("{prefix}/interviews/{id}"),
            RouteTarget::Interviews => format!("{prefix}/interviews"),
            RouteTarget::CandidateProfile(id) => format!("{prefix}/candidates/{id}"),
            RouteTarget::OwnProfile => format!("{prefix}/profile"),
            RouteTarget::Organization(id) => format!("{prefix}/organizations/{id}"),
            RouteTarget::OwnOrganization => format!("{prefix}/organization"),
            RouteTarget::Invitation(id) => format!("{prefix}/invitations/{id}"),
            RouteTarget::Invitations => format!("{prefix}/invitations"),
            RouteTarget::Notifications => format!("{prefix}/notifications"),
        }
    }
}

/// Where clicking `notification` should take a viewer with `role`.
pub fn route_for(notification: &Notification, role: Role) -> Route {
    let target = match notification.related_entity() {
        Some(entity) => target_for(&entity.entity_type, entity.entity_id, role),
        None => RouteTarget::Notifications,
    };
    Route { role, target }
}

fn target_for(entity_type: &RelatedEntityType, id: String, role: Role) -> RouteTarget {
    use RelatedEntityType as E;

    match (entity_type, role) {
        (E::Ticket, _) => RouteTarget::Ticket(id),

        (E::JobRequest, Role::Admin | Role::Hr | Role::Client) => RouteTarget::JobRequest(id),
        (E::JobRequest, Role::Candidate) => RouteTarget::Notifications,

        (E::Interview, Role::Admin | Role::Hr | Role::Client) => RouteTarget::Interview(id),
        (E::Interview, Role::Candidate) => RouteTarget::Interviews,

        (E::Candidate, Role::Admin | Role::Hr | Role::Client) => RouteTarget::CandidateProfile(id),
        (E::Candidate, Role::Candidate) => RouteTarget::OwnProfile,

        (E::Organization, Role::Admin | Role::Hr) => RouteTarget::Organization(id),
        (E::Organization, Role::Client) => RouteTarget::OwnOrganization,
        (E::Organization, Role::Candidate) => RouteTarget::Notifications,

        (E::Invitation, Role::Admin | Role::Hr) => RouteTarget::Invitations,
        (E::Invitation, Role::Client | Role::Candidate) => RouteTarget::Invitation(id),

        (E::Other(_), _) => RouteTarget::Notifications,
    }
}
