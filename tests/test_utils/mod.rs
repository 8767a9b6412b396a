#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use portal_realtime::api::{HttpPortalApi, PortalApi};
use serde_json::{Value, json};
use url::Url;
use wiremock::MockServer;

pub const TOKEN: &str = "test-token";

/// REST client pointed at `<mock server>/api`.
pub fn api_for(server: &MockServer) -> Arc<dyn PortalApi> {
    let base = Url::parse(&format!("{}/api", server.uri())).expect("mock server uri parses");
    Arc::new(HttpPortalApi::new(base, Some(TOKEN.to_string())).expect("http client builds"))
}

/// Wrap a payload the way the portal backend does.
pub fn envelope(data: Value) -> Value {
    json!({ "success": true, "data": data })
}

pub fn notification_json(id: &str, read: bool) -> Value {
    json!({
        "id": id,
        "userId": "u1",
        "type": "ticket_message",
        "title": format!("Title {id}"),
        "message": format!("Message {id}"),
        "read": read,
        "createdAt": "2024-05-01T10:00:00Z"
    })
}

pub fn ticket_notification_json(id: &str, ticket_id: &str) -> Value {
    let mut value = notification_json(id, false);
    value["relatedEntityType"] = json!("ticket");
    value["relatedEntityId"] = json!(ticket_id);
    value
}

pub fn ticket_json(id: &str, unread: u32) -> Value {
    json!({
        "id": id,
        "ticketType": "hr",
        "subject": format!("Subject {id}"),
        "description": "Payslip is missing",
        "status": "open",
        "createdByUserId": "u1",
        "unreadCount": unread,
        "createdAt": "2024-05-01T09:00:00Z"
    })
}

pub fn message_json(id: &str, ticket_id: &str) -> Value {
    json!({
        "id": id,
        "ticketId": ticket_id,
        "sentByUserId": "u2",
        "sentByUserType": "hr",
        "message": format!("Body {id}"),
        "createdAt": "2024-05-01T09:30:00Z"
    })
}

pub fn details_json(ticket_id: &str, unread: u32, messages: Vec<Value>) -> Value {
    envelope(json!({ "ticket": ticket_json(ticket_id, unread), "messages": messages }))
}

pub fn push_frame(event: &str, data: Value) -> String {
    json!({ "event": event, "data": data }).to_string()
}

/// Poll `condition` until it holds or a second passes.
pub async fn eventually<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
