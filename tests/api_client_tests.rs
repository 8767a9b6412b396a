use portal_realtime::ClientError;
use portal_realtime::models::{
    NewTicket, NotificationFilter, RelatedEntity, TicketStatus, TicketType,
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path, query_param},
};

mod test_utils;
use test_utils::{api_for, envelope, notification_json, ticket_json};

#[tokio::test]
async fn list_notifications_sends_filter_and_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/notifications"))
        .and(query_param("unreadOnly", "true"))
        .and(query_param("limit", "20"))
        .and(query_param("page", "2"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "notifications": [notification_json("n1", false), notification_json("n2", true)],
            "pagination": { "page": 2, "limit": 20, "total": 22, "totalPages": 2 }
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    let page = api
        .list_notifications(&NotificationFilter {
            unread_only: true,
            limit: Some(20),
            page: Some(2),
        })
        .await
        .expect("notifications load");

    assert_eq!(page.notifications.len(), 2);
    assert!(page.notifications[1].read);
    let pagination = page.pagination.expect("pagination present");
    assert_eq!(pagination.total_pages, Some(2));
    assert_eq!(pagination.total, Some(22));
}

#[tokio::test]
async fn unread_count_accepts_bare_and_wrapped_bodies() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/notifications/unread-count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "count": 4 })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/notifications/unread-count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({ "count": 9 }))))
        .mount(&server)
        .await;

    let api = api_for(&server);
    assert_eq!(api.unread_count().await.unwrap(), 4);
    assert_eq!(api.unread_count().await.unwrap(), 9);
}

#[tokio::test]
async fn read_by_related_entity_sends_type_and_id() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/notifications/read-by-related-entity"))
        .and(body_json(json!({
            "relatedEntityType": "ticket",
            "relatedEntityId": "t-42"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    api.mark_read_by_related_entity(&RelatedEntity::ticket("t-42"))
        .await
        .expect("batch read-mark succeeds");
}

#[tokio::test]
async fn mark_read_paths_include_the_id() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/notifications/n-7/read"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/notifications/read-all"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    api.mark_notification_read("n-7").await.unwrap();
    api.mark_all_notifications_read().await.unwrap();
}

#[tokio::test]
async fn failure_body_becomes_http_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tickets/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "success": false,
            "message": "Ticket not found"
        })))
        .mount(&server)
        .await;

    let api = api_for(&server);
    let err = api.ticket_details("missing").await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert!(matches!(err, ClientError::Http { ref message, .. } if message == "Ticket not found"));
    assert_eq!(err.user_message(), "The item could not be found.");
}

#[tokio::test]
async fn ticket_mutations_send_expected_bodies() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/tickets/t1/status"))
        .and(body_json(json!({ "status": "in_progress" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/tickets/t1/assign"))
        .and(body_json(json!({ "assignedTo": "hr-9" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/tickets/t1/messages"))
        .and(body_json(json!({ "message": "hello" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    api.update_ticket_status("t1", TicketStatus::InProgress)
        .await
        .unwrap();
    api.assign_ticket("t1", "hr-9").await.unwrap();
    api.send_ticket_message("t1", "hello").await.unwrap();
}

#[tokio::test]
async fn tickets_accept_wrapped_and_bare_shapes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tickets"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(json!({ "tickets": [ticket_json("t1", 2)] }))),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/tickets"))
        .and(body_json(json!({
            "ticketType": "it",
            "subject": "VPN",
            "description": "VPN drops every hour"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(ticket_json("t2", 0)))
        .mount(&server)
        .await;

    let api = api_for(&server);
    let tickets = api.list_tickets().await.unwrap();
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].unread_count, 2);

    let created = api
        .create_ticket(&NewTicket {
            ticket_type: TicketType::It,
            subject: Some("VPN".to_string()),
            description: "VPN drops every hour".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(created.id, "t2");
}
