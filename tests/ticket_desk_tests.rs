use std::sync::Arc;

use portal_realtime::ClientError;
use portal_realtime::channel::PushChannel;
use portal_realtime::feedback::{RecordingToaster, ToastLevel};
use portal_realtime::models::{NewTicket, Role, SenderType, TicketStatus, TicketType};
use portal_realtime::sync::ReadStateSynchronizer;
use portal_realtime::tickets::TicketDesk;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, method, path},
};

mod test_utils;
use test_utils::{api_for, details_json, envelope, message_json, push_frame, ticket_json};

fn desk(server: &MockServer, role: Role, toaster: &Arc<RecordingToaster>) -> TicketDesk {
    let api = api_for(server);
    TicketDesk::new(
        api.clone(),
        toaster.clone(),
        ReadStateSynchronizer::new(api),
        role,
    )
}

async fn mount_ticket_list(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/tickets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "tickets": [ticket_json("A", 3), ticket_json("B", 0)]
        }))))
        .mount(server)
        .await;
}

async fn mount_read_mark(server: &MockServer, status: u16) {
    Mock::given(method("PUT"))
        .and(path("/api/notifications/read-by-related-entity"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "success": status < 300 })))
        .mount(server)
        .await;
}

async fn mount_details(server: &MockServer, ticket_id: &str, unread: u32, messages: Vec<serde_json::Value>) {
    Mock::given(method("GET"))
        .and(path(format!("/api/tickets/{ticket_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(details_json(ticket_id, unread, messages)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn opening_a_ticket_marks_it_read_and_clears_badge() {
    let server = MockServer::start().await;
    mount_ticket_list(&server).await;
    mount_details(&server, "A", 3, vec![message_json("m1", "A")]).await;
    Mock::given(method("PUT"))
        .and(path("/api/notifications/read-by-related-entity"))
        .and(body_json(json!({ "relatedEntityType": "ticket", "relatedEntityId": "A" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let toaster = Arc::new(RecordingToaster::new());
    let desk = desk(&server, Role::Candidate, &toaster);
    desk.load_tickets().await.unwrap();
    assert_eq!(desk.ticket("A").unwrap().unread_count, 3);

    desk.open("A").await.unwrap();

    assert_eq!(desk.ticket("A").unwrap().unread_count, 0);
    assert_eq!(desk.messages().len(), 1);
    assert!(desk.scroll_requests() >= 1);
}

#[tokio::test]
async fn read_mark_failure_does_not_block_viewing() {
    let server = MockServer::start().await;
    mount_ticket_list(&server).await;
    mount_details(&server, "A", 3, vec![message_json("m1", "A")]).await;
    mount_read_mark(&server, 500).await;

    let toaster = Arc::new(RecordingToaster::new());
    let desk = desk(&server, Role::Candidate, &toaster);
    desk.load_tickets().await.unwrap();

    desk.open("A").await.expect("viewing succeeds");
    assert_eq!(desk.current().unwrap().ticket.id, "A");
    assert_eq!(desk.messages().len(), 1);
    assert!(toaster.errors().is_empty());
}

#[tokio::test]
async fn blank_message_makes_no_request() {
    let server = MockServer::start().await;
    mount_details(&server, "A", 0, vec![message_json("m1", "A")]).await;
    mount_read_mark(&server, 200).await;

    let toaster = Arc::new(RecordingToaster::new());
    let desk = desk(&server, Role::Candidate, &toaster);
    desk.open("A").await.unwrap();

    let err = desk.send("   \n ").await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(desk.messages().len(), 1);
    assert!(!desk.is_sending());

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|request| request.method.as_str() != "POST"));
}

#[tokio::test]
async fn pushes_for_open_and_other_tickets() {
    let server = MockServer::start().await;
    mount_ticket_list(&server).await;
    mount_details(&server, "A", 0, vec![message_json("m1", "A")]).await;
    mount_read_mark(&server, 200).await;

    let toaster = Arc::new(RecordingToaster::new());
    let desk = desk(&server, Role::Hr, &toaster);
    let channel = Arc::new(PushChannel::new());
    desk.attach(&channel);
    desk.load_tickets().await.unwrap();
    desk.open("A").await.unwrap();

    let b_before = desk.ticket("B").unwrap().unread_count;
    channel.dispatch_frame(&push_frame(
        "ticket-message",
        json!({ "ticketId": "A", "message": message_json("m2", "A") }),
    ));
    channel.dispatch_frame(&push_frame(
        "ticket-message",
        json!({ "ticketId": "B", "message": message_json("m3", "B") }),
    ));

    let ids: Vec<String> = desk.messages().into_iter().map(|m| m.id).collect();
    assert_eq!(ids, vec!["m1", "m2"]);
    assert_eq!(desk.ticket("B").unwrap().unread_count, b_before + 1);
    assert!(desk.messages().iter().all(|m| m.ticket_id == "A"));
}

#[tokio::test]
async fn send_reloads_ticket_and_clears_draft() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tickets/A"))
        .respond_with(ResponseTemplate::new(200).set_body_json(details_json(
            "A",
            0,
            vec![message_json("m1", "A")],
        )))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tickets/A"))
        .respond_with(ResponseTemplate::new(200).set_body_json(details_json(
            "A",
            0,
            vec![message_json("m1", "A"), message_json("m2", "A")],
        )))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/tickets/A/messages"))
        .and(body_json(json!({ "message": "Any update?" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(envelope(json!({
            "message": message_json("m2", "A")
        }))))
        .expect(1)
        .mount(&server)
        .await;
    mount_read_mark(&server, 200).await;

    let toaster = Arc::new(RecordingToaster::new());
    let desk = desk(&server, Role::Candidate, &toaster);
    desk.open("A").await.unwrap();

    desk.send("  Any update?  ").await.unwrap();

    assert_eq!(desk.messages().len(), 2);
    assert_eq!(desk.draft(), "");
    assert!(!desk.is_sending());
}

#[tokio::test]
async fn failed_send_keeps_draft_and_toasts() {
    let server = MockServer::start().await;
    mount_details(&server, "A", 0, Vec::new()).await;
    mount_read_mark(&server, 200).await;
    Mock::given(method("POST"))
        .and(path("/api/tickets/A/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "Server error" })))
        .mount(&server)
        .await;

    let toaster = Arc::new(RecordingToaster::new());
    let desk = desk(&server, Role::Candidate, &toaster);
    desk.open("A").await.unwrap();

    assert!(desk.send("hello").await.is_err());
    assert_eq!(desk.draft(), "hello");
    assert!(!desk.is_sending());
    assert_eq!(toaster.errors(), vec!["Server error".to_string()]);
}

#[tokio::test]
async fn candidates_cannot_change_status() {
    let server = MockServer::start().await;
    mount_details(&server, "A", 0, Vec::new()).await;
    mount_read_mark(&server, 200).await;

    let toaster = Arc::new(RecordingToaster::new());
    let desk = desk(&server, Role::Candidate, &toaster);
    desk.open("A").await.unwrap();

    let err = desk.update_status(TicketStatus::Closed).await.unwrap_err();
    assert!(matches!(err, ClientError::Forbidden { role: Role::Candidate, .. }));
    let err = desk.assign("hr-1").await.unwrap_err();
    assert!(matches!(err, ClientError::Forbidden { .. }));

    let requests = server.received_requests().await.unwrap();
    assert!(
        requests
            .iter()
            .all(|request| !request.url.path().ends_with("/status")
                && !request.url.path().ends_with("/assign"))
    );
}

#[tokio::test]
async fn hr_can_reopen_a_closed_ticket() {
    let server = MockServer::start().await;
    mount_details(&server, "A", 0, Vec::new()).await;
    mount_read_mark(&server, 200).await;
    Mock::given(method("PUT"))
        .and(path("/api/tickets/A/status"))
        .and(body_json(json!({ "status": "open" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/tickets/A/assign"))
        .and(body_json(json!({ "assignedTo": "hr-7" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let toaster = Arc::new(RecordingToaster::new());
    let desk = desk(&server, Role::Hr, &toaster);
    desk.open("A").await.unwrap();

    desk.update_status(TicketStatus::Open).await.unwrap();
    desk.assign("hr-7").await.unwrap();
    assert!(toaster.errors().is_empty());
}

#[tokio::test]
async fn status_change_without_open_ticket_is_rejected() {
    let server = MockServer::start().await;
    let toaster = Arc::new(RecordingToaster::new());
    let desk = desk(&server, Role::Admin, &toaster);

    let err = desk.update_status(TicketStatus::Resolved).await.unwrap_err();
    assert!(matches!(err, ClientError::NoOpenTicket));
}

#[tokio::test]
async fn created_ticket_is_listed_and_opened() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tickets"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(envelope(json!({ "ticket": ticket_json("C", 0) }))),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_details(&server, "C", 0, Vec::new()).await;
    mount_read_mark(&server, 200).await;

    let toaster = Arc::new(RecordingToaster::new());
    let desk = desk(&server, Role::Client, &toaster);

    let ticket = desk
        .create_ticket(&NewTicket {
            ticket_type: TicketType::Hr,
            subject: Some("Contract".to_string()),
            description: "Need a copy of my contract".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(ticket.id, "C");
    assert_eq!(desk.tickets()[0].id, "C");
    assert_eq!(desk.current().unwrap().ticket.id, "C");
}

#[tokio::test]
async fn ticket_without_description_is_not_submitted() {
    let server = MockServer::start().await;
    let toaster = Arc::new(RecordingToaster::new());
    let desk = desk(&server, Role::Client, &toaster);

    let err = desk
        .create_ticket(&NewTicket {
            ticket_type: TicketType::It,
            subject: None,
            description: " ".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Validation(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn new_ticket_push_is_prepended() {
    let server = MockServer::start().await;
    mount_ticket_list(&server).await;

    let toaster = Arc::new(RecordingToaster::new());
    let desk = desk(&server, Role::Hr, &toaster);
    let channel = Arc::new(PushChannel::new());
    desk.attach(&channel);
    desk.load_tickets().await.unwrap();

    channel.dispatch_frame(&push_frame("new-ticket", ticket_json("Z", 1)));
    channel.dispatch_frame(&push_frame("new-ticket", ticket_json("Z", 1)));

    let tickets = desk.tickets();
    assert_eq!(tickets.len(), 3);
    assert_eq!(tickets[0].id, "Z");

    desk.detach();
    channel.dispatch_frame(&push_frame("new-ticket", ticket_json("Y", 0)));
    assert_eq!(desk.tickets().len(), 3);
}

#[tokio::test]
async fn messages_from_unlisted_sender_types_are_shown() {
    let server = MockServer::start().await;
    let mut system = message_json("m1", "A");
    system["sentByUserType"] = json!("system");
    mount_details(&server, "A", 0, vec![system]).await;
    mount_read_mark(&server, 200).await;

    let toaster = Arc::new(RecordingToaster::new());
    let desk = desk(&server, Role::Candidate, &toaster);
    let channel = Arc::new(PushChannel::new());
    desk.attach(&channel);

    desk.open("A").await.unwrap();
    assert_eq!(desk.current().map(|open| open.ticket.id).as_deref(), Some("A"));
    assert_eq!(
        desk.messages()[0].sent_by_user_type,
        SenderType::Other("system".to_string())
    );

    let mut shouted = message_json("m2", "A");
    shouted["sentByUserType"] = json!("HR");
    let handled = channel.dispatch_frame(&push_frame(
        "ticket-message",
        json!({ "ticketId": "A", "message": shouted }),
    ));

    assert_eq!(handled, 1);
    let messages = desk.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].sent_by_user_type, SenderType::Role(Role::Hr));
    assert!(toaster.errors().is_empty());
}

#[tokio::test]
async fn sent_message_reload_failure_is_announced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tickets/A"))
        .respond_with(ResponseTemplate::new(200).set_body_json(details_json(
            "A",
            0,
            vec![message_json("m1", "A")],
        )))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tickets/A"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({ "message": "busy" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/tickets/A/messages"))
        .respond_with(ResponseTemplate::new(201).set_body_json(envelope(json!({
            "message": message_json("m2", "A")
        }))))
        .mount(&server)
        .await;
    mount_read_mark(&server, 200).await;

    let toaster = Arc::new(RecordingToaster::new());
    let desk = desk(&server, Role::Candidate, &toaster);
    desk.open("A").await.unwrap();

    desk.send("Any update?").await.unwrap();

    assert_eq!(desk.draft(), "");
    assert_eq!(desk.messages().len(), 1);
    assert!(
        toaster
            .toasts()
            .iter()
            .any(|toast| toast.level == ToastLevel::Info && toast.message.starts_with("Message sent"))
    );
    assert!(toaster.errors().is_empty());
}
