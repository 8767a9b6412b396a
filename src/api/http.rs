//! reqwest-backed implementation of [`PortalApi`].

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;

use super::PortalApi;
use crate::config::AppConfig;
use crate::error::{ClientError, ClientResult};
use crate::models::{
    NewTicket, NotificationFilter, NotificationPage, RelatedEntity, Ticket, TicketDetails,
    TicketStatus,
};
use crate::telemetry;

const USER_AGENT: &str = concat!("portal-realtime/", env!("CARGO_PKG_VERSION"));

#[derive(Deserialize)]
struct CountBody {
    count: u64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TicketBody {
    Wrapped { ticket: Ticket },
    Bare(Ticket),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TicketListBody {
    Wrapped { tickets: Vec<Ticket> },
    Bare(Vec<Ticket>),
}

/// HTTP client for the portal backend.
#[derive(Clone)]
pub struct HttpPortalApi {
    client: reqwest::Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl HttpPortalApi {
    pub fn new(base_url: Url, auth_token: Option<String>) -> ClientResult<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self::with_client(client, base_url, auth_token))
    }

    pub fn with_client(client: reqwest::Client, base_url: Url, auth_token: Option<String>) -> Self {
        Self {
            client,
            base_url,
            auth_token,
        }
    }

    pub fn from_config(config: &AppConfig) -> ClientResult<Self> {
        let base_url = Url::parse(&config.api_base_url)?;
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::with_client(
            client,
            base_url,
            config.auth_token.clone(),
        ))
    }

    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request_id = telemetry::current_trace_id()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let builder = self
            .client
            .request(method, url)
            .header("Accept", "application/json")
            .header("X-Request-Id", request_id);
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ClientResult<T> {
        let value = self.execute_value(builder).await?;
        Ok(serde_json::from_value(unwrap_envelope(value))?)
    }

    async fn execute_value(&self, builder: RequestBuilder) -> ClientResult<Value> {
        let response = builder.send().await?;
        let status = response.status();
        let url = response.url().clone();

        if status.is_success() {
            let body = response.text().await?;
            debug!(%url, status = status.as_u16(), "portal request succeeded");
            if body.trim().is_empty() {
                return Ok(Value::Null);
            }
            return Ok(serde_json::from_str(&body)?);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(%url, status = status.as_u16(), "portal request failed");
        Err(ClientError::from_response(status.as_u16(), &body))
    }
}

/// The backend wraps most payloads as `{"success": true, "data": ...}`; bare
/// payloads are passed through.
fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("success") && map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

#[async_trait]
impl PortalApi for HttpPortalApi {
    async fn list_notifications(
        &self,
        filter: &NotificationFilter,
    ) -> ClientResult<NotificationPage> {
        let mut url = self.endpoint(&["notifications"])?;
        {
            let pairs = filter.query_pairs();
            if !pairs.is_empty() {
                let mut query = url.query_pairs_mut();
                for (key, value) in pairs {
                    query.append_pair(key, &value);
                }
            }
        }
        self.execute(self.request(Method::GET, url)).await
    }

    async fn unread_count(&self) -> ClientResult<u64> {
        let url = self.endpoint(&["notifications", "unread-count"])?;
        let body: CountBody = self.execute(self.request(Method::GET, url)).await?;
        Ok(body.count)
    }

    async fn mark_notification_read(&self, notification_id: &str) -> ClientResult<()> {
        let url = self.endpoint(&["notifications", notification_id, "read"])?;
        self.execute_value(self.request(Method::PUT, url)).await?;
        Ok(())
    }

    async fn mark_all_notifications_read(&self) -> ClientResult<()> {
        let url = self.endpoint(&["notifications", "read-all"])?;
        self.execute_value(self.request(Method::PUT, url)).await?;
        Ok(())
    }

    async fn mark_read_by_related_entity(&self, entity: &RelatedEntity) -> ClientResult<()> {
        let url = self.endpoint(&["notifications", "read-by-related-entity"])?;
        self.execute_value(self.request(Method::PUT, url).json(entity))
            .await?;
        Ok(())
    }

    async fn list_tickets(&self) -> ClientResult<Vec<Ticket>> {
        let url = self.endpoint(&["tickets"])?;
        let body: TicketListBody = self.execute(self.request(Method::GET, url)).await?;
        Ok(match body {
            TicketListBody::Wrapped { tickets } => tickets,
            TicketListBody::Bare(tickets) => tickets,
        })
    }

    async fn create_ticket(&self, ticket: &NewTicket) -> ClientResult<Ticket> {
        let url = self.endpoint(&["tickets"])?;
        let body: TicketBody = self
            .execute(self.request(Method::POST, url).json(ticket))
            .await?;
        Ok(match body {
            TicketBody::Wrapped { ticket } => ticket,
            TicketBody::Bare(ticket) => ticket,
        })
    }

    async fn ticket_details(&self, ticket_id: &str) -> ClientResult<TicketDetails> {
        let url = self.endpoint(&["tickets", ticket_id])?;
        self.execute(self.request(Method::GET, url)).await
    }

    async fn send_ticket_message(&self, ticket_id: &str, message: &str) -> ClientResult<()> {
        let url = self.endpoint(&["tickets", ticket_id, "messages"])?;
        self.execute_value(
            self.request(Method::POST, url)
                .json(&json!({ "message": message })),
        )
        .await?;
        Ok(())
    }

    async fn update_ticket_status(
        &self,
        ticket_id: &str,
        status: TicketStatus,
    ) -> ClientResult<()> {
        let url = self.endpoint(&["tickets", ticket_id, "status"])?;
        self.execute_value(
            self.request(Method::PUT, url)
                .json(&json!({ "status": status })),
        )
        .await?;
        Ok(())
    }

    async fn assign_ticket(&self, ticket_id: &str, assignee_user_id: &str) -> ClientResult<()> {
        let url = self.endpoint(&["tickets", ticket_id, "assign"])?;
        self.execute_value(
            self.request(Method::PUT, url)
                .json(&json!({ "assignedTo": assignee_user_id })),
        )
        .await?;
        Ok(())
    }
}
