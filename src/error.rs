//! # Error Handling
//!
//! One error type for every client operation, plus the classification used to
//! decide how a failure is surfaced: transport failures degrade silently,
//! request failures become toasts, validation failures are shown inline and
//! never reach the network.

use serde::Deserialize;
use thiserror::Error;

use crate::models::Role;

/// Errors produced by the REST client, the push channel and the stores.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("push channel unavailable: {0}")]
    Transport(String),

    #[error("request failed with status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("a message is already being sent")]
    Busy,

    #[error("role '{role}' is not allowed to {action}")]
    Forbidden { role: Role, action: &'static str },

    #[error("no ticket is open")]
    NoOpenTicket,
}

/// Coarse failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Push channel problems. Never shown; the fallback poller covers them.
    Transport,
    /// A fetch or mutation was rejected or could not be completed.
    Request,
    /// Rejected locally before any network call.
    Validation,
}

/// Error body shapes the portal backend is known to return.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ClientError {
    /// Build an HTTP error from a non-success response body, preferring the
    /// server's `message`/`error` field over the raw text.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|parsed| parsed.message.or(parsed.error))
            .unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    format!("HTTP {}", status)
                } else {
                    trimmed.chars().take(200).collect()
                }
            });
        ClientError::Http { status, message }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Transport(_) => ErrorKind::Transport,
            ClientError::Validation(_)
            | ClientError::Busy
            | ClientError::Forbidden { .. }
            | ClientError::NoOpenTicket => ErrorKind::Validation,
            ClientError::Http { .. }
            | ClientError::Network(_)
            | ClientError::Serialization(_)
            | ClientError::Url(_) => ErrorKind::Request,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            ClientError::Network(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    /// Text suitable for a toast or inline message.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Http { status: 401, .. } => {
                "Your session has expired. Please sign in again.".to_string()
            }
            ClientError::Http { status: 403, .. } | ClientError::Forbidden { .. } => {
                "You do not have permission to do that.".to_string()
            }
            ClientError::Http { status: 404, .. } => "The item could not be found.".to_string(),
            ClientError::Http { message, .. } => message.clone(),
            ClientError::Network(_) => "Network error. Please try again.".to_string(),
            ClientError::Serialization(_) | ClientError::Url(_) => {
                "Unexpected response from the server.".to_string()
            }
            ClientError::Validation(message) => message.clone(),
            ClientError::Busy => "Please wait for the current message to send.".to_string(),
            ClientError::NoOpenTicket => "Open a ticket first.".to_string(),
            ClientError::Transport(_) => "Live updates are unavailable.".to_string(),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
