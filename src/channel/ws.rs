//! Websocket transport feeding a [`PushChannel`].
//!
//! Keeps one connection open for the session, flips the channel's
//! `connected` flag and reconnects with capped, jittered exponential backoff
//! until shut down. Events sent while disconnected are lost; the fallback
//! poller covers the gap.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rand::Rng;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::PushChannel;
use crate::config::{AppConfig, ConfigError, ReconnectConfig};
use crate::error::{ClientError, ClientResult};

pub struct WsTransport {
    channel: Arc<PushChannel>,
    url: Url,
    auth_token: Option<String>,
    reconnect: ReconnectConfig,
}

impl WsTransport {
    pub fn new(
        channel: Arc<PushChannel>,
        url: Url,
        auth_token: Option<String>,
        reconnect: ReconnectConfig,
    ) -> Self {
        Self {
            channel,
            url,
            auth_token,
            reconnect,
        }
    }

    pub fn from_config(config: &AppConfig, channel: Arc<PushChannel>) -> Result<Self, ConfigError> {
        Ok(Self::new(
            channel,
            config.resolved_push_url()?,
            config.auth_token.clone(),
            config.reconnect.clone(),
        ))
    }

    /// Run the connect/read/reconnect loop until `shutdown` fires.
    #[instrument(skip_all, fields(url = %self.url))]
    pub async fn run(self, shutdown: CancellationToken) -> ClientResult<()> {
        info!("Starting push transport");
        let mut attempt: u32 = 0;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                outcome = self.session(&shutdown) => match outcome {
                    Ok(frames) => {
                        info!(frames, "push connection closed");
                        if frames > 0 {
                            attempt = 0;
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, attempt, "push connection failed");
                    }
                },
            }

            self.channel.set_connected(false);
            if shutdown.is_cancelled() {
                break;
            }

            let delay = backoff_delay(&self.reconnect, attempt);
            attempt = attempt.saturating_add(1);
            debug!(delay_ms = delay.as_millis() as u64, "waiting before reconnect");

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(delay) => {}
            }
        }

        self.channel.set_connected(false);
        info!("Push transport stopped");
        Ok(())
    }

    /// One connection lifetime. Returns the number of text frames received.
    async fn session(&self, shutdown: &CancellationToken) -> ClientResult<u64> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|err| ClientError::Transport(err.to_string()))?;

        if let Some(token) = &self.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|err| ClientError::Transport(err.to_string()))?;
            request.headers_mut().insert("Authorization", value);
        }

        let (stream, _response) = connect_async(request)
            .await
            .map_err(|err| ClientError::Transport(err.to_string()))?;

        self.channel.set_connected(true);
        info!("push connection established");

        let (mut sink, mut stream) = stream.split();
        let mut frames: u64 = 0;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    let _ = sink.close().await;
                    break;
                }
                next = stream.next() => match next {
                    Some(Ok(Message::Text(text))) => {
                        frames += 1;
                        self.channel.dispatch_frame(&text);
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "server closed push connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return Err(ClientError::Transport(err.to_string())),
                    None => break,
                },
            }
        }

        Ok(frames)
    }
}

/// `base * 2^attempt`, capped at `max`, spread by `± jitter_factor`.
pub fn backoff_delay(config: &ReconnectConfig, attempt: u32) -> Duration {
    let exponential = config
        .base_ms
        .saturating_mul(1u64.checked_shl(attempt.min(20)).unwrap_or(u64::MAX));
    let capped = exponential.min(config.max_ms) as f64;

    let spread = if config.jitter_factor > 0.0 {
        rand::thread_rng().gen_range(-config.jitter_factor..=config.jitter_factor)
    } else {
        0.0
    };

    Duration::from_millis((capped * (1.0 + spread)).max(0.0) as u64)
}
