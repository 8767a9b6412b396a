//! # Portal Session
//!
//! Explicit context for one signed-in viewer: who they are, the REST client,
//! the shared push channel and the toast sink. Views are built from the
//! session instead of reaching for globals, so each can be driven in
//! isolation.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{HttpPortalApi, PortalApi};
use crate::channel::{PushChannel, WsTransport};
use crate::config::{AppConfig, ConfigError};
use crate::error::{ClientError, ClientResult};
use crate::feedback::{LogToaster, Toaster};
use crate::models::Role;
use crate::notifications::NotificationFeed;
use crate::sync::poller::{FallbackPoller, PollTarget, PollerHandle};
use crate::sync::read_state::ReadStateSynchronizer;
use crate::tickets::TicketDesk;

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Option<String>,
    pub role: Role,
    pub token: Option<String>,
}

impl AuthContext {
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            user_id: config.user_id.clone(),
            role: config.parsed_role()?,
            token: config.auth_token.clone(),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.as_deref().is_some_and(|token| !token.is_empty())
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] ClientError),
}

pub struct PortalSession {
    config: AppConfig,
    auth: AuthContext,
    api: Arc<dyn PortalApi>,
    channel: Arc<PushChannel>,
    toaster: Arc<dyn Toaster>,
    read_state: ReadStateSynchronizer,
    bell: Arc<NotificationFeed>,
    inbox: Arc<NotificationFeed>,
    desk: Arc<TicketDesk>,
}

impl PortalSession {
    /// Build a session against the configured backend, reporting to the log.
    pub fn from_config(config: AppConfig) -> Result<Self, SessionError> {
        let api: Arc<dyn PortalApi> = Arc::new(HttpPortalApi::from_config(&config)?);
        let toaster: Arc<dyn Toaster> = Arc::new(LogToaster);
        Ok(Self::new(config, api, toaster)?)
    }

    pub fn new(
        config: AppConfig,
        api: Arc<dyn PortalApi>,
        toaster: Arc<dyn Toaster>,
    ) -> Result<Self, ConfigError> {
        let auth = AuthContext::from_config(&config)?;
        let read_state = ReadStateSynchronizer::new(Arc::clone(&api));

        let bell = Arc::new(NotificationFeed::new(
            Arc::clone(&api),
            Arc::clone(&toaster),
            config.bell_capacity,
            config.seen_id_capacity,
        ));
        let inbox = Arc::new(NotificationFeed::new(
            Arc::clone(&api),
            Arc::clone(&toaster),
            config.page_size as usize,
            config.seen_id_capacity,
        ));
        let desk = Arc::new(TicketDesk::new(
            Arc::clone(&api),
            Arc::clone(&toaster),
            read_state.clone(),
            auth.role,
        ));

        Ok(Self {
            config,
            auth,
            api,
            channel: Arc::new(PushChannel::new()),
            toaster,
            read_state,
            bell,
            inbox,
            desk,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    pub fn api(&self) -> Arc<dyn PortalApi> {
        Arc::clone(&self.api)
    }

    pub fn channel(&self) -> Arc<PushChannel> {
        Arc::clone(&self.channel)
    }

    pub fn toaster(&self) -> Arc<dyn Toaster> {
        Arc::clone(&self.toaster)
    }

    pub fn read_state(&self) -> &ReadStateSynchronizer {
        &self.read_state
    }

    /// The bell widget feed (newest few notifications).
    pub fn bell(&self) -> Arc<NotificationFeed> {
        Arc::clone(&self.bell)
    }

    /// The paginated notification list feed.
    pub fn inbox(&self) -> Arc<NotificationFeed> {
        Arc::clone(&self.inbox)
    }

    pub fn desk(&self) -> Arc<TicketDesk> {
        Arc::clone(&self.desk)
    }

    /// Wire every view to the push channel, start the fallback poller and,
    /// for an authenticated viewer, the websocket transport.
    pub fn start(&self) -> ClientResult<RunningSession> {
        self.bell.attach(&self.channel);
        self.inbox.attach(&self.channel);
        self.desk.attach(&self.channel);

        let entity_reads = vec![
            self.bell.watch_entity_reads(self.read_state.subscribe()),
            self.inbox.watch_entity_reads(self.read_state.subscribe()),
        ];

        let shutdown = CancellationToken::new();
        let authenticated = self.auth.is_authenticated();

        let transport = if authenticated {
            let transport = WsTransport::from_config(&self.config, Arc::clone(&self.channel))
                .map_err(|err| ClientError::Transport(err.to_string()))?;
            Some(tokio::spawn(transport.run(shutdown.clone())))
        } else {
            warn!("No auth token configured; live updates disabled");
            None
        };

        let poller = FallbackPoller::new(
            self.config.poller.interval(),
            self.channel.watch_connected(),
            authenticated,
        )
        .spawn(Arc::new(FeedRefresh {
            feeds: vec![Arc::clone(&self.bell), Arc::clone(&self.inbox)],
        }));

        info!(role = %self.auth.role, authenticated, "portal session started");
        Ok(RunningSession {
            shutdown,
            transport,
            poller,
            entity_reads,
            views: vec![Arc::clone(&self.bell), Arc::clone(&self.inbox)],
            desk: Arc::clone(&self.desk),
        })
    }
}

/// Background work of a started session.
pub struct RunningSession {
    shutdown: CancellationToken,
    transport: Option<JoinHandle<ClientResult<()>>>,
    poller: PollerHandle,
    entity_reads: Vec<JoinHandle<()>>,
    views: Vec<Arc<NotificationFeed>>,
    desk: Arc<TicketDesk>,
}

impl RunningSession {
    pub fn live_poll_timers(&self) -> usize {
        self.poller.live_timers()
    }

    /// Unsubscribe every view and stop all background tasks.
    pub async fn shutdown(self) {
        for view in &self.views {
            view.detach();
        }
        self.desk.detach();

        self.shutdown.cancel();
        self.poller.stop().await;
        if let Some(transport) = self.transport {
            match transport.await {
                Ok(Err(err)) => warn!(error = %err, "push transport ended with error"),
                Err(err) => warn!(error = %err, "push transport task failed"),
                Ok(Ok(())) => {}
            }
        }
        for task in self.entity_reads {
            task.abort();
        }
        info!("portal session stopped");
    }
}

struct FeedRefresh {
    feeds: Vec<Arc<NotificationFeed>>,
}

#[async_trait]
impl PollTarget for FeedRefresh {
    async fn poll(&self) {
        for feed in &self.feeds {
            feed.refresh().await;
        }
    }
}
