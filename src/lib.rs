//! # Portal Realtime
//!
//! Client-side real-time messaging and read-state synchronization for the
//! recruiting portal: push channel, notification views, ticket chat,
//! batch read-marking and the fallback poller.

pub mod api;
pub mod channel;
pub mod cli;
pub mod config;
pub mod error;
pub mod feedback;
pub mod models;
pub mod notifications;
pub mod session;
pub mod sync;
pub mod telemetry;
pub mod tickets;

pub use error::{ClientError, ClientResult};
pub use session::{AuthContext, PortalSession};
