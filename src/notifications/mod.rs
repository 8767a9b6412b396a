//! Notification views: the bounded store, its async feed and deep-link routing.

pub mod feed;
pub mod routing;
pub mod store;

pub use feed::NotificationFeed;
pub use routing::{Route, RouteTarget, route_for};
pub use store::{LoadOutcome, LoadState, LoadedNotifications, NotificationStore};
