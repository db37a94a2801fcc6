/// N빵 keyword notifier core.
///
/// Runs once per created post: loads every keyword subscription, evaluates
/// each subscriber against the post text and the distance between the meeting
/// location and the subscriber's certified location, and sends at most one
/// push per (user, post).
///
/// - `geo`: haversine distance
/// - `subscription`: parsing raw subscription documents
/// - `matcher`: per-user keyword + radius decision
/// - `dispatcher`: bounded concurrent run with per-user isolation
/// - `ports`: store / ledger / push traits the host wires up
/// - `push`: push sender implementations

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod geo;
pub mod matcher;
pub mod ports;
pub mod push;
pub mod subscription;

#[cfg(test)]
mod fakes;

pub use config::NotifyConfig;
pub use dispatcher::{Diagnostic, DispatchReport, Notifier, RunStatus};
pub use error::{DispatchError, PushError, StoreError, SubscriptionError};
pub use matcher::Match;
pub use ports::{NotificationClaim, NotificationLedger, ProfileStore, PushSender, SubscriptionStore};
pub use push::{HttpPushSender, TracingPushSender};
pub use subscription::{KeywordSubscription, SubscriptionDocument};
