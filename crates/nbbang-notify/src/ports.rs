use async_trait::async_trait;
use uuid::Uuid;

use nbbang_types::GeoPoint;
use nbbang_types::events::PushNotification;

use crate::error::{PushError, StoreError};
use crate::subscription::SubscriptionDocument;

/// Bulk read of keyword subscription documents.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn load_subscriptions(&self) -> Result<Vec<SubscriptionDocument>, StoreError>;
}

/// Per-user profile read.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// The user's certified location, `None` if they never certified one.
    async fn certified_location(&self, user_id: &str) -> Result<Option<GeoPoint>, StoreError>;
}

/// A (post, user) notification about to be sent.
#[derive(Debug, Clone)]
pub struct NotificationClaim {
    pub post_id: Uuid,
    pub user_id: String,
    pub keyword: String,
    pub distance_km: f64,
}

/// Persistent record of which users were notified about which posts.
#[async_trait]
pub trait NotificationLedger: Send + Sync {
    /// Reserve the (post, user) pair. Returns `false` if it was already taken.
    async fn claim(&self, claim: &NotificationClaim) -> Result<bool, StoreError>;

    /// Record whether the push for a claimed pair went out.
    async fn record_delivery(&self, post_id: Uuid, user_id: &str, delivered: bool) -> Result<(), StoreError>;

    /// Drop a claim whose delivery was never recorded. Returns `true` if a
    /// claim was removed.
    async fn release(&self, post_id: Uuid, user_id: &str) -> Result<bool, StoreError>;
}

/// Outbound push messaging.
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, token: &str, notification: &PushNotification) -> Result<(), PushError>;
}
