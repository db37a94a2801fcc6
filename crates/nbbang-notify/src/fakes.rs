//! In-memory collaborators for dispatcher tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use nbbang_types::GeoPoint;
use nbbang_types::events::PushNotification;

use crate::error::{PushError, StoreError};
use crate::ports::{NotificationClaim, NotificationLedger, ProfileStore, PushSender, SubscriptionStore};
use crate::subscription::SubscriptionDocument;

#[derive(Default)]
pub struct FakeSubscriptions {
    docs: Mutex<Vec<SubscriptionDocument>>,
    failing: AtomicBool,
}

impl FakeSubscriptions {
    pub fn add(&self, user_id: &str, data: serde_json::Value) {
        self.docs.lock().unwrap().push(SubscriptionDocument {
            user_id: user_id.to_string(),
            data,
        });
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SubscriptionStore for FakeSubscriptions {
    async fn load_subscriptions(&self) -> Result<Vec<SubscriptionDocument>, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("collection offline".into()));
        }
        Ok(self.docs.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct FakeProfiles {
    locations: Mutex<HashMap<String, Option<GeoPoint>>>,
    failing: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeProfiles {
    pub fn set(&self, user_id: &str, location: Option<GeoPoint>) {
        self.locations.lock().unwrap().insert(user_id.to_string(), location);
    }

    pub fn fail_for(&self, user_id: &str) {
        self.failing.lock().unwrap().insert(user_id.to_string());
    }

    pub fn delay_for(&self, user_id: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(user_id.to_string(), delay);
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileStore for FakeProfiles {
    async fn certified_location(&self, user_id: &str) -> Result<Option<GeoPoint>, StoreError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.delays.lock().unwrap().get(user_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().unwrap().contains(user_id) {
            return Err(StoreError::unavailable("profile shard timeout"));
        }
        Ok(self.locations.lock().unwrap().get(user_id).copied().flatten())
    }
}

#[derive(Default)]
pub struct MemoryLedger {
    rows: Mutex<HashMap<(Uuid, String), Option<bool>>>,
    failing: AtomicBool,
}

impl MemoryLedger {
    pub fn fail_claims(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Delivery state for a user on any post, if claimed and recorded.
    pub fn delivered(&self, user_id: &str) -> Option<bool> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|((_, u), _)| u == user_id)
            .and_then(|(_, state)| *state)
    }
}

#[async_trait]
impl NotificationLedger for MemoryLedger {
    async fn claim(&self, claim: &NotificationClaim) -> Result<bool, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("ledger locked"));
        }
        let mut rows = self.rows.lock().unwrap();
        let key = (claim.post_id, claim.user_id.clone());
        if rows.contains_key(&key) {
            return Ok(false);
        }
        rows.insert(key, None);
        Ok(true)
    }

    async fn record_delivery(&self, post_id: Uuid, user_id: &str, delivered: bool) -> Result<(), StoreError> {
        self.rows
            .lock()
            .unwrap()
            .insert((post_id, user_id.to_string()), Some(delivered));
        Ok(())
    }

    async fn release(&self, post_id: Uuid, user_id: &str) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let key = (post_id, user_id.to_string());
        if rows.get(&key) == Some(&None) {
            rows.remove(&key);
            return Ok(true);
        }
        Ok(false)
    }
}

#[derive(Default)]
pub struct RecordingPush {
    sent: Mutex<Vec<(String, PushNotification)>>,
    failing: Mutex<HashSet<String>>,
    delay: Mutex<Duration>,
}

impl RecordingPush {
    pub fn fail_token(&self, token: &str) {
        self.failing.lock().unwrap().insert(token.to_string());
    }

    pub fn delay_sends(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn sent(&self) -> Vec<(String, PushNotification)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushSender for RecordingPush {
    async fn send(&self, token: &str, notification: &PushNotification) -> Result<(), PushError> {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(token) {
            return Err(PushError::Rejected {
                status: 404,
                body: "UNREGISTERED".into(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((token.to_string(), notification.clone()));
        Ok(())
    }
}
