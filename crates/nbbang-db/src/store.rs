use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use nbbang_notify::{
    NotificationClaim, NotificationLedger, ProfileStore, StoreError, SubscriptionDocument, SubscriptionStore,
};
use nbbang_types::GeoPoint;

use crate::Database;
use crate::queries::parse_document;

/// Notifier store ports backed by the SQLite database.
///
/// SQLite calls block, so each one runs on the blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(StoreError::unavailable)?
            .map_err(StoreError::unavailable)
    }
}

#[async_trait]
impl SubscriptionStore for SqliteStore {
    async fn load_subscriptions(&self) -> Result<Vec<SubscriptionDocument>, StoreError> {
        let rows = self.blocking(|db| db.list_subscription_documents()).await?;
        Ok(rows
            .into_iter()
            .map(|(user_id, text)| SubscriptionDocument {
                data: parse_document(&user_id, &text),
                user_id,
            })
            .collect())
    }
}

#[async_trait]
impl ProfileStore for SqliteStore {
    async fn certified_location(&self, user_id: &str) -> Result<Option<GeoPoint>, StoreError> {
        let uid = user_id.to_string();
        let row = self.blocking(move |db| db.get_profile(&uid)).await?;

        match row.map(|r| (r.certified_lat, r.certified_lng)) {
            None | Some((None, None)) => Ok(None),
            Some((Some(lat), Some(lng))) => Ok(Some(GeoPoint::new(lat, lng))),
            Some(_) => Err(StoreError::Malformed {
                id: user_id.to_string(),
                reason: "certified location has only one coordinate".into(),
            }),
        }
    }
}

#[async_trait]
impl NotificationLedger for SqliteStore {
    async fn claim(&self, claim: &NotificationClaim) -> Result<bool, StoreError> {
        let claim = claim.clone();
        self.blocking(move |db| {
            db.claim_notification(&claim.post_id.to_string(), &claim.user_id, &claim.keyword, claim.distance_km)
        })
        .await
    }

    async fn record_delivery(&self, post_id: Uuid, user_id: &str, delivered: bool) -> Result<(), StoreError> {
        let uid = user_id.to_string();
        self.blocking(move |db| db.set_delivered(&post_id.to_string(), &uid, delivered))
            .await
    }

    async fn release(&self, post_id: Uuid, user_id: &str) -> Result<bool, StoreError> {
        let uid = user_id.to_string();
        self.blocking(move |db| db.release_notification(&post_id.to_string(), &uid))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> (Arc<Database>, SqliteStore) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        (db.clone(), SqliteStore::new(db))
    }

    #[tokio::test]
    async fn corrupt_document_is_returned_not_dropped() {
        let (db, store) = store();
        db.upsert_keyword("good", "우유", 1.0).unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO keyword_subscriptions (user_id, document) VALUES ('bad', '{not json')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let docs = store.load_subscriptions().await.unwrap();
        assert_eq!(docs.len(), 2);
        let bad = docs.iter().find(|d| d.user_id == "bad").unwrap();
        assert!(bad.data.is_string());
        let good = docs.iter().find(|d| d.user_id == "good").unwrap();
        assert_eq!(good.data["keywords"], json!({"우유": 1.0}));
    }

    #[tokio::test]
    async fn certified_location_states() {
        let (db, store) = store();
        assert_eq!(store.certified_location("nobody").await.unwrap(), None);

        db.certify_location("u1", 37.505, 127.003).unwrap();
        assert_eq!(
            store.certified_location("u1").await.unwrap(),
            Some(GeoPoint::new(37.505, 127.003))
        );

        db.revoke_certified_location("u1").unwrap();
        assert_eq!(store.certified_location("u1").await.unwrap(), None);

        db.with_conn(|conn| {
            conn.execute("INSERT INTO user_profiles (user_id, certified_lat) VALUES ('half', 37.5)", [])?;
            Ok(())
        })
        .unwrap();
        assert!(matches!(
            store.certified_location("half").await,
            Err(StoreError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn ledger_claims_once() {
        let (db, store) = store();
        let claim = NotificationClaim {
            post_id: Uuid::new_v4(),
            user_id: "u1".into(),
            keyword: "우유".into(),
            distance_km: 0.6,
        };
        assert!(store.claim(&claim).await.unwrap());
        assert!(!store.claim(&claim).await.unwrap());

        store.record_delivery(claim.post_id, "u1", true).await.unwrap();
        let rows = db.notifications_for_post(&claim.post_id.to_string()).unwrap();
        assert_eq!(rows[0].delivered, Some(true));
        assert!(!store.release(claim.post_id, "u1").await.unwrap());
    }

    #[tokio::test]
    async fn released_claim_can_be_taken_again() {
        let (_db, store) = store();
        let claim = NotificationClaim {
            post_id: Uuid::new_v4(),
            user_id: "u1".into(),
            keyword: "우유".into(),
            distance_km: 0.6,
        };
        assert!(store.claim(&claim).await.unwrap());
        assert!(store.release(claim.post_id, "u1").await.unwrap());
        assert!(store.claim(&claim).await.unwrap());
    }
}
