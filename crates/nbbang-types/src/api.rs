use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::GeoPoint;

// -- Posts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub author_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub meeting_location: Option<GeoPoint>,
}

// -- Keyword subscriptions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct UpsertKeywordRequest {
    pub radius_km: f64,
}

/// Keyword → radius (km) map for one user, plus whether a token is registered.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordListResponse {
    pub user_id: Uuid,
    pub keywords: BTreeMap<String, f64>,
    pub has_push_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetPushTokenRequest {
    pub token: String,
}

// -- Profiles --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CertifyLocationRequest {
    pub latitude: f64,
    pub longitude: f64,
}

// -- Notification log --

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationLogEntry {
    pub post_id: Uuid,
    pub user_id: String,
    pub keyword: String,
    pub distance_km: f64,
    pub delivered: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
