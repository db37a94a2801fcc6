/// Database row types. These map directly to SQLite rows and are converted
/// to `nbbang-types` models at the HTTP layer.

pub struct PostRow {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub content: String,
    pub meeting_lat: Option<f64>,
    pub meeting_lng: Option<f64>,
    pub created_at: String,
}

pub struct ProfileRow {
    pub user_id: String,
    pub certified_lat: Option<f64>,
    pub certified_lng: Option<f64>,
    pub certified_at: Option<String>,
}

pub struct NotificationRow {
    pub post_id: String,
    pub user_id: String,
    pub keyword: String,
    pub distance_km: f64,
    /// `None` while the push is in flight or if the outcome was never recorded.
    pub delivered: Option<bool>,
    pub created_at: String,
}

/// SQLite's `datetime('now')` yields "YYYY-MM-DD HH:MM:SS" without a zone;
/// rows written from Rust carry RFC 3339. Accept both as UTC.
pub fn parse_timestamp(raw: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    raw.parse::<chrono::DateTime<chrono::Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .ok()
}
