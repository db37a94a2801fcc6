use crate::Database;
use crate::models::{NotificationRow, PostRow, ProfileRow};
use anyhow::Result;
use nbbang_notify::subscription::{KEYWORDS_FIELD, TOKEN_FIELD};
use rusqlite::Connection;
use serde_json::{Map, Value};
use tracing::warn;

impl Database {
    // -- Posts --

    pub fn insert_post(&self, row: &PostRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (id, author_id, title, content, meeting_lat, meeting_lng, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    row.id,
                    row.author_id,
                    row.title,
                    row.content,
                    row.meeting_lat,
                    row.meeting_lng,
                    row.created_at
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| query_post(conn, id))
    }

    // -- Keyword subscriptions --

    /// Every subscription document as raw JSON text, keyed by user id.
    pub fn list_subscription_documents(&self) -> Result<Vec<(String, String)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT user_id, document FROM keyword_subscriptions")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_subscription_document(&self, user_id: &str) -> Result<Option<Value>> {
        self.with_conn(|conn| {
            let raw = conn
                .query_row(
                    "SELECT document FROM keyword_subscriptions WHERE user_id = ?1",
                    [user_id],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(raw.map(|text| parse_document(user_id, &text)))
        })
    }

    /// Overwrite a user's subscription document as-is.
    pub fn put_subscription_document(&self, user_id: &str, document: &Value) -> Result<()> {
        self.with_conn(|conn| write_document(conn, user_id, document))
    }

    pub fn upsert_keyword(&self, user_id: &str, keyword: &str, radius_km: f64) -> Result<()> {
        self.modify_subscription(user_id, |doc| {
            with_keywords(user_id, doc, |keywords| {
                keywords.insert(keyword.to_string(), Value::from(radius_km));
            });
            true
        })
        .map(|_| ())
    }

    /// Returns false if the keyword was not subscribed.
    pub fn remove_keyword(&self, user_id: &str, keyword: &str) -> Result<bool> {
        self.modify_subscription(user_id, |doc| {
            with_keywords(user_id, doc, |keywords| keywords.remove(keyword).is_some())
        })
    }

    pub fn set_push_token(&self, user_id: &str, token: &str) -> Result<()> {
        self.modify_subscription(user_id, |doc| {
            doc.insert(TOKEN_FIELD.to_string(), Value::from(token));
            true
        })
        .map(|_| ())
    }

    /// Read-modify-write of one document inside a transaction. The closure
    /// returns whether anything changed; unchanged documents are not written.
    fn modify_subscription<F>(&self, user_id: &str, f: F) -> Result<bool>
    where
        F: FnOnce(&mut Map<String, Value>) -> bool,
    {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let existing = tx
                .query_row(
                    "SELECT document FROM keyword_subscriptions WHERE user_id = ?1",
                    [user_id],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;

            let mut doc = match existing.map(|text| parse_document(user_id, &text)) {
                Some(Value::Object(map)) => map,
                Some(_) => {
                    warn!("Replacing non-object subscription document for {}", user_id);
                    Map::new()
                }
                None => Map::new(),
            };

            let changed = f(&mut doc);
            if changed {
                write_document(&tx, user_id, &Value::Object(doc))?;
            }
            tx.commit()?;
            Ok(changed)
        })
    }

    // -- Profiles --

    pub fn certify_location(&self, user_id: &str, lat: f64, lng: f64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_profiles (user_id, certified_lat, certified_lng, certified_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, datetime('now'))
                 ON CONFLICT(user_id) DO UPDATE SET
                    certified_lat = excluded.certified_lat,
                    certified_lng = excluded.certified_lng,
                    certified_at  = excluded.certified_at,
                    updated_at    = excluded.updated_at",
                rusqlite::params![user_id, lat, lng, chrono::Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
    }

    /// Returns false if the user had no certified location.
    pub fn revoke_certified_location(&self, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE user_profiles
                 SET certified_lat = NULL, certified_lng = NULL, certified_at = NULL, updated_at = datetime('now')
                 WHERE user_id = ?1 AND certified_lat IS NOT NULL",
                [user_id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn get_profile(&self, user_id: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT user_id, certified_lat, certified_lng, certified_at FROM user_profiles WHERE user_id = ?1",
                    [user_id],
                    |row| {
                        Ok(ProfileRow {
                            user_id: row.get(0)?,
                            certified_lat: row.get(1)?,
                            certified_lng: row.get(2)?,
                            certified_at: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Notification log --

    /// Insert the (post, user) row unless it exists. Returns true if inserted.
    pub fn claim_notification(&self, post_id: &str, user_id: &str, keyword: &str, distance_km: f64) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO notification_log (post_id, user_id, keyword, distance_km, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![post_id, user_id, keyword, distance_km, chrono::Utc::now().to_rfc3339()],
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn set_delivered(&self, post_id: &str, user_id: &str, delivered: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE notification_log SET delivered = ?3 WHERE post_id = ?1 AND user_id = ?2",
                rusqlite::params![post_id, user_id, delivered],
            )?;
            Ok(())
        })
    }

    /// Delete a claim that never got a delivery state. Returns true if removed.
    pub fn release_notification(&self, post_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM notification_log WHERE post_id = ?1 AND user_id = ?2 AND delivered IS NULL",
                [post_id, user_id],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn notifications_for_post(&self, post_id: &str) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT post_id, user_id, keyword, distance_km, delivered, created_at
                 FROM notification_log
                 WHERE post_id = ?1
                 ORDER BY created_at, user_id",
            )?;
            let rows = stmt
                .query_map([post_id], |row| {
                    Ok(NotificationRow {
                        post_id: row.get(0)?,
                        user_id: row.get(1)?,
                        keyword: row.get(2)?,
                        distance_km: row.get(3)?,
                        delivered: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_post(conn: &Connection, id: &str) -> Result<Option<PostRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, author_id, title, content, meeting_lat, meeting_lng, created_at FROM posts WHERE id = ?1",
    )?;

    let row = stmt
        .query_row([id], |row| {
            Ok(PostRow {
                id: row.get(0)?,
                author_id: row.get(1)?,
                title: row.get(2)?,
                content: row.get(3)?,
                meeting_lat: row.get(4)?,
                meeting_lng: row.get(5)?,
                created_at: row.get(6)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn write_document(conn: &Connection, user_id: &str, document: &Value) -> Result<()> {
    conn.execute(
        "INSERT INTO keyword_subscriptions (user_id, document, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(user_id) DO UPDATE SET document = excluded.document, updated_at = excluded.updated_at",
        rusqlite::params![user_id, document.to_string()],
    )?;
    Ok(())
}

/// Unparseable JSON is kept as a plain string value so readers can report it
/// as malformed instead of losing the row.
pub(crate) fn parse_document(user_id: &str, text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|e| {
        warn!("Corrupt subscription document for {}: {}", user_id, e);
        Value::String(text.to_string())
    })
}

/// Apply `f` to the document's keyword map, replacing the field if it is
/// missing or not a map.
fn with_keywords<R>(user_id: &str, doc: &mut Map<String, Value>, f: impl FnOnce(&mut Map<String, Value>) -> R) -> R {
    let mut keywords = match doc.remove(KEYWORDS_FIELD) {
        Some(Value::Object(map)) => map,
        Some(_) => {
            warn!("Replacing non-map keywords field for {}", user_id);
            Map::new()
        }
        None => Map::new(),
    };
    let result = f(&mut keywords);
    doc.insert(KEYWORDS_FIELD.to_string(), Value::Object(keywords));
    result
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn post_roundtrip_keeps_optional_location() {
        let db = db();
        db.insert_post(&PostRow {
            id: "p1".into(),
            author_id: "u1".into(),
            title: "우유 공동구매".into(),
            content: "".into(),
            meeting_lat: None,
            meeting_lng: None,
            created_at: "2026-10-18 09:00:00".into(),
        })
        .unwrap();

        let row = db.get_post("p1").unwrap().unwrap();
        assert_eq!(row.title, "우유 공동구매");
        assert!(row.meeting_lat.is_none());
        assert!(db.get_post("missing").unwrap().is_none());
    }

    #[test]
    fn keyword_edits_build_one_document() {
        let db = db();
        db.upsert_keyword("u1", "우유", 1.0).unwrap();
        db.upsert_keyword("u1", "계란", 2.5).unwrap();
        db.set_push_token("u1", "tok-1").unwrap();
        db.upsert_keyword("u1", "우유", 3.0).unwrap();

        let doc = db.get_subscription_document("u1").unwrap().unwrap();
        assert_eq!(doc, json!({"keywords": {"우유": 3.0, "계란": 2.5}, "pushToken": "tok-1"}));

        assert!(db.remove_keyword("u1", "계란").unwrap());
        assert!(!db.remove_keyword("u1", "계란").unwrap());
        let doc = db.get_subscription_document("u1").unwrap().unwrap();
        assert_eq!(doc["keywords"], json!({"우유": 3.0}));
    }

    #[test]
    fn removing_from_missing_document_writes_nothing() {
        let db = db();
        assert!(!db.remove_keyword("ghost", "우유").unwrap());
        assert!(db.get_subscription_document("ghost").unwrap().is_none());
    }

    #[test]
    fn upsert_repairs_malformed_keywords_field() {
        let db = db();
        db.put_subscription_document("u1", &json!({"keywords": "우유", "pushToken": "tok"}))
            .unwrap();
        db.upsert_keyword("u1", "우유", 1.0).unwrap();
        let doc = db.get_subscription_document("u1").unwrap().unwrap();
        assert_eq!(doc, json!({"keywords": {"우유": 1.0}, "pushToken": "tok"}));
    }

    #[test]
    fn certify_and_revoke_location() {
        let db = db();
        assert!(db.get_profile("u1").unwrap().is_none());

        db.certify_location("u1", 37.505, 127.003).unwrap();
        let row = db.get_profile("u1").unwrap().unwrap();
        assert_eq!(row.certified_lat, Some(37.505));
        assert!(row.certified_at.is_some());

        assert!(db.revoke_certified_location("u1").unwrap());
        assert!(!db.revoke_certified_location("u1").unwrap());
        let row = db.get_profile("u1").unwrap().unwrap();
        assert!(row.certified_lat.is_none());
    }

    #[test]
    fn notification_claim_is_once_per_pair() {
        let db = db();
        assert!(db.claim_notification("p1", "u1", "우유", 0.6).unwrap());
        assert!(!db.claim_notification("p1", "u1", "계란", 0.6).unwrap());
        assert!(db.claim_notification("p1", "u2", "우유", 0.9).unwrap());

        db.set_delivered("p1", "u1", true).unwrap();
        let rows = db.notifications_for_post("p1").unwrap();
        assert_eq!(rows.len(), 2);
        let u1 = rows.iter().find(|r| r.user_id == "u1").unwrap();
        assert_eq!(u1.keyword, "우유");
        assert_eq!(u1.delivered, Some(true));
        let u2 = rows.iter().find(|r| r.user_id == "u2").unwrap();
        assert_eq!(u2.delivered, None);
    }

    #[test]
    fn release_only_drops_undelivered_claims() {
        let db = db();
        db.claim_notification("p1", "u1", "우유", 0.6).unwrap();
        db.claim_notification("p1", "u2", "우유", 0.6).unwrap();
        db.set_delivered("p1", "u2", false).unwrap();

        assert!(db.release_notification("p1", "u1").unwrap());
        assert!(!db.release_notification("p1", "u1").unwrap());
        assert!(!db.release_notification("p1", "u2").unwrap());

        assert!(db.claim_notification("p1", "u1", "우유", 0.6).unwrap());
        assert!(!db.claim_notification("p1", "u2", "우유", 0.6).unwrap());
    }
}
