use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS posts (
            id            TEXT PRIMARY KEY,
            author_id     TEXT NOT NULL,
            title         TEXT NOT NULL,
            content       TEXT NOT NULL,
            meeting_lat   REAL,
            meeting_lng   REAL,
            created_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_posts_created
            ON posts(created_at);

        -- One JSON document per user: {\"keywords\": {kw: radius_km}, \"pushToken\": ...}
        CREATE TABLE IF NOT EXISTS keyword_subscriptions (
            user_id     TEXT PRIMARY KEY,
            document    TEXT NOT NULL,
            updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS user_profiles (
            user_id        TEXT PRIMARY KEY,
            certified_lat  REAL,
            certified_lng  REAL,
            certified_at   TEXT,
            updated_at     TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS notification_log (
            post_id      TEXT NOT NULL,
            user_id      TEXT NOT NULL,
            keyword      TEXT NOT NULL,
            distance_km  REAL NOT NULL,
            delivered    INTEGER,
            created_at   TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (post_id, user_id)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
