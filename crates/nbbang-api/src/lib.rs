pub mod keywords;
pub mod posts;
pub mod profiles;
pub mod triggers;
pub mod validation;


use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    routing::{get, post, put},
};
use tracing::error;

use nbbang_db::Database;
use nbbang_notify::Notifier;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub notifier: Notifier,
}

/// All notifier and supporting routes, without middleware layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/posts", post(posts::create_post))
        .route("/posts/{post_id}", get(posts::get_post))
        .route("/posts/{post_id}/notifications", get(posts::get_notifications))
        .route("/users/{user_id}/keywords", get(keywords::list_keywords))
        .route(
            "/users/{user_id}/keywords/{keyword}",
            put(keywords::upsert_keyword).delete(keywords::delete_keyword),
        )
        .route("/users/{user_id}/push-token", put(keywords::set_push_token))
        .route("/users/{user_id}/profile", get(profiles::get_profile))
        .route(
            "/users/{user_id}/certified-location",
            put(profiles::certify_location).delete(profiles::revoke_certified_location),
        )
        .route("/triggers/post-created", post(triggers::post_created))
        .with_state(state)
}

/// Run a blocking DB call off the async runtime, mapping failures to 500.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, StatusCode>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("Database error: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}
