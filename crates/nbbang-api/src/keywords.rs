use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use nbbang_notify::subscription::{KEYWORDS_FIELD, TOKEN_FIELD};
use nbbang_types::api::{KeywordListResponse, SetPushTokenRequest, UpsertKeywordRequest};

use crate::{AppState, blocking, validation};

pub async fn list_keywords(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let uid = user_id.to_string();
    let doc = blocking(&state, move |db| db.get_subscription_document(&uid)).await?;

    let mut keywords = BTreeMap::new();
    let mut has_push_token = false;

    if let Some(doc) = doc {
        if let Some(Value::Object(map)) = doc.get(KEYWORDS_FIELD) {
            for (keyword, radius) in map {
                match radius.as_f64() {
                    Some(r) => {
                        keywords.insert(keyword.clone(), r);
                    }
                    None => warn!("Skipping non-numeric radius for '{}' of user {}", keyword, user_id),
                }
            }
        }
        has_push_token = doc
            .get(TOKEN_FIELD)
            .and_then(Value::as_str)
            .is_some_and(|t| !t.trim().is_empty());
    }

    Ok(Json(KeywordListResponse {
        user_id,
        keywords,
        has_push_token,
    }))
}

pub async fn upsert_keyword(
    State(state): State<AppState>,
    Path((user_id, keyword)): Path<(Uuid, String)>,
    Json(req): Json<UpsertKeywordRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let keyword = validation::keyword(&keyword)?;
    let radius_km = validation::radius_km(req.radius_km)?;

    let uid = user_id.to_string();
    let kw = keyword.clone();
    blocking(&state, move |db| db.upsert_keyword(&uid, &kw, radius_km)).await?;

    info!("User {} subscribed to '{}' within {} km", user_id, keyword, radius_km);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_keyword(
    State(state): State<AppState>,
    Path((user_id, keyword)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, StatusCode> {
    let keyword = validation::keyword(&keyword)?;

    let uid = user_id.to_string();
    let kw = keyword.clone();
    let removed = blocking(&state, move |db| db.remove_keyword(&uid, &kw)).await?;
    if !removed {
        return Err(StatusCode::NOT_FOUND);
    }

    info!("User {} unsubscribed from '{}'", user_id, keyword);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_push_token(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<SetPushTokenRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let token = validation::push_token(&req.token)?;

    let uid = user_id.to_string();
    blocking(&state, move |db| db.set_push_token(&uid, &token)).await?;

    Ok(StatusCode::NO_CONTENT)
}
