use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use nbbang_db::models::parse_timestamp;
use nbbang_types::GeoPoint;
use nbbang_types::api::CertifyLocationRequest;
use nbbang_types::models::UserProfile;

use crate::{AppState, blocking, validation};

/// Record the neighborhood a user verified. Replaces any earlier one.
pub async fn certify_location(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<CertifyLocationRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let point = validation::location(GeoPoint::new(req.latitude, req.longitude))?;

    let uid = user_id.to_string();
    blocking(&state, move |db| db.certify_location(&uid, point.latitude, point.longitude)).await?;

    info!("User {} certified location ({:.4}, {:.4})", user_id, point.latitude, point.longitude);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn revoke_certified_location(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let uid = user_id.to_string();
    let revoked = blocking(&state, move |db| db.revoke_certified_location(&uid)).await?;
    if !revoked {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let uid = user_id.to_string();
    let row = blocking(&state, move |db| db.get_profile(&uid)).await?;

    let profile = match row {
        Some(row) => UserProfile {
            certified_location: match (row.certified_lat, row.certified_lng) {
                (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
                _ => None,
            },
            certified_at: row.certified_at.as_deref().and_then(|raw| {
                let parsed = parse_timestamp(raw);
                if parsed.is_none() {
                    warn!("Corrupt certified_at '{}' for user {}", raw, row.user_id);
                }
                parsed
            }),
            user_id: row.user_id,
        },
        None => UserProfile {
            user_id: user_id.to_string(),
            certified_location: None,
            certified_at: None,
        },
    };

    Ok(Json(profile))
}
