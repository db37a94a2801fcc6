use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, warn};
use uuid::Uuid;

use nbbang_db::models::{NotificationRow, PostRow, parse_timestamp};
use nbbang_types::GeoPoint;
use nbbang_types::api::{CreatePostRequest, NotificationLogEntry};
use nbbang_types::events::PostCreated;
use nbbang_types::models::Post;

use crate::{AppState, blocking, validation};

pub async fn create_post(
    State(state): State<AppState>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    validation::post_text(&req.title, &req.content)?;
    let meeting_location = req.meeting_location.map(validation::location).transpose()?;

    let post = Post {
        id: Uuid::new_v4(),
        author_id: req.author_id,
        title: req.title.trim().to_string(),
        content: req.content,
        meeting_location,
        created_at: chrono::Utc::now(),
    };

    let row = PostRow {
        id: post.id.to_string(),
        author_id: post.author_id.to_string(),
        title: post.title.clone(),
        content: post.content.clone(),
        meeting_lat: post.meeting_location.map(|p| p.latitude),
        meeting_lng: post.meeting_location.map(|p| p.longitude),
        created_at: post.created_at.to_rfc3339(),
    };
    blocking(&state, move |db| db.insert_post(&row)).await?;

    // Fire the create trigger in the background, like a document-create hook.
    let event = PostCreated::from(&post);
    let notifier = state.notifier.clone();
    tokio::spawn(async move {
        if let Err(e) = notifier.run(&event).await {
            error!(post_id = %event.id, error = %e, "Keyword notification run failed");
        }
    });

    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let id = post_id.to_string();
    let row = blocking(&state, move |db| db.get_post(&id))
        .await?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(post_from_row(row)?))
}

pub async fn get_notifications(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let id = post_id.to_string();
    let rows = blocking(&state, move |db| db.notifications_for_post(&id)).await?;

    let entries: Vec<NotificationLogEntry> = rows.into_iter().map(|row| log_entry(post_id, row)).collect();
    Ok(Json(entries))
}

fn post_from_row(row: PostRow) -> Result<Post, StatusCode> {
    let corrupt = |field: &str, value: &str| {
        error!("Corrupt {} '{}' on post '{}'", field, value, row.id);
        StatusCode::INTERNAL_SERVER_ERROR
    };

    let id = row.id.parse().map_err(|_| corrupt("id", &row.id))?;
    let author_id = row.author_id.parse().map_err(|_| corrupt("author_id", &row.author_id))?;
    let meeting_location = match (row.meeting_lat, row.meeting_lng) {
        (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
        (None, None) => None,
        _ => {
            warn!("Post '{}' has a half-set meeting location, ignoring it", row.id);
            None
        }
    };
    let created_at = parse_timestamp(&row.created_at).unwrap_or_else(|| {
        warn!("Corrupt created_at '{}' on post '{}'", row.created_at, row.id);
        chrono::DateTime::default()
    });

    Ok(Post {
        id,
        author_id,
        title: row.title,
        content: row.content,
        meeting_location,
        created_at,
    })
}

fn log_entry(post_id: Uuid, row: NotificationRow) -> NotificationLogEntry {
    let created_at = parse_timestamp(&row.created_at).unwrap_or_else(|| {
        warn!("Corrupt created_at '{}' on notification for post '{}'", row.created_at, row.post_id);
        chrono::DateTime::default()
    });
    NotificationLogEntry {
        post_id,
        user_id: row.user_id,
        keyword: row.keyword,
        distance_km: row.distance_km,
        delivered: row.delivered.unwrap_or(false),
        created_at,
    }
}
