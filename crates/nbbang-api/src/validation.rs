use axum::http::StatusCode;

use nbbang_types::GeoPoint;

pub const MAX_KEYWORD_CHARS: usize = 20;
pub const MAX_RADIUS_KM: f64 = 50.0;
pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_CONTENT_CHARS: usize = 5000;
pub const MAX_TOKEN_LEN: usize = 4096;

/// Trimmed keyword, or 400.
pub fn keyword(raw: &str) -> Result<String, StatusCode> {
    let keyword = raw.trim();
    if keyword.is_empty() || keyword.chars().count() > MAX_KEYWORD_CHARS {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(keyword.to_string())
}

pub fn radius_km(radius: f64) -> Result<f64, StatusCode> {
    if !radius.is_finite() || radius <= 0.0 || radius > MAX_RADIUS_KM {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(radius)
}

pub fn location(point: GeoPoint) -> Result<GeoPoint, StatusCode> {
    if !point.is_valid() {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(point)
}

pub fn post_text(title: &str, content: &str) -> Result<(), StatusCode> {
    let title_len = title.trim().chars().count();
    if title_len == 0 || title_len > MAX_TITLE_CHARS {
        return Err(StatusCode::BAD_REQUEST);
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(())
}

pub fn push_token(raw: &str) -> Result<String, StatusCode> {
    let token = raw.trim();
    if token.is_empty() || token.len() > MAX_TOKEN_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(token.to_string())
}
