use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{GeoPoint, Post};

/// Payload delivered by the "post created" trigger.
///
/// Mirrors the stored post document: only the fields the matcher reads are
/// required, and the meeting location may be absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostCreated {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub meeting_location: Option<GeoPoint>,
}

impl From<&Post> for PostCreated {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            content: post.content.clone(),
            meeting_location: post.meeting_location,
        }
    }
}

/// Push notification addressed to one delivery token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushNotification {
    pub title: String,
    pub body: String,
    pub post_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_created_location_is_optional() {
        let json = r#"{"id":"00000000-0000-0000-0000-000000000000","title":"우유","content":"같이 사요"}"#;
        let event: PostCreated = serde_json::from_str(json).unwrap();
        assert!(event.meeting_location.is_none());
        assert_eq!(event.content, "같이 사요");
    }

    #[test]
    fn post_created_reads_meeting_location() {
        let json = r#"{
            "id": "00000000-0000-0000-0000-000000000000",
            "title": "우유 공동구매",
            "content": "",
            "meetingLocation": {"latitude": 37.5, "longitude": 127.0}
        }"#;
        let event: PostCreated = serde_json::from_str(json).unwrap();
        assert_eq!(event.meeting_location, Some(GeoPoint::new(37.5, 127.0)));
    }

    #[test]
    fn push_payload_uses_post_id_key() {
        let payload = PushNotification {
            title: "t".into(),
            body: "b".into(),
            post_id: Uuid::nil(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("postId").is_some());
    }
}
