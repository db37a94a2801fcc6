use nbbang_types::GeoPoint;
use nbbang_types::events::{PostCreated, PushNotification};

use crate::geo::haversine_km;
use crate::subscription::KeywordSubscription;

/// Outcome of a successful evaluation. At most one per (user, post).
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub user_id: String,
    pub token: String,
    /// Keyword the notification is titled with: the passing keyword with the
    /// tightest radius.
    pub keyword: String,
    /// Every keyword that appeared in the post and whose radius covered it.
    pub matched_keywords: Vec<String>,
    pub distance_km: f64,
}

/// Decide whether `subscription` should be notified about `post`.
///
/// `origin` is the post's meeting location and `home` the subscriber's
/// certified location. Distance is only computed once some keyword occurs in
/// the post text.
pub fn evaluate(
    post: &PostCreated,
    origin: GeoPoint,
    subscription: &KeywordSubscription,
    home: GeoPoint,
) -> Option<Match> {
    let mut distance_km: Option<f64> = None;
    let mut passing: Vec<(&str, f64)> = Vec::new();

    for (keyword, &radius_km) in &subscription.keywords {
        if !mentions(post, keyword) {
            continue;
        }
        let d = *distance_km.get_or_insert_with(|| haversine_km(origin, home));
        if d <= radius_km {
            passing.push((keyword.as_str(), radius_km));
        }
    }

    // Keywords iterate in order, so the first minimum wins ties.
    let (keyword, _) = passing
        .iter()
        .copied()
        .reduce(|best, next| if next.1 < best.1 { next } else { best })?;

    Some(Match {
        user_id: subscription.user_id.clone(),
        token: subscription.token.clone(),
        keyword: keyword.to_string(),
        matched_keywords: passing.iter().map(|(k, _)| k.to_string()).collect(),
        distance_km: distance_km.unwrap_or_default(),
    })
}

/// Literal, case-sensitive substring match on title or content.
fn mentions(post: &PostCreated, keyword: &str) -> bool {
    !keyword.is_empty() && (post.title.contains(keyword) || post.content.contains(keyword))
}

/// Build the push payload for a match.
pub fn build_notification(post: &PostCreated, m: &Match, excerpt_chars: usize) -> PushNotification {
    PushNotification {
        title: format!("[{}] 키워드 알림", m.keyword),
        body: excerpt(&post.title, excerpt_chars),
        post_id: post.id,
    }
}

/// Truncate to `max_chars` characters, appending `…` when anything was cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    const POST_AT: GeoPoint = GeoPoint { latitude: 37.50, longitude: 127.00 };
    const HOME: GeoPoint = GeoPoint { latitude: 37.505, longitude: 127.003 };

    fn post(title: &str, content: &str) -> PostCreated {
        PostCreated {
            id: Uuid::nil(),
            title: title.into(),
            content: content.into(),
            meeting_location: Some(POST_AT),
        }
    }

    fn sub(keywords: &[(&str, f64)]) -> KeywordSubscription {
        KeywordSubscription {
            user_id: "user-a".into(),
            keywords: keywords
                .iter()
                .map(|(k, r)| (k.to_string(), *r))
                .collect::<BTreeMap<_, _>>(),
            token: "tok-a".into(),
        }
    }

    #[test]
    fn keyword_in_title_within_radius_matches() {
        let m = evaluate(&post("우유 공동구매", ""), POST_AT, &sub(&[("우유", 1.0)]), HOME).unwrap();
        assert_eq!(m.keyword, "우유");
        assert_eq!(m.token, "tok-a");
        assert!(m.distance_km > 0.5 && m.distance_km < 1.0);
    }

    #[test]
    fn radius_too_small_does_not_match() {
        assert!(evaluate(&post("우유 공동구매", ""), POST_AT, &sub(&[("우유", 0.1)]), HOME).is_none());
    }

    #[test]
    fn keyword_in_content_matches() {
        let m = evaluate(&post("공동구매", "서울우유 2L"), POST_AT, &sub(&[("우유", 1.0)]), HOME);
        assert!(m.is_some());
    }

    #[test]
    fn absent_keyword_does_not_match() {
        assert!(evaluate(&post("계란 나눠요", "한 판"), POST_AT, &sub(&[("우유", 50.0)]), HOME).is_none());
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert!(evaluate(&post("Milk deal", ""), POST_AT, &sub(&[("milk", 5.0)]), HOME).is_none());
    }

    #[test]
    fn radius_equal_to_distance_matches() {
        let d = haversine_km(POST_AT, HOME);
        assert!(evaluate(&post("우유", ""), POST_AT, &sub(&[("우유", d)]), HOME).is_some());
    }

    #[test]
    fn two_keywords_collapse_into_one_match() {
        let m = evaluate(
            &post("우유 계란 공동구매", ""),
            POST_AT,
            &sub(&[("우유", 3.0), ("계란", 1.0), ("빵", 1.0)]),
            HOME,
        )
        .unwrap();
        assert_eq!(m.keyword, "계란");
        assert_eq!(m.matched_keywords.len(), 2);
        assert!(m.matched_keywords.contains(&"우유".to_string()));
    }

    #[test]
    fn only_passing_keywords_are_reported() {
        let m = evaluate(
            &post("우유 계란", ""),
            POST_AT,
            &sub(&[("우유", 1.0), ("계란", 0.1)]),
            HOME,
        )
        .unwrap();
        assert_eq!(m.matched_keywords, vec!["우유".to_string()]);
    }

    #[test]
    fn excerpt_is_char_safe() {
        assert_eq!(excerpt("우유 공동구매 하실 분", 5), "우유 공동…");
        assert_eq!(excerpt("우유", 5), "우유");
        assert_eq!(excerpt("  우유  ", 2), "우유");
    }

    #[test]
    fn notification_payload() {
        let p = post("우유 공동구매", "");
        let m = evaluate(&p, POST_AT, &sub(&[("우유", 1.0)]), HOME).unwrap();
        let n = build_notification(&p, &m, 40);
        assert_eq!(n.title, "[우유] 키워드 알림");
        assert_eq!(n.body, "우유 공동구매");
        assert_eq!(n.post_id, Uuid::nil());
    }
}
