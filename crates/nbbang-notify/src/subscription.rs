use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::SubscriptionError;

/// Field holding the keyword → radius (km) map.
pub const KEYWORDS_FIELD: &str = "keywords";
/// Field holding the push delivery token.
pub const TOKEN_FIELD: &str = "pushToken";

/// A keyword subscription document exactly as stored, one per user.
///
/// Kept untyped so a single malformed document can be skipped without failing
/// the bulk read that returned it.
#[derive(Debug, Clone)]
pub struct SubscriptionDocument {
    pub user_id: String,
    pub data: Value,
}

/// A subscription that is complete enough to be matched.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordSubscription {
    pub user_id: String,
    /// Keyword → alert radius in kilometers. Keys are trimmed and non-empty.
    pub keywords: BTreeMap<String, f64>,
    pub token: String,
}

impl KeywordSubscription {
    /// Interpret a raw document.
    ///
    /// `Ok(None)` means the user never finished configuring alerts (no token,
    /// no keyword map, or no usable keyword). `Err` means the document has the
    /// fields but with the wrong shape.
    pub fn from_document(doc: &SubscriptionDocument) -> Result<Option<Self>, SubscriptionError> {
        let obj = doc.data.as_object().ok_or(SubscriptionError::NotAnObject)?;

        let token = match obj.get(TOKEN_FIELD) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(_) => return Err(SubscriptionError::TokenNotString),
        };

        let raw_keywords = match obj.get(KEYWORDS_FIELD) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(SubscriptionError::KeywordsNotMap),
        };

        let mut keywords: BTreeMap<String, f64> = BTreeMap::new();
        for (keyword, radius) in raw_keywords {
            let radius_km = parse_radius(keyword, radius)?;
            let keyword = keyword.trim();
            if keyword.is_empty() {
                continue;
            }
            keywords
                .entry(keyword.to_string())
                .and_modify(|r| *r = r.min(radius_km))
                .or_insert(radius_km);
        }

        if keywords.is_empty() {
            return Ok(None);
        }

        Ok(Some(Self {
            user_id: doc.user_id.clone(),
            keywords,
            token,
        }))
    }

    /// Fold another record for the same user into this one. Keywords are
    /// unioned and a keyword present in both keeps the smaller radius. The
    /// first record's token wins.
    pub fn merge(&mut self, other: KeywordSubscription) {
        for (keyword, radius_km) in other.keywords {
            self.keywords
                .entry(keyword)
                .and_modify(|r| *r = r.min(radius_km))
                .or_insert(radius_km);
        }
    }
}

fn parse_radius(keyword: &str, value: &Value) -> Result<f64, SubscriptionError> {
    match value.as_f64() {
        Some(r) if r.is_finite() && r >= 0.0 => Ok(r),
        _ => Err(SubscriptionError::InvalidRadius {
            keyword: keyword.to_string(),
            value: value.to_string(),
        }),
    }
}
