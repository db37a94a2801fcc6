use thiserror::Error;

/// Failure reading from or writing to the backing document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("malformed record '{id}': {reason}")]
    Malformed { id: String, reason: String },
}

impl StoreError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// A subscription document that exists but cannot be interpreted.
#[derive(Debug, Error, PartialEq)]
pub enum SubscriptionError {
    #[error("keywords field is not a map")]
    KeywordsNotMap,

    #[error("radius for keyword '{keyword}' is not a usable number: {value}")]
    InvalidRadius { keyword: String, value: String },

    #[error("push token is not a string")]
    TokenNotString,

    #[error("document is not an object")]
    NotAnObject,
}

#[derive(Debug, Error)]
pub enum PushError {
    #[error("push transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("push rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("delivery token is empty")]
    EmptyToken,
}

/// Errors that fail the whole invocation. Everything scoped to a single user
/// is reported in the `DispatchReport` instead.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to load keyword subscriptions: {0}")]
    Subscriptions(#[source] StoreError),
}
