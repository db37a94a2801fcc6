//! Push sender implementations.
//!
//! `HttpPushSender` posts to an FCM-style HTTP endpoint. `TracingPushSender`
//! only logs, for local runs without push credentials.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;

use nbbang_types::events::PushNotification;

use crate::error::PushError;
use crate::ports::PushSender;

#[derive(Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    notification: PushRequestNotification<'a>,
    data: &'a PushNotification,
}

#[derive(Serialize)]
struct PushRequestNotification<'a> {
    title: &'a str,
    body: &'a str,
}

/// Sends notifications with an HTTP POST per delivery token.
pub struct HttpPushSender {
    client: Client,
    endpoint: Url,
    server_key: String,
}

impl HttpPushSender {
    pub fn new(endpoint: Url, server_key: String, timeout: Duration) -> Result<Self, PushError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            server_key,
        })
    }
}

#[async_trait]
impl PushSender for HttpPushSender {
    async fn send(&self, token: &str, notification: &PushNotification) -> Result<(), PushError> {
        if token.is_empty() {
            return Err(PushError::EmptyToken);
        }

        let body = PushRequest {
            to: token,
            notification: PushRequestNotification {
                title: &notification.title,
                body: &notification.body,
            },
            data: notification,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::AUTHORIZATION, format!("key={}", self.server_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

/// Logs notifications instead of delivering them.
pub struct TracingPushSender;

#[async_trait]
impl PushSender for TracingPushSender {
    async fn send(&self, token: &str, notification: &PushNotification) -> Result<(), PushError> {
        if token.is_empty() {
            return Err(PushError::EmptyToken);
        }
        tracing::info!(
            component = "push",
            post_id = %notification.post_id,
            token_suffix = token_suffix(token),
            title = %notification.title,
            body = %notification.body,
            "push (log only)",
        );
        Ok(())
    }
}

/// Last few characters of a token, enough to correlate without leaking it.
fn token_suffix(token: &str) -> &str {
    let start = token.char_indices().rev().nth(5).map(|(i, _)| i).unwrap_or(0);
    &token[start..]
}
