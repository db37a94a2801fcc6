use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use nbbang_types::GeoPoint;
use nbbang_types::events::PostCreated;

use crate::config::NotifyConfig;
use crate::error::{DispatchError, PushError, StoreError};
use crate::geo::display_km;
use crate::matcher::{self, Match};
use crate::ports::{NotificationClaim, NotificationLedger, ProfileStore, PushSender, SubscriptionStore};
use crate::subscription::KeywordSubscription;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every subscriber was evaluated.
    #[default]
    Completed,
    /// The post has no meeting location, nothing to match against.
    NoLocation,
    /// The post's meeting location is out of range or not finite.
    InvalidLocation,
    /// The deadline hit before every subscriber was evaluated.
    DeadlineExceeded,
}

/// A subscriber that was skipped, and why.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub user_id: String,
    pub reason: String,
}

/// Summary of one notifier run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub post_id: Uuid,
    pub status: RunStatus,
    /// Subscription documents read from the store.
    pub subscribers: usize,
    /// No token, no keyword map, or no usable keyword.
    pub unconfigured: usize,
    pub malformed: usize,
    /// Extra documents for a user, merged into the first one.
    pub duplicate_records: usize,
    pub without_location: usize,
    pub profile_errors: usize,
    pub unmatched: usize,
    pub already_notified: usize,
    pub ledger_errors: usize,
    pub notified: usize,
    pub push_failures: usize,
    pub task_failures: usize,
    /// Subscribers still pending when the deadline hit.
    pub dropped: usize,
    /// Claims of dropped subscribers given back so a retried trigger can
    /// still deliver them.
    pub released_claims: usize,
    pub notified_users: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl DispatchReport {
    fn new(post_id: Uuid) -> Self {
        Self {
            post_id,
            ..Default::default()
        }
    }

    fn diagnose(&mut self, user_id: &str, reason: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            user_id: user_id.to_string(),
            reason: reason.into(),
        });
    }

    fn settle(
        &mut self,
        pending: &mut HashMap<tokio::task::Id, String>,
        joined: Result<(tokio::task::Id, Evaluated), tokio::task::JoinError>,
    ) {
        match joined {
            Ok((id, evaluated)) => {
                pending.remove(&id);
                self.record(evaluated);
            }
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                let user_id = pending.remove(&e.id()).unwrap_or_default();
                warn!(post_id = %self.post_id, user_id = %user_id, error = %e, "Subscriber evaluation task failed");
                self.task_failures += 1;
                self.diagnose(&user_id, format!("evaluation task failed: {}", e));
            }
        }
    }

    fn record(&mut self, evaluated: Evaluated) {
        let Evaluated { user_id, outcome } = evaluated;
        let post_id = self.post_id;
        match outcome {
            UserOutcome::NoLocation => {
                debug!(%post_id, user_id = %user_id, "Subscriber has no certified location");
                self.without_location += 1;
            }
            UserOutcome::InvalidLocation(p) => {
                warn!(%post_id, user_id = %user_id, lat = p.latitude, lng = p.longitude, "Certified location out of range");
                self.profile_errors += 1;
                self.diagnose(&user_id, format!("certified location out of range: ({}, {})", p.latitude, p.longitude));
            }
            UserOutcome::ProfileError(e) => {
                warn!(%post_id, user_id = %user_id, error = %e, "Profile read failed");
                self.profile_errors += 1;
                self.diagnose(&user_id, format!("profile read failed: {}", e));
            }
            UserOutcome::NoMatch => {
                self.unmatched += 1;
            }
            UserOutcome::AlreadyNotified => {
                debug!(%post_id, user_id = %user_id, "Already notified about this post");
                self.already_notified += 1;
            }
            UserOutcome::LedgerError(e) => {
                warn!(%post_id, user_id = %user_id, error = %e, "Could not claim notification, not sending");
                self.ledger_errors += 1;
                self.diagnose(&user_id, format!("ledger claim failed: {}", e));
            }
            UserOutcome::Notified(m) => {
                info!(
                    %post_id,
                    user_id = %user_id,
                    keyword = %m.keyword,
                    matched = m.matched_keywords.len(),
                    distance_km = display_km(m.distance_km),
                    "Keyword notification sent"
                );
                self.notified += 1;
                self.notified_users.push(user_id);
            }
            UserOutcome::PushFailed(m, e) => {
                warn!(%post_id, user_id = %user_id, keyword = %m.keyword, error = %e, "Push dispatch failed");
                self.push_failures += 1;
                self.diagnose(&user_id, format!("push failed: {}", e));
            }
        }
    }
}

/// What happened to one subscriber.
enum UserOutcome {
    NoLocation,
    InvalidLocation(GeoPoint),
    ProfileError(StoreError),
    NoMatch,
    AlreadyNotified,
    LedgerError(StoreError),
    Notified(Match),
    PushFailed(Match, PushError),
}

struct Evaluated {
    user_id: String,
    outcome: UserOutcome,
}

/// Keyword match & notification dispatcher.
///
/// Cheap to clone; every collaborator sits behind an `Arc`.
#[derive(Clone)]
pub struct Notifier {
    subscriptions: Arc<dyn SubscriptionStore>,
    profiles: Arc<dyn ProfileStore>,
    ledger: Arc<dyn NotificationLedger>,
    push: Arc<dyn PushSender>,
    config: NotifyConfig,
}

impl Notifier {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        profiles: Arc<dyn ProfileStore>,
        ledger: Arc<dyn NotificationLedger>,
        push: Arc<dyn PushSender>,
        config: NotifyConfig,
    ) -> Self {
        Self {
            subscriptions,
            profiles,
            ledger,
            push,
            config,
        }
    }

    /// Handle one "post created" trigger.
    ///
    /// Only an unreadable subscription collection fails the run. Problems with
    /// a single subscriber are logged, counted and listed in the report.
    pub async fn run(&self, post: &PostCreated) -> Result<DispatchReport, DispatchError> {
        let mut report = DispatchReport::new(post.id);

        let Some(origin) = post.meeting_location else {
            info!(post_id = %post.id, "Post has no meeting location, skipping keyword notifications");
            report.status = RunStatus::NoLocation;
            return Ok(report);
        };
        if !origin.is_valid() {
            warn!(post_id = %post.id, lat = origin.latitude, lng = origin.longitude, "Post meeting location out of range");
            report.status = RunStatus::InvalidLocation;
            return Ok(report);
        }

        let deadline = Instant::now() + self.config.deadline;

        let docs = tokio::time::timeout_at(deadline, self.subscriptions.load_subscriptions())
            .await
            .map_err(|_| {
                DispatchError::Subscriptions(StoreError::Unavailable("subscription load exceeded deadline".into()))
            })?
            .map_err(DispatchError::Subscriptions)?;
        report.subscribers = docs.len();

        let mut queued: Vec<KeywordSubscription> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for doc in &docs {
            let subscription = match KeywordSubscription::from_document(doc) {
                Ok(Some(s)) => s,
                Ok(None) => {
                    report.unconfigured += 1;
                    continue;
                }
                Err(e) => {
                    warn!(post_id = %post.id, user_id = %doc.user_id, error = %e, "Skipping malformed keyword subscription");
                    report.malformed += 1;
                    report.diagnose(&doc.user_id, format!("malformed subscription: {}", e));
                    continue;
                }
            };

            match positions.get(&subscription.user_id) {
                Some(&i) => {
                    report.duplicate_records += 1;
                    report.diagnose(&subscription.user_id, "duplicate subscription record merged");
                    queued[i].merge(subscription);
                }
                None => {
                    positions.insert(subscription.user_id.clone(), queued.len());
                    queued.push(subscription);
                }
            }
        }

        let post = Arc::new(post.clone());
        let permits = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut pending: HashMap<tokio::task::Id, String> = HashMap::new();
        let mut tasks = JoinSet::new();

        for subscription in queued {
            let user_id = subscription.user_id.clone();
            let worker = self.clone();
            let post = post.clone();
            let permits = permits.clone();
            let handle = tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                worker.evaluate_user(&post, origin, subscription).await
            });
            pending.insert(handle.id(), user_id);
        }

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next_with_id()).await {
                Ok(Some(joined)) => report.settle(&mut pending, joined),
                Ok(None) => break,
                Err(_) => {
                    report.status = RunStatus::DeadlineExceeded;
                    tasks.abort_all();
                    // Tasks that finished before the abort landed still count.
                    while let Some(joined) = tasks.join_next_with_id().await {
                        report.settle(&mut pending, joined);
                    }
                    report.dropped = pending.len();
                    warn!(post_id = %post.id, dropped = report.dropped, "Notifier deadline reached, dropping pending subscribers");
                    self.release_dropped(&mut report, pending.values()).await;
                    break;
                }
            }
        }

        report.notified_users.sort();

        info!(
            post_id = %post.id,
            subscribers = report.subscribers,
            notified = report.notified,
            unmatched = report.unmatched,
            skipped = report.unconfigured + report.malformed + report.without_location,
            failures = report.profile_errors + report.push_failures + report.ledger_errors + report.task_failures,
            dropped = report.dropped,
            released = report.released_claims,
            "Keyword notification run finished"
        );

        Ok(report)
    }

    /// Give back claims held by aborted tasks. A claim taken right before the
    /// abort has no push behind it and would block every retry of this post.
    async fn release_dropped<'a>(&self, report: &mut DispatchReport, users: impl Iterator<Item = &'a String>) {
        for user_id in users {
            match self.ledger.release(report.post_id, user_id).await {
                Ok(true) => {
                    debug!(post_id = %report.post_id, user_id = %user_id, "Released claim of dropped subscriber");
                    report.released_claims += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(post_id = %report.post_id, user_id = %user_id, error = %e, "Could not release claim of dropped subscriber");
                    report.ledger_errors += 1;
                    report.diagnose(user_id, format!("claim release failed: {}", e));
                }
            }
        }
    }

    async fn evaluate_user(&self, post: &PostCreated, origin: GeoPoint, subscription: KeywordSubscription) -> Evaluated {
        let user_id = subscription.user_id.clone();
        let outcome = self.user_outcome(post, origin, &subscription).await;
        Evaluated { user_id, outcome }
    }

    async fn user_outcome(&self, post: &PostCreated, origin: GeoPoint, subscription: &KeywordSubscription) -> UserOutcome {
        let home = match self.profiles.certified_location(&subscription.user_id).await {
            Ok(Some(p)) if p.is_valid() => p,
            Ok(Some(p)) => return UserOutcome::InvalidLocation(p),
            Ok(None) => return UserOutcome::NoLocation,
            Err(e) => return UserOutcome::ProfileError(e),
        };

        let Some(m) = matcher::evaluate(post, origin, subscription, home) else {
            return UserOutcome::NoMatch;
        };

        let claim = NotificationClaim {
            post_id: post.id,
            user_id: m.user_id.clone(),
            keyword: m.keyword.clone(),
            distance_km: m.distance_km,
        };
        match self.ledger.claim(&claim).await {
            Ok(true) => {}
            Ok(false) => return UserOutcome::AlreadyNotified,
            Err(e) => return UserOutcome::LedgerError(e),
        }

        let notification = matcher::build_notification(post, &m, self.config.excerpt_chars);
        let sent = self.push.send(&m.token, &notification).await;

        if let Err(e) = self.ledger.record_delivery(post.id, &m.user_id, sent.is_ok()).await {
            warn!(post_id = %post.id, user_id = %m.user_id, error = %e, "Failed to record delivery state");
        }

        match sent {
            Ok(()) => UserOutcome::Notified(m),
            Err(e) => UserOutcome::PushFailed(m, e),
        }
    }
}
