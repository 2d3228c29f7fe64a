use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use skywatch_common::{
    AgentIdentity, MonitorJob, Notification, NotificationReason, SkywatchError, ThreadRecord,
    TrackedThread, WatchConfig,
};

use crate::analyzer::ThreadAnalyzer;
use crate::backoff::{self, DueStatus};
use crate::monitor::monitor_job;
use crate::store::StateStore;
use crate::traits::ThreadTransport;

/// Drives the engine for one account: discovery over the notification feed,
/// due-evaluation and backoff updates for tracked threads, and job emission.
/// One instance per process tick; state is load-mutate-saved within each
/// operation.
pub struct Sentry<T: ThreadTransport, S: StateStore> {
    transport: T,
    store: S,
    config: WatchConfig,
    identity: AgentIdentity,
}

#[derive(Debug)]
pub struct DiscoverySummary {
    pub notifications_seen: usize,
    pub fresh_notifications: usize,
    pub threads_analyzed: usize,
    pub threads_tracked: usize,
    pub jobs: Vec<MonitorJob>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Due — re-poll the thread now.
    Check,
    /// Due at the terminal level — disable monitoring instead of polling.
    Retire,
    NotDue,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated { backoff_level: u32 },
    NotFound,
}

impl<T: ThreadTransport, S: StateStore> Sentry<T, S> {
    pub fn new(transport: T, store: S, config: WatchConfig, identity: AgentIdentity) -> Self {
        Self {
            transport,
            store,
            config,
            identity,
        }
    }

    /// Discovery pass: group fresh conversational notifications by thread
    /// root, analyze each root once, persist what qualifies (or was already
    /// tracked), and emit monitoring jobs for threads over the thresholds.
    pub async fn discover(&self, now: DateTime<Utc>) -> Result<DiscoverySummary, SkywatchError> {
        let run_id = format!("discover-{}", uuid::Uuid::new_v4());
        let mut state = self.store.load()?;

        let notifications = self
            .transport
            .fetch_notifications(self.config.notification_limit)
            .await;
        let notifications_seen = notifications.len();

        let fresh: Vec<Notification> = notifications
            .into_iter()
            .filter(|n| n.reason.is_conversational())
            .filter(|n| !state.already_evaluated(&n.uri))
            .collect();

        let roots: BTreeSet<String> = fresh.iter().map(|n| n.root_uri().to_string()).collect();

        let analyzer = ThreadAnalyzer::new(&self.transport, &self.config, &self.identity);
        let mut analyzed: BTreeSet<String> = BTreeSet::new();
        let mut tracked: BTreeSet<String> = BTreeSet::new();

        for root in &roots {
            let existing = state.thread(root);
            match analyzer.analyze(root, existing.as_ref(), now).await {
                Some(thread) => {
                    analyzed.insert(root.clone());
                    // Threads enter tracking when they first qualify; once
                    // tracked they are re-analyzed forever (until unwatch).
                    if existing.is_some() || self.qualifies(&thread) {
                        tracked.insert(thread.root_uri.clone());
                        state.put_thread(&thread);
                    }
                }
                None => {
                    warn!(
                        root = root.as_str(),
                        "thread unavailable, leaving its notifications for a later pass"
                    );
                }
            }
        }

        // Only notifications whose root actually got analyzed are spent;
        // fetch failures stay fresh for the next tick.
        for n in &fresh {
            if analyzed.contains(n.root_uri()) {
                state.note_evaluated(&n.uri);
            }
        }
        state.last_evaluated_at = Some(now);

        let jobs: Vec<MonitorJob> = tracked
            .iter()
            .filter_map(|root| state.thread(root))
            .filter(|t| t.enabled && self.qualifies(t))
            .map(|t| monitor_job(&t, &self.config))
            .collect();

        self.store.save(&mut state)?;

        info!(
            run_id = run_id.as_str(),
            seen = notifications_seen,
            fresh = fresh.len(),
            analyzed = analyzed.len(),
            tracked = tracked.len(),
            jobs = jobs.len(),
            "Discovery pass complete"
        );

        Ok(DiscoverySummary {
            notifications_seen,
            fresh_notifications: fresh.len(),
            threads_analyzed: analyzed.len(),
            threads_tracked: tracked.len(),
            jobs,
        })
    }

    /// Is this thread due for a re-poll? A fresh reply sitting in the
    /// notification feed pre-empts backoff entirely: it resets the level and
    /// reports due no matter how deep the ratchet sat.
    pub async fn check_due(
        &self,
        root_uri: &str,
        now: DateTime<Utc>,
    ) -> Result<CheckOutcome, SkywatchError> {
        let mut state = self.store.load()?;
        let Some(mut thread) = state.thread(root_uri) else {
            return Ok(CheckOutcome::NotFound);
        };

        if self.peek_recent_activity(root_uri, now).await {
            backoff::record_check(&mut thread, true, self.config.terminal_level(), now);
            state.put_thread(&thread);
            self.store.save(&mut state)?;
            info!(root = root_uri, "recent reply pre-empts backoff");
            return Ok(CheckOutcome::Check);
        }

        match backoff::check_due(&thread, &self.config, now) {
            DueStatus::Check => Ok(CheckOutcome::Check),
            DueStatus::Retire => Ok(CheckOutcome::Retire),
            DueStatus::NotDue => Ok(CheckOutcome::NotDue),
        }
    }

    /// Record the outcome of an external check against a thread's backoff
    /// state.
    pub fn update(
        &self,
        root_uri: &str,
        activity_found: bool,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome, SkywatchError> {
        let mut state = self.store.load()?;
        let Some(mut thread) = state.thread(root_uri) else {
            return Ok(UpdateOutcome::NotFound);
        };

        backoff::record_check(&mut thread, activity_found, self.config.terminal_level(), now);
        let backoff_level = thread.backoff_level;
        state.put_thread(&thread);
        self.store.save(&mut state)?;
        Ok(UpdateOutcome::Updated { backoff_level })
    }

    /// Monitoring jobs for every enabled thread currently over the
    /// thresholds. Unreadable records are skipped with a warning.
    pub fn jobs(&self) -> Result<Vec<MonitorJob>, SkywatchError> {
        Ok(self
            .readable_threads()?
            .into_iter()
            .filter(|t| t.enabled && self.qualifies(t))
            .map(|t| monitor_job(&t, &self.config))
            .collect())
    }

    /// All decodable tracked threads, for listing.
    pub fn list(&self) -> Result<Vec<TrackedThread>, SkywatchError> {
        self.readable_threads()
    }

    /// Stop tracking a thread. Returns false when nothing was stored under
    /// that root.
    pub fn unwatch(&self, root_uri: &str) -> Result<bool, SkywatchError> {
        let mut state = self.store.load()?;
        if !state.remove_thread(root_uri) {
            return Ok(false);
        }
        self.store.save(&mut state)?;
        Ok(true)
    }

    fn readable_threads(&self) -> Result<Vec<TrackedThread>, SkywatchError> {
        let state = self.store.load()?;
        let mut threads = Vec::new();
        for (key, record) in state.thread_records() {
            match record {
                ThreadRecord::Valid(thread) => threads.push(*thread),
                ThreadRecord::Unreadable { reason } => {
                    warn!(key, reason = reason.as_str(), "skipping unreadable thread record");
                }
            }
        }
        Ok(threads)
    }

    fn qualifies(&self, thread: &TrackedThread) -> bool {
        thread.clamped_score() >= self.config.relevance_threshold
            && thread.exchange_depth() >= self.config.min_exchange_depth
    }

    async fn peek_recent_activity(&self, root_uri: &str, now: DateTime<Utc>) -> bool {
        let lookback = chrono::Duration::minutes(self.config.peek_lookback_min);
        self.transport
            .fetch_notifications(self.config.notification_limit)
            .await
            .iter()
            .any(|n| {
                n.reason == NotificationReason::Reply
                    && n.root_uri() == root_uri
                    && now - n.indexed_at <= lookback
            })
    }
}
