use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Transient value objects (never persisted) ---

/// Snapshot of a conversation participant's public profile. Re-fetched per
/// analysis pass; no caching guarantee.
#[derive(Debug, Clone)]
pub struct InterlocutorProfile {
    pub did: String,
    pub handle: String,
    pub display_name: Option<String>,
    pub followers_count: u32,
    pub follows_count: u32,
    pub posts_count: u32,
    pub description: Option<String>,
    pub labels: Vec<String>,
}

/// One node of a reply tree as the engine walks it: the transport adapter
/// flattens the wire union into this before analysis.
#[derive(Debug, Clone)]
pub struct ThreadNode {
    pub uri: String,
    pub author_did: String,
    pub author_handle: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub replies: Vec<ThreadNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationReason {
    Reply,
    Mention,
    Quote,
    Other,
}

impl NotificationReason {
    pub fn from_str_loose(s: &str) -> Self {
        match s {
            "reply" => Self::Reply,
            "mention" => Self::Mention,
            "quote" => Self::Quote,
            _ => Self::Other,
        }
    }

    /// Only these reasons can seed thread discovery.
    pub fn is_conversational(&self) -> bool {
        matches!(self, Self::Reply | Self::Mention | Self::Quote)
    }
}

/// A notification from the account's feed, normalized for discovery.
#[derive(Debug, Clone)]
pub struct Notification {
    pub uri: String,
    pub reason: NotificationReason,
    pub author_did: String,
    pub author_handle: String,
    /// Root of the thread the notifying post belongs to, when the record
    /// carries a reply reference.
    pub thread_root: Option<String>,
    pub indexed_at: DateTime<Utc>,
}

impl Notification {
    /// The thread root this notification groups under: the record's reply
    /// root when present, otherwise the post itself anchors a new thread.
    pub fn root_uri(&self) -> &str {
        self.thread_root.as_deref().unwrap_or(&self.uri)
    }
}

// --- Persisted state ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchParticipant {
    pub did: String,
    pub handle: String,
}

/// A sub-conversation anchored at one of the agent's own replies. Exists iff
/// the agent authored at least one post in the sub-tree; re-walking the
/// thread extends the same branch under the same anchor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    /// URI of the agent reply that started the branch; the branch key.
    pub anchor_uri: String,
    /// Other participants, first-seen order, de-duplicated by did.
    #[serde(default)]
    pub participants: Vec<BranchParticipant>,
    /// All posts folded into the branch, the anchor included.
    #[serde(default)]
    pub message_count: u32,
    #[serde(default = "unix_epoch")]
    pub last_activity_at: DateTime<Utc>,
    /// Jaccard distance between branch and root topic sets, in [0,1].
    #[serde(default)]
    pub topic_drift: f64,
    /// Branch relevance in [0,100].
    #[serde(default)]
    pub score: f64,
}

impl Branch {
    pub fn participant_dids(&self) -> impl Iterator<Item = &str> {
        self.participants.iter().map(|p| p.did.as_str())
    }
}

/// The persisted unit of monitoring state, keyed by the root post URI.
/// Mutated on every re-analysis; removal only via explicit unwatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedThread {
    #[serde(default)]
    pub root_uri: String,
    #[serde(default)]
    pub root_author: String,
    #[serde(default)]
    pub root_topics: Vec<String>,
    /// Root text truncated to `ROOT_TEXT_MAX` chars.
    #[serde(default)]
    pub root_text: String,
    /// Overall relevance, stored unclamped; see [`TrackedThread::clamped_score`].
    #[serde(default)]
    pub overall_score: f64,
    #[serde(default)]
    pub branches: BTreeMap<String, Branch>,
    #[serde(default)]
    pub our_reply_count: u32,
    #[serde(default = "unix_epoch")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "unix_epoch")]
    pub last_activity_at: DateTime<Utc>,
    /// DIDs the agent has replied to directly, not merely co-present in a branch.
    #[serde(default)]
    pub engaged_participants: BTreeSet<String>,
    /// The agent's own most recent reply texts, newest last, bounded history.
    #[serde(default)]
    pub recent_replies: Vec<String>,
    /// Identifier of the external scheduler job, once one has been created.
    #[serde(default)]
    pub monitor_job_id: Option<String>,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    /// Index into the backoff interval table; one past the end is the
    /// terminal silence window.
    #[serde(default)]
    pub backoff_level: u32,
    #[serde(default = "unix_epoch")]
    pub last_check_at: DateTime<Utc>,
    #[serde(default)]
    pub last_new_activity_at: Option<DateTime<Utc>>,
}

pub const ROOT_TEXT_MAX: usize = 300;

fn unix_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

fn enabled_default() -> bool {
    true
}

impl TrackedThread {
    /// Total conversational turns inside the agent's branches (agent and
    /// counterpart posts alike). Gates monitoring-job emission.
    pub fn exchange_depth(&self) -> u32 {
        self.branches.values().map(|b| b.message_count).sum()
    }

    /// Overall score re-clamped to [0,100] for callers that need a hard ceiling.
    pub fn clamped_score(&self) -> f64 {
        self.overall_score.clamp(0.0, 100.0)
    }
}

/// Outcome of decoding one persisted thread record. Partial or corrupt
/// records surface explicitly instead of crashing a batch operation.
#[derive(Debug)]
pub enum ThreadRecord {
    Valid(Box<TrackedThread>),
    Unreadable { reason: String },
}

/// Decode a raw stored value into a thread record. Missing identity fields
/// yield `Unreadable`, never an error.
pub fn decode_thread(value: &serde_json::Value) -> ThreadRecord {
    match serde_json::from_value::<TrackedThread>(value.clone()) {
        Ok(thread) if thread.root_uri.is_empty() => ThreadRecord::Unreadable {
            reason: "record is missing root_uri".to_string(),
        },
        Ok(thread) => ThreadRecord::Valid(Box::new(thread)),
        Err(e) => ThreadRecord::Unreadable {
            reason: e.to_string(),
        },
    }
}

/// Everything the engine persists for one account: tracked threads (stored
/// raw and decoded fail-soft per record), the evaluated-notification log,
/// and the last evaluation watermark.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchState {
    #[serde(default)]
    pub threads: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub evaluated_notifications: Vec<String>,
    #[serde(default)]
    pub last_evaluated_at: Option<DateTime<Utc>>,
}

impl WatchState {
    /// Decode one tracked thread. Unreadable records read as absent.
    pub fn thread(&self, root_uri: &str) -> Option<TrackedThread> {
        match self.threads.get(root_uri).map(decode_thread)? {
            ThreadRecord::Valid(t) => Some(*t),
            ThreadRecord::Unreadable { .. } => None,
        }
    }

    /// Iterate all stored records with their decode outcome, so bulk callers
    /// can skip-and-warn on the unreadable ones.
    pub fn thread_records(&self) -> impl Iterator<Item = (&str, ThreadRecord)> {
        self.threads
            .iter()
            .map(|(key, value)| (key.as_str(), decode_thread(value)))
    }

    pub fn put_thread(&mut self, thread: &TrackedThread) {
        let value = serde_json::to_value(thread)
            .expect("TrackedThread serialization is infallible");
        self.threads.insert(thread.root_uri.clone(), value);
    }

    pub fn remove_thread(&mut self, root_uri: &str) -> bool {
        self.threads.remove(root_uri).is_some()
    }

    pub fn already_evaluated(&self, notification_uri: &str) -> bool {
        self.evaluated_notifications
            .iter()
            .any(|u| u == notification_uri)
    }

    pub fn note_evaluated(&mut self, notification_uri: &str) {
        if !self.already_evaluated(notification_uri) {
            self.evaluated_notifications
                .push(notification_uri.to_string());
        }
    }

    /// Keep only the newest `cap` evaluated-notification entries. Applied on
    /// every save so the append-only log stays bounded.
    pub fn truncate_evaluated(&mut self, cap: usize) {
        let len = self.evaluated_notifications.len();
        if len > cap {
            self.evaluated_notifications.drain(..len - cap);
        }
    }
}

// --- Monitoring-job output ---

/// Declarative job description for the external scheduler. Field names
/// follow the scheduler's wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorJob {
    pub name: String,
    pub schedule: JobSchedule,
    pub payload: JobPayload,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSchedule {
    pub kind: String,
    #[serde(rename = "intervalMs")]
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload {
    pub message: String,
    pub deliver: bool,
    pub channel: String,
    pub to: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_thread() -> TrackedThread {
        let mut branches = BTreeMap::new();
        branches.insert(
            "at://did:plc:me/app.bsky.feed.post/b1".to_string(),
            Branch {
                anchor_uri: "at://did:plc:me/app.bsky.feed.post/b1".to_string(),
                participants: vec![BranchParticipant {
                    did: "did:plc:other".to_string(),
                    handle: "other.bsky.social".to_string(),
                }],
                message_count: 4,
                last_activity_at: Utc::now(),
                topic_drift: 0.25,
                score: 62.5,
            },
        );
        TrackedThread {
            root_uri: "at://did:plc:root/app.bsky.feed.post/1".to_string(),
            root_author: "root.bsky.social".to_string(),
            root_topics: vec!["ai".to_string()],
            root_text: "talking about ai".to_string(),
            overall_score: 71.0,
            branches,
            our_reply_count: 2,
            created_at: Utc::now(),
            last_activity_at: Utc::now(),
            engaged_participants: BTreeSet::from(["did:plc:other".to_string()]),
            recent_replies: vec!["sure, here's a thought".to_string()],
            monitor_job_id: None,
            enabled: true,
            backoff_level: 3,
            last_check_at: Utc::now(),
            last_new_activity_at: None,
        }
    }

    #[test]
    fn thread_round_trips_through_json() {
        let thread = sample_thread();
        let value = serde_json::to_value(&thread).unwrap();
        let back = match decode_thread(&value) {
            ThreadRecord::Valid(t) => *t,
            ThreadRecord::Unreadable { reason } => panic!("should decode: {reason}"),
        };

        assert_eq!(back.root_uri, thread.root_uri);
        assert_eq!(back.backoff_level, 3);
        assert_eq!(
            back.branches.keys().collect::<Vec<_>>(),
            thread.branches.keys().collect::<Vec<_>>()
        );
        let b = &back.branches["at://did:plc:me/app.bsky.feed.post/b1"];
        assert!((b.score - 62.5).abs() < f64::EPSILON);
        assert!((b.topic_drift - 0.25).abs() < f64::EPSILON);
        assert!((back.overall_score - 71.0).abs() < f64::EPSILON);
    }

    #[test]
    fn record_without_root_uri_is_unreadable() {
        let value = json!({"overall_score": 50.0, "backoff_level": 2});
        match decode_thread(&value) {
            ThreadRecord::Unreadable { reason } => {
                assert!(reason.contains("root_uri"), "reason was: {reason}")
            }
            ThreadRecord::Valid(_) => panic!("identity-less record must not decode"),
        }
    }

    #[test]
    fn legacy_record_with_missing_fields_still_decodes() {
        // Only identity present — everything else defaults.
        let value = json!({"root_uri": "at://did:plc:root/app.bsky.feed.post/1"});
        match decode_thread(&value) {
            ThreadRecord::Valid(t) => {
                assert!(t.enabled, "enabled should default on");
                assert_eq!(t.backoff_level, 0);
                assert!(t.branches.is_empty());
            }
            ThreadRecord::Unreadable { reason } => panic!("legacy record should load: {reason}"),
        }
    }

    #[test]
    fn state_skips_unreadable_thread_on_lookup() {
        let mut state = WatchState::default();
        state
            .threads
            .insert("bad".to_string(), json!({"not_a_thread": true}));
        assert!(state.thread("bad").is_none());
    }

    #[test]
    fn evaluated_log_truncates_to_newest() {
        let mut state = WatchState::default();
        for i in 0..10 {
            state.note_evaluated(&format!("at://n/{i}"));
        }
        state.truncate_evaluated(3);
        assert_eq!(
            state.evaluated_notifications,
            vec!["at://n/7", "at://n/8", "at://n/9"]
        );
    }

    #[test]
    fn evaluated_log_deduplicates() {
        let mut state = WatchState::default();
        state.note_evaluated("at://n/1");
        state.note_evaluated("at://n/1");
        assert_eq!(state.evaluated_notifications.len(), 1);
    }

    #[test]
    fn exchange_depth_sums_branch_messages() {
        let thread = sample_thread();
        assert_eq!(thread.exchange_depth(), 4);
    }

    #[test]
    fn notification_root_falls_back_to_own_uri() {
        let n = Notification {
            uri: "at://did:plc:x/app.bsky.feed.post/9".to_string(),
            reason: NotificationReason::Mention,
            author_did: "did:plc:x".to_string(),
            author_handle: "x.bsky.social".to_string(),
            thread_root: None,
            indexed_at: Utc::now(),
        };
        assert_eq!(n.root_uri(), "at://did:plc:x/app.bsky.feed.post/9");
    }

    #[test]
    fn monitor_job_serializes_interval_in_camel_case() {
        let job = MonitorJob {
            name: "watch-thread".to_string(),
            schedule: JobSchedule {
                kind: "every".to_string(),
                interval_ms: 600_000,
            },
            payload: JobPayload {
                message: "briefing".to_string(),
                deliver: true,
                channel: "dm".to_string(),
                to: "operator".to_string(),
            },
            enabled: true,
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["schedule"]["intervalMs"], 600_000);
        assert_eq!(value["schedule"]["kind"], "every");
    }
}
