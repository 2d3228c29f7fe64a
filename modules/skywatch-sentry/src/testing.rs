// Deterministic test doubles: an in-memory transport and state store so the
// whole engine runs under `cargo test` with no network and no filesystem.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use skywatch_common::{
    InterlocutorProfile, Notification, NotificationReason, SkywatchError, ThreadNode, WatchState,
};

use crate::store::StateStore;
use crate::traits::ThreadTransport;

#[derive(Default)]
pub struct MockTransport {
    threads: HashMap<String, ThreadNode>,
    profiles: HashMap<String, InterlocutorProfile>,
    notifications: Vec<Notification>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thread(mut self, node: ThreadNode) -> Self {
        self.threads.insert(node.uri.clone(), node);
        self
    }

    pub fn with_profile(mut self, profile: InterlocutorProfile) -> Self {
        self.profiles.insert(profile.did.clone(), profile);
        self
    }

    pub fn with_notification(mut self, notification: Notification) -> Self {
        self.notifications.push(notification);
        self
    }
}

#[async_trait]
impl ThreadTransport for MockTransport {
    async fn fetch_thread(&self, root_uri: &str, _depth: u32) -> Option<ThreadNode> {
        self.threads.get(root_uri).cloned()
    }

    async fn fetch_profile(&self, actor: &str) -> Option<InterlocutorProfile> {
        self.profiles.get(actor).cloned()
    }

    async fn fetch_notifications(&self, limit: u32) -> Vec<Notification> {
        self.notifications
            .iter()
            .take(limit as usize)
            .cloned()
            .collect()
    }
}

/// Clones share the same underlying state, so a test can hold one handle and
/// hand the other to the engine.
#[derive(Clone)]
pub struct MemoryStateStore {
    inner: Arc<Mutex<WatchState>>,
    evaluated_cap: usize,
}

impl MemoryStateStore {
    pub fn new(evaluated_cap: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(WatchState::default())),
            evaluated_cap,
        }
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<WatchState, SkywatchError> {
        Ok(self.inner.lock().expect("state lock").clone())
    }

    fn save(&self, state: &mut WatchState) -> Result<(), SkywatchError> {
        state.truncate_evaluated(self.evaluated_cap);
        *self.inner.lock().expect("state lock") = state.clone();
        Ok(())
    }
}

// --- Fixture builders ---

pub fn post(
    uri: &str,
    did: &str,
    text: &str,
    created_at: DateTime<Utc>,
    replies: Vec<ThreadNode>,
) -> ThreadNode {
    ThreadNode {
        uri: uri.to_string(),
        author_did: did.to_string(),
        author_handle: format!("{}.bsky.social", did.trim_start_matches("did:plc:")),
        text: text.to_string(),
        created_at,
        replies,
    }
}

pub fn profile(
    did: &str,
    followers: u32,
    follows: u32,
    posts: u32,
    bio: &str,
) -> InterlocutorProfile {
    InterlocutorProfile {
        did: did.to_string(),
        handle: format!("{}.bsky.social", did.trim_start_matches("did:plc:")),
        display_name: None,
        followers_count: followers,
        follows_count: follows,
        posts_count: posts,
        description: if bio.is_empty() { None } else { Some(bio.to_string()) },
        labels: vec![],
    }
}

pub fn reply_notification(
    uri: &str,
    author_did: &str,
    thread_root: &str,
    indexed_at: DateTime<Utc>,
) -> Notification {
    Notification {
        uri: uri.to_string(),
        reason: NotificationReason::Reply,
        author_did: author_did.to_string(),
        author_handle: format!("{}.bsky.social", author_did.trim_start_matches("did:plc:")),
        thread_root: Some(thread_root.to_string()),
        indexed_at,
    }
}
