// Trait abstraction for the transport collaborator.
//
// ThreadTransport is the engine's only window onto the network. Every
// failure mode at this boundary reads as "no data" — absent thread, absent
// profile, empty notification list — so callers branch on presence, never on
// errors. This also enables deterministic testing with MockTransport: no
// network, no AppView.

use async_trait::async_trait;
use tracing::warn;

use bsky_client::{BskyClient, NotificationView, ProfileView, ThreadView};
use skywatch_common::{InterlocutorProfile, Notification, NotificationReason, ThreadNode};

#[async_trait]
pub trait ThreadTransport: Send + Sync {
    /// Fetch the reply tree rooted at `root_uri`, `depth` levels down.
    async fn fetch_thread(&self, root_uri: &str, depth: u32) -> Option<ThreadNode>;

    /// Fetch an actor's public profile.
    async fn fetch_profile(&self, actor: &str) -> Option<InterlocutorProfile>;

    /// Fetch the newest notifications for the account.
    async fn fetch_notifications(&self, limit: u32) -> Vec<Notification>;
}

/// Production transport: the AppView client with every error degraded to
/// absence at this boundary.
pub struct AppViewTransport {
    client: BskyClient,
}

impl AppViewTransport {
    pub fn new(client: BskyClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ThreadTransport for AppViewTransport {
    async fn fetch_thread(&self, root_uri: &str, depth: u32) -> Option<ThreadNode> {
        match self.client.get_post_thread(root_uri, depth).await {
            Ok(view) => thread_node_from_view(view),
            Err(e) => {
                warn!(root = root_uri, error = %e, "thread fetch failed");
                None
            }
        }
    }

    async fn fetch_profile(&self, actor: &str) -> Option<InterlocutorProfile> {
        match self.client.get_profile(actor).await {
            Ok(view) => Some(profile_from_view(view)),
            Err(e) => {
                warn!(actor, error = %e, "profile fetch failed");
                None
            }
        }
    }

    async fn fetch_notifications(&self, limit: u32) -> Vec<Notification> {
        match self.client.list_notifications(limit).await {
            Ok(views) => views.into_iter().map(notification_from_view).collect(),
            Err(e) => {
                warn!(error = %e, "notification fetch failed");
                Vec::new()
            }
        }
    }
}

/// Flatten the wire union into the engine's tree shape. Tombstoned nodes
/// (deleted/blocked posts) disappear along with their subtrees.
pub fn thread_node_from_view(view: ThreadView) -> Option<ThreadNode> {
    let post = view.post?;
    let created_at = post.record.created_at.unwrap_or(post.indexed_at);
    Some(ThreadNode {
        uri: post.uri,
        author_did: post.author.did,
        author_handle: post.author.handle,
        text: post.record.text,
        created_at,
        replies: view
            .replies
            .into_iter()
            .filter_map(thread_node_from_view)
            .collect(),
    })
}

pub fn profile_from_view(view: ProfileView) -> InterlocutorProfile {
    InterlocutorProfile {
        did: view.did,
        handle: view.handle,
        display_name: view.display_name,
        followers_count: view.followers_count,
        follows_count: view.follows_count,
        posts_count: view.posts_count,
        description: view.description,
        labels: view.labels.into_iter().map(|l| l.val).collect(),
    }
}

pub fn notification_from_view(view: NotificationView) -> Notification {
    Notification {
        reason: NotificationReason::from_str_loose(&view.reason),
        author_did: view.author.did,
        author_handle: view.author.handle,
        thread_root: view.record.reply.map(|r| r.root.uri),
        indexed_at: view.indexed_at,
        uri: view.uri,
    }
}
