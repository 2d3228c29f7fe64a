use chrono::{DateTime, Utc};
use serde::Deserialize;

// --- app.bsky.feed.getPostThread ---

/// Response wrapper for getPostThread.
#[derive(Debug, Clone, Deserialize)]
pub struct PostThreadResponse {
    pub thread: ThreadView,
}

/// One node of a reply tree. The AppView returns a union here; for
/// `notFoundPost` / `blockedPost` variants `post` is absent and the node
/// carries no usable content.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadView {
    pub post: Option<PostView>,
    pub parent: Option<Box<ThreadView>>,
    #[serde(default)]
    pub replies: Vec<ThreadView>,
}

impl ThreadView {
    /// True when the AppView replaced this node with a tombstone
    /// (deleted or blocked post).
    pub fn is_tombstone(&self) -> bool {
        self.post.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostView {
    pub uri: String,
    pub cid: String,
    pub author: Author,
    pub record: PostRecord,
    #[serde(rename = "replyCount")]
    pub reply_count: Option<u32>,
    #[serde(rename = "likeCount")]
    pub like_count: Option<u32>,
    #[serde(rename = "indexedAt")]
    pub indexed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    pub did: String,
    pub handle: String,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
}

/// The `app.bsky.feed.post` record embedded in a post view or notification.
#[derive(Debug, Clone, Deserialize)]
pub struct PostRecord {
    #[serde(default)]
    pub text: String,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    pub reply: Option<ReplyRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplyRef {
    pub root: PostRef,
    pub parent: PostRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostRef {
    pub uri: String,
    pub cid: String,
}

// --- app.bsky.actor.getProfile ---

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileView {
    pub did: String,
    pub handle: String,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(rename = "followersCount", default)]
    pub followers_count: u32,
    #[serde(rename = "followsCount", default)]
    pub follows_count: u32,
    #[serde(rename = "postsCount", default)]
    pub posts_count: u32,
    pub description: Option<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub val: String,
}

// --- app.bsky.notification.listNotifications ---

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsResponse {
    #[serde(default)]
    pub notifications: Vec<NotificationView>,
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationView {
    pub uri: String,
    pub cid: String,
    /// "reply", "mention", "quote", "like", "repost", "follow".
    pub reason: String,
    pub author: Author,
    pub record: PostRecord,
    #[serde(rename = "isRead", default)]
    pub is_read: bool,
    #[serde(rename = "indexedAt")]
    pub indexed_at: DateTime<Utc>,
}
