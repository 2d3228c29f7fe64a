pub mod error;
pub mod types;

pub use error::{BskyError, Result};
pub use types::{
    Author, NotificationView, NotificationsResponse, PostRecord, PostRef, PostThreadResponse,
    PostView, ProfileView, ReplyRef, ThreadView,
};

use std::time::Duration;

/// Public AppView endpoint; works unauthenticated for threads and profiles.
pub const DEFAULT_BASE_URL: &str = "https://public.api.bsky.app";

pub struct BskyClient {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl BskyClient {
    /// Build a client against an AppView base URL. The access token is only
    /// needed for notification endpoints; session establishment happens
    /// elsewhere.
    pub fn new(base_url: &str, access_token: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.map(String::from),
        }
    }

    /// Fetch the full reply tree around a post, `depth` levels down.
    pub async fn get_post_thread(&self, uri: &str, depth: u32) -> Result<ThreadView> {
        let endpoint = format!("{}/xrpc/app.bsky.feed.getPostThread", self.base_url);
        let depth = depth.to_string();
        let resp = self
            .authorized(self.client.get(&endpoint))
            .query(&[("uri", uri), ("depth", depth.as_str())])
            .send()
            .await?;

        let resp = Self::check_status(resp).await?;
        let parsed: PostThreadResponse = resp.json().await?;
        Ok(parsed.thread)
    }

    /// Fetch an actor's public profile by DID or handle.
    pub async fn get_profile(&self, actor: &str) -> Result<ProfileView> {
        let endpoint = format!("{}/xrpc/app.bsky.actor.getProfile", self.base_url);
        let resp = self
            .authorized(self.client.get(&endpoint))
            .query(&[("actor", actor)])
            .send()
            .await?;

        let resp = Self::check_status(resp).await?;
        Ok(resp.json().await?)
    }

    /// Fetch the newest notifications for the authenticated account.
    pub async fn list_notifications(&self, limit: u32) -> Result<Vec<NotificationView>> {
        let endpoint = format!("{}/xrpc/app.bsky.notification.listNotifications", self.base_url);
        let limit = limit.to_string();
        let resp = self
            .authorized(self.client.get(&endpoint))
            .query(&[("limit", limit.as_str())])
            .send()
            .await?;

        let resp = Self::check_status(resp).await?;
        let parsed: NotificationsResponse = resp.json().await?;
        Ok(parsed.notifications)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BskyError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp)
    }
}
