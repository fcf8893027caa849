//! Fire-and-forget push notifications.
//!
//! Tool handlers call [`Notifier::notify`] after recording a lead or an
//! unanswered question so the site owner hears about it promptly. Delivery
//! is strictly best-effort: a missing configuration or a failed request is
//! logged and swallowed, and never blocks or fails the tool result.

use std::time::Duration;

const PUSHOVER_URL: &str = "https://api.pushover.net/1/messages.json";

/// Pushover-style push notification sender.
pub struct Notifier {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    user: Option<String>,
}

impl Notifier {
    /// Build a notifier from the environment (`PUSHOVER_TOKEN`,
    /// `PUSHOVER_USER`). When `enabled` is false or either variable is
    /// missing, the notifier is inert.
    pub fn from_env(enabled: bool) -> Self {
        let (token, user) = if enabled {
            (
                std::env::var("PUSHOVER_TOKEN").ok(),
                std::env::var("PUSHOVER_USER").ok(),
            )
        } else {
            (None, None)
        };

        Self::with_url(PUSHOVER_URL, token, user)
    }

    /// Build a notifier against an explicit endpoint. Used by tests.
    pub fn with_url(
        url: impl Into<String>,
        token: Option<String>,
        user: Option<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap_or_default();

        Self {
            client,
            url: url.into(),
            token,
            user,
        }
    }

    /// Send a push notification. Never fails; unconfigured or failed sends
    /// are logged and dropped.
    pub async fn notify(&self, message: &str) {
        let (token, user) = match (&self.token, &self.user) {
            (Some(t), Some(u)) => (t, u),
            _ => {
                tracing::debug!("push notifications not configured, skipping");
                return;
            }
        };

        let payload = [
            ("token", token.as_str()),
            ("user", user.as_str()),
            ("message", message),
        ];

        match self.client.post(&self.url).form(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => {
                tracing::warn!(status = %resp.status(), "push notification rejected");
            }
            Err(e) => {
                tracing::warn!(error = %e, "push notification failed");
            }
        }
    }
}
