//! Client configuration.

/// Base location avatar images are resolved against.
pub const DEFAULT_AVATAR_BASE_URL: &str =
    "http://media.steampowered.com/steamcommunity/public/images/avatars";

/// Name used for the local user when none is configured.
pub const DEFAULT_SELF_NAME: &str = "Me";

/// Policy for transport connection retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    /// Maximum retries before the session is failed. `None` retries until
    /// the user disconnects.
    pub max_retries: Option<u32>,
}

impl RetryPolicy {
    /// Retry until explicitly disconnected.
    pub fn unbounded() -> Self {
        Self { max_retries: None }
    }

    /// Fail the session after `max_retries` retries.
    pub fn bounded(max_retries: u32) -> Self {
        Self { max_retries: Some(max_retries) }
    }

    /// Whether retry number `attempt` is past the limit.
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        self.max_retries.is_some_and(|max| attempt > max)
    }
}

/// Configuration for [`crate::Client`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Display name attributed to outgoing chat messages.
    pub self_name: String,
    /// Base URL avatar paths are appended to.
    pub avatar_base_url: String,
    /// Connection retry policy.
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            self_name: DEFAULT_SELF_NAME.to_string(),
            avatar_base_url: DEFAULT_AVATAR_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}
