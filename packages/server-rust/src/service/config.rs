use std::collections::BTreeSet;

use super::action::DEFAULT_ACTION_TIMEOUT_MS;

/// Header carrying the identity established by a fronting authenticator.
pub const DEFAULT_USER_HEADER: &str = "x-remote-user";

/// Server-level configuration for the routing core.
///
/// Controls request timeouts, concurrency limits, and startup logging.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Name of this server instance, used in logs.
    pub node_name: String,
    /// Suppress the setup summary logged at startup.
    pub quiet: bool,
    /// Log every endpoint in the setup summary.
    pub verbose: bool,
    /// Default timeout for dispatched requests in milliseconds.
    pub default_action_timeout_ms: u64,
    /// Maximum number of concurrent requests before load shedding.
    pub max_concurrent_requests: u32,
    /// Request header whose value becomes the request principal.
    pub user_header: String,
    /// Identities allowed to add and remove datasets. Empty denies everyone.
    pub admin_users: BTreeSet<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            node_name: "triplegate".to_string(),
            quiet: false,
            verbose: false,
            default_action_timeout_ms: DEFAULT_ACTION_TIMEOUT_MS,
            max_concurrent_requests: 1000,
            user_header: DEFAULT_USER_HEADER.to_string(),
            admin_users: BTreeSet::new(),
        }
    }
}

impl ServerConfig {
    /// Whether `user` may change the set of served datasets.
    #[must_use]
    pub fn is_admin(&self, user: Option<&str>) -> bool {
        user.is_some_and(|user| self.admin_users.contains(user))
    }
}
