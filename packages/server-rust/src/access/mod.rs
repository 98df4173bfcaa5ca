//! Graph-level access control for datasets whose storage carries an
//! [`AuthorizationService`].
//!
//! At startup [`apply_access_control`] replaces every endpoint handler of such
//! a dataset with a filtering or denying variant. Identity comes from a
//! [`UserResolver`] supplied by the deployment.

pub mod handlers;
pub mod overlay;

use std::collections::HashMap;
use std::sync::Arc;

use triplegate_core::{RequestContext, SecurityContext};

use crate::traits::AuthorizationService;

pub use handlers::{DenyHandler, FilteringGraphReadHandler, FilteringQueryHandler};
pub use overlay::{apply_access_control, controlled_handler};

/// Resolves the identity a request runs as. Must be pure.
pub type UserResolver = Arc<dyn Fn(&RequestContext) -> Option<String> + Send + Sync>;

/// Resolver that returns the authenticated principal of the request.
#[must_use]
pub fn default_user_resolver() -> UserResolver {
    Arc::new(|ctx: &RequestContext| ctx.user().map(str::to_string))
}

/// Resolver that runs every request as `user`.
#[must_use]
pub fn fixed_user_resolver(user: impl Into<String>) -> UserResolver {
    let user = user.into();
    Arc::new(move |_ctx: &RequestContext| Some(user.clone()))
}

// ---------------------------------------------------------------------------
// StaticAuthorization
// ---------------------------------------------------------------------------

/// Map-backed authorization: each known user has a fixed security context.
///
/// Unknown users, and requests with no identity, have no context at all
/// unless an anonymous context is configured.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthorization {
    users: HashMap<String, SecurityContext>,
    anonymous: Option<SecurityContext>,
}

impl StaticAuthorization {
    #[must_use]
    pub fn new(users: HashMap<String, SecurityContext>) -> Self {
        Self {
            users,
            anonymous: None,
        }
    }

    /// Grants `ctx` to `user`, builder style.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>, ctx: SecurityContext) -> Self {
        self.users.insert(user.into(), ctx);
        self
    }

    /// Context for requests without an identity.
    #[must_use]
    pub fn with_anonymous(mut self, ctx: SecurityContext) -> Self {
        self.anonymous = Some(ctx);
        self
    }
}

impl AuthorizationService for StaticAuthorization {
    fn security_context(&self, user: Option<&str>) -> Option<SecurityContext> {
        match user {
            Some(user) => self.users.get(user).cloned(),
            None => self.anonymous.clone(),
        }
    }
}
