//! Handler variants installed on access-controlled datasets.

use async_trait::async_trait;
use triplegate_core::{Operation, SecurityContext};

use super::UserResolver;
use crate::service::action::{ActionError, ActionMethod, ActionRequest, ActionResponse};
use crate::service::handlers::query::query_pattern;
use crate::service::handlers::ActionHandler;
use crate::traits::DatasetGraph;

/// Looks up what the request's identity may see. No context means no access.
fn security_context(
    resolver: &UserResolver,
    request: &ActionRequest,
    dataset: &dyn DatasetGraph,
) -> Result<SecurityContext, ActionError> {
    let Some(authorization) = dataset.access_control() else {
        return Err(ActionError::AccessDenied {
            message: "dataset has no authorization service".to_string(),
        });
    };
    let user = resolver(&request.ctx);
    authorization
        .security_context(user.as_deref())
        .ok_or_else(|| ActionError::AccessDenied {
            message: match user {
                Some(user) => format!("no access for user '{user}'"),
                None => "no access for anonymous requests".to_string(),
            },
        })
}

// ---------------------------------------------------------------------------
// FilteringQueryHandler
// ---------------------------------------------------------------------------

/// Query handler restricted to the graphs the resolved identity may read.
pub struct FilteringQueryHandler {
    resolver: UserResolver,
}

impl FilteringQueryHandler {
    #[must_use]
    pub fn new(resolver: UserResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl ActionHandler for FilteringQueryHandler {
    fn name(&self) -> &'static str {
        "query-filtered"
    }

    async fn execute(
        &self,
        request: ActionRequest,
        dataset: &dyn DatasetGraph,
    ) -> Result<ActionResponse, ActionError> {
        if !matches!(request.method, ActionMethod::Get | ActionMethod::Post) {
            return Err(ActionError::MethodNotAllowed {
                method: request.method,
                handler: self.name(),
            });
        }
        let ctx = security_context(&self.resolver, &request, dataset)?;
        let pattern = query_pattern(&request)?;

        // Invisible graphs read as empty.
        if let Some(graph) = &pattern.graph {
            if !ctx.is_visible(graph) {
                return Ok(ActionResponse::Quads { quads: Vec::new() });
            }
        }
        let quads = ctx.filter(dataset.find(&pattern).await?);
        Ok(ActionResponse::Quads { quads })
    }
}

// ---------------------------------------------------------------------------
// FilteringGraphReadHandler
// ---------------------------------------------------------------------------

/// Graph store read restricted to visible graphs. Every write is denied.
pub struct FilteringGraphReadHandler {
    resolver: UserResolver,
}

impl FilteringGraphReadHandler {
    #[must_use]
    pub fn new(resolver: UserResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl ActionHandler for FilteringGraphReadHandler {
    fn name(&self) -> &'static str {
        "gsp-r-filtered"
    }

    async fn execute(
        &self,
        request: ActionRequest,
        dataset: &dyn DatasetGraph,
    ) -> Result<ActionResponse, ActionError> {
        if request.method.is_write() {
            return Err(ActionError::AccessDenied {
                message: format!(
                    "{} is read-only under graph level access control",
                    request.ctx.endpoint
                ),
            });
        }
        let ctx = security_context(&self.resolver, &request, dataset)?;
        let graph = request.target_graph();
        if !ctx.is_visible(&graph) {
            return Ok(ActionResponse::Quads { quads: Vec::new() });
        }
        let quads = dataset.graph(&graph).await?;
        Ok(ActionResponse::Quads { quads })
    }
}

// ---------------------------------------------------------------------------
// DenyHandler
// ---------------------------------------------------------------------------

/// Rejects every request. Installed for operations with no filtering variant.
pub struct DenyHandler {
    message: String,
}

impl DenyHandler {
    #[must_use]
    pub fn new(operation: &Operation) -> Self {
        Self {
            message: format!(
                "Not supported for graph level access control: {}",
                operation.description()
            ),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[async_trait]
impl ActionHandler for DenyHandler {
    fn name(&self) -> &'static str {
        "deny"
    }

    async fn execute(
        &self,
        _request: ActionRequest,
        _dataset: &dyn DatasetGraph,
    ) -> Result<ActionResponse, ActionError> {
        Err(ActionError::AccessDenied {
            message: self.message.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
