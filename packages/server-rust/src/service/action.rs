//! Request, response, and error types carried through the dispatch pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};
use triplegate_core::{GraphName, Quad, QuadPattern, RequestContext};

/// Default per-request timeout when the transport does not set one.
pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 30_000;

/// Request verb, mirroring the HTTP method that carried the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl ActionMethod {
    /// Whether the method asks to change data.
    #[must_use]
    pub fn is_write(self) -> bool {
        !matches!(self, Self::Get)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for ActionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Change set applied by the update operation: deletions first, then insertions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRequest {
    #[serde(default)]
    pub delete: Vec<Quad>,
    #[serde(default)]
    pub insert: Vec<Quad>,
}

impl UpdateRequest {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.insert.is_empty()
    }
}

/// Decoded request payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ActionBody {
    #[default]
    Empty,
    Pattern(QuadPattern),
    Quads(Vec<Quad>),
    Update(UpdateRequest),
}

/// One request addressed to `ctx.dataset` / `ctx.endpoint`.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub ctx: RequestContext,
    pub method: ActionMethod,
    /// Graph selected by the request, for graph store requests.
    pub graph: Option<GraphName>,
    pub body: ActionBody,
    pub timeout_ms: u64,
}

impl ActionRequest {
    #[must_use]
    pub fn new(ctx: RequestContext, method: ActionMethod) -> Self {
        Self {
            ctx,
            method,
            graph: None,
            body: ActionBody::Empty,
            timeout_ms: DEFAULT_ACTION_TIMEOUT_MS,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: ActionBody) -> Self {
        self.body = body;
        self
    }

    #[must_use]
    pub fn with_graph(mut self, graph: GraphName) -> Self {
        self.graph = Some(graph);
        self
    }

    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Graph targeted by a graph store request; the default graph when unset.
    #[must_use]
    pub fn target_graph(&self) -> GraphName {
        self.graph.clone().unwrap_or_default()
    }
}

/// Successful outcome of a handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionResponse {
    Quads { quads: Vec<Quad> },
    Modified { inserted: usize, deleted: usize },
    Empty,
}

/// Errors returned by handlers and by the dispatch pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("dataset not found: {name}")]
    DatasetNotFound { name: String },
    #[error("endpoint not found: /{dataset}/{endpoint}")]
    EndpointNotFound { dataset: String, endpoint: String },
    #[error("method {method} not allowed by {handler}")]
    MethodNotAllowed {
        method: ActionMethod,
        handler: &'static str,
    },
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("access denied: {message}")]
    AccessDenied { message: String },
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("server overloaded, try again later")]
    Overloaded,
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ActionError {
    /// Short label used for log fields and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DatasetNotFound { .. } | Self::EndpointNotFound { .. } => "not_found",
            Self::MethodNotAllowed { .. } => "method_not_allowed",
            Self::BadRequest(_) => "bad_request",
            Self::AccessDenied { .. } => "denied",
            Self::Timeout { .. } => "timeout",
            Self::Overloaded => "overloaded",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_methods() {
        assert!(!ActionMethod::Get.is_write());
        assert!(ActionMethod::Post.is_write());
        assert!(ActionMethod::Put.is_write());
        assert!(ActionMethod::Delete.is_write());
    }

    #[test]
    fn target_graph_defaults_to_default_graph() {
        let req = ActionRequest::new(RequestContext::new("ds", "data"), ActionMethod::Get);
        assert!(req.target_graph().is_default());
        let req = req.with_graph(GraphName::named("http://g"));
        assert_eq!(req.target_graph(), GraphName::named("http://g"));
    }

    #[test]
    fn response_serializes_with_kind_tag() {
        let json = serde_json::to_value(ActionResponse::Modified {
            inserted: 2,
            deleted: 0,
        })
        .unwrap();
        assert_eq!(json["kind"], "modified");
        assert_eq!(json["inserted"], 2);
    }

    #[test]
    fn error_kinds() {
        let err = ActionError::EndpointNotFound {
            dataset: "ds".to_string(),
            endpoint: "x".to_string(),
        };
        assert_eq!(err.kind(), "not_found");
        assert_eq!(err.to_string(), "endpoint not found: /ds/x");
        assert_eq!(
            ActionError::AccessDenied {
                message: "nope".to_string()
            }
            .kind(),
            "denied"
        );
    }
}
