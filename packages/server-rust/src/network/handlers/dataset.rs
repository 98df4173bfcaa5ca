//! `/{dataset}/{endpoint}`: translates HTTP into an [`ActionRequest`] and
//! runs it through the dispatch pipeline.
//!
//! Request shape:
//! - query string `graph=<iri>` or `graph=default` selects the target graph
//! - query string `s`, `p`, `o`, `g` build a pattern when there is no body
//! - query string `timeout_ms` shortens the default dispatch timeout
//! - JSON body: a quad array, `{"quads": [...]}`, `{"pattern": {...}}`, or
//!   `{"insert": [...], "delete": [...]}`

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tower::ServiceExt;
use triplegate_core::{GraphName, Quad, QuadPattern, RequestContext};

use super::{header_user, AppState};
use crate::network::middleware::REQUEST_ID_HEADER;
use crate::service::action::{ActionBody, ActionError, ActionMethod, ActionRequest, UpdateRequest};

/// Query-string parameters understood by dataset endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct DispatchParams {
    pub graph: Option<String>,
    pub s: Option<String>,
    pub p: Option<String>,
    pub o: Option<String>,
    pub g: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// Accepted JSON bodies, tried in order.
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonBody {
    Quads(Vec<Quad>),
    Wrapped { quads: Vec<Quad> },
    Pattern { pattern: QuadPattern },
    Update(UpdateRequest),
}

fn graph_name(value: &str) -> GraphName {
    if value == "default" {
        GraphName::Default
    } else {
        GraphName::named(value)
    }
}

fn action_method(method: &Method) -> Option<ActionMethod> {
    match *method {
        Method::GET => Some(ActionMethod::Get),
        Method::POST => Some(ActionMethod::Post),
        Method::PUT => Some(ActionMethod::Put),
        Method::DELETE => Some(ActionMethod::Delete),
        _ => None,
    }
}

fn decode_body(params: &DispatchParams, body: &[u8]) -> Result<ActionBody, ActionError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        let has_pattern = params.s.is_some() || params.p.is_some() || params.o.is_some() || params.g.is_some();
        if !has_pattern {
            return Ok(ActionBody::Empty);
        }
        return Ok(ActionBody::Pattern(QuadPattern {
            subject: params.s.clone(),
            predicate: params.p.clone(),
            object: params.o.clone(),
            graph: params.g.as_deref().map(graph_name),
        }));
    }

    let decoded: JsonBody =
        serde_json::from_slice(body).map_err(|e| ActionError::BadRequest(format!("invalid body: {e}")))?;
    Ok(match decoded {
        JsonBody::Quads(quads) | JsonBody::Wrapped { quads } => ActionBody::Quads(quads),
        JsonBody::Pattern { pattern } => ActionBody::Pattern(pattern),
        JsonBody::Update(update) if update.is_empty() => {
            return Err(ActionError::BadRequest(
                "update needs a non-empty `insert` or `delete`".to_string(),
            ))
        }
        JsonBody::Update(update) => ActionBody::Update(update),
    })
}

/// A client may shorten the dispatch timeout but never extend it past `limit_ms`.
fn effective_timeout(requested: Option<u64>, limit_ms: u64) -> Result<u64, ActionError> {
    match requested {
        None => Ok(limit_ms),
        Some(0) => Err(ActionError::BadRequest("timeout_ms must be positive".to_string())),
        Some(ms) => Ok(ms.min(limit_ms)),
    }
}

/// Builds the request context: routing names, correlation id, and the
/// principal named by the configured identity header.
fn request_context(state: &AppState, dataset: String, endpoint: String, headers: &HeaderMap) -> RequestContext {
    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_string);

    let mut ctx = RequestContext::new(dataset, endpoint).with_request_id(request_id);
    if let Some(user) = header_user(state, headers) {
        ctx = ctx.with_user(user);
    }
    ctx
}

/// Dispatches one dataset request.
pub async fn dataset_handler(
    State(state): State<AppState>,
    Path((dataset, endpoint)): Path<(String, String)>,
    Query(params): Query<DispatchParams>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !state.shutdown.health_state().accepts_requests() {
        return ActionError::Overloaded.into_response();
    }
    let _guard = state.shutdown.in_flight_guard();

    let Some(method) = action_method(&method) else {
        return (StatusCode::METHOD_NOT_ALLOWED, "unsupported method").into_response();
    };
    let body = match decode_body(&params, &body) {
        Ok(body) => body,
        Err(e) => return e.into_response(),
    };

    let timeout_ms = match effective_timeout(params.timeout_ms, state.context.config().default_action_timeout_ms) {
        Ok(timeout_ms) => timeout_ms,
        Err(e) => return e.into_response(),
    };

    let ctx = request_context(&state, dataset, endpoint, &headers);
    let mut request = ActionRequest::new(ctx, method)
        .with_body(body)
        .with_timeout_ms(timeout_ms);
    if let Some(graph) = params.graph.as_deref() {
        request = request.with_graph(graph_name(graph));
    }

    match state.pipeline.clone().oneshot(request).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => e.into_response(),
    }
}

/// HTTP status for each dispatch failure.
#[must_use]
pub fn status_for(error: &ActionError) -> StatusCode {
    match error {
        ActionError::DatasetNotFound { .. } | ActionError::EndpointNotFound { .. } => StatusCode::NOT_FOUND,
        ActionError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
        ActionError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ActionError::AccessDenied { .. } => StatusCode::FORBIDDEN,
        ActionError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ActionError::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
        ActionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::Request;

    use super::*;
    use crate::network::handlers::tests::test_state;
    use crate::network::NetworkModule;

    async fn send(router: axum::Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    async fn router() -> axum::Router {
        let state = test_state().await;
        state.shutdown.set_ready();
        NetworkModule::router_for(state)
    }

    #[test]
    fn pattern_from_query_string() {
        let params = DispatchParams {
            s: Some("ex:a".to_string()),
            g: Some("default".to_string()),
            ..DispatchParams::default()
        };
        let body = decode_body(&params, b"").unwrap();
        assert_eq!(
            body,
            ActionBody::Pattern(QuadPattern {
                subject: Some("ex:a".to_string()),
                graph: Some(GraphName::Default),
                ..QuadPattern::default()
            })
        );
    }

    #[test]
    fn body_shapes_decode() {
        let params = DispatchParams::default();
        assert!(matches!(
            decode_body(&params, br#"[{"subject":"s","predicate":"p","object":"o"}]"#).unwrap(),
            ActionBody::Quads(q) if q.len() == 1
        ));
        assert!(matches!(
            decode_body(&params, br#"{"quads":[]}"#).unwrap(),
            ActionBody::Quads(q) if q.is_empty()
        ));
        assert!(matches!(
            decode_body(&params, br#"{"pattern":{"predicate":"p"}}"#).unwrap(),
            ActionBody::Pattern(p) if p.predicate.as_deref() == Some("p")
        ));
        assert!(matches!(
            decode_body(&params, br#"{"insert":[{"subject":"s","predicate":"p","object":"o"}]}"#).unwrap(),
            ActionBody::Update(u) if u.insert.len() == 1 && u.delete.is_empty()
        ));
        assert!(matches!(
            decode_body(&params, b"not json").unwrap_err(),
            ActionError::BadRequest(_)
        ));
    }

    #[test]
    fn misspelled_or_empty_update_is_rejected() {
        let params = DispatchParams::default();
        for body in [
            &br#"{"inserts":[{"subject":"s","predicate":"p","object":"o"}]}"#[..],
            br#"{"insert":[],"delete":[]}"#,
            b"{}",
        ] {
            assert!(matches!(
                decode_body(&params, body).unwrap_err(),
                ActionError::BadRequest(_)
            ));
        }
    }

    #[test]
    fn client_timeout_is_capped() {
        assert_eq!(effective_timeout(None, 5_000).unwrap(), 5_000);
        assert_eq!(effective_timeout(Some(200), 5_000).unwrap(), 200);
        assert_eq!(effective_timeout(Some(u64::MAX), 5_000).unwrap(), 5_000);
        assert!(matches!(
            effective_timeout(Some(0), 5_000).unwrap_err(),
            ActionError::BadRequest(_)
        ));
    }

    #[tokio::test]
    async fn zero_timeout_is_bad_request() {
        let router = router().await;
        let (status, json) = send(router, Request::get("/ds1/sparql?timeout_ms=0").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "bad_request");
    }

    #[test]
    fn error_statuses() {
        assert_eq!(
            status_for(&ActionError::AccessDenied {
                message: String::new()
            }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(status_for(&ActionError::Overloaded), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status_for(&ActionError::Timeout { timeout_ms: 1 }),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[tokio::test]
    async fn write_then_read_graph() {
        let router = router().await;

        let put = Request::put("/ds1/data?graph=http://g1")
            .body(Body::from(r#"[{"subject":"ex:s","predicate":"ex:p","object":"ex:o"}]"#))
            .unwrap();
        let (status, json) = send(router.clone(), put).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["kind"], "modified");
        assert_eq!(json["inserted"], 1);

        let get = Request::get("/ds1/sparql?g=http://g1").body(Body::empty()).unwrap();
        let (status, json) = send(router, get).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["quads"][0]["subject"], "ex:s");
        assert_eq!(json["quads"][0]["graph"], "http://g1");
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let router = router().await;

        let (status, json) = send(router.clone(), Request::get("/nope/sparql").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "not_found");

        let (status, _) = send(router, Request::get("/ds1/nope").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn wrong_method_is_405() {
        let router = router().await;
        let (status, json) = send(router, Request::delete("/ds1/sparql").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json["error"], "method_not_allowed");
    }

    #[tokio::test]
    async fn draining_server_refuses_requests() {
        let state = test_state().await;
        state.shutdown.trigger_shutdown();
        let router = NetworkModule::router_for(state);
        let (status, _) = send(router, Request::get("/ds1/sparql").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
