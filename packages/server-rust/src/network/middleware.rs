//! HTTP middleware stack.
//!
//! Middleware ordering follows the outer-to-inner convention: the first
//! layer listed is the outermost (processes the request first on the way
//! in, and the response last on the way out).

use axum::http::header::HeaderName;
use axum::http::{Method, StatusCode};
use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::config::NetworkConfig;

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// The composed Tower layer type produced by [`build_http_layers`].
type HttpLayers = Stack<
    RequestBodyLimitLayer,
    Stack<
        PropagateRequestIdLayer,
        Stack<
            TimeoutLayer,
            Stack<
                CorsLayer,
                Stack<
                    CompressionLayer,
                    Stack<
                        TraceLayer<SharedClassifier<ServerErrorsAsFailures>>,
                        Stack<SetRequestIdLayer<MakeRequestUuid>, Identity>,
                    >,
                >,
            >,
        >,
    >,
>;

/// Builds the HTTP-level middleware stack.
///
/// **Ordering (outermost to innermost):**
/// 1. `SetRequestId` -- assigns a UUID v4 `x-request-id` when the client sent none
/// 2. `Tracing` -- request/response trace spans
/// 3. `Compression` -- gzip responses
/// 4. `CORS` -- configured origins; the dataset methods GET, POST, PUT, DELETE
/// 5. `Timeout` -- maximum HTTP request duration (408)
/// 6. `PropagateRequestId` -- copies `x-request-id` onto the response
/// 7. `RequestBodyLimit` -- rejects bodies over `max_body_bytes` (413)
///
/// Dispatch-level limits (load shedding, per-request timeout, metrics) live
/// in the action pipeline, not here.
#[must_use]
pub fn build_http_layers(config: &NetworkConfig) -> HttpLayers {
    let x_request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&config.cors_origins))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(PropagateRequestIdLayer::new(x_request_id))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .into_inner()
}

/// A `"*"` entry allows any origin; otherwise only the parseable origins listed.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn builds_with_defaults() {
        let _layers = build_http_layers(&NetworkConfig::default());
    }

    #[test]
    fn builds_with_custom_timeout_and_origins() {
        let config = NetworkConfig {
            request_timeout: Duration::from_secs(5),
            cors_origins: vec!["http://localhost:3000".to_string(), "not a url".to_string()],
            ..NetworkConfig::default()
        };
        let _layers = build_http_layers(&config);
    }
}
