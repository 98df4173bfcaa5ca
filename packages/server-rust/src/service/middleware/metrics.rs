//! Metrics middleware for dispatched requests.
//!
//! Each request runs inside a `tracing` span carrying dataset, endpoint and
//! outcome, and is counted through the `metrics` facade
//! (`triplegate_requests_total`, `triplegate_request_duration_seconds`).

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::service::action::{ActionError, ActionRequest, ActionResponse};

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

/// Service wrapper that records request duration and outcome.
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S> Service<ActionRequest> for MetricsService<S>
where
    S: Service<ActionRequest, Response = ActionResponse, Error = ActionError> + Send,
    S::Future: Send + 'static,
{
    type Response = ActionResponse;
    type Error = ActionError;
    type Future = Pin<Box<dyn Future<Output = Result<ActionResponse, ActionError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: ActionRequest) -> Self::Future {
        let dataset = request.ctx.dataset.clone();
        let endpoint = request.ctx.endpoint.clone();

        let span = info_span!(
            "action",
            request_id = %request.ctx.request_id,
            dataset = %dataset,
            endpoint = %endpoint,
            method = request.method.as_str(),
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(request);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let elapsed = start.elapsed();

                let outcome = match &result {
                    Ok(_) => "ok",
                    Err(e) => e.kind(),
                };

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = elapsed.as_millis() as u64;
                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);

                ::metrics::counter!(
                    "triplegate_requests_total",
                    "dataset" => dataset.clone(),
                    "outcome" => outcome
                )
                .increment(1);
                ::metrics::histogram!("triplegate_request_duration_seconds", "dataset" => dataset)
                    .record(elapsed.as_secs_f64());

                tracing::debug!(duration_ms, outcome, "request complete");

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
