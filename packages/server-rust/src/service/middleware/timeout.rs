//! Timeout middleware for dispatched requests.
//!
//! Rejects requests that exceed their `timeout_ms` with `ActionError::Timeout`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tower::{Layer, Service};

use crate::service::action::{ActionError, ActionRequest, ActionResponse};

// ---------------------------------------------------------------------------
// TimeoutLayer
// ---------------------------------------------------------------------------

/// Tower layer that enforces each request's own `timeout_ms`.
#[derive(Debug, Clone)]
pub struct TimeoutLayer;

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService { inner }
    }
}

// ---------------------------------------------------------------------------
// TimeoutService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TimeoutService<S> {
    inner: S,
}

impl<S> Service<ActionRequest> for TimeoutService<S>
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
        let timeout_ms = request.timeout_ms;
        let fut = self.inner.call(request);
        Box::pin(async move {
            match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
                Ok(result) => result,
                Err(_elapsed) => Err(ActionError::Timeout { timeout_ms }),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tower::ServiceExt;
    use triplegate_core::RequestContext;

    use super::*;
    use crate::service::action::ActionMethod;

    /// Service that takes a configurable delay before responding.
    struct SlowService {
        delay_ms: u64,
    }

    impl Service<ActionRequest> for SlowService {
        type Response = ActionResponse;
        type Error = ActionError;
        type Future = Pin<Box<dyn Future<Output = Result<ActionResponse, ActionError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _request: ActionRequest) -> Self::Future {
            let delay = self.delay_ms;
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(ActionResponse::Empty)
            })
        }
    }

    fn make_request(timeout_ms: u64) -> ActionRequest {
        ActionRequest::new(RequestContext::new("ds", "sparql"), ActionMethod::Get)
            .with_timeout_ms(timeout_ms)
    }

    #[tokio::test]
    async fn completes_within_timeout() {
        let svc = TimeoutLayer.layer(SlowService { delay_ms: 10 });
        let resp = svc.oneshot(make_request(1000)).await.unwrap();
        assert_eq!(resp, ActionResponse::Empty);
    }

    #[tokio::test]
    async fn exceeds_timeout_returns_error() {
        let svc = TimeoutLayer.layer(SlowService { delay_ms: 200 });
        let err = svc.oneshot(make_request(50)).await.unwrap_err();
        assert!(matches!(err, ActionError::Timeout { timeout_ms: 50 }));
    }
}
