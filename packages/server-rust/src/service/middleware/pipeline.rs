//! Pipeline composition: combines all middleware layers into a single service stack.

use tower::ServiceBuilder;

use super::load_shed::{LoadShedLayer, LoadShedService};
use super::metrics::{MetricsLayer, MetricsService};
use super::timeout::{TimeoutLayer, TimeoutService};
use crate::service::config::ServerConfig;
use crate::service::router::ActionRouter;

/// The composed dispatch stack. Cloning shares the concurrency limit.
pub type ActionPipeline = LoadShedService<TimeoutService<MetricsService<ActionRouter>>>;

/// Build the dispatch pipeline by wrapping the `ActionRouter` with middleware layers.
///
/// Layer order (outermost to innermost):
/// 1. `LoadShedLayer` -- reject when overloaded, before doing any work
/// 2. `TimeoutLayer` -- enforce per-request timeouts
/// 3. `MetricsLayer` -- record timing and outcome, closest to the handler
#[must_use]
pub fn build_action_pipeline(router: ActionRouter, config: &ServerConfig) -> ActionPipeline {
    ServiceBuilder::new()
        .layer(LoadShedLayer::new(config.max_concurrent_requests))
        .layer(TimeoutLayer)
        .layer(MetricsLayer)
        .service(router)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tower::ServiceExt;
    use triplegate_core::{Operation, RequestContext};

    use super::*;
    use crate::service::access_point::DataAccessPointRegistry;
    use crate::service::action::{ActionError, ActionMethod, ActionRequest, ActionResponse};
    use crate::service::dataset::{DataAccessPoint, DataService, Endpoint};
    use crate::service::operations::OperationRegistry;
    use crate::storage::MemoryDataset;

    #[tokio::test]
    async fn pipeline_routes_through_all_layers() {
        let service = DataService::builder("ds1", Arc::new(MemoryDataset::new()))
            .endpoint(Endpoint::new("ping", Operation::NO_OP))
            .unwrap()
            .build();
        service
            .set_endpoint_handlers(&OperationRegistry::standard())
            .unwrap();
        service.activate().unwrap();
        let registry = Arc::new(DataAccessPointRegistry::new());
        registry.register(DataAccessPoint::new("ds1", service)).unwrap();

        let config = ServerConfig {
            max_concurrent_requests: 100,
            ..ServerConfig::default()
        };
        let svc = build_action_pipeline(ActionRouter::new(registry), &config);

        let request = ActionRequest::new(RequestContext::new("ds1", "ping"), ActionMethod::Post);
        let resp = svc.oneshot(request).await.unwrap();
        assert_eq!(resp, ActionResponse::Empty);
    }

    #[tokio::test]
    async fn pipeline_reports_routing_miss() {
        let registry = Arc::new(DataAccessPointRegistry::new());
        let svc = build_action_pipeline(ActionRouter::new(registry), &ServerConfig::default());

        let request = ActionRequest::new(RequestContext::new("ds1", "ping"), ActionMethod::Get);
        let err = svc.oneshot(request).await.unwrap_err();
        assert!(matches!(err, ActionError::DatasetNotFound { .. }));
    }
}
