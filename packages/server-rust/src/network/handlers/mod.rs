//! HTTP handler definitions.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors) and re-exports the handler functions used by the router.

pub mod admin;
pub mod dataset;
pub mod health;

pub use admin::{add_dataset_handler, list_datasets_handler, remove_dataset_handler};
pub use dataset::dataset_handler;
pub use health::{health_handler, liveness_handler, ping_handler, readiness_handler};

use std::sync::Arc;
use std::time::Instant;

use axum::http::HeaderMap;

use super::{NetworkConfig, ShutdownController};
use crate::bootstrap::ServerContext;
use crate::service::middleware::{build_action_pipeline, ActionPipeline};
use crate::service::router::ActionRouter;

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references and the cloneable dispatch pipeline, so cloning
/// is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Registries built at startup.
    pub context: Arc<ServerContext>,
    /// Router wrapped in load shedding, timeout and metrics layers.
    pub pipeline: ActionPipeline,
    /// Graceful shutdown controller with health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    pub config: Arc<NetworkConfig>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Builds the state, including the dispatch pipeline over the context's datasets.
    #[must_use]
    pub fn new(
        context: Arc<ServerContext>,
        shutdown: Arc<ShutdownController>,
        config: Arc<NetworkConfig>,
    ) -> Self {
        let router = ActionRouter::new(Arc::clone(context.datasets()));
        let pipeline = build_action_pipeline(router, context.config());
        Self {
            context,
            pipeline,
            shutdown,
            config,
            start_time: Instant::now(),
        }
    }
}

/// Identity named by the configured user header, if present and non-blank.
pub(crate) fn header_user<'a>(state: &AppState, headers: &'a HeaderMap) -> Option<&'a str> {
    headers
        .get(state.context.config().user_header.as_str())
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
