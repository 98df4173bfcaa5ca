//! One-time handler rewrite for access-controlled datasets.

use std::sync::Arc;

use tracing::{debug, info};
use triplegate_core::Operation;

use super::handlers::{DenyHandler, FilteringGraphReadHandler, FilteringQueryHandler};
use super::UserResolver;
use crate::service::dataset::{DataService, ServiceState};
use crate::service::error::ConfigError;
use crate::service::handlers::ActionHandler;

/// Handler installed under access control for an endpoint bound to `operation`.
///
/// | Operation | Handler |
/// |-----------|---------|
/// | `query`   | [`FilteringQueryHandler`] |
/// | `gsp-r`   | [`FilteringGraphReadHandler`] |
/// | `gsp-rw`  | [`FilteringGraphReadHandler`] (writes denied) |
/// | other     | [`DenyHandler`] |
///
/// Operations without a filtering variant, including ones added later by
/// modules, fall through to the deny handler.
#[must_use]
pub fn controlled_handler(operation: &Operation, resolver: &UserResolver) -> Arc<dyn ActionHandler> {
    match operation.id() {
        id if id == Operation::QUERY.id() => Arc::new(FilteringQueryHandler::new(resolver.clone())),
        id if id == Operation::GSP_R.id() || id == Operation::GSP_RW.id() => {
            Arc::new(FilteringGraphReadHandler::new(resolver.clone()))
        }
        _ => Arc::new(DenyHandler::new(operation)),
    }
}

/// Replaces the handler of every endpoint of `service` with its
/// access-controlled variant.
///
/// Runs once per service, after handler resolution and before activation.
///
/// # Errors
///
/// Returns `ConfigError::InvalidState` unless the service is exactly in the
/// handlers-resolved state, which also rejects a second application.
pub fn apply_access_control(service: &DataService, resolver: &UserResolver) -> Result<(), ConfigError> {
    service.expect_state(ServiceState::HandlersResolved, "apply access control")?;

    for endpoint in service.endpoints() {
        let handler = controlled_handler(endpoint.operation(), resolver);
        debug!(
            dataset = service.name(),
            endpoint = endpoint.name(),
            operation = endpoint.operation().id(),
            handler = handler.name(),
            "access-controlled handler installed"
        );
        endpoint.set_handler(handler)?;
    }

    service.mark_access_controlled()?;
    info!(dataset = service.name(), "graph level access control applied");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
