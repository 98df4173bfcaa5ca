//! Datasets as the router sees them: endpoints, data services, access points.
//!
//! A [`DataService`] moves through a one-way state machine:
//!
//! ```text
//! Created -> HandlersResolved -> [AccessControlled] -> Active
//! ```
//!
//! Endpoint handlers may only change before `Active`; activation seals
//! every endpoint, after which request tasks read handlers without locking.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::{debug, warn};
use triplegate_core::Operation;

use super::error::ConfigError;
use super::handlers::ActionHandler;
use super::operations::OperationRegistry;
use crate::traits::DatasetGraph;

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// Wrapper giving the trait object a sized type that `ArcSwap` can hold.
struct BoundHandler(Arc<dyn ActionHandler>);

/// A named route inside one dataset binding an operation to a handler.
///
/// The handler reference is the only mutable part. It is swapped atomically
/// during startup and frozen by [`DataService::activate`].
pub struct Endpoint {
    name: String,
    operation: Operation,
    handler: ArcSwapOption<BoundHandler>,
    explicit: bool,
    sealed: AtomicBool,
}

impl Endpoint {
    /// Creates an endpoint whose handler will come from the operation registry.
    #[must_use]
    pub fn new(name: impl Into<String>, operation: Operation) -> Self {
        Self {
            name: name.into(),
            operation,
            handler: ArcSwapOption::empty(),
            explicit: false,
            sealed: AtomicBool::new(false),
        }
    }

    /// Creates an endpoint with a handler fixed by configuration.
    /// [`DataService::set_endpoint_handlers`] leaves it untouched.
    #[must_use]
    pub fn with_handler(
        name: impl Into<String>,
        operation: Operation,
        handler: Arc<dyn ActionHandler>,
    ) -> Self {
        Self {
            handler: ArcSwapOption::from_pointee(BoundHandler(handler)),
            explicit: true,
            ..Self::new(name, operation)
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Current handler, or `None` before handlers are resolved.
    #[must_use]
    pub fn handler(&self) -> Option<Arc<dyn ActionHandler>> {
        self.handler
            .load()
            .as_ref()
            .map(|bound| Arc::clone(&bound.0))
    }

    /// Whether configuration supplied the handler explicitly.
    #[must_use]
    pub fn has_explicit_handler(&self) -> bool {
        self.explicit
    }

    /// Replaces the handler.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EndpointSealed` once the owning dataset is active.
    pub fn set_handler(&self, handler: Arc<dyn ActionHandler>) -> Result<(), ConfigError> {
        if self.is_sealed() {
            return Err(ConfigError::EndpointSealed {
                endpoint: self.name.clone(),
            });
        }
        self.handler.store(Some(Arc::new(BoundHandler(handler))));
        Ok(())
    }

    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("operation", &self.operation.id())
            .field("handler", &self.handler().map(|h| h.name()))
            .field("sealed", &self.is_sealed())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ServiceState
// ---------------------------------------------------------------------------

/// Lifecycle state of a [`DataService`]. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ServiceState {
    /// Endpoints attached, handlers possibly unset.
    Created = 0,
    /// Every endpoint has a handler.
    HandlersResolved = 1,
    /// The access-control overlay has replaced the handlers.
    AccessControlled = 2,
    /// Serving requests. Endpoints are sealed.
    Active = 3,
}

impl ServiceState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::HandlersResolved,
            2 => Self::AccessControlled,
            _ => Self::Active,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::HandlersResolved => "handlers-resolved",
            Self::AccessControlled => "access-controlled",
            Self::Active => "active",
        }
    }
}

// ---------------------------------------------------------------------------
// DataService
// ---------------------------------------------------------------------------

/// One logical dataset: the storage handle plus its endpoints.
///
/// The dataset handle is released through [`DataService::close`] when the
/// owning access point is unregistered.
pub struct DataService {
    name: String,
    dataset: Arc<dyn DatasetGraph>,
    endpoints: HashMap<String, Arc<Endpoint>>,
    state: AtomicU8,
}

impl DataService {
    /// Starts building a data service for `dataset`, labelled `name` in logs.
    #[must_use]
    pub fn builder(name: impl Into<String>, dataset: Arc<dyn DatasetGraph>) -> DataServiceBuilder {
        DataServiceBuilder {
            name: name.into(),
            dataset,
            endpoints: HashMap::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The storage handle.
    #[must_use]
    pub fn dataset(&self) -> &Arc<dyn DatasetGraph> {
        &self.dataset
    }

    #[must_use]
    pub fn endpoint(&self, name: &str) -> Option<Arc<Endpoint>> {
        self.endpoints.get(name).cloned()
    }

    /// Iterates the endpoints in unspecified order.
    pub fn endpoints(&self) -> impl Iterator<Item = &Arc<Endpoint>> {
        self.endpoints.values()
    }

    #[must_use]
    pub fn state(&self) -> ServiceState {
        ServiceState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == ServiceState::Active
    }

    /// Fills in the handler of every endpoint configuration left unset,
    /// using the endpoint's operation.
    ///
    /// All handlers are resolved before any is installed, so on failure no
    /// endpoint has changed.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnresolvedOperation` if any operation has no
    /// registry entry, or `ConfigError::InvalidState` if called after the
    /// service left `Created`.
    pub fn set_endpoint_handlers(&self, registry: &OperationRegistry) -> Result<(), ConfigError> {
        self.expect_state(ServiceState::Created, "resolve handlers")?;

        let mut resolved = Vec::with_capacity(self.endpoints.len());
        for endpoint in self.endpoints.values() {
            if endpoint.has_explicit_handler() {
                continue;
            }
            resolved.push((endpoint, registry.resolve(endpoint.operation())?));
        }
        for (endpoint, handler) in resolved {
            debug!(
                dataset = %self.name,
                endpoint = endpoint.name(),
                handler = handler.name(),
                "endpoint handler resolved"
            );
            endpoint.set_handler(handler)?;
        }

        self.transition(ServiceState::Created, ServiceState::HandlersResolved, "resolve handlers")
    }

    /// Records that the access-control overlay has run.
    pub(crate) fn mark_access_controlled(&self) -> Result<(), ConfigError> {
        self.transition(
            ServiceState::HandlersResolved,
            ServiceState::AccessControlled,
            "apply access control",
        )
    }

    /// Makes the service routable and seals its endpoints.
    ///
    /// Returns `true` on the transition and `false` if the service was
    /// already active; a repeated activation is a logged no-op.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidState` if handlers were never resolved.
    pub fn activate(&self) -> Result<bool, ConfigError> {
        let current = self.state();
        match current {
            ServiceState::Active => {
                warn!(dataset = %self.name, "dataset already active");
                Ok(false)
            }
            ServiceState::Created => Err(self.invalid_state(current, "activate")),
            ServiceState::HandlersResolved | ServiceState::AccessControlled => {
                for endpoint in self.endpoints.values() {
                    endpoint.seal();
                }
                self.transition(current, ServiceState::Active, "activate")?;
                debug!(dataset = %self.name, "dataset active");
                Ok(true)
            }
        }
    }

    /// Releases the storage handle.
    ///
    /// # Errors
    ///
    /// Propagates the storage layer's close failure.
    pub async fn close(&self) -> anyhow::Result<()> {
        self.dataset.close().await
    }

    pub(crate) fn expect_state(
        &self,
        expected: ServiceState,
        action: &'static str,
    ) -> Result<(), ConfigError> {
        let current = self.state();
        if current == expected {
            Ok(())
        } else {
            Err(self.invalid_state(current, action))
        }
    }

    fn transition(
        &self,
        from: ServiceState,
        to: ServiceState,
        action: &'static str,
    ) -> Result<(), ConfigError> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|actual| self.invalid_state(ServiceState::from_u8(actual), action))
    }

    fn invalid_state(&self, state: ServiceState, action: &'static str) -> ConfigError {
        ConfigError::InvalidState {
            dataset: self.name.clone(),
            state: state.as_str(),
            action,
        }
    }
}

impl fmt::Debug for DataService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataService")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("endpoints", &self.endpoints.len())
            .finish_non_exhaustive()
    }
}

/// Collects endpoints before a [`DataService`] is created.
pub struct DataServiceBuilder {
    name: String,
    dataset: Arc<dyn DatasetGraph>,
    endpoints: HashMap<String, Arc<Endpoint>>,
}

impl DataServiceBuilder {
    /// Attaches an endpoint.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateEndpoint` if the name is taken.
    pub fn endpoint(mut self, endpoint: Endpoint) -> Result<Self, ConfigError> {
        if self.endpoints.contains_key(endpoint.name()) {
            return Err(ConfigError::DuplicateEndpoint {
                dataset: self.name,
                endpoint: endpoint.name,
            });
        }
        self.endpoints
            .insert(endpoint.name.clone(), Arc::new(endpoint));
        Ok(self)
    }

    #[must_use]
    pub fn build(self) -> DataService {
        DataService {
            name: self.name,
            dataset: self.dataset,
            endpoints: self.endpoints,
            state: AtomicU8::new(ServiceState::Created as u8),
        }
    }
}

// ---------------------------------------------------------------------------
// DataAccessPoint
// ---------------------------------------------------------------------------

/// The routable name under which a [`DataService`] is reachable.
#[derive(Debug, Clone)]
pub struct DataAccessPoint {
    name: String,
    service: Arc<DataService>,
}

impl DataAccessPoint {
    /// Creates an access point. A leading `/` in `name` is dropped.
    #[must_use]
    pub fn new(name: impl Into<String>, service: DataService) -> Self {
        let name = name.into();
        Self {
            name: name.trim_start_matches('/').to_string(),
            service: Arc::new(service),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn data_service(&self) -> &Arc<DataService> {
        &self.service
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
