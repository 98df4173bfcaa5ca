//! Serving core: operations, datasets, modules, and request dispatch.
//!
//! 1. **Operations** (`operations`): operation identifiers bound to handlers
//! 2. **Datasets** (`dataset`, `access_point`): data services, endpoints and the routing registry
//! 3. **Modules** (`registry`): pluggable extensions discovered at startup
//! 4. **Dispatch** (`router`, `middleware`): Tower pipeline from request to endpoint handler

pub mod access_point;
pub mod action;
pub mod config;
pub mod dataset;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod operations;
pub mod registry;
pub mod router;

pub use access_point::DataAccessPointRegistry;
pub use action::{ActionBody, ActionError, ActionMethod, ActionRequest, ActionResponse, UpdateRequest};
pub use config::ServerConfig;
pub use dataset::{DataAccessPoint, DataService, Endpoint, ServiceState};
pub use error::ConfigError;
pub use handlers::{ActionHandler, NoOpHandler};
pub use middleware::{build_action_pipeline, ActionPipeline};
pub use operations::OperationRegistry;
pub use registry::{ModuleContext, ModuleDiscovery, ModuleRegistry, ServerModule, StaticDiscovery};
pub use router::ActionRouter;
