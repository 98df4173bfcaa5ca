//! Startup orchestration and the shared server context.
//!
//! [`Bootstrap::initialize`] runs the whole startup sequence exactly once:
//!
//! 1. load modules
//! 2. build the operation registry and let modules configure it
//! 3. build every dataset, resolve its handlers, apply access control
//! 4. register all datasets, then activate all of them
//! 5. start modules and log the setup summary
//!
//! Any configuration error aborts before a single dataset is active.

use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};
use tracing::{error, info, warn};

use crate::access::{apply_access_control, default_user_resolver, UserResolver};
use crate::service::access_point::DataAccessPointRegistry;
use crate::service::config::ServerConfig;
use crate::service::dataset::DataAccessPoint;
use crate::service::error::ConfigError;
use crate::service::operations::OperationRegistry;
use crate::service::registry::{ModuleContext, ModuleDiscovery, ModuleRegistry};
use crate::setup::{DatasetConfig, ServerSetup};

/// Startup failure. Stored by [`Bootstrap`] and handed to every caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartupError {
    #[error("startup aborted: {0}")]
    Config(#[from] ConfigError),
    #[error("startup aborted: dataset '{dataset}': {source}")]
    Dataset {
        dataset: String,
        #[source]
        source: ConfigError,
    },
}

// ---------------------------------------------------------------------------
// ServerContext
// ---------------------------------------------------------------------------

/// The registries a running server consults, created by [`Bootstrap`].
///
/// Administrative changes (`add_dataset`, `remove_dataset`) are serialized
/// with each other; request dispatch only reads `datasets()`.
pub struct ServerContext {
    config: Arc<ServerConfig>,
    modules: Arc<ModuleRegistry>,
    operations: Arc<OperationRegistry>,
    datasets: Arc<DataAccessPointRegistry>,
    resolver: UserResolver,
    admin_lock: Mutex<()>,
}

impl ServerContext {
    #[must_use]
    pub fn config(&self) -> &Arc<ServerConfig> {
        &self.config
    }

    #[must_use]
    pub fn modules(&self) -> &Arc<ModuleRegistry> {
        &self.modules
    }

    #[must_use]
    pub fn operations(&self) -> &Arc<OperationRegistry> {
        &self.operations
    }

    #[must_use]
    pub fn datasets(&self) -> &Arc<DataAccessPointRegistry> {
        &self.datasets
    }

    /// Builds, registers and activates one dataset.
    ///
    /// # Errors
    ///
    /// Returns the configuration error that prevented the dataset from being
    /// built, including `ConfigError::DuplicateDataset` if the name is taken.
    /// Nothing is registered on failure.
    pub async fn add_dataset(&self, config: &DatasetConfig) -> Result<Arc<DataAccessPoint>, ConfigError> {
        let _guard = self.admin_lock.lock().await;
        if self.datasets.contains(config.access_point_name()) {
            return Err(ConfigError::DuplicateDataset {
                name: config.access_point_name().to_string(),
            });
        }
        let access_point = prepare_access_point(config, &self.operations, &self.resolver)?;
        let access_point = self.datasets.register(access_point)?;
        if let Err(e) = access_point.data_service().activate() {
            self.datasets.unregister(access_point.name()).await;
            return Err(e);
        }
        info!(dataset = access_point.name(), "dataset added");
        Ok(access_point)
    }

    /// Unregisters a dataset and closes its storage. Returns whether it existed.
    pub async fn remove_dataset(&self, name: &str) -> bool {
        let _guard = self.admin_lock.lock().await;
        self.datasets.unregister(name.trim_start_matches('/')).await
    }

    /// Stops every module and removes every dataset.
    pub async fn shutdown(&self) {
        self.modules.stop_all().await;
        let _guard = self.admin_lock.lock().await;
        for name in self.datasets.names() {
            self.datasets.unregister(&name).await;
        }
        info!("server context shut down");
    }

    /// Logs what the server is serving, unless `quiet` is set.
    pub fn log_summary(&self) {
        if self.config.quiet {
            return;
        }
        info!(
            node = %self.config.node_name,
            datasets = self.datasets.len(),
            "server setup"
        );
        for access_point in sorted(self.datasets.snapshot()) {
            let service = access_point.data_service();
            info!(
                dataset = access_point.name(),
                endpoints = service.endpoints().count(),
                access_controlled = service.dataset().is_access_controlled(),
                "serving dataset"
            );
            if self.config.verbose {
                let mut endpoints: Vec<_> = service.endpoints().collect();
                endpoints.sort_by(|a, b| a.name().cmp(b.name()));
                for endpoint in endpoints {
                    info!(
                        "    /{}/{} -> {} ({})",
                        access_point.name(),
                        endpoint.name(),
                        endpoint.operation().id(),
                        endpoint.handler().map_or("unbound", |h| h.name()),
                    );
                }
            }
        }
    }
}

impl std::fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerContext")
            .field("node_name", &self.config.node_name)
            .field("datasets", &self.datasets.names())
            .finish_non_exhaustive()
    }
}

fn sorted(mut access_points: Vec<Arc<DataAccessPoint>>) -> Vec<Arc<DataAccessPoint>> {
    access_points.sort_by(|a, b| a.name().cmp(b.name()));
    access_points
}

/// Builds a data service, resolves its handlers and, for access-controlled
/// storage, installs the filtering handlers. The result is not yet active.
fn prepare_access_point(
    config: &DatasetConfig,
    operations: &OperationRegistry,
    resolver: &UserResolver,
) -> Result<DataAccessPoint, ConfigError> {
    let service = config.build(operations)?;
    service.set_endpoint_handlers(operations)?;
    if service.dataset().is_access_controlled() {
        apply_access_control(&service, resolver)?;
    }
    Ok(DataAccessPoint::new(config.access_point_name(), service))
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

/// Run-once server initialization.
///
/// The first call to [`initialize`](Self::initialize) runs the startup
/// sequence; concurrent callers wait for it and every later caller receives
/// the same stored outcome, success or failure, without side effects.
pub struct Bootstrap {
    config: Arc<ServerConfig>,
    discovery: Arc<dyn ModuleDiscovery>,
    resolver: UserResolver,
    outcome: OnceCell<Result<Arc<ServerContext>, StartupError>>,
}

impl Bootstrap {
    #[must_use]
    pub fn new(config: ServerConfig, discovery: Arc<dyn ModuleDiscovery>) -> Self {
        Self {
            config: Arc::new(config),
            discovery,
            resolver: default_user_resolver(),
            outcome: OnceCell::new(),
        }
    }

    /// Replaces the identity function used by access-controlled endpoints.
    #[must_use]
    pub fn with_user_resolver(mut self, resolver: UserResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Whether startup has completed, successfully or not.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.outcome.initialized()
    }

    /// Runs startup once and returns its outcome.
    ///
    /// # Errors
    ///
    /// Returns the `StartupError` of the first run. No dataset is active
    /// after a failed run.
    pub async fn initialize(&self, setup: &ServerSetup) -> Result<Arc<ServerContext>, StartupError> {
        let mut ran = false;
        let outcome = self
            .outcome
            .get_or_init(|| {
                ran = true;
                self.run(setup)
            })
            .await;
        if !ran {
            warn!("server already initialized; returning the first outcome");
        }
        outcome.clone()
    }

    async fn run(&self, setup: &ServerSetup) -> Result<Arc<ServerContext>, StartupError> {
        let ctx = ModuleContext {
            config: Arc::clone(&self.config),
        };
        let modules = Arc::new(ModuleRegistry::new(Arc::clone(&self.discovery), ctx));
        modules.load().await;

        match self.assemble(&modules, setup).await {
            Ok(context) => {
                start_modules(&context).await;
                context.log_summary();
                info!(node = %self.config.node_name, "server initialized");
                Ok(context)
            }
            Err(e) => {
                error!(error = %e, "server startup failed");
                modules.stop_all().await;
                Err(e)
            }
        }
    }

    async fn assemble(
        &self,
        modules: &Arc<ModuleRegistry>,
        setup: &ServerSetup,
    ) -> Result<Arc<ServerContext>, StartupError> {
        let operations = OperationRegistry::standard();
        for module in modules.modules().await {
            let checkpoint = operations.checkpoint();
            if let Err(e) = module.configure(&operations).await {
                error!(module = module.name(), error = %e, "module failed to configure; removed");
                operations.restore(checkpoint);
                modules.remove(module.name()).await;
            }
        }

        setup.validate()?;
        let mut prepared = Vec::with_capacity(setup.datasets.len());
        for config in &setup.datasets {
            let access_point = prepare_access_point(config, &operations, &self.resolver).map_err(|source| {
                StartupError::Dataset {
                    dataset: config.access_point_name().to_string(),
                    source,
                }
            })?;
            prepared.push(access_point);
        }

        let datasets = Arc::new(DataAccessPointRegistry::new());
        register_and_activate(&datasets, prepared).await?;

        Ok(Arc::new(ServerContext {
            config: Arc::clone(&self.config),
            modules: Arc::clone(modules),
            operations: Arc::new(operations),
            datasets,
            resolver: self.resolver.clone(),
            admin_lock: Mutex::new(()),
        }))
    }
}

/// Registers every access point, then activates them all. On any failure
/// every registered entry is removed again.
async fn register_and_activate(
    datasets: &DataAccessPointRegistry,
    prepared: Vec<DataAccessPoint>,
) -> Result<(), ConfigError> {
    let mut registered = Vec::with_capacity(prepared.len());
    let mut failure = None;
    for access_point in prepared {
        match datasets.register(access_point) {
            Ok(access_point) => registered.push(access_point),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }
    if failure.is_none() {
        for access_point in &registered {
            if let Err(e) = access_point.data_service().activate() {
                failure = Some(e);
                break;
            }
        }
    }

    match failure {
        None => Ok(()),
        Some(e) => {
            for access_point in &registered {
                datasets.unregister(access_point.name()).await;
            }
            Err(e)
        }
    }
}

async fn start_modules(context: &ServerContext) {
    for module in context.modules.modules().await {
        if let Err(e) = module.start(&context.datasets).await {
            error!(module = module.name(), error = %e, "module failed to start; removed");
            context.modules.remove(module.name()).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
