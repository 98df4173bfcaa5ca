use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::access_point::DataAccessPointRegistry;
use super::config::ServerConfig;
use super::operations::OperationRegistry;

// ---------------------------------------------------------------------------
// ModuleContext
// ---------------------------------------------------------------------------

/// Context provided to modules when they are registered.
#[derive(Debug, Clone)]
pub struct ModuleContext {
    pub config: Arc<ServerConfig>,
}

// ---------------------------------------------------------------------------
// ServerModule trait
// ---------------------------------------------------------------------------

/// Optional server extension with lifecycle hooks.
///
/// Hooks run in this order: `initialize` when the module is registered by
/// discovery, `configure` while the operation registry is being built,
/// `start` once every dataset is active, and `stop` when the module is
/// removed, displaced, or the server shuts down.
#[async_trait]
pub trait ServerModule: Send + Sync {
    /// Returns the unique name of this module.
    fn name(&self) -> &str;

    /// Prepare the module. A failure keeps the module out of the registry.
    async fn initialize(&self, ctx: &ModuleContext) -> anyhow::Result<()>;

    /// Contribute operations and default handlers.
    async fn configure(&self, _operations: &OperationRegistry) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called after all datasets have been activated.
    async fn start(&self, _datasets: &DataAccessPointRegistry) -> anyhow::Result<()> {
        Ok(())
    }

    /// Release whatever `initialize` and `start` acquired.
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Source of module instances for [`ModuleRegistry::load`] and
/// [`ModuleRegistry::reload`]. Each call returns fresh instances.
pub trait ModuleDiscovery: Send + Sync {
    fn discover(&self) -> Vec<Arc<dyn ServerModule>>;
}

type ModuleFactory = Box<dyn Fn() -> Arc<dyn ServerModule> + Send + Sync>;

/// Discovery over a fixed list of module factories, registered in code.
#[derive(Default)]
pub struct StaticDiscovery {
    factories: Vec<ModuleFactory>,
}

impl StaticDiscovery {
    /// Creates a discovery that finds no modules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a factory, builder style.
    #[must_use]
    pub fn with<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn ServerModule> + Send + Sync + 'static,
    {
        self.factories.push(Box::new(factory));
        self
    }
}

impl ModuleDiscovery for StaticDiscovery {
    fn discover(&self) -> Vec<Arc<dyn ServerModule>> {
        self.factories.iter().map(|factory| factory()).collect()
    }
}

// ---------------------------------------------------------------------------
// ModuleRegistry
// ---------------------------------------------------------------------------

/// Registered modules in registration order. Names are unique.
#[derive(Default, Clone)]
struct ModuleSet {
    modules: Vec<Arc<dyn ServerModule>>,
}

impl ModuleSet {
    fn position(&self, name: &str) -> Option<usize> {
        self.modules.iter().position(|m| m.name() == name)
    }
}

/// Registry of discovered server modules.
///
/// Readers work on an atomically published snapshot; writers (`load`,
/// `reload`, `add`, `remove`) serialize on an async mutex so lifecycle hooks
/// can be awaited while the write is in progress.
///
/// Policies:
/// - a module whose `initialize` fails is logged and skipped; the rest load
/// - `add` of a name already present stops the displaced module first
/// - `reload` stops every module of the discarded set
pub struct ModuleRegistry {
    discovery: Arc<dyn ModuleDiscovery>,
    ctx: ModuleContext,
    current: ArcSwapOption<ModuleSet>,
    write_lock: Mutex<()>,
}

impl ModuleRegistry {
    /// Creates an unloaded registry backed by `discovery`.
    #[must_use]
    pub fn new(discovery: Arc<dyn ModuleDiscovery>, ctx: ModuleContext) -> Self {
        Self {
            discovery,
            ctx,
            current: ArcSwapOption::empty(),
            write_lock: Mutex::new(()),
        }
    }

    /// Whether discovery has populated the registry at least once.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.current.load().is_some()
    }

    /// Populates the registry through discovery unless it already is.
    /// Returns the number of registered modules.
    pub async fn load(&self) -> usize {
        let _guard = self.write_lock.lock().await;
        if let Some(set) = self.current.load_full() {
            return set.modules.len();
        }
        self.discover_and_publish().await
    }

    /// Discards the current modules (stopping them), re-runs discovery,
    /// and registers every discovered module again.
    pub async fn reload(&self) -> usize {
        let _guard = self.write_lock.lock().await;
        if let Some(previous) = self.current.swap(None) {
            for module in previous.modules.iter().rev() {
                stop_module(module.as_ref()).await;
            }
        }
        self.discover_and_publish().await
    }

    /// Registers one module, loading the registry first if needed. A module
    /// already registered under the same name is stopped and replaced.
    pub async fn add(&self, module: Arc<dyn ServerModule>) {
        let _guard = self.write_lock.lock().await;
        let mut next = match self.current.load_full() {
            Some(set) => ModuleSet::clone(&set),
            None => self.discover().await,
        };

        if let Some(index) = next.position(module.name()) {
            let displaced = next.modules.remove(index);
            info!(module = module.name(), "replacing registered module");
            stop_module(displaced.as_ref()).await;
        }
        debug!(module = module.name(), "module added");
        next.modules.push(module);
        self.current.store(Some(Arc::new(next)));
    }

    /// Unregisters the module with the given name and stops it.
    pub async fn remove(&self, name: &str) -> Option<Arc<dyn ServerModule>> {
        let _guard = self.write_lock.lock().await;
        let current = self.current.load_full()?;
        let index = current.position(name)?;

        let mut next = ModuleSet::clone(&current);
        let removed = next.modules.remove(index);
        self.current.store(Some(Arc::new(next)));

        stop_module(removed.as_ref()).await;
        info!(module = name, "module removed");
        Some(removed)
    }

    /// Whether a module with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.current
            .load()
            .as_ref()
            .is_some_and(|set| set.position(name).is_some())
    }

    /// Retrieve a module by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ServerModule>> {
        let current = self.current.load();
        let set = current.as_ref()?;
        set.position(name).map(|i| Arc::clone(&set.modules[i]))
    }

    /// Applies `action` to every registered module in registration order,
    /// loading the registry first if it never was.
    pub async fn for_each_module(&self, mut action: impl FnMut(&str, &Arc<dyn ServerModule>)) {
        for module in self.modules().await {
            action(module.name(), &module);
        }
    }

    /// Snapshot of the registered modules in registration order, loading the
    /// registry first if it never was.
    pub async fn modules(&self) -> Vec<Arc<dyn ServerModule>> {
        if !self.is_loaded() {
            self.load().await;
        }
        self.current
            .load()
            .as_ref()
            .map(|set| set.modules.clone())
            .unwrap_or_default()
    }

    /// Stops every module in reverse registration order. Modules stay registered.
    pub async fn stop_all(&self) {
        let _guard = self.write_lock.lock().await;
        if let Some(set) = self.current.load_full() {
            for module in set.modules.iter().rev() {
                stop_module(module.as_ref()).await;
            }
        }
    }

    async fn discover_and_publish(&self) -> usize {
        let set = self.discover().await;
        let count = set.modules.len();
        self.current.store(Some(Arc::new(set)));
        info!(modules = count, "modules loaded");
        count
    }

    /// Runs discovery and initializes each found module.
    async fn discover(&self) -> ModuleSet {
        let mut set = ModuleSet::default();
        for module in self.discovery.discover() {
            if set.position(module.name()).is_some() {
                warn!(module = module.name(), "duplicate module name from discovery; skipped");
                continue;
            }
            match module.initialize(&self.ctx).await {
                Ok(()) => {
                    debug!(module = module.name(), "module initialized");
                    set.modules.push(module);
                }
                Err(e) => {
                    error!(module = module.name(), error = %e, "module failed to initialize; skipped");
                }
            }
        }
        set
    }
}

async fn stop_module(module: &dyn ServerModule) {
    if let Err(e) = module.stop().await {
        warn!(module = module.name(), error = %e, "module stop failed");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// Test module that tracks lifecycle calls in a shared log.
    struct TestModule {
        module_name: &'static str,
        fail_init: bool,
        log: Arc<parking_lot::Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ServerModule for TestModule {
        fn name(&self) -> &str {
            self.module_name
        }

        async fn initialize(&self, _ctx: &ModuleContext) -> anyhow::Result<()> {
            self.log.lock().push(format!("init:{}", self.module_name));
            if self.fail_init {
                anyhow::bail!("init refused");
            }
            Ok(())
        }

        async fn stop(&self) -> anyhow::Result<()> {
            self.log.lock().push(format!("stop:{}", self.module_name));
            Ok(())
        }
    }

    struct Fixture {
        log: Arc<parking_lot::Mutex<Vec<String>>>,
        discoveries: Arc<AtomicU32>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                log: Arc::new(parking_lot::Mutex::new(Vec::new())),
                discoveries: Arc::new(AtomicU32::new(0)),
            }
        }

        fn module(&self, name: &'static str, fail_init: bool) -> Arc<dyn ServerModule> {
            Arc::new(TestModule {
                module_name: name,
                fail_init,
                log: self.log.clone(),
            })
        }

        fn registry(&self, names: &[(&'static str, bool)]) -> ModuleRegistry {
            let mut discovery = StaticDiscovery::new();
            for &(name, fail) in names {
                let log = self.log.clone();
                let counter = self.discoveries.clone();
                discovery = discovery.with(move || -> Arc<dyn ServerModule> {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Arc::new(TestModule {
                        module_name: name,
                        fail_init: fail,
                        log: log.clone(),
                    })
                });
            }
            ModuleRegistry::new(Arc::new(discovery), make_ctx())
        }

        fn entries(&self) -> Vec<String> {
            self.log.lock().clone()
        }
    }

    fn make_ctx() -> ModuleContext {
        ModuleContext {
            config: Arc::new(ServerConfig::default()),
        }
    }

    #[tokio::test]
    async fn load_is_idempotent() {
        let fx = Fixture::new();
        let registry = fx.registry(&[("alpha", false), ("beta", false)]);

        assert_eq!(registry.load().await, 2);
        assert_eq!(registry.load().await, 2);

        assert_eq!(fx.entries(), vec!["init:alpha", "init:beta"]);
        assert_eq!(fx.discoveries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn reload_discovers_fresh_instances() {
        let fx = Fixture::new();
        let registry = fx.registry(&[("alpha", false)]);

        registry.load().await;
        let first = registry.get("alpha").unwrap();
        registry.reload().await;
        let second = registry.get("alpha").unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(
            fx.entries(),
            vec!["init:alpha", "stop:alpha", "init:alpha"]
        );
    }

    #[tokio::test]
    async fn failed_initialize_skips_only_that_module() {
        let fx = Fixture::new();
        let registry = fx.registry(&[("good", false), ("bad", true), ("also-good", false)]);

        assert_eq!(registry.load().await, 2);
        assert!(registry.contains("good"));
        assert!(!registry.contains("bad"));
        assert!(registry.contains("also-good"));
    }

    #[tokio::test]
    async fn add_stops_displaced_module() {
        let fx = Fixture::new();
        let registry = fx.registry(&[("alpha", false)]);
        registry.load().await;

        let replacement = fx.module("alpha", false);
        registry.add(replacement.clone()).await;

        assert!(Arc::ptr_eq(&registry.get("alpha").unwrap(), &replacement));
        assert_eq!(fx.entries(), vec!["init:alpha", "stop:alpha"]);
    }

    #[tokio::test]
    async fn add_loads_registry_first() {
        let fx = Fixture::new();
        let registry = fx.registry(&[("discovered", false)]);

        registry.add(fx.module("manual", false)).await;

        assert!(registry.is_loaded());
        assert!(registry.contains("discovered"));
        assert!(registry.contains("manual"));
    }

    #[tokio::test]
    async fn remove_stops_module() {
        let fx = Fixture::new();
        let registry = fx.registry(&[("alpha", false)]);
        registry.load().await;

        assert!(registry.remove("alpha").await.is_some());
        assert!(!registry.contains("alpha"));
        assert!(registry.remove("alpha").await.is_none());
        assert_eq!(fx.entries(), vec!["init:alpha", "stop:alpha"]);
    }

    #[tokio::test]
    async fn for_each_module_loads_when_needed() {
        let fx = Fixture::new();
        let registry = fx.registry(&[("first", false), ("second", false)]);

        let mut names = Vec::new();
        registry
            .for_each_module(|name, _| names.push(name.to_string()))
            .await;

        assert_eq!(names, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn for_each_module_on_empty_discovery_is_noop() {
        let registry = ModuleRegistry::new(Arc::new(StaticDiscovery::new()), make_ctx());
        let mut calls = 0;
        registry.for_each_module(|_, _| calls += 1).await;
        assert_eq!(calls, 0);
        assert!(registry.is_loaded());
    }

    #[tokio::test]
    async fn stop_all_runs_in_reverse_order() {
        let fx = Fixture::new();
        let registry = fx.registry(&[("first", false), ("second", false), ("third", false)]);
        registry.load().await;
        fx.log.lock().clear();

        registry.stop_all().await;

        assert_eq!(
            fx.entries(),
            vec!["stop:third", "stop:second", "stop:first"]
        );
    }
}
