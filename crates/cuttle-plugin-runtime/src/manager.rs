//! Plugin manager: the high-level orchestrator surface
//!
//! Composes the registry (lifecycle state machine), the dispatcher (event
//! fan-out), the plugin source (file loading) and the hot-reload watcher
//! behind one facade, and adds the convenience compositions: `use_plugin`,
//! `bootstrap`, `shutdown` and `dispose`.

use crate::dispatcher::EventDispatcher;
use crate::error::Result;
use crate::events::{EventBus, Listener, ListenerId, PluginEvent};
use crate::hot_reload::HotReloadWatcher;
use crate::loader::{scan_directory, ManifestSource, PluginSource, MANIFEST_EXTENSIONS};
use crate::registry::{PluginDebugInfo, PluginRegistry, RuntimeOptions};
use crate::resolver;
use crate::store::{LifecycleState, PluginEntry, PluginStore};
use cuttle_plugin_api::{
    AggregatedHealth, BuildContext, BuildSummary, ConfigMap, ErrorContext, HotReloadContext,
    InMemoryServices, Plugin, PluginResponse, RequestContext, ResponseContext, RouteDef,
    ScheduleContext, ServiceContainer, SocketContext,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Counts of plugins per lifecycle state
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct PluginStats {
    /// Total number of plugins
    pub total: usize,

    /// Registered but not installed
    pub registered: usize,

    /// Installed but never activated
    pub installed: usize,

    /// Currently active
    pub active: usize,

    /// Deactivated
    pub inactive: usize,

    /// Uninstalled
    pub uninstalled: usize,
}

/// High-level plugin orchestrator
pub struct PluginManager {
    registry: Arc<PluginRegistry>,
    dispatcher: EventDispatcher,
    source: Arc<dyn PluginSource>,
    watcher: parking_lot::Mutex<Option<HotReloadWatcher>>,
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("registry", &self.registry)
            .finish()
    }
}

impl PluginManager {
    /// Create a manager with default options and an in-memory container
    pub fn new() -> Self {
        Self::with_options(RuntimeOptions::default())
    }

    /// Create a manager with custom options
    pub fn with_options(options: RuntimeOptions) -> Self {
        Self::with_container(Arc::new(InMemoryServices::new()), options)
    }

    /// Create a manager over a host-supplied service container
    pub fn with_container(services: Arc<dyn ServiceContainer>, options: RuntimeOptions) -> Self {
        let store = Arc::new(PluginStore::new());
        let events = Arc::new(EventBus::new());
        let registry = Arc::new(PluginRegistry::new(store, events, services, options));
        let dispatcher = EventDispatcher::new(Arc::clone(&registry));

        Self {
            registry,
            dispatcher,
            source: Arc::new(ManifestSource::new()),
            watcher: parking_lot::Mutex::new(None),
        }
    }

    /// Swap in a custom plugin source (e.g. a dynamic-library loader)
    pub fn with_source(mut self, source: Arc<dyn PluginSource>) -> Self {
        self.source = source;
        self
    }

    /// The underlying registry
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// The event dispatcher
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    // ---- lifecycle -------------------------------------------------------

    /// Register a plugin
    pub async fn register(&self, plugin: Box<dyn Plugin>, replace: bool) -> Result<()> {
        self.registry.register(plugin, replace).await
    }

    /// Install a plugin (dependencies first)
    pub async fn install(&self, name: &str) -> Result<()> {
        self.registry.install(name).await
    }

    /// Activate a plugin
    pub async fn activate(&self, name: &str) -> Result<()> {
        self.registry.activate(name).await
    }

    /// Deactivate a plugin
    pub async fn deactivate(&self, name: &str) -> Result<()> {
        self.registry.deactivate(name).await
    }

    /// Uninstall a plugin
    pub async fn uninstall(&self, name: &str) -> Result<()> {
        self.registry.uninstall(name).await
    }

    /// Register, install and activate a plugin in one call
    ///
    /// Each phase is skipped when the plugin is already past it, so calling
    /// this repeatedly on an active plugin is a no-op.
    pub async fn use_plugin(&self, plugin: Box<dyn Plugin>) -> Result<()> {
        let name = plugin.name().to_string();

        if !self.registry.store().contains(&name) {
            self.registry.register(plugin, false).await?;
        }
        if self.registry.get_state(&name) == Some(LifecycleState::Registered) {
            self.registry.install(&name).await?;
        }
        if matches!(
            self.registry.get_state(&name),
            Some(LifecycleState::Installed | LifecycleState::Inactive)
        ) {
            self.registry.activate(&name).await?;
        }

        Ok(())
    }

    /// Install and activate every registered plugin, then fan out init
    ///
    /// The activation phase runs in dependency order so the explicit
    /// deps-active gate holds without the caller sequencing anything.
    pub async fn bootstrap(&self) -> Result<()> {
        info!("Bootstrapping plugins");

        for name in self.registry.get_registered_plugins() {
            if self.registry.get_state(&name) == Some(LifecycleState::Registered) {
                self.registry.install(&name).await?;
            }
        }

        let graph = self.registry.get_dependency_graph();
        let order = resolver::topological_sort(&graph, &self.registry.get_registered_plugins())?;
        for name in order {
            if matches!(
                self.registry.get_state(&name),
                Some(LifecycleState::Installed | LifecycleState::Inactive)
            ) {
                self.registry.activate(&name).await?;
            }
        }

        self.dispatcher.trigger_init().await
    }

    /// Stop everything
    ///
    /// Fans out the stop and shutdown hooks (state untouched, reverse
    /// activation order), then deactivates every active plugin in reverse
    /// activation order, then uninstalls everything not already uninstalled
    /// or merely registered. Individual failures are swallowed
    /// unconditionally: shutdown never aborts partway.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down plugins");

        self.dispatcher.trigger_stop().await?;
        self.dispatcher.trigger_shutdown().await?;

        let mut active = self.registry.store().active_names();
        active.reverse();
        for name in active {
            if let Err(e) = self.registry.deactivate(&name).await {
                warn!(plugin = %name, error = %e, "Deactivate during shutdown failed");
            }
        }

        for name in self.registry.get_registered_plugins() {
            let state = self.registry.get_state(&name);
            if matches!(
                state,
                Some(
                    LifecycleState::Installed
                        | LifecycleState::Active
                        | LifecycleState::Inactive
                )
            ) {
                if let Err(e) = self.registry.uninstall(&name).await {
                    warn!(plugin = %name, error = %e, "Uninstall during shutdown failed");
                }
            }
        }

        Ok(())
    }

    /// Tear the manager down to an empty shell
    ///
    /// Stops the hot-reload watcher and clears every plugin, listener and
    /// ordering. The instance is unusable for the old plugins afterward.
    pub fn dispose(&self) {
        self.stop_hot_reload();
        self.registry.store().clear();
        self.registry.events().clear();
        info!("Plugin manager disposed");
    }

    // ---- queries ---------------------------------------------------------

    /// Get a plugin entry by name
    pub fn get_plugin(&self, name: &str) -> Option<PluginEntry> {
        self.registry.get_plugin(name)
    }

    /// Get a plugin's current lifecycle state
    pub fn get_state(&self, name: &str) -> Option<LifecycleState> {
        self.registry.get_state(name)
    }

    /// Names of every registered plugin, in registration order
    pub fn get_registered_plugins(&self) -> Vec<String> {
        self.registry.get_registered_plugins()
    }

    /// Effective configuration for a plugin
    pub fn get_config(&self, name: &str) -> Option<ConfigMap> {
        self.registry.get_config(name)
    }

    /// Replace a plugin's runtime configuration
    pub async fn set_config(&self, name: &str, config: ConfigMap) -> Result<()> {
        self.registry.set_config(name, config).await
    }

    /// Shallow-merge a patch onto a plugin's configuration
    pub async fn update_config(&self, name: &str, patch: ConfigMap) -> Result<()> {
        self.registry.update_config(name, patch).await
    }

    /// Debug snapshot for a single plugin
    pub fn get_debug_info(&self, name: &str) -> Result<PluginDebugInfo> {
        self.registry.get_debug_info(name)
    }

    /// Debug snapshots for every plugin
    pub fn get_debug_info_all(&self) -> Vec<PluginDebugInfo> {
        self.registry.get_debug_info_all()
    }

    /// Dependency graph: name -> declared dependency names
    pub fn get_dependency_graph(&self) -> HashMap<String, Vec<String>> {
        self.registry.get_dependency_graph()
    }

    /// Validate the dependency graph (whole registry or one plugin's closure)
    pub fn validate_dependencies(&self, name: Option<&str>) -> Result<()> {
        self.registry.validate_dependencies(name)
    }

    /// Counts of plugins per lifecycle state
    pub fn stats(&self) -> PluginStats {
        let mut stats = PluginStats {
            total: 0,
            registered: 0,
            installed: 0,
            active: 0,
            inactive: 0,
            uninstalled: 0,
        };

        for name in self.registry.get_registered_plugins() {
            let Some(state) = self.registry.get_state(&name) else {
                continue;
            };
            stats.total += 1;
            match state {
                LifecycleState::Registered => stats.registered += 1,
                LifecycleState::Installed => stats.installed += 1,
                LifecycleState::Active => stats.active += 1,
                LifecycleState::Inactive => stats.inactive += 1,
                LifecycleState::Uninstalled => stats.uninstalled += 1,
            }
        }

        stats
    }

    // ---- loading ---------------------------------------------------------

    /// Load a plugin from a file and register it
    ///
    /// Returns the registered plugin's name.
    pub async fn load_from_file(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let plugin = self.source.load(path).await?;
        let name = plugin.name().to_string();
        self.registry.register(plugin, false).await?;
        info!(plugin = %name, path = %path.display(), "Plugin loaded from file");
        Ok(name)
    }

    /// Load every manifest in a directory
    ///
    /// Per-file failures follow the `continue_on_error` policy: skipped with
    /// a warning by default, propagated otherwise. Returns the names that
    /// registered successfully.
    pub async fn load_from_directory(&self, dir: impl AsRef<Path>) -> Result<Vec<String>> {
        let dir = dir.as_ref();
        let files = scan_directory(dir, MANIFEST_EXTENSIONS).await?;

        let mut loaded = Vec::new();
        for file in files {
            match self.load_from_file(&file).await {
                Ok(name) => loaded.push(name),
                Err(e) => {
                    warn!(path = %file.display(), error = %e, "Failed to load plugin");
                    if !self.registry.options().continue_on_error {
                        return Err(e);
                    }
                }
            }
        }

        Ok(loaded)
    }

    /// Start watching a directory for plugin changes
    pub fn start_hot_reload(&self, dir: impl AsRef<Path>) -> Result<()> {
        let mut watcher = HotReloadWatcher::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.source),
            dir.as_ref(),
        );
        watcher.start()?;
        *self.watcher.lock() = Some(watcher);
        Ok(())
    }

    /// Stop the hot-reload watcher, if running
    pub fn stop_hot_reload(&self) {
        if let Some(mut watcher) = self.watcher.lock().take() {
            watcher.close();
        }
    }

    // ---- events ----------------------------------------------------------

    /// Subscribe a listener to an event name (`"*"` for all)
    pub fn on(&self, event: impl Into<String>, listener: Listener) -> ListenerId {
        self.registry.events().on(event, listener)
    }

    /// Unsubscribe a listener
    pub fn off(&self, id: ListenerId) -> bool {
        self.registry.events().off(id)
    }

    /// Emit a caller-defined event
    pub fn emit(&self, name: impl Into<String>, payload: serde_json::Value) {
        self.registry.events().emit_custom(name, payload);
    }

    /// Create a broadcast receiver carrying every emitted event
    pub fn subscribe(&self) -> broadcast::Receiver<PluginEvent> {
        self.registry.events().subscribe()
    }

    // ---- triggers --------------------------------------------------------

    /// Fan out the init hook
    pub async fn trigger_init(&self) -> Result<()> {
        self.dispatcher.trigger_init().await
    }

    /// Fan out the start hook
    pub async fn trigger_start(&self) -> Result<()> {
        self.dispatcher.trigger_start().await
    }

    /// Fan out the stop hook (reverse order, errors swallowed)
    pub async fn trigger_stop(&self) -> Result<()> {
        self.dispatcher.trigger_stop().await
    }

    /// Fan out the shutdown hook (reverse order, errors swallowed)
    pub async fn trigger_shutdown(&self) -> Result<()> {
        self.dispatcher.trigger_shutdown().await
    }

    /// Fan out a request (first response short-circuits)
    pub async fn trigger_request(&self, req: &RequestContext) -> Result<Option<PluginResponse>> {
        self.dispatcher.trigger_request(req).await
    }

    /// Fan out a response
    pub async fn trigger_response(&self, res: &ResponseContext) -> Result<()> {
        self.dispatcher.trigger_response(res).await
    }

    /// Fan out an application error (first response short-circuits)
    pub async fn trigger_error(&self, err: &ErrorContext) -> Result<Option<PluginResponse>> {
        self.dispatcher.trigger_error(err).await
    }

    /// Run the route pipeline
    pub async fn trigger_route(&self, routes: Vec<RouteDef>) -> Result<Vec<RouteDef>> {
        self.dispatcher.trigger_route(routes).await
    }

    /// Fan out a build start
    pub async fn trigger_build(&self, build: &BuildContext) -> Result<()> {
        self.dispatcher.trigger_build(build).await
    }

    /// Fan out a finished build
    pub async fn trigger_build_complete(&self, summary: &BuildSummary) -> Result<()> {
        self.dispatcher.trigger_build_complete(summary).await
    }

    /// Fan out an opened connection
    pub async fn trigger_socket(&self, socket: &SocketContext) -> Result<()> {
        self.dispatcher.trigger_socket(socket).await
    }

    /// Fan out a closed connection
    pub async fn trigger_socket_close(&self, socket: &SocketContext) -> Result<()> {
        self.dispatcher.trigger_socket_close(socket).await
    }

    /// Fan out a scheduled-task notification
    pub async fn trigger_schedule(&self, task: &ScheduleContext) -> Result<()> {
        self.dispatcher.trigger_schedule(task).await
    }

    /// Aggregate health across active plugins
    pub async fn trigger_health_check(&self) -> Result<AggregatedHealth> {
        self.dispatcher.trigger_health_check().await
    }

    /// Fan out a hot-reload notification (errors swallowed)
    pub async fn trigger_hot_reload(&self, reload: &HotReloadContext) -> Result<()> {
        self.dispatcher.trigger_hot_reload(reload).await
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}
