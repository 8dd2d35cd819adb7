//! Plugin registry and lifecycle state machine
//!
//! The registry owns the store and drives every lifecycle transition:
//! register/replace, dependency-ordered installation, the deps-active
//! activation gate, deactivation, and uninstallation. Structural misuse
//! (wrong state, duplicate name, inactive dependency) always raises;
//! plugin-hook failures are recorded per plugin and either swallowed or
//! propagated according to [`RuntimeOptions::continue_on_error`].

use crate::error::{Result, RuntimeError};
use crate::events::{EventBus, PluginEvent};
use crate::resolver;
use crate::store::{LifecycleState, PluginEntry, PluginStore};
use cuttle_plugin_api::{ConfigMap, Plugin, PluginContext, PluginError, ServiceContainer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Runtime policy knobs
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// When a plugin hook fails: `true` records the error and carries on
    /// (default), `false` propagates it to the caller. Shutdown and
    /// hot-reload hooks are always swallowed regardless.
    pub continue_on_error: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            continue_on_error: true,
        }
    }
}

/// Debug snapshot of a single plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDebugInfo {
    /// Plugin name
    pub name: String,

    /// Plugin version
    pub version: String,

    /// Current lifecycle state
    pub state: LifecycleState,

    /// Declared dependency names
    pub dependencies: Vec<String>,

    /// Effective configuration
    pub config: ConfigMap,

    /// Last captured error, if any
    pub error: Option<String>,

    /// Service keys the plugin registered at install time
    pub services: Vec<String>,

    /// Time since last activation, when active
    #[serde(skip)]
    pub uptime: Option<Duration>,
}

/// Plugin registry driving the lifecycle state machine
#[derive(Clone)]
pub struct PluginRegistry {
    store: Arc<PluginStore>,
    events: Arc<EventBus>,
    services: Arc<dyn ServiceContainer>,
    options: RuntimeOptions,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("store", &self.store)
            .field("options", &self.options)
            .finish()
    }
}

impl PluginRegistry {
    /// Create a registry over the given store, bus and service container
    pub fn new(
        store: Arc<PluginStore>,
        events: Arc<EventBus>,
        services: Arc<dyn ServiceContainer>,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            store,
            events,
            services,
            options,
        }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<PluginStore> {
        &self.store
    }

    /// The event bus
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// The host service container
    pub fn services(&self) -> &Arc<dyn ServiceContainer> {
        &self.services
    }

    /// The runtime policy
    pub fn options(&self) -> RuntimeOptions {
        self.options
    }

    /// Register a plugin
    ///
    /// Without `replace`, a duplicate name is an error. With `replace`, the
    /// existing entry's state, runtime config, error and footprint are wiped,
    /// a `plugin:replaced` event fires, and registration proceeds fresh.
    /// Always ends in the `Registered` state.
    pub async fn register(&self, plugin: Box<dyn Plugin>, replace: bool) -> Result<()> {
        let metadata = plugin.metadata();
        let name = metadata.name.clone();

        if metadata.dependencies.iter().any(|d| d.name == name) {
            return Err(RuntimeError::DependencyCycle {
                path: vec![name],
            });
        }

        if self.store.contains(&name) {
            if !replace {
                return Err(RuntimeError::already_registered(&name));
            }
            self.store.record_deactivated(&name);
            self.events.emit(PluginEvent::Replaced {
                plugin: name.clone(),
            });
            info!(plugin = %name, "Plugin replaced");
        }

        self.store.insert(name.clone(), PluginEntry::new(plugin));

        info!(plugin = %name, "Plugin registered");
        self.events.emit(PluginEvent::Registered { plugin: name });

        Ok(())
    }

    /// Install a plugin, its transitive dependencies first
    ///
    /// Collects the dependency closure, topologically sorts it (the single
    /// gate raising on cycles and missing dependencies), then installs every
    /// closure member still in `Registered` state in sorted order, `name`
    /// last among them.
    pub async fn install(&self, name: &str) -> Result<()> {
        let entry = self
            .store
            .get(name)
            .ok_or_else(|| RuntimeError::not_found(name))?;

        match entry.state() {
            LifecycleState::Registered => {}
            state => {
                return Err(RuntimeError::invalid_state(name, state, "registered"));
            }
        }

        let graph = self.store.dependency_graph();
        let closure = resolver::transitive_closure(&graph, name);
        let order = resolver::topological_sort(&graph, &closure)?;

        for member in &order {
            if self.store.state(member) == Some(LifecycleState::Registered) {
                self.install_one(member).await?;
            }
        }

        Ok(())
    }

    async fn install_one(&self, name: &str) -> Result<()> {
        let entry = self
            .store
            .get(name)
            .ok_or_else(|| RuntimeError::not_found(name))?;

        // Version requirements against whatever is actually registered.
        for dep in &entry.metadata.dependencies {
            if let Some(required) = &dep.version_req {
                if let Some(dep_entry) = self.store.get(&dep.name) {
                    if !dep.satisfies(&dep_entry.metadata.version) {
                        return Err(RuntimeError::VersionConflict {
                            plugin: name.to_string(),
                            dependency: dep.name.clone(),
                            required: required.clone(),
                            found: dep_entry.metadata.version.clone(),
                        });
                    }
                }
            }
        }

        // The install hook may register services; the container is diffed
        // around the call to record the plugin's footprint.
        let before: HashSet<String> = self.services.registered_services().into_iter().collect();
        let ctx = self.context_for(name);
        let result = {
            let mut plugin = entry.plugin.write().await;
            plugin.install(&ctx).await
        };

        match result {
            Ok(()) => {
                let footprint: BTreeSet<String> = self
                    .services
                    .registered_services()
                    .into_iter()
                    .filter(|key| !before.contains(key))
                    .collect();
                *entry.footprint.write() = footprint;

                self.store.set_state(name, LifecycleState::Installed);
                info!(plugin = %name, "Plugin installed");
                self.events.emit(PluginEvent::Installed {
                    plugin: name.to_string(),
                });
                Ok(())
            }
            Err(e) => {
                self.record_failure(name, &e);
                if self.options.continue_on_error {
                    Ok(())
                } else {
                    Err(RuntimeError::hook(name, &e))
                }
            }
        }
    }

    /// Activate a plugin
    ///
    /// Requires the plugin to be `Installed` or `Inactive` and every
    /// non-optional declared dependency to currently be `Active`. There is
    /// no dependency auto-activation: the caller activates dependencies
    /// explicitly, which keeps ordering visible at the call site.
    pub async fn activate(&self, name: &str) -> Result<()> {
        let entry = self
            .store
            .get(name)
            .ok_or_else(|| RuntimeError::not_found(name))?;

        match entry.state() {
            LifecycleState::Installed | LifecycleState::Inactive => {}
            state => {
                return Err(RuntimeError::invalid_state(
                    name,
                    state,
                    "installed or inactive",
                ));
            }
        }

        for dep in &entry.metadata.dependencies {
            if dep.optional {
                continue;
            }
            match self.store.state(&dep.name) {
                Some(LifecycleState::Active) => {}
                Some(other) => {
                    return Err(RuntimeError::DependencyNotActive {
                        plugin: name.to_string(),
                        dependency: dep.name.clone(),
                        state: other.to_string(),
                    });
                }
                None => {
                    return Err(RuntimeError::DependencyNotActive {
                        plugin: name.to_string(),
                        dependency: dep.name.clone(),
                        state: "undefined".to_string(),
                    });
                }
            }
        }

        self.store.set_state(name, LifecycleState::Active);
        self.store.record_activated(name);
        self.store.clear_error(name);

        info!(plugin = %name, "Plugin activated");
        self.events.emit(PluginEvent::Activated {
            plugin: name.to_string(),
        });

        Ok(())
    }

    /// Deactivate a plugin
    pub async fn deactivate(&self, name: &str) -> Result<()> {
        let entry = self
            .store
            .get(name)
            .ok_or_else(|| RuntimeError::not_found(name))?;

        match entry.state() {
            LifecycleState::Active => {}
            state => {
                return Err(RuntimeError::invalid_state(name, state, "active"));
            }
        }

        self.store.set_state(name, LifecycleState::Inactive);
        self.store.record_deactivated(name);
        self.store.clear_error(name);

        info!(plugin = %name, "Plugin deactivated");
        self.events.emit(PluginEvent::Deactivated {
            plugin: name.to_string(),
        });

        Ok(())
    }

    /// Uninstall a plugin
    ///
    /// A no-op if already uninstalled. Auto-deactivates first when active.
    /// Services the plugin registered at install time are removed from the
    /// container, and the stored error and runtime config are cleared.
    pub async fn uninstall(&self, name: &str) -> Result<()> {
        let entry = self
            .store
            .get(name)
            .ok_or_else(|| RuntimeError::not_found(name))?;

        match entry.state() {
            LifecycleState::Uninstalled => return Ok(()),
            LifecycleState::Active => {
                self.deactivate(name).await?;
            }
            _ => {}
        }

        let footprint = std::mem::take(&mut *entry.footprint.write());
        for key in &footprint {
            self.services.remove(key);
        }

        self.store.set_state(name, LifecycleState::Uninstalled);
        *entry.runtime_config.write() = None;
        self.store.clear_error(name);

        info!(plugin = %name, "Plugin uninstalled");
        self.events.emit(PluginEvent::Uninstalled {
            plugin: name.to_string(),
        });

        Ok(())
    }

    /// Validate the dependency graph
    ///
    /// When given a name, the check is restricted to the transitive closure
    /// reachable from it; otherwise the whole registry is checked. Surfaces
    /// the resolver's cycle and missing-dependency error shapes verbatim.
    pub fn validate_dependencies(&self, name: Option<&str>) -> Result<()> {
        let graph = self.store.dependency_graph();
        let scope = match name {
            Some(n) => {
                if !graph.contains_key(n) {
                    return Err(RuntimeError::not_found(n));
                }
                resolver::transitive_closure(&graph, n)
            }
            None => self.store.registration_order(),
        };

        resolver::topological_sort(&graph, &scope).map(|_| ())
    }

    /// Get a plugin entry by name
    pub fn get_plugin(&self, name: &str) -> Option<PluginEntry> {
        self.store.get(name)
    }

    /// Get a plugin's current lifecycle state
    pub fn get_state(&self, name: &str) -> Option<LifecycleState> {
        self.store.state(name)
    }

    /// Names of every registered plugin, in registration order
    pub fn get_registered_plugins(&self) -> Vec<String> {
        self.store.registration_order()
    }

    /// Effective configuration: runtime override else built-in default
    pub fn get_config(&self, name: &str) -> Option<ConfigMap> {
        if !self.store.contains(name) {
            return None;
        }
        Some(self.store.effective_config(name))
    }

    /// Replace a plugin's runtime configuration
    ///
    /// The map is validated by the plugin before anything is written; on
    /// rejection the prior configuration is left untouched.
    pub async fn set_config(&self, name: &str, config: ConfigMap) -> Result<()> {
        self.apply_config(name, config).await
    }

    /// Shallow-merge a patch onto the effective configuration
    ///
    /// Goes through the same validation and write path as
    /// [`set_config`](PluginRegistry::set_config).
    pub async fn update_config(&self, name: &str, patch: ConfigMap) -> Result<()> {
        if !self.store.contains(name) {
            return Err(RuntimeError::not_found(name));
        }
        let mut merged = self.store.effective_config(name);
        for (key, value) in patch {
            merged.insert(key, value);
        }
        self.apply_config(name, merged).await
    }

    async fn apply_config(&self, name: &str, config: ConfigMap) -> Result<()> {
        let entry = self
            .store
            .get(name)
            .ok_or_else(|| RuntimeError::not_found(name))?;

        {
            let plugin = entry.plugin.read().await;
            plugin
                .validate_config(&config)
                .map_err(|e| RuntimeError::ConfigRejected {
                    plugin: name.to_string(),
                    message: e.to_string(),
                })?;
        }

        *entry.runtime_config.write() = Some(config.clone());

        let ctx = PluginContext::new(Arc::clone(&self.services), config.clone());
        let result = {
            let mut plugin = entry.plugin.write().await;
            plugin.on_config_update(&ctx, &config).await
        };
        if let Err(e) = result {
            self.record_failure(name, &e);
            if !self.options.continue_on_error {
                return Err(RuntimeError::hook(name, &e));
            }
        }

        info!(plugin = %name, "Plugin configuration updated");
        self.events.emit(PluginEvent::ConfigUpdated {
            plugin: name.to_string(),
        });

        Ok(())
    }

    /// Dependency graph: name -> declared dependency names
    pub fn get_dependency_graph(&self) -> HashMap<String, Vec<String>> {
        self.store.dependency_graph()
    }

    /// Debug snapshot for a single plugin
    pub fn get_debug_info(&self, name: &str) -> Result<PluginDebugInfo> {
        let entry = self
            .store
            .get(name)
            .ok_or_else(|| RuntimeError::not_found(name))?;

        let info = PluginDebugInfo {
            name: entry.metadata.name.clone(),
            version: entry.metadata.version.clone(),
            state: entry.state(),
            dependencies: entry.metadata.dependency_names(),
            config: self.store.effective_config(name),
            error: entry.last_error.read().clone(),
            services: entry.footprint.read().iter().cloned().collect(),
            uptime: entry.activated_at.read().map(|t| t.elapsed()),
        };
        Ok(info)
    }

    /// Debug snapshots for every plugin, in registration order
    pub fn get_debug_info_all(&self) -> Vec<PluginDebugInfo> {
        self.store
            .registration_order()
            .iter()
            .filter_map(|name| self.get_debug_info(name).ok())
            .collect()
    }

    /// Build the context handed to a plugin's hooks
    pub(crate) fn context_for(&self, name: &str) -> PluginContext {
        PluginContext::new(Arc::clone(&self.services), self.store.effective_config(name))
    }

    /// Record a hook failure: stored against the plugin and emitted as a
    /// `plugin:error` event
    pub(crate) fn record_failure(&self, name: &str, err: &PluginError) {
        let message = err.to_string();
        error!(plugin = %name, error = %message, "Plugin hook failed");
        self.store.set_error(name, &message);
        self.events.emit(PluginEvent::Error {
            plugin: name.to_string(),
            message,
        });
    }

    /// Warn-and-record variant used on paths that never propagate
    pub(crate) fn record_swallowed_failure(&self, name: &str, err: &PluginError) {
        let message = err.to_string();
        warn!(plugin = %name, error = %message, "Plugin hook failed (swallowed)");
        self.store.set_error(name, &message);
        self.events.emit(PluginEvent::Error {
            plugin: name.to_string(),
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cuttle_plugin_api::{InMemoryServices, PluginDependency};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct TestPlugin {
        name: String,
        version: String,
        dependencies: Vec<PluginDependency>,
        fail_install: bool,
    }

    impl TestPlugin {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                version: "1.0.0".to_string(),
                dependencies: vec![],
                fail_install: false,
            }
        }

        fn with_deps(mut self, deps: &[&str]) -> Self {
            self.dependencies = deps
                .iter()
                .map(|d| PluginDependency::required(*d))
                .collect();
            self
        }
    }

    #[async_trait]
    impl Plugin for TestPlugin {
        fn name(&self) -> &str {
            &self.name
        }

        fn version(&self) -> &str {
            &self.version
        }

        fn dependencies(&self) -> Vec<PluginDependency> {
            self.dependencies.clone()
        }

        fn validate_config(&self, config: &ConfigMap) -> std::result::Result<(), PluginError> {
            if let Some(max) = config.get("maxSize").and_then(|v| v.as_i64()) {
                if max < 0 {
                    return Err(PluginError::config("maxSize must not be negative"));
                }
            }
            Ok(())
        }

        async fn install(&mut self, _ctx: &PluginContext) -> std::result::Result<(), PluginError> {
            if self.fail_install {
                return Err(PluginError::install("refused"));
            }
            Ok(())
        }
    }

    fn registry() -> PluginRegistry {
        registry_with(RuntimeOptions::default())
    }

    fn registry_with(options: RuntimeOptions) -> PluginRegistry {
        PluginRegistry::new(
            Arc::new(PluginStore::new()),
            Arc::new(EventBus::new()),
            Arc::new(InMemoryServices::new()),
            options,
        )
    }

    #[tokio::test]
    async fn test_duplicate_registration_fails_without_replace() {
        let registry = registry();
        registry
            .register(Box::new(TestPlugin::new("db")), false)
            .await
            .unwrap();

        let err = registry
            .register(Box::new(TestPlugin::new("db")), false)
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::AlreadyRegistered(_)));
    }

    #[tokio::test]
    async fn test_replace_resets_state_and_emits_replaced_before_registered() {
        let registry = registry();
        let events: Arc<parking_lot::Mutex<Vec<String>>> = Arc::default();
        let seen = Arc::clone(&events);
        registry.events().on(
            "*",
            Arc::new(move |event| {
                seen.lock().push(event.name().to_string());
            }),
        );

        registry
            .register(Box::new(TestPlugin::new("db")), false)
            .await
            .unwrap();
        registry.install("db").await.unwrap();
        registry.activate("db").await.unwrap();
        registry.store().set_error("db", "stale failure");

        registry
            .register(Box::new(TestPlugin::new("db")), true)
            .await
            .unwrap();

        assert_eq!(
            registry.get_state("db"),
            Some(LifecycleState::Registered)
        );
        let info = registry.get_debug_info("db").unwrap();
        assert_eq!(info.error, None);

        let seen = events.lock().clone();
        let replaced = seen.iter().position(|e| e == "plugin:replaced").unwrap();
        let last_registered = seen
            .iter()
            .rposition(|e| e == "plugin:registered")
            .unwrap();
        assert!(replaced < last_registered);
        assert_eq!(seen.iter().filter(|e| *e == "plugin:replaced").count(), 1);
    }

    #[tokio::test]
    async fn test_self_dependency_rejected_at_registration() {
        let registry = registry();
        let err = registry
            .register(
                Box::new(TestPlugin::new("loop").with_deps(&["loop"])),
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::DependencyCycle { .. }));
    }

    #[tokio::test]
    async fn test_install_cascades_dependencies_in_order() {
        let registry = registry();
        registry
            .register(Box::new(TestPlugin::new("db")), false)
            .await
            .unwrap();
        registry
            .register(
                Box::new(TestPlugin::new("auth").with_deps(&["db"])),
                false,
            )
            .await
            .unwrap();

        let order: Arc<parking_lot::Mutex<Vec<String>>> = Arc::default();
        let seen = Arc::clone(&order);
        registry.events().on(
            "plugin:installed",
            Arc::new(move |event| {
                if let Some(plugin) = event.plugin() {
                    seen.lock().push(plugin.to_string());
                }
            }),
        );

        registry.install("auth").await.unwrap();

        assert_eq!(registry.get_state("db"), Some(LifecycleState::Installed));
        assert_eq!(registry.get_state("auth"), Some(LifecycleState::Installed));
        assert_eq!(order.lock().clone(), vec!["db".to_string(), "auth".to_string()]);
    }

    #[tokio::test]
    async fn test_install_raises_on_missing_dependency() {
        let registry = registry();
        registry
            .register(
                Box::new(TestPlugin::new("auth").with_deps(&["ghost"])),
                false,
            )
            .await
            .unwrap();

        let err = registry.install("auth").await.unwrap_err();
        match err {
            RuntimeError::MissingDependencies { missing } => {
                assert_eq!(
                    missing,
                    vec![("auth".to_string(), vec!["ghost".to_string()])]
                );
            }
            other => panic!("expected missing error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_install_raises_on_cycle() {
        let registry = registry();
        registry
            .register(Box::new(TestPlugin::new("a").with_deps(&["b"])), false)
            .await
            .unwrap();
        registry
            .register(Box::new(TestPlugin::new("b").with_deps(&["a"])), false)
            .await
            .unwrap();

        let err = registry.install("a").await.unwrap_err();
        assert!(matches!(err, RuntimeError::DependencyCycle { .. }));
    }

    #[tokio::test]
    async fn test_activate_requires_active_dependencies() {
        let registry = registry();
        registry
            .register(Box::new(TestPlugin::new("db")), false)
            .await
            .unwrap();
        registry
            .register(
                Box::new(TestPlugin::new("auth").with_deps(&["db"])),
                false,
            )
            .await
            .unwrap();
        registry.install("auth").await.unwrap();

        let err = registry.activate("auth").await.unwrap_err();
        match err {
            RuntimeError::DependencyNotActive {
                dependency, state, ..
            } => {
                assert_eq!(dependency, "db");
                assert_eq!(state, "installed");
            }
            other => panic!("expected dependency gate error, got {other}"),
        }

        registry.activate("db").await.unwrap();
        registry.activate("auth").await.unwrap();
        assert_eq!(registry.get_state("db"), Some(LifecycleState::Active));
        assert_eq!(registry.get_state("auth"), Some(LifecycleState::Active));
    }

    #[tokio::test]
    async fn test_activate_names_unregistered_dependency_as_undefined() {
        let registry = registry();
        registry
            .register(
                Box::new(TestPlugin::new("auth").with_deps(&["ghost"])),
                false,
            )
            .await
            .unwrap();

        // Force past install so the activation gate itself is exercised.
        registry.store().set_state("auth", LifecycleState::Installed);

        let err = registry.activate("auth").await.unwrap_err();
        match err {
            RuntimeError::DependencyNotActive { state, .. } => {
                assert_eq!(state, "undefined");
            }
            other => panic!("expected dependency gate error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_state_machine_rejects_illegal_transitions() {
        let registry = registry();
        registry
            .register(Box::new(TestPlugin::new("db")), false)
            .await
            .unwrap();

        // activate before install
        assert!(matches!(
            registry.activate("db").await.unwrap_err(),
            RuntimeError::InvalidState { .. }
        ));

        // deactivate before activate
        registry.install("db").await.unwrap();
        assert!(matches!(
            registry.deactivate("db").await.unwrap_err(),
            RuntimeError::InvalidState { .. }
        ));

        // double install
        assert!(matches!(
            registry.install("db").await.unwrap_err(),
            RuntimeError::InvalidState { .. }
        ));
    }

    #[tokio::test]
    async fn test_uninstall_is_idempotent() {
        let registry = registry();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        registry.events().on(
            "plugin:uninstalled",
            Arc::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        );

        registry
            .register(Box::new(TestPlugin::new("db")), false)
            .await
            .unwrap();
        registry.install("db").await.unwrap();
        registry.activate("db").await.unwrap();

        registry.uninstall("db").await.unwrap();
        assert_eq!(registry.get_state("db"), Some(LifecycleState::Uninstalled));

        // Second uninstall: no error, no duplicate event.
        registry.uninstall("db").await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_install_failure_is_recorded_and_swallowed_by_default() {
        let registry = registry();
        let mut plugin = TestPlugin::new("flaky");
        plugin.fail_install = true;
        registry.register(Box::new(plugin), false).await.unwrap();

        registry.install("flaky").await.unwrap();

        // Still registered, error queryable after the fact.
        assert_eq!(
            registry.get_state("flaky"),
            Some(LifecycleState::Registered)
        );
        let info = registry.get_debug_info("flaky").unwrap();
        assert!(info.error.unwrap().contains("refused"));
    }

    #[tokio::test]
    async fn test_install_failure_propagates_when_policy_says_so() {
        let registry = registry_with(RuntimeOptions {
            continue_on_error: false,
        });
        let mut plugin = TestPlugin::new("flaky");
        plugin.fail_install = true;
        registry.register(Box::new(plugin), false).await.unwrap();

        let err = registry.install("flaky").await.unwrap_err();
        assert!(matches!(err, RuntimeError::Hook { .. }));
    }

    #[tokio::test]
    async fn test_version_conflict_detected_at_install() {
        let registry = registry();
        registry
            .register(Box::new(TestPlugin::new("db")), false)
            .await
            .unwrap();

        let mut auth = TestPlugin::new("auth");
        auth.dependencies = vec![PluginDependency::required("db").with_version("^2.0")];
        registry.register(Box::new(auth), false).await.unwrap();

        let err = registry.install("auth").await.unwrap_err();
        match err {
            RuntimeError::VersionConflict {
                dependency, found, ..
            } => {
                assert_eq!(dependency, "db");
                assert_eq!(found, "1.0.0");
            }
            other => panic!("expected version conflict, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_config_rejection_leaves_prior_config() {
        let registry = registry();
        registry
            .register(Box::new(TestPlugin::new("store")), false)
            .await
            .unwrap();

        let mut good = ConfigMap::new();
        good.insert("maxSize".into(), serde_json::json!(100));
        registry.set_config("store", good).await.unwrap();

        let mut bad = ConfigMap::new();
        bad.insert("maxSize".into(), serde_json::json!(-1));
        let err = registry.set_config("store", bad).await.unwrap_err();
        assert!(matches!(err, RuntimeError::ConfigRejected { .. }));

        let config = registry.get_config("store").unwrap();
        assert_eq!(config.get("maxSize"), Some(&serde_json::json!(100)));
    }

    #[tokio::test]
    async fn test_update_config_shallow_merges() {
        let registry = registry();
        registry
            .register(Box::new(TestPlugin::new("store")), false)
            .await
            .unwrap();

        let mut base = ConfigMap::new();
        base.insert("maxSize".into(), serde_json::json!(100));
        base.insert("label".into(), serde_json::json!("old"));
        registry.set_config("store", base).await.unwrap();

        let mut patch = ConfigMap::new();
        patch.insert("label".into(), serde_json::json!("new"));
        registry.update_config("store", patch).await.unwrap();

        let config = registry.get_config("store").unwrap();
        assert_eq!(config.get("maxSize"), Some(&serde_json::json!(100)));
        assert_eq!(config.get("label"), Some(&serde_json::json!("new")));
    }

    #[tokio::test]
    async fn test_validate_dependencies_scoped_and_global() {
        let registry = registry();
        registry
            .register(Box::new(TestPlugin::new("ok")), false)
            .await
            .unwrap();
        registry
            .register(
                Box::new(TestPlugin::new("broken").with_deps(&["ghost"])),
                false,
            )
            .await
            .unwrap();

        // Scoped to the healthy plugin: fine.
        registry.validate_dependencies(Some("ok")).unwrap();

        // Scoped to the broken one and globally: missing.
        assert!(matches!(
            registry.validate_dependencies(Some("broken")).unwrap_err(),
            RuntimeError::MissingDependencies { .. }
        ));
        assert!(matches!(
            registry.validate_dependencies(None).unwrap_err(),
            RuntimeError::MissingDependencies { .. }
        ));
    }
}
