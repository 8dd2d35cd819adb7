//! Plugin store: descriptors, lifecycle states, and per-plugin runtime data
//!
//! Four parallel pieces of state keyed by plugin name — the plugin instance
//! with its metadata, the lifecycle state, the runtime configuration
//! override, and the last captured error — plus the service footprint set and
//! the two orderings (registration and activation) the orchestrator depends
//! on for deterministic traversal.

use cuttle_plugin_api::{ConfigMap, Plugin, PluginMetadata};
use dashmap::DashMap;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Lifecycle state of a registered plugin
///
/// Transitions are only legal along
/// `registered -> installed -> active -> (inactive <-> active) -> uninstalled`;
/// `uninstalled` is terminal except for replace-registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Registered but not installed
    Registered,

    /// Installed but never activated
    Installed,

    /// Active: receives trigger fan-out
    Active,

    /// Deactivated after having been active
    Inactive,

    /// Uninstalled (terminal)
    Uninstalled,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Registered => write!(f, "registered"),
            LifecycleState::Installed => write!(f, "installed"),
            LifecycleState::Active => write!(f, "active"),
            LifecycleState::Inactive => write!(f, "inactive"),
            LifecycleState::Uninstalled => write!(f, "uninstalled"),
        }
    }
}

/// Plugin entry with instance, metadata and runtime state
#[derive(Clone)]
pub struct PluginEntry {
    /// Plugin instance
    pub plugin: Arc<tokio::sync::RwLock<Box<dyn Plugin>>>,

    /// Metadata snapshot taken at registration
    pub metadata: PluginMetadata,

    /// Lifecycle state
    pub state: Arc<parking_lot::RwLock<LifecycleState>>,

    /// Runtime configuration override (fully shadows the built-in default)
    pub runtime_config: Arc<parking_lot::RwLock<Option<ConfigMap>>>,

    /// Last captured error
    pub last_error: Arc<parking_lot::RwLock<Option<String>>>,

    /// Service keys this plugin registered during installation
    pub footprint: Arc<parking_lot::RwLock<BTreeSet<String>>>,

    /// When the plugin was registered
    pub registered_at: Instant,

    /// When the plugin was last activated
    pub activated_at: Arc<parking_lot::RwLock<Option<Instant>>>,
}

impl PluginEntry {
    /// Create a fresh entry in the `Registered` state
    pub fn new(plugin: Box<dyn Plugin>) -> Self {
        let metadata = plugin.metadata();
        Self {
            plugin: Arc::new(tokio::sync::RwLock::new(plugin)),
            metadata,
            state: Arc::new(parking_lot::RwLock::new(LifecycleState::Registered)),
            runtime_config: Arc::new(parking_lot::RwLock::new(None)),
            last_error: Arc::new(parking_lot::RwLock::new(None)),
            footprint: Arc::new(parking_lot::RwLock::new(BTreeSet::new())),
            registered_at: Instant::now(),
            activated_at: Arc::new(parking_lot::RwLock::new(None)),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        *self.state.read()
    }
}

impl fmt::Debug for PluginEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginEntry")
            .field("metadata", &self.metadata)
            .field("state", &self.state())
            .field("registered_at", &self.registered_at)
            .finish()
    }
}

/// In-memory plugin store
///
/// Mutations are synchronous and atomic from the caller's perspective; the
/// orchestrator is driven from a single control flow.
#[derive(Clone, Default)]
pub struct PluginStore {
    entries: Arc<DashMap<String, PluginEntry>>,

    /// Names in registration (insertion) order
    registration_order: Arc<parking_lot::RwLock<Vec<String>>>,

    /// Names in activation order; entries leave on deactivate/uninstall
    activation_order: Arc<parking_lot::RwLock<Vec<String>>>,
}

impl fmt::Debug for PluginStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginStore")
            .field("plugins", &self.registration_order())
            .finish()
    }
}

impl PluginStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh entry, tracking registration order
    ///
    /// Replacing an existing name keeps its original position in the
    /// registration order.
    pub fn insert(&self, name: impl Into<String>, entry: PluginEntry) {
        let name = name.into();
        let mut order = self.registration_order.write();
        if !order.contains(&name) {
            order.push(name.clone());
        }
        self.entries.insert(name, entry);
    }

    /// Get an entry by name
    pub fn get(&self, name: &str) -> Option<PluginEntry> {
        self.entries.get(name).map(|e| e.clone())
    }

    /// Check whether a name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Current state of a plugin, if registered
    pub fn state(&self, name: &str) -> Option<LifecycleState> {
        self.entries.get(name).map(|e| e.state())
    }

    /// Set a plugin's state
    pub fn set_state(&self, name: &str, state: LifecycleState) {
        if let Some(entry) = self.entries.get(name) {
            *entry.state.write() = state;
        }
    }

    /// Record an error against a plugin
    pub fn set_error(&self, name: &str, message: impl Into<String>) {
        if let Some(entry) = self.entries.get(name) {
            *entry.last_error.write() = Some(message.into());
        }
    }

    /// Clear a plugin's stored error
    pub fn clear_error(&self, name: &str) {
        if let Some(entry) = self.entries.get(name) {
            *entry.last_error.write() = None;
        }
    }

    /// Names in registration order
    pub fn registration_order(&self) -> Vec<String> {
        self.registration_order.read().clone()
    }

    /// Names of currently-active plugins, in activation order
    ///
    /// Read fresh on every call; the activation list only holds names whose
    /// state is `Active`, but the state is re-checked here since it can
    /// change between the list mutation and this read.
    pub fn active_names(&self) -> Vec<String> {
        self.activation_order
            .read()
            .iter()
            .filter(|name| self.state(name) == Some(LifecycleState::Active))
            .cloned()
            .collect()
    }

    /// Record a plugin as activated, appending it to the activation order
    pub fn record_activated(&self, name: &str) {
        let mut order = self.activation_order.write();
        if !order.iter().any(|n| n == name) {
            order.push(name.to_string());
        }
        if let Some(entry) = self.entries.get(name) {
            *entry.activated_at.write() = Some(Instant::now());
        }
    }

    /// Remove a plugin from the activation order
    pub fn record_deactivated(&self, name: &str) {
        self.activation_order.write().retain(|n| n != name);
        if let Some(entry) = self.entries.get(name) {
            *entry.activated_at.write() = None;
        }
    }

    /// Effective configuration: runtime override else built-in default
    pub fn effective_config(&self, name: &str) -> ConfigMap {
        let Some(entry) = self.entries.get(name) else {
            return ConfigMap::new();
        };
        if let Some(config) = entry.runtime_config.read().clone() {
            return config;
        }
        // The default lives on the plugin instance; taking the blocking read
        // here is fine because config reads never race a held write lock in
        // the single-control-flow model.
        let config = match entry.plugin.try_read() {
            Ok(plugin) => plugin.default_config().unwrap_or_default(),
            Err(_) => ConfigMap::new(),
        };
        config
    }

    /// Dependency graph of every registered plugin
    ///
    /// Maps each name to its declared dependency names (empty when none).
    pub fn dependency_graph(&self) -> HashMap<String, Vec<String>> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), e.metadata.dependency_names()))
            .collect()
    }

    /// Number of registered plugins
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear every entry and both orderings
    pub fn clear(&self) {
        self.entries.clear();
        self.registration_order.write().clear();
        self.activation_order.write().clear();
    }
}
