//! Hot reload support for plugins
//!
//! Watches a directory of plugin manifests and, when a file changes, runs the
//! serialized reload sequence for the affected plugin:
//! deactivate -> uninstall -> re-register, followed by a `plugin:reloaded`
//! event and the hot-reload hook fan-out. A per-path last-modified map drops
//! events that are not strictly newer than the last observed timestamp, which
//! keeps duplicate-event storms from triggering repeated reloads. Every
//! failure inside the watch loop is swallowed: a broken manifest or a failing
//! plugin must not crash the watcher.

use crate::dispatcher::EventDispatcher;
use crate::error::{Result, RuntimeError};
use crate::events::PluginEvent;
use crate::loader::{PluginSource, MANIFEST_EXTENSIONS};
use crate::registry::PluginRegistry;
use crate::store::LifecycleState;
use cuttle_plugin_api::HotReloadContext;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Hot reload watcher for plugin manifest files
pub struct HotReloadWatcher {
    registry: Arc<PluginRegistry>,
    source: Arc<dyn PluginSource>,
    dir: PathBuf,
    extensions: Vec<String>,
    watcher: Option<RecommendedWatcher>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl std::fmt::Debug for HotReloadWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotReloadWatcher")
            .field("dir", &self.dir)
            .field("watching", &self.watcher.is_some())
            .finish()
    }
}

impl HotReloadWatcher {
    /// Create a watcher over a manifest directory
    pub fn new(
        registry: Arc<PluginRegistry>,
        source: Arc<dyn PluginSource>,
        dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            source,
            dir: dir.into(),
            extensions: MANIFEST_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            watcher: None,
            handle: None,
        }
    }

    /// Override the watched extensions
    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Start watching
    pub fn start(&mut self) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )
        .map_err(|e| RuntimeError::Watcher(format!("failed to create file watcher: {e}")))?;

        watcher
            .watch(&self.dir, RecursiveMode::Recursive)
            .map_err(|e| {
                RuntimeError::Watcher(format!(
                    "failed to watch '{}': {e}",
                    self.dir.display()
                ))
            })?;

        self.watcher = Some(watcher);

        let registry = Arc::clone(&self.registry);
        let source = Arc::clone(&self.source);
        let extensions = self.extensions.clone();

        self.handle = Some(tokio::spawn(async move {
            let mut last_seen: HashMap<PathBuf, SystemTime> = HashMap::new();
            while let Some(res) = rx.recv().await {
                match res {
                    Ok(event) => {
                        Self::process_event(&registry, &source, &extensions, &mut last_seen, event)
                            .await;
                    }
                    Err(e) => {
                        warn!(error = %e, "File watcher error");
                    }
                }
            }
        }));

        info!(dir = %self.dir.display(), "Hot reload watcher started");
        Ok(())
    }

    /// Stop watching
    pub fn close(&mut self) {
        self.watcher = None;
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        info!("Hot reload watcher stopped");
    }

    fn is_watched(path: &Path, extensions: &[String]) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .map(|ext| extensions.iter().any(|e| e == ext))
            .unwrap_or(false)
    }

    async fn process_event(
        registry: &Arc<PluginRegistry>,
        source: &Arc<dyn PluginSource>,
        extensions: &[String],
        last_seen: &mut HashMap<PathBuf, SystemTime>,
        event: Event,
    ) {
        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
            return;
        }

        for path in &event.paths {
            if !Self::is_watched(path, extensions) {
                continue;
            }

            // Only modifications strictly newer than the last observed
            // timestamp for this path are processed.
            let Some(mtime) = tokio::fs::metadata(path)
                .await
                .ok()
                .and_then(|m| m.modified().ok())
            else {
                continue;
            };
            if last_seen.get(path).is_some_and(|prev| mtime <= *prev) {
                debug!(path = %path.display(), "Skipping duplicate change event");
                continue;
            }
            last_seen.insert(path.clone(), mtime);

            Self::reload_path(registry, source, path).await;
        }
    }

    /// Run the reload sequence for one changed file
    ///
    /// Every error along the way is swallowed and recorded; the watch loop
    /// must keep running.
    pub(crate) async fn reload_path(
        registry: &Arc<PluginRegistry>,
        source: &Arc<dyn PluginSource>,
        path: &Path,
    ) {
        debug!(path = %path.display(), "Plugin file changed");

        let plugin = match source.load(path).await {
            Ok(plugin) => plugin,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to load changed plugin");
                return;
            }
        };
        let name = plugin.name().to_string();

        if registry.get_state(&name).is_some() {
            if registry.get_state(&name) == Some(LifecycleState::Active) {
                if let Err(e) = registry.deactivate(&name).await {
                    warn!(plugin = %name, error = %e, "Deactivate during reload failed");
                }
            }
            if let Err(e) = registry.uninstall(&name).await {
                warn!(plugin = %name, error = %e, "Uninstall during reload failed");
            }
            if let Err(e) = registry.register(plugin, true).await {
                error!(plugin = %name, error = %e, "Re-registration during reload failed");
                return;
            }
        } else if let Err(e) = registry.register(plugin, false).await {
            error!(plugin = %name, error = %e, "Registration during reload failed");
            return;
        }

        info!(plugin = %name, path = %path.display(), "Plugin reloaded");
        registry.events().emit(PluginEvent::Reloaded {
            plugin: name.clone(),
        });

        // Let active plugins observe the reload; failures in their hooks are
        // swallowed by the trigger itself.
        let reload = HotReloadContext {
            path: path.to_path_buf(),
            plugin: Some(name),
        };
        let _ = EventDispatcher::new(Arc::clone(registry))
            .trigger_hot_reload(&reload)
            .await;
    }
}

impl Drop for HotReloadWatcher {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
