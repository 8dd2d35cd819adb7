//! # Cuttle Plugin Runtime
//!
//! Lifecycle orchestration for Cuttle plugins: a registry enforcing the
//! `registered -> installed -> active -> (inactive <-> active) -> uninstalled`
//! state machine, dependency-ordered installation with cycle and
//! missing-dependency detection, and sequential event fan-out to the active
//! plugin set with per-plugin error isolation.
//!
//! ## Example
//!
//! ```rust,no_run
//! use cuttle_plugin_runtime::prelude::*;
//!
//! # #[derive(Debug)]
//! # struct MyPlugin;
//! # #[async_trait]
//! # impl Plugin for MyPlugin {
//! #     fn name(&self) -> &str { "my-plugin" }
//! #     fn version(&self) -> &str { "1.0.0" }
//! # }
//! # async fn example() -> Result<()> {
//! let manager = PluginManager::new();
//!
//! // Register, install and activate in one call.
//! manager.use_plugin(Box::new(MyPlugin)).await?;
//!
//! // Fan application events out to every active plugin.
//! manager.trigger_init().await?;
//! let health = manager.trigger_health_check().await?;
//! println!("overall: {}", health.state);
//!
//! // Reverse-order teardown.
//! manager.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod dispatcher;
pub mod error;
pub mod events;
pub mod hot_reload;
pub mod loader;
pub mod manager;
pub mod registry;
pub mod resolver;
pub mod store;

pub use dispatcher::EventDispatcher;
pub use error::{Result, RuntimeError};
pub use events::{EventBus, Listener, ListenerId, PluginEvent};
pub use hot_reload::HotReloadWatcher;
pub use loader::{ManifestPlugin, ManifestSource, PluginSource, MANIFEST_EXTENSIONS};
pub use manager::{PluginManager, PluginStats};
pub use registry::{PluginDebugInfo, PluginRegistry, RuntimeOptions};
pub use store::{LifecycleState, PluginEntry, PluginStore};

// Re-export plugin API types for convenience
pub use cuttle_plugin_api::{
    AggregatedHealth, BuildContext, BuildSummary, CheckEntry, CheckStatus, ConfigMap,
    ErrorContext, HealthReport, HealthState, HotReloadContext, InMemoryServices, Plugin,
    PluginContext, PluginDependency, PluginError, PluginMetadata, PluginResponse, RequestContext,
    ResponseContext, RouteDef, ScheduleContext, ServiceContainer, SocketContext, SocketKind,
};

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::dispatcher::EventDispatcher;
    pub use crate::error::{Result, RuntimeError};
    pub use crate::events::{EventBus, ListenerId, PluginEvent};
    pub use crate::manager::{PluginManager, PluginStats};
    pub use crate::registry::{PluginDebugInfo, PluginRegistry, RuntimeOptions};
    pub use crate::store::{LifecycleState, PluginStore};
    pub use cuttle_plugin_api::prelude::*;
}
