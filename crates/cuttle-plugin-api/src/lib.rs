//! # Cuttle Plugin API
//!
//! This crate provides the SDK for developing plugins for the Cuttle
//! lifecycle orchestrator.
//!
//! A plugin is any type implementing [`Plugin`]: a unique name and version,
//! optional declared dependencies on other plugins, and any subset of the
//! event hooks (init/start/stop/shutdown, request/response/error, route
//! mutation, build, socket, schedule, health, hot reload). Every hook is
//! optional — a plugin with no hooks is valid.
//!
//! ## Example
//!
//! ```rust,no_run
//! use cuttle_plugin_api::prelude::*;
//!
//! #[derive(Debug)]
//! struct MyPlugin;
//!
//! #[async_trait]
//! impl Plugin for MyPlugin {
//!     fn name(&self) -> &str { "my-plugin" }
//!     fn version(&self) -> &str { "1.0.0" }
//!
//!     async fn on_request(
//!         &self,
//!         _ctx: &PluginContext,
//!         req: &RequestContext,
//!     ) -> Result<Option<PluginResponse>, PluginError> {
//!         if req.path == "/blocked" {
//!             return Ok(Some(PluginResponse::new(403, serde_json::json!("no"))));
//!         }
//!         Ok(None)
//!     }
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod context;
pub mod error;
pub mod health;
pub mod plugin;
pub mod services;

// Re-export commonly used types
pub use context::{
    BuildContext, BuildSummary, ErrorContext, HotReloadContext, PluginContext, PluginResponse,
    RequestContext, ResponseContext, RouteDef, ScheduleContext, SocketContext, SocketKind,
};
pub use error::PluginError;
pub use health::{AggregatedHealth, CheckEntry, CheckStatus, HealthReport, HealthState};
pub use plugin::{ConfigMap, Plugin, PluginDependency, PluginMetadata};
pub use services::{InMemoryServices, Service, ServiceContainer};

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::context::{
        BuildContext, BuildSummary, ErrorContext, HotReloadContext, PluginContext, PluginResponse,
        RequestContext, ResponseContext, RouteDef, ScheduleContext, SocketContext, SocketKind,
    };
    pub use crate::error::PluginError;
    pub use crate::health::{CheckEntry, CheckStatus, HealthReport, HealthState};
    pub use crate::plugin::{ConfigMap, Plugin, PluginDependency, PluginMetadata};
    pub use crate::services::{InMemoryServices, Service, ServiceContainer};
    pub use async_trait::async_trait;
}
