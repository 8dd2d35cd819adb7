//! Core plugin trait and types

use crate::context::{
    BuildContext, BuildSummary, ErrorContext, HotReloadContext, PluginContext, PluginResponse,
    RequestContext, ResponseContext, RouteDef, ScheduleContext, SocketContext,
};
use crate::error::Result;
use crate::health::HealthReport;
use async_trait::async_trait;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

/// String-keyed configuration map handed to plugins.
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

/// Core plugin trait that all plugins must implement
///
/// Only [`name`](Plugin::name) and [`version`](Plugin::version) are required.
/// Every hook has a no-op default, so a plugin that implements nothing beyond
/// its identity is valid and simply never reacts when triggered.
#[async_trait]
pub trait Plugin: Send + Sync + fmt::Debug {
    /// Plugin name (must be unique)
    fn name(&self) -> &str;

    /// Plugin version (semver)
    fn version(&self) -> &str;

    /// Plugin description
    fn description(&self) -> &str {
        ""
    }

    /// Plugin dependencies (other plugins this depends on)
    fn dependencies(&self) -> Vec<PluginDependency> {
        vec![]
    }

    /// Built-in default configuration
    ///
    /// Shadowed in full by a runtime override when one has been set.
    fn default_config(&self) -> Option<ConfigMap> {
        None
    }

    /// Validate a configuration map before it is applied
    fn validate_config(&self, _config: &ConfigMap) -> Result<()> {
        Ok(())
    }

    /// Install hook
    ///
    /// Runs once during installation, before the plugin can be activated.
    /// Plugins may register services into the container here; the runtime
    /// diffs the container around this call to record the plugin's service
    /// footprint.
    async fn install(&mut self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    /// Configuration was updated at runtime
    async fn on_config_update(&mut self, _ctx: &PluginContext, _config: &ConfigMap) -> Result<()> {
        Ok(())
    }

    /// Application init
    async fn on_init(&mut self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    /// Application start
    async fn on_start(&mut self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    /// Application stop (graceful shutdown, first phase)
    async fn on_stop(&mut self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    /// Application shutdown (final phase)
    async fn on_shutdown(&mut self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    /// Incoming request
    ///
    /// Returning `Some(response)` short-circuits the fan-out: later plugins
    /// are skipped and the response is handed back to the caller.
    async fn on_request(
        &self,
        _ctx: &PluginContext,
        _req: &RequestContext,
    ) -> Result<Option<PluginResponse>> {
        Ok(None)
    }

    /// Outgoing response (observational, never short-circuits)
    async fn on_response(&self, _ctx: &PluginContext, _res: &ResponseContext) -> Result<()> {
        Ok(())
    }

    /// Application-level error
    ///
    /// Returning `Some(response)` short-circuits the fan-out.
    async fn on_error(
        &self,
        _ctx: &PluginContext,
        _err: &ErrorContext,
    ) -> Result<Option<PluginResponse>> {
        Ok(None)
    }

    /// Route list transformation
    ///
    /// Receives the route list as transformed by all prior plugins and
    /// returns the (possibly modified) list that feeds the next plugin.
    async fn on_route(&self, _ctx: &PluginContext, routes: Vec<RouteDef>) -> Result<Vec<RouteDef>> {
        Ok(routes)
    }

    /// Build started
    async fn on_build(&self, _ctx: &PluginContext, _build: &BuildContext) -> Result<()> {
        Ok(())
    }

    /// Build finished
    async fn on_build_complete(
        &self,
        _ctx: &PluginContext,
        _summary: &BuildSummary,
    ) -> Result<()> {
        Ok(())
    }

    /// Bidirectional connection opened
    ///
    /// The context is tagged with a [`SocketKind`](crate::context::SocketKind)
    /// so a single hook can branch on the underlying transport.
    async fn on_socket(&self, _ctx: &PluginContext, _socket: &SocketContext) -> Result<()> {
        Ok(())
    }

    /// Bidirectional connection closed
    async fn on_socket_close(&self, _ctx: &PluginContext, _socket: &SocketContext) -> Result<()> {
        Ok(())
    }

    /// Scheduled task fired
    async fn on_schedule(&self, _ctx: &PluginContext, _task: &ScheduleContext) -> Result<()> {
        Ok(())
    }

    /// Health check
    async fn on_health_check(&self, _ctx: &PluginContext) -> Result<HealthReport> {
        Ok(HealthReport::healthy())
    }

    /// Source file changed during development
    async fn on_hot_reload(&self, _ctx: &PluginContext, _reload: &HotReloadContext) -> Result<()> {
        Ok(())
    }

    /// Get plugin metadata
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: self.name().to_string(),
            version: self.version().to_string(),
            description: self.description().to_string(),
            dependencies: self.dependencies(),
        }
    }
}

/// Plugin dependency specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDependency {
    /// Plugin name
    pub name: String,

    /// Version requirement (semver), unconstrained when absent
    pub version_req: Option<String>,

    /// Whether this dependency is optional
    pub optional: bool,
}

impl PluginDependency {
    /// Create a required dependency with no version constraint
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_req: None,
            optional: false,
        }
    }

    /// Create an optional dependency with no version constraint
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_req: None,
            optional: true,
        }
    }

    /// Constrain the dependency to a semver requirement
    pub fn with_version(mut self, version_req: impl Into<String>) -> Self {
        self.version_req = Some(version_req.into());
        self
    }

    /// Check if a version satisfies this dependency
    ///
    /// An unconstrained dependency accepts everything; an unparseable
    /// requirement or version accepts nothing.
    pub fn satisfies(&self, version: &str) -> bool {
        let Some(req) = &self.version_req else {
            return true;
        };
        let Ok(req) = semver::VersionReq::parse(req) else {
            return false;
        };
        let Ok(ver) = Version::parse(version) else {
            return false;
        };
        req.matches(&ver)
    }
}

/// Plugin metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Plugin name
    pub name: String,

    /// Plugin version
    pub version: String,

    /// Plugin description
    pub description: String,

    /// Plugin dependencies
    pub dependencies: Vec<PluginDependency>,
}

impl PluginMetadata {
    /// Names of the declared dependencies, in declaration order
    pub fn dependency_names(&self) -> Vec<String> {
        self.dependencies.iter().map(|d| d.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct BarePlugin;

    #[async_trait]
    impl Plugin for BarePlugin {
        fn name(&self) -> &str {
            "bare"
        }

        fn version(&self) -> &str {
            "0.1.0"
        }
    }

    #[tokio::test]
    async fn test_hookless_plugin_is_valid() {
        let mut plugin = BarePlugin;
        let ctx = PluginContext::default();

        plugin.on_init(&ctx).await.unwrap();
        let short_circuit = plugin
            .on_request(&ctx, &RequestContext::new("req-1", "GET", "/"))
            .await
            .unwrap();
        assert!(short_circuit.is_none());

        let report = plugin.on_health_check(&ctx).await.unwrap();
        assert!(report.state.is_healthy());
    }

    #[test]
    fn test_metadata_assembly() {
        let metadata = BarePlugin.metadata();
        assert_eq!(metadata.name, "bare");
        assert_eq!(metadata.version, "0.1.0");
        assert!(metadata.dependencies.is_empty());
    }

    #[test]
    fn test_dependency_satisfies() {
        let dep = PluginDependency::required("auth").with_version("^1.0");
        assert!(dep.satisfies("1.0.0"));
        assert!(dep.satisfies("1.4.2"));
        assert!(!dep.satisfies("2.0.0"));
        assert!(!dep.satisfies("not-a-version"));

        let unconstrained = PluginDependency::required("db");
        assert!(unconstrained.satisfies("0.0.1"));
    }
}
