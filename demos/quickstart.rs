//! Quickstart: two plugins, a full lifecycle walk, and a few triggers
//!
//! Run with: `cargo run --bin quickstart`

use cuttle_plugin_api::prelude::*;
use cuttle_plugin_runtime::prelude::*;
use std::sync::Arc;

#[derive(Debug)]
struct DbPlugin;

#[async_trait]
impl Plugin for DbPlugin {
    fn name(&self) -> &str {
        "db"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    async fn install(&mut self, ctx: &PluginContext) -> std::result::Result<(), PluginError> {
        ctx.services
            .register_singleton("db-pool", Arc::new("postgres://localhost".to_string()));
        Ok(())
    }

    async fn on_health_check(
        &self,
        _ctx: &PluginContext,
    ) -> std::result::Result<HealthReport, PluginError> {
        Ok(HealthReport::healthy().with_check(
            "pool",
            CheckEntry::pass(std::time::Duration::from_millis(1)),
        ))
    }
}

#[derive(Debug)]
struct AuthPlugin;

#[async_trait]
impl Plugin for AuthPlugin {
    fn name(&self) -> &str {
        "auth"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn dependencies(&self) -> Vec<PluginDependency> {
        vec![PluginDependency::required("db").with_version("^1.0")]
    }

    async fn on_request(
        &self,
        _ctx: &PluginContext,
        req: &RequestContext,
    ) -> std::result::Result<Option<PluginResponse>, PluginError> {
        if !req.headers.contains_key("authorization") {
            return Ok(Some(PluginResponse::new(
                401,
                serde_json::json!({"error": "missing credentials"}),
            )));
        }
        Ok(None)
    }
}

#[tokio::main]
async fn main() -> cuttle_plugin_runtime::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let manager = PluginManager::new();

    manager.on(
        "*",
        Arc::new(|event| {
            tracing::debug!(event = event.name(), "lifecycle event");
        }),
    );

    manager.register(Box::new(DbPlugin), false).await?;
    manager.register(Box::new(AuthPlugin), false).await?;
    manager.bootstrap().await?;

    // An unauthenticated request is short-circuited by the auth plugin.
    let denied = manager
        .trigger_request(&RequestContext::new("req-1", "GET", "/private"))
        .await?;
    tracing::info!(?denied, "request without credentials");

    // An authenticated one passes through every plugin.
    let allowed = manager
        .trigger_request(
            &RequestContext::new("req-2", "GET", "/private")
                .with_header("authorization", "Bearer token"),
        )
        .await?;
    tracing::info!(?allowed, "request with credentials");

    let health = manager.trigger_health_check().await?;
    tracing::info!(state = %health.state, checks = health.checks.len(), "aggregated health");

    manager.shutdown().await?;
    Ok(())
}
