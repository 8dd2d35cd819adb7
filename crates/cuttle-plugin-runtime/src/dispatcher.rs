//! Event fan-out across active plugins
//!
//! Every trigger reads the set of currently-active plugins fresh from the
//! store (state can change between calls) and invokes the corresponding hook
//! sequentially — each hook is awaited to completion before the next plugin
//! is touched, which keeps short-circuit and aggregation semantics
//! well-defined. Hook failures are recorded against their plugin and emitted
//! as `plugin:error`; whether they abort the remaining fan-out follows
//! [`RuntimeOptions::continue_on_error`](crate::registry::RuntimeOptions),
//! except for the stop/shutdown and hot-reload phases where errors are
//! always swallowed.

use crate::error::{Result, RuntimeError};
use crate::registry::PluginRegistry;
use crate::store::PluginEntry;
use cuttle_plugin_api::{
    AggregatedHealth, BuildContext, BuildSummary, CheckEntry, CheckStatus, ErrorContext,
    HealthState, HotReloadContext, PluginResponse, RequestContext, ResponseContext, RouteDef,
    ScheduleContext, SocketContext,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Dispatcher fanning application events out to active plugins
#[derive(Clone, Debug)]
pub struct EventDispatcher {
    registry: Arc<PluginRegistry>,
}

impl EventDispatcher {
    /// Create a dispatcher over a registry
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self { registry }
    }

    fn continue_on_error(&self) -> bool {
        self.registry.options().continue_on_error
    }

    /// Active plugins in activation order, snapshotted fresh per trigger
    fn active(&self) -> Vec<(String, PluginEntry)> {
        let store = self.registry.store();
        store
            .active_names()
            .into_iter()
            .filter_map(|name| store.get(&name).map(|entry| (name, entry)))
            .collect()
    }

    /// Fan out the init hook, in activation order
    pub async fn trigger_init(&self) -> Result<()> {
        for (name, entry) in self.active() {
            let ctx = self.registry.context_for(&name);
            let result = {
                let mut plugin = entry.plugin.write().await;
                plugin.on_init(&ctx).await
            };
            if let Err(e) = result {
                self.registry.record_failure(&name, &e);
                if !self.continue_on_error() {
                    return Err(RuntimeError::hook(&name, &e));
                }
            }
        }
        Ok(())
    }

    /// Fan out the start hook, in activation order
    pub async fn trigger_start(&self) -> Result<()> {
        for (name, entry) in self.active() {
            let ctx = self.registry.context_for(&name);
            let result = {
                let mut plugin = entry.plugin.write().await;
                plugin.on_start(&ctx).await
            };
            if let Err(e) = result {
                self.registry.record_failure(&name, &e);
                if !self.continue_on_error() {
                    return Err(RuntimeError::hook(&name, &e));
                }
            }
        }
        Ok(())
    }

    /// Fan out the stop hook, in reverse activation order
    ///
    /// Errors are always swallowed so every plugin gets a stop attempt.
    pub async fn trigger_stop(&self) -> Result<()> {
        for (name, entry) in self.active().into_iter().rev() {
            let ctx = self.registry.context_for(&name);
            let result = {
                let mut plugin = entry.plugin.write().await;
                plugin.on_stop(&ctx).await
            };
            if let Err(e) = result {
                self.registry.record_swallowed_failure(&name, &e);
            }
        }
        Ok(())
    }

    /// Fan out the shutdown hook, in reverse activation order
    ///
    /// Errors are always swallowed so every plugin gets a shutdown attempt.
    pub async fn trigger_shutdown(&self) -> Result<()> {
        for (name, entry) in self.active().into_iter().rev() {
            let ctx = self.registry.context_for(&name);
            let result = {
                let mut plugin = entry.plugin.write().await;
                plugin.on_shutdown(&ctx).await
            };
            if let Err(e) = result {
                self.registry.record_swallowed_failure(&name, &e);
            }
        }
        Ok(())
    }

    /// Fan out a request, in activation order
    ///
    /// The first plugin returning a response value short-circuits: the
    /// remaining plugins are skipped and that value is the overall result.
    pub async fn trigger_request(&self, req: &RequestContext) -> Result<Option<PluginResponse>> {
        for (name, entry) in self.active() {
            let ctx = self.registry.context_for(&name);
            let result = {
                let plugin = entry.plugin.read().await;
                plugin.on_request(&ctx, req).await
            };
            match result {
                Ok(Some(response)) => {
                    debug!(plugin = %name, request_id = %req.request_id, "Request short-circuited");
                    return Ok(Some(response));
                }
                Ok(None) => {}
                Err(e) => {
                    self.registry.record_failure(&name, &e);
                    if !self.continue_on_error() {
                        return Err(RuntimeError::hook(&name, &e));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Fan out a response, in activation order (purely observational)
    pub async fn trigger_response(&self, res: &ResponseContext) -> Result<()> {
        for (name, entry) in self.active() {
            let ctx = self.registry.context_for(&name);
            let result = {
                let plugin = entry.plugin.read().await;
                plugin.on_response(&ctx, res).await
            };
            if let Err(e) = result {
                self.registry.record_failure(&name, &e);
                if !self.continue_on_error() {
                    return Err(RuntimeError::hook(&name, &e));
                }
            }
        }
        Ok(())
    }

    /// Fan out an application error, in activation order
    ///
    /// The first plugin returning a response value short-circuits. Hook
    /// errors here are recorded but never re-thrown: an error handler
    /// erroring must not crash error handling.
    pub async fn trigger_error(&self, err: &ErrorContext) -> Result<Option<PluginResponse>> {
        for (name, entry) in self.active() {
            let ctx = self.registry.context_for(&name);
            let result = {
                let plugin = entry.plugin.read().await;
                plugin.on_error(&ctx, err).await
            };
            match result {
                Ok(Some(response)) => return Ok(Some(response)),
                Ok(None) => {}
                Err(e) => {
                    self.registry.record_swallowed_failure(&name, &e);
                }
            }
        }
        Ok(None)
    }

    /// Run the route pipeline, in activation order
    ///
    /// Not a fan-out: each plugin receives the route list as transformed by
    /// all prior plugins and returns the list that feeds the next. A failing
    /// plugin leaves the accumulated list untouched.
    pub async fn trigger_route(&self, routes: Vec<RouteDef>) -> Result<Vec<RouteDef>> {
        let mut acc = routes;
        for (name, entry) in self.active() {
            let ctx = self.registry.context_for(&name);
            let result = {
                let plugin = entry.plugin.read().await;
                plugin.on_route(&ctx, acc.clone()).await
            };
            match result {
                Ok(transformed) => acc = transformed,
                Err(e) => {
                    self.registry.record_failure(&name, &e);
                    if !self.continue_on_error() {
                        return Err(RuntimeError::hook(&name, &e));
                    }
                }
            }
        }
        Ok(acc)
    }

    /// Fan out a build start, in activation order
    pub async fn trigger_build(&self, build: &BuildContext) -> Result<()> {
        for (name, entry) in self.active() {
            let ctx = self.registry.context_for(&name);
            let result = {
                let plugin = entry.plugin.read().await;
                plugin.on_build(&ctx, build).await
            };
            if let Err(e) = result {
                self.registry.record_failure(&name, &e);
                if !self.continue_on_error() {
                    return Err(RuntimeError::hook(&name, &e));
                }
            }
        }
        Ok(())
    }

    /// Fan out a finished build, in activation order
    pub async fn trigger_build_complete(&self, summary: &BuildSummary) -> Result<()> {
        for (name, entry) in self.active() {
            let ctx = self.registry.context_for(&name);
            let result = {
                let plugin = entry.plugin.read().await;
                plugin.on_build_complete(&ctx, summary).await
            };
            if let Err(e) = result {
                self.registry.record_failure(&name, &e);
                if !self.continue_on_error() {
                    return Err(RuntimeError::hook(&name, &e));
                }
            }
        }
        Ok(())
    }

    /// Fan out an opened connection, in activation order
    pub async fn trigger_socket(&self, socket: &SocketContext) -> Result<()> {
        for (name, entry) in self.active() {
            let ctx = self.registry.context_for(&name);
            let result = {
                let plugin = entry.plugin.read().await;
                plugin.on_socket(&ctx, socket).await
            };
            if let Err(e) = result {
                self.registry.record_failure(&name, &e);
                if !self.continue_on_error() {
                    return Err(RuntimeError::hook(&name, &e));
                }
            }
        }
        Ok(())
    }

    /// Fan out a closed connection, in activation order
    pub async fn trigger_socket_close(&self, socket: &SocketContext) -> Result<()> {
        for (name, entry) in self.active() {
            let ctx = self.registry.context_for(&name);
            let result = {
                let plugin = entry.plugin.read().await;
                plugin.on_socket_close(&ctx, socket).await
            };
            if let Err(e) = result {
                self.registry.record_failure(&name, &e);
                if !self.continue_on_error() {
                    return Err(RuntimeError::hook(&name, &e));
                }
            }
        }
        Ok(())
    }

    /// Fan out a scheduled-task notification, in activation order
    pub async fn trigger_schedule(&self, task: &ScheduleContext) -> Result<()> {
        for (name, entry) in self.active() {
            let ctx = self.registry.context_for(&name);
            let result = {
                let plugin = entry.plugin.read().await;
                plugin.on_schedule(&ctx, task).await
            };
            if let Err(e) = result {
                self.registry.record_failure(&name, &e);
                if !self.continue_on_error() {
                    return Err(RuntimeError::hook(&name, &e));
                }
            }
        }
        Ok(())
    }

    /// Aggregate health across active plugins, in activation order
    ///
    /// Detailed check maps merge under `plugin:check` keys; plugins without
    /// one get a single synthesized entry keyed by their name. `Unhealthy`
    /// is sticky on the overall state; a hook failure records a synthetic
    /// failing check and forces overall `Unhealthy`.
    pub async fn trigger_health_check(&self) -> Result<AggregatedHealth> {
        let mut aggregated = AggregatedHealth::empty();

        for (name, entry) in self.active() {
            let ctx = self.registry.context_for(&name);
            let start = Instant::now();
            let result = {
                let plugin = entry.plugin.read().await;
                plugin.on_health_check(&ctx).await
            };
            let elapsed = start.elapsed();

            match result {
                Ok(report) => {
                    aggregated.state = aggregated.state.worst_of(report.state);
                    match report.checks {
                        Some(checks) => {
                            for (check, entry) in checks {
                                aggregated.checks.insert(format!("{name}:{check}"), entry);
                            }
                        }
                        None => {
                            aggregated.checks.insert(
                                name.clone(),
                                CheckEntry {
                                    status: CheckStatus::from(report.state),
                                    message: report.message,
                                    duration: elapsed,
                                },
                            );
                        }
                    }
                }
                Err(e) => {
                    aggregated.state = HealthState::Unhealthy;
                    aggregated
                        .checks
                        .insert(name.clone(), CheckEntry::fail(elapsed, e.to_string()));
                    self.registry.record_failure(&name, &e);
                    if !self.continue_on_error() {
                        return Err(RuntimeError::hook(&name, &e));
                    }
                }
            }
        }

        aggregated.captured_at = chrono::Utc::now();
        Ok(aggregated)
    }

    /// Fan out a hot-reload notification, in activation order
    ///
    /// A development-only feature: errors are always swallowed so the watch
    /// loop cannot be crashed by a plugin.
    pub async fn trigger_hot_reload(&self, reload: &HotReloadContext) -> Result<()> {
        for (name, entry) in self.active() {
            let ctx = self.registry.context_for(&name);
            let result = {
                let plugin = entry.plugin.read().await;
                plugin.on_hot_reload(&ctx, reload).await
            };
            if let Err(e) = result {
                self.registry.record_swallowed_failure(&name, &e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::registry::RuntimeOptions;
    use crate::store::PluginStore;
    use async_trait::async_trait;
    use cuttle_plugin_api::{
        HealthReport, InMemoryServices, Plugin, PluginContext, PluginError,
    };
    use std::time::Duration;

    type Log = Arc<parking_lot::Mutex<Vec<String>>>;

    #[derive(Debug)]
    struct RecorderPlugin {
        name: String,
        log: Log,
        respond_to_requests: bool,
        fail_hooks: bool,
        health: Option<HealthReport>,
    }

    impl RecorderPlugin {
        fn new(name: &str, log: Log) -> Self {
            Self {
                name: name.to_string(),
                log,
                respond_to_requests: false,
                fail_hooks: false,
                health: None,
            }
        }

        fn record(&self, hook: &str) {
            self.log.lock().push(format!("{}:{}", self.name, hook));
        }

        fn check(&self) -> std::result::Result<(), PluginError> {
            if self.fail_hooks {
                Err(PluginError::hook("deliberate failure"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Plugin for RecorderPlugin {
        fn name(&self) -> &str {
            &self.name
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        async fn on_init(&mut self, _ctx: &PluginContext) -> std::result::Result<(), PluginError> {
            self.record("init");
            self.check()
        }

        async fn on_stop(&mut self, _ctx: &PluginContext) -> std::result::Result<(), PluginError> {
            self.record("stop");
            self.check()
        }

        async fn on_shutdown(
            &mut self,
            _ctx: &PluginContext,
        ) -> std::result::Result<(), PluginError> {
            self.record("shutdown");
            self.check()
        }

        async fn on_request(
            &self,
            _ctx: &PluginContext,
            _req: &RequestContext,
        ) -> std::result::Result<Option<PluginResponse>, PluginError> {
            self.record("request");
            self.check()?;
            if self.respond_to_requests {
                Ok(Some(PluginResponse::new(
                    200,
                    serde_json::json!({"handled_by": self.name}),
                )))
            } else {
                Ok(None)
            }
        }

        async fn on_response(
            &self,
            _ctx: &PluginContext,
            _res: &ResponseContext,
        ) -> std::result::Result<(), PluginError> {
            self.record("response");
            self.check()
        }

        async fn on_error(
            &self,
            _ctx: &PluginContext,
            _err: &ErrorContext,
        ) -> std::result::Result<Option<PluginResponse>, PluginError> {
            self.record("error");
            self.check()?;
            if self.respond_to_requests {
                Ok(Some(PluginResponse::new(500, serde_json::json!("handled"))))
            } else {
                Ok(None)
            }
        }

        async fn on_route(
            &self,
            _ctx: &PluginContext,
            mut routes: Vec<RouteDef>,
        ) -> std::result::Result<Vec<RouteDef>, PluginError> {
            self.record("route");
            self.check()?;
            routes.push(RouteDef::new(
                format!("{}-route", self.name),
                format!("/{}", self.name),
                vec!["GET".to_string()],
            ));
            Ok(routes)
        }

        async fn on_health_check(
            &self,
            _ctx: &PluginContext,
        ) -> std::result::Result<HealthReport, PluginError> {
            self.record("health");
            self.check()?;
            Ok(self.health.clone().unwrap_or_else(HealthReport::healthy))
        }
    }

    async fn dispatcher_with(
        plugins: Vec<RecorderPlugin>,
        options: RuntimeOptions,
    ) -> (EventDispatcher, Arc<PluginRegistry>) {
        let registry = Arc::new(PluginRegistry::new(
            Arc::new(PluginStore::new()),
            Arc::new(EventBus::new()),
            Arc::new(InMemoryServices::new()),
            options,
        ));

        for plugin in plugins {
            let name = plugin.name.clone();
            registry.register(Box::new(plugin), false).await.unwrap();
            registry.install(&name).await.unwrap();
            registry.activate(&name).await.unwrap();
        }

        (EventDispatcher::new(Arc::clone(&registry)), registry)
    }

    #[tokio::test]
    async fn test_init_runs_in_activation_order() {
        let log: Log = Arc::default();
        let (dispatcher, _) = dispatcher_with(
            vec![
                RecorderPlugin::new("a", Arc::clone(&log)),
                RecorderPlugin::new("b", Arc::clone(&log)),
                RecorderPlugin::new("c", Arc::clone(&log)),
            ],
            RuntimeOptions::default(),
        )
        .await;

        dispatcher.trigger_init().await.unwrap();
        assert_eq!(log.lock().clone(), vec!["a:init", "b:init", "c:init"]);
    }

    #[tokio::test]
    async fn test_stop_and_shutdown_run_in_reverse_order() {
        let log: Log = Arc::default();
        let (dispatcher, _) = dispatcher_with(
            vec![
                RecorderPlugin::new("a", Arc::clone(&log)),
                RecorderPlugin::new("b", Arc::clone(&log)),
                RecorderPlugin::new("c", Arc::clone(&log)),
            ],
            RuntimeOptions::default(),
        )
        .await;

        dispatcher.trigger_stop().await.unwrap();
        dispatcher.trigger_shutdown().await.unwrap();
        assert_eq!(
            log.lock().clone(),
            vec![
                "c:stop", "b:stop", "a:stop", "c:shutdown", "b:shutdown", "a:shutdown"
            ]
        );
    }

    #[tokio::test]
    async fn test_request_short_circuits_on_first_response() {
        let log: Log = Arc::default();
        let mut first = RecorderPlugin::new("first", Arc::clone(&log));
        first.respond_to_requests = true;
        let second = RecorderPlugin::new("second", Arc::clone(&log));

        let (dispatcher, _) =
            dispatcher_with(vec![first, second], RuntimeOptions::default()).await;

        let response = dispatcher
            .trigger_request(&RequestContext::new("req-1", "GET", "/"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(
            response.body,
            serde_json::json!({"handled_by": "first"})
        );
        // The second plugin's hook was never invoked.
        assert_eq!(log.lock().clone(), vec!["first:request"]);
    }

    #[tokio::test]
    async fn test_response_never_short_circuits() {
        let log: Log = Arc::default();
        let mut first = RecorderPlugin::new("first", Arc::clone(&log));
        first.respond_to_requests = true;
        let second = RecorderPlugin::new("second", Arc::clone(&log));

        let (dispatcher, _) =
            dispatcher_with(vec![first, second], RuntimeOptions::default()).await;

        dispatcher
            .trigger_response(&ResponseContext::new("req-1", 200, Duration::from_millis(5)))
            .await
            .unwrap();
        assert_eq!(
            log.lock().clone(),
            vec!["first:response", "second:response"]
        );
    }

    #[tokio::test]
    async fn test_route_pipeline_accumulates() {
        let log: Log = Arc::default();
        let (dispatcher, _) = dispatcher_with(
            vec![
                RecorderPlugin::new("a", Arc::clone(&log)),
                RecorderPlugin::new("b", Arc::clone(&log)),
            ],
            RuntimeOptions::default(),
        )
        .await;

        let seed = vec![RouteDef::new("root", "/", vec!["GET".to_string()])];
        let routes = dispatcher.trigger_route(seed).await.unwrap();

        let names: Vec<&str> = routes.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["root", "a-route", "b-route"]);
    }

    #[tokio::test]
    async fn test_failing_route_plugin_leaves_accumulated_list() {
        let log: Log = Arc::default();
        let mut broken = RecorderPlugin::new("broken", Arc::clone(&log));
        broken.fail_hooks = true;
        let tail = RecorderPlugin::new("tail", Arc::clone(&log));

        let (dispatcher, registry) =
            dispatcher_with(vec![broken, tail], RuntimeOptions::default()).await;

        let routes = dispatcher.trigger_route(vec![]).await.unwrap();
        let names: Vec<&str> = routes.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["tail-route"]);

        // The failure is queryable after the fact.
        let info = registry.get_debug_info("broken").unwrap();
        assert!(info.error.is_some());
    }

    #[tokio::test]
    async fn test_error_hook_short_circuits_and_never_rethrows() {
        let log: Log = Arc::default();
        let mut broken = RecorderPlugin::new("broken", Arc::clone(&log));
        broken.fail_hooks = true;
        let mut handler = RecorderPlugin::new("handler", Arc::clone(&log));
        handler.respond_to_requests = true;
        let unreached = RecorderPlugin::new("unreached", Arc::clone(&log));

        // Even with continue_on_error=false, error-hook failures are
        // swallowed.
        let (dispatcher, _) = dispatcher_with(
            vec![broken, handler, unreached],
            RuntimeOptions {
                continue_on_error: false,
            },
        )
        .await;

        let response = dispatcher
            .trigger_error(&ErrorContext::new("boom"))
            .await
            .unwrap();
        assert!(response.is_some());
        assert_eq!(log.lock().clone(), vec!["broken:error", "handler:error"]);
    }

    #[tokio::test]
    async fn test_unhealthy_plugin_forces_overall_unhealthy() {
        let log: Log = Arc::default();
        let healthy = RecorderPlugin::new("healthy", Arc::clone(&log));
        let mut sick = RecorderPlugin::new("sick", Arc::clone(&log));
        sick.health = Some(HealthReport::unhealthy("db unreachable"));
        let fine = RecorderPlugin::new("fine", Arc::clone(&log));

        let (dispatcher, _) =
            dispatcher_with(vec![healthy, sick, fine], RuntimeOptions::default()).await;

        let health = dispatcher.trigger_health_check().await.unwrap();
        assert_eq!(health.state, HealthState::Unhealthy);
        assert_eq!(health.checks["sick"].status, CheckStatus::Fail);
        assert_eq!(health.checks["fine"].status, CheckStatus::Pass);
    }

    #[tokio::test]
    async fn test_degraded_upgrades_healthy_only() {
        let log: Log = Arc::default();
        let mut slow = RecorderPlugin::new("slow", Arc::clone(&log));
        slow.health = Some(HealthReport::degraded("cache cold"));
        let fine = RecorderPlugin::new("fine", Arc::clone(&log));

        let (dispatcher, _) =
            dispatcher_with(vec![slow, fine], RuntimeOptions::default()).await;

        let health = dispatcher.trigger_health_check().await.unwrap();
        assert_eq!(health.state, HealthState::Degraded);
        assert_eq!(health.checks["slow"].status, CheckStatus::Warn);
        assert_eq!(
            health.checks["slow"].message.as_deref(),
            Some("cache cold")
        );
    }

    #[tokio::test]
    async fn test_detailed_checks_merge_under_prefixed_keys() {
        let log: Log = Arc::default();
        let mut detailed = RecorderPlugin::new("db", Arc::clone(&log));
        detailed.health = Some(
            HealthReport::healthy()
                .with_check("pool", CheckEntry::pass(Duration::from_millis(1)))
                .with_check("replication", CheckEntry::pass(Duration::from_millis(2))),
        );

        let (dispatcher, _) = dispatcher_with(vec![detailed], RuntimeOptions::default()).await;

        let health = dispatcher.trigger_health_check().await.unwrap();
        assert!(health.checks.contains_key("db:pool"));
        assert!(health.checks.contains_key("db:replication"));
        assert!(!health.checks.contains_key("db"));
    }

    #[tokio::test]
    async fn test_health_hook_failure_records_synthetic_fail() {
        let log: Log = Arc::default();
        let mut broken = RecorderPlugin::new("broken", Arc::clone(&log));
        broken.fail_hooks = true;
        let fine = RecorderPlugin::new("fine", Arc::clone(&log));

        let (dispatcher, _) =
            dispatcher_with(vec![broken, fine], RuntimeOptions::default()).await;

        let health = dispatcher.trigger_health_check().await.unwrap();
        assert_eq!(health.state, HealthState::Unhealthy);
        assert_eq!(health.checks["broken"].status, CheckStatus::Fail);
        assert!(health.checks["broken"]
            .message
            .as_deref()
            .unwrap()
            .contains("deliberate failure"));
        // The healthy plugin was still checked.
        assert_eq!(health.checks["fine"].status, CheckStatus::Pass);
    }

    #[tokio::test]
    async fn test_init_failure_propagates_when_policy_says_so() {
        let log: Log = Arc::default();
        let mut broken = RecorderPlugin::new("broken", Arc::clone(&log));
        broken.fail_hooks = true;
        let unreached = RecorderPlugin::new("unreached", Arc::clone(&log));

        let (dispatcher, _) = dispatcher_with(
            vec![broken, unreached],
            RuntimeOptions {
                continue_on_error: false,
            },
        )
        .await;

        let err = dispatcher.trigger_init().await.unwrap_err();
        assert!(matches!(err, RuntimeError::Hook { .. }));
        // Fan-out aborted before the second plugin.
        assert_eq!(log.lock().clone(), vec!["broken:init"]);
    }

    #[tokio::test]
    async fn test_stop_errors_swallowed_even_with_strict_policy() {
        let log: Log = Arc::default();
        let mut broken = RecorderPlugin::new("broken", Arc::clone(&log));
        broken.fail_hooks = true;
        let fine = RecorderPlugin::new("fine", Arc::clone(&log));

        let (dispatcher, _) = dispatcher_with(
            vec![fine, broken],
            RuntimeOptions {
                continue_on_error: false,
            },
        )
        .await;

        // Reverse order: broken first, and its failure must not stop "fine"
        // from getting its stop attempt.
        dispatcher.trigger_stop().await.unwrap();
        assert_eq!(log.lock().clone(), vec!["broken:stop", "fine:stop"]);
    }

    #[tokio::test]
    async fn test_triggers_read_active_set_fresh() {
        let log: Log = Arc::default();
        let (dispatcher, registry) = dispatcher_with(
            vec![
                RecorderPlugin::new("a", Arc::clone(&log)),
                RecorderPlugin::new("b", Arc::clone(&log)),
            ],
            RuntimeOptions::default(),
        )
        .await;

        dispatcher.trigger_init().await.unwrap();
        registry.deactivate("a").await.unwrap();
        dispatcher.trigger_init().await.unwrap();

        assert_eq!(log.lock().clone(), vec!["a:init", "b:init", "b:init"]);
    }
}
