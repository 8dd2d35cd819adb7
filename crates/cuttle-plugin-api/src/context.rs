//! Hook context types
//!
//! Plain value types handed to plugin hooks. The orchestrator is host-framework
//! neutral, so requests, responses, routes and sockets are carried as open
//! string/JSON structures rather than any particular wire representation.

use crate::plugin::ConfigMap;
use crate::services::{InMemoryServices, ServiceContainer};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Context handed to every plugin hook
///
/// Carries the host service container and the plugin's effective
/// configuration at the time of the call.
#[derive(Clone)]
pub struct PluginContext {
    /// Host service container
    pub services: Arc<dyn ServiceContainer>,

    /// Effective configuration (runtime override else built-in default)
    pub config: ConfigMap,
}

impl PluginContext {
    /// Create a new plugin context
    pub fn new(services: Arc<dyn ServiceContainer>, config: ConfigMap) -> Self {
        Self { services, config }
    }
}

impl Default for PluginContext {
    fn default() -> Self {
        Self {
            services: Arc::new(InMemoryServices::new()),
            config: ConfigMap::new(),
        }
    }
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("services", &self.services.registered_services())
            .field("config", &self.config)
            .finish()
    }
}

/// Request context provided to request hooks
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique request ID
    pub request_id: String,

    /// Request method
    pub method: String,

    /// Request path
    pub path: String,

    /// Request headers
    pub headers: HashMap<String, String>,

    /// Request body, when one was supplied
    pub body: Option<serde_json::Value>,

    /// Request start time
    pub start_time: Instant,

    /// Custom metadata
    pub metadata: HashMap<String, serde_json::Value>,
}

impl RequestContext {
    /// Create a new request context
    pub fn new(
        request_id: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            method: method.into(),
            path: path.into(),
            headers: HashMap::new(),
            body: None,
            start_time: Instant::now(),
            metadata: HashMap::new(),
        }
    }

    /// Attach a header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Attach a body
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Get elapsed time since request start
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Response value returned by a short-circuiting plugin
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PluginResponse {
    /// HTTP-style status code
    pub status: u16,

    /// Response headers
    pub headers: HashMap<String, String>,

    /// Response body
    pub body: serde_json::Value,
}

impl PluginResponse {
    /// Create a response with the given status and body
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body,
        }
    }

    /// Attach a header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// Response context provided to response hooks
#[derive(Debug, Clone)]
pub struct ResponseContext {
    /// Request ID (from the request context)
    pub request_id: String,

    /// HTTP-style status code
    pub status_code: u16,

    /// Total request duration
    pub duration: Duration,

    /// Custom metadata
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ResponseContext {
    /// Create a new response context
    pub fn new(request_id: impl Into<String>, status_code: u16, duration: Duration) -> Self {
        Self {
            request_id: request_id.into(),
            status_code,
            duration,
            metadata: HashMap::new(),
        }
    }

    /// Check if the response was successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Check if the response was a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code)
    }

    /// Check if the response was a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status_code)
    }
}

/// Error context provided to error hooks
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Error message
    pub message: String,

    /// Request ID, when the error arose while handling a request
    pub request_id: Option<String>,

    /// Plugin that originated the error, when known
    pub source: Option<String>,
}

impl ErrorContext {
    /// Create a new error context
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            request_id: None,
            source: None,
        }
    }
}

/// A single route definition in the route pipeline
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RouteDef {
    /// Route name
    pub name: String,

    /// Route path pattern
    pub path: String,

    /// Accepted methods
    pub methods: Vec<String>,
}

impl RouteDef {
    /// Create a new route definition
    pub fn new(name: impl Into<String>, path: impl Into<String>, methods: Vec<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            methods,
        }
    }
}

/// Build context provided to build hooks
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Build target
    pub target: String,

    /// Build options
    pub options: ConfigMap,
}

impl BuildContext {
    /// Create a new build context
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            options: ConfigMap::new(),
        }
    }
}

/// Outcome of a finished build
#[derive(Debug, Clone)]
pub struct BuildSummary {
    /// Build target
    pub target: String,

    /// Time the build took
    pub duration: Duration,

    /// Whether the build succeeded
    pub success: bool,
}

/// Underlying transport of a bidirectional connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketKind {
    /// WebSocket connection
    WebSocket,
    /// Raw TCP connection
    Tcp,
}

impl fmt::Display for SocketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketKind::WebSocket => write!(f, "websocket"),
            SocketKind::Tcp => write!(f, "tcp"),
        }
    }
}

/// Socket context provided to socket hooks
#[derive(Debug, Clone)]
pub struct SocketContext {
    /// Connection ID
    pub connection_id: String,

    /// Transport kind discriminator
    pub kind: SocketKind,

    /// Remote peer address, when known
    pub remote_addr: Option<String>,

    /// Custom metadata
    pub metadata: HashMap<String, serde_json::Value>,
}

impl SocketContext {
    /// Create a new socket context
    pub fn new(connection_id: impl Into<String>, kind: SocketKind) -> Self {
        Self {
            connection_id: connection_id.into(),
            kind,
            remote_addr: None,
            metadata: HashMap::new(),
        }
    }
}

/// Scheduled-task context provided to schedule hooks
#[derive(Debug, Clone)]
pub struct ScheduleContext {
    /// Task name
    pub task: String,

    /// When the task was scheduled to fire
    pub scheduled_at: chrono::DateTime<chrono::Utc>,
}

impl ScheduleContext {
    /// Create a context for a task firing now
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            scheduled_at: chrono::Utc::now(),
        }
    }
}

/// Hot-reload context provided to hot-reload hooks
#[derive(Debug, Clone)]
pub struct HotReloadContext {
    /// Path that changed
    pub path: PathBuf,

    /// Plugin that was reloaded, when the change mapped to one
    pub plugin: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_context() {
        let ctx = RequestContext::new("req-123", "GET", "/api/users")
            .with_header("accept", "application/json");

        assert_eq!(ctx.request_id, "req-123");
        assert_eq!(ctx.headers.get("accept").map(String::as_str), Some("application/json"));
        assert!(ctx.body.is_none());
        assert!(ctx.elapsed().as_secs() < 1);
    }

    #[test]
    fn test_response_context_status_classes() {
        let ok = ResponseContext::new("req-1", 204, Duration::from_millis(3));
        assert!(ok.is_success());
        assert!(!ok.is_client_error());

        let missing = ResponseContext::new("req-2", 404, Duration::from_millis(3));
        assert!(missing.is_client_error());

        let broken = ResponseContext::new("req-3", 502, Duration::from_millis(3));
        assert!(broken.is_server_error());
    }

    #[test]
    fn test_socket_kind_display() {
        assert_eq!(SocketKind::WebSocket.to_string(), "websocket");
        assert_eq!(SocketKind::Tcp.to_string(), "tcp");
    }
}
