//! Lifecycle event bus
//!
//! Internal lifecycle events are a closed tagged union ([`PluginEvent`]) for
//! type safety; caller-defined custom events travel through the same bus via
//! [`PluginEvent::Custom`]. Listeners subscribe by event name (or `"*"` for
//! everything) and are invoked in subscription order; a broadcast channel is
//! exposed for stream-style consumers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

/// Event emitted by the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PluginEvent {
    /// Plugin was registered
    Registered {
        /// Plugin name
        plugin: String,
    },
    /// Plugin was installed
    Installed {
        /// Plugin name
        plugin: String,
    },
    /// Plugin was activated
    Activated {
        /// Plugin name
        plugin: String,
    },
    /// Plugin was deactivated
    Deactivated {
        /// Plugin name
        plugin: String,
    },
    /// Plugin was uninstalled
    Uninstalled {
        /// Plugin name
        plugin: String,
    },
    /// Plugin was replaced by a fresh registration
    Replaced {
        /// Plugin name
        plugin: String,
    },
    /// Plugin configuration was updated
    ConfigUpdated {
        /// Plugin name
        plugin: String,
    },
    /// Plugin was reloaded from disk
    Reloaded {
        /// Plugin name
        plugin: String,
    },
    /// A plugin operation or hook failed
    Error {
        /// Plugin name
        plugin: String,
        /// Error message
        message: String,
    },
    /// Caller-defined event
    Custom {
        /// Event name
        name: String,
        /// Event payload
        payload: serde_json::Value,
    },
}

impl PluginEvent {
    /// Wire name of the event
    pub fn name(&self) -> &str {
        match self {
            PluginEvent::Registered { .. } => "plugin:registered",
            PluginEvent::Installed { .. } => "plugin:installed",
            PluginEvent::Activated { .. } => "plugin:activated",
            PluginEvent::Deactivated { .. } => "plugin:deactivated",
            PluginEvent::Uninstalled { .. } => "plugin:uninstalled",
            PluginEvent::Replaced { .. } => "plugin:replaced",
            PluginEvent::ConfigUpdated { .. } => "plugin:config:updated",
            PluginEvent::Reloaded { .. } => "plugin:reloaded",
            PluginEvent::Error { .. } => "plugin:error",
            PluginEvent::Custom { name, .. } => name,
        }
    }

    /// Plugin the event concerns, when it concerns one
    pub fn plugin(&self) -> Option<&str> {
        match self {
            PluginEvent::Registered { plugin }
            | PluginEvent::Installed { plugin }
            | PluginEvent::Activated { plugin }
            | PluginEvent::Deactivated { plugin }
            | PluginEvent::Uninstalled { plugin }
            | PluginEvent::Replaced { plugin }
            | PluginEvent::ConfigUpdated { plugin }
            | PluginEvent::Reloaded { plugin }
            | PluginEvent::Error { plugin, .. } => Some(plugin),
            PluginEvent::Custom { .. } => None,
        }
    }
}

/// Identifier handed back by [`EventBus::on`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Event listener callback
pub type Listener = Arc<dyn Fn(&PluginEvent) + Send + Sync>;

struct RegisteredListener {
    id: ListenerId,
    event: String,
    listener: Listener,
}

/// Named-event publish/subscribe bus
pub struct EventBus {
    listeners: parking_lot::RwLock<Vec<RegisteredListener>>,
    next_id: AtomicU64,
    sender: broadcast::Sender<PluginEvent>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            listeners: parking_lot::RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
            sender,
        }
    }

    /// Subscribe a listener to an event name
    ///
    /// `"*"` subscribes to every event. Returns the id to pass to
    /// [`off`](EventBus::off).
    pub fn on(&self, event: impl Into<String>, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.write().push(RegisteredListener {
            id,
            event: event.into(),
            listener,
        });
        id
    }

    /// Unsubscribe a listener, returning whether it existed
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    /// Emit an event to every matching listener, in subscription order
    pub fn emit(&self, event: PluginEvent) {
        trace!(event = event.name(), "Emitting event");

        // Stream-style consumers; no receiver is not an error.
        let _ = self.sender.send(event.clone());

        let listeners = self.listeners.read();
        for registered in listeners.iter() {
            if registered.event == "*" || registered.event == event.name() {
                (registered.listener)(&event);
            }
        }
    }

    /// Emit a caller-defined event
    pub fn emit_custom(&self, name: impl Into<String>, payload: serde_json::Value) {
        self.emit(PluginEvent::Custom {
            name: name.into(),
            payload,
        });
    }

    /// Create a broadcast receiver carrying every emitted event
    pub fn subscribe(&self) -> broadcast::Receiver<PluginEvent> {
        self.sender.subscribe()
    }

    /// Number of subscribed listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Remove every listener
    pub fn clear(&self) {
        self.listeners.write().clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_on_emit_off() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        let seen = Arc::clone(&count);
        let id = bus.on(
            "plugin:registered",
            Arc::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.emit(PluginEvent::Registered {
            plugin: "db".into(),
        });
        bus.emit(PluginEvent::Activated {
            plugin: "db".into(),
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert!(bus.off(id));
        assert!(!bus.off(id));

        bus.emit(PluginEvent::Registered {
            plugin: "db".into(),
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wildcard_listener_sees_everything() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        let seen = Arc::clone(&count);
        bus.on(
            "*",
            Arc::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.emit(PluginEvent::Registered {
            plugin: "a".into(),
        });
        bus.emit_custom("cache:flushed", serde_json::json!({"entries": 10}));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_custom_events_match_their_own_name() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        let seen = Arc::clone(&count);
        bus.on(
            "cache:flushed",
            Arc::new(move |event| {
                assert_eq!(event.name(), "cache:flushed");
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.emit_custom("cache:flushed", serde_json::Value::Null);
        bus.emit_custom("cache:warmed", serde_json::Value::Null);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_broadcast_receiver() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(PluginEvent::Installed {
            plugin: "db".into(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "plugin:installed");
        assert_eq!(event.plugin(), Some("db"));
    }
}
