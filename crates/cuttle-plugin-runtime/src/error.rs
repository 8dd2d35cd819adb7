//! Plugin runtime error types

use cuttle_plugin_api::PluginError;
use std::fmt;
use std::path::Path;

/// Plugin runtime error type
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Plugin already registered under this name
    #[error("Plugin already registered: {0}")]
    AlreadyRegistered(String),

    /// Plugin not found
    #[error("Plugin not found: {0}")]
    NotFound(String),

    /// Plugin is in the wrong lifecycle state for the requested transition
    #[error("Plugin '{plugin}' is {state}, expected {expected}")]
    InvalidState {
        /// Plugin name
        plugin: String,
        /// Actual state
        state: String,
        /// State(s) the operation requires
        expected: String,
    },

    /// A declared dependency is not active
    #[error("Cannot activate '{plugin}': dependency '{dependency}' is {state}")]
    DependencyNotActive {
        /// Plugin being activated
        plugin: String,
        /// Offending dependency
        dependency: String,
        /// The dependency's actual state, or `undefined` if never registered
        state: String,
    },

    /// Dependency cycle detected
    #[error("Dependency cycle detected: {}", path.join(" -> "))]
    DependencyCycle {
        /// The full cycle path; the first element conceptually repeats at the
        /// end
        path: Vec<String>,
    },

    /// Declared dependencies are absent from the registry
    #[error("Missing dependencies: {}", format_missing(missing))]
    MissingDependencies {
        /// Per-plugin lists of missing dependency names
        missing: Vec<(String, Vec<String>)>,
    },

    /// Configuration rejected by the plugin's validator
    #[error("Configuration rejected for '{plugin}': {message}")]
    ConfigRejected {
        /// Plugin name
        plugin: String,
        /// Validator message
        message: String,
    },

    /// Dependency version requirement not met
    #[error("Plugin '{plugin}' requires '{dependency}' {required}, found {found}")]
    VersionConflict {
        /// Plugin declaring the requirement
        plugin: String,
        /// Dependency name
        dependency: String,
        /// Declared requirement
        required: String,
        /// Version actually registered
        found: String,
    },

    /// A plugin-supplied hook failed
    #[error("Plugin error in '{plugin}': {message}")]
    Hook {
        /// Plugin name
        plugin: String,
        /// Hook error message
        message: String,
    },

    /// Loading a plugin from a file failed
    #[error("Failed to load plugin from '{path}': {message}")]
    Loader {
        /// Offending path
        path: String,
        /// Loader message
        message: String,
    },

    /// File watcher error
    #[error("File watcher error: {0}")]
    Watcher(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

fn format_missing(missing: &[(String, Vec<String>)]) -> String {
    missing
        .iter()
        .map(|(plugin, deps)| format!("{} -> [{}]", plugin, deps.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for plugin runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

impl RuntimeError {
    /// Create a new already-registered error
    pub fn already_registered(name: impl fmt::Display) -> Self {
        Self::AlreadyRegistered(name.to_string())
    }

    /// Create a new plugin-not-found error
    pub fn not_found(name: impl fmt::Display) -> Self {
        Self::NotFound(name.to_string())
    }

    /// Create a new invalid-state error
    pub fn invalid_state(
        plugin: impl fmt::Display,
        state: impl fmt::Display,
        expected: impl fmt::Display,
    ) -> Self {
        Self::InvalidState {
            plugin: plugin.to_string(),
            state: state.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Create a new hook error from a plugin failure
    pub fn hook(plugin: impl fmt::Display, err: &PluginError) -> Self {
        Self::Hook {
            plugin: plugin.to_string(),
            message: err.to_string(),
        }
    }

    /// Create a new loader error carrying the offending path
    pub fn loader(path: &Path, message: impl fmt::Display) -> Self {
        Self::Loader {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }
}
