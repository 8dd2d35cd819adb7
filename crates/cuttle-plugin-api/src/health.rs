//! Health reporting types
//!
//! Plugins report health through [`HealthReport`]; the runtime merges the
//! reports of every active plugin into one [`AggregatedHealth`] snapshot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Overall health of a plugin or of the aggregated system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Operating normally
    Healthy,
    /// Degraded but still functioning
    Degraded,
    /// Not functioning
    Unhealthy,
}

impl HealthState {
    /// Check if the state is healthy
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthState::Healthy)
    }

    /// Combine two states, keeping the worse one
    ///
    /// `Unhealthy` is sticky: nothing downgrades it back. `Degraded` upgrades
    /// `Healthy` only.
    pub fn worst_of(self, other: HealthState) -> HealthState {
        match (self, other) {
            (HealthState::Unhealthy, _) | (_, HealthState::Unhealthy) => HealthState::Unhealthy,
            (HealthState::Degraded, _) | (_, HealthState::Degraded) => HealthState::Degraded,
            _ => HealthState::Healthy,
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Degraded => write!(f, "degraded"),
            HealthState::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Status of a single named check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// Check passed
    Pass,
    /// Check passed with a warning
    Warn,
    /// Check failed
    Fail,
}

impl From<HealthState> for CheckStatus {
    fn from(state: HealthState) -> Self {
        match state {
            HealthState::Healthy => CheckStatus::Pass,
            HealthState::Degraded => CheckStatus::Warn,
            HealthState::Unhealthy => CheckStatus::Fail,
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Pass => write!(f, "pass"),
            CheckStatus::Warn => write!(f, "warn"),
            CheckStatus::Fail => write!(f, "fail"),
        }
    }
}

/// Result of a single named check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckEntry {
    /// Check status
    pub status: CheckStatus,

    /// Optional message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Time the check took
    #[serde(skip)]
    pub duration: Duration,
}

impl CheckEntry {
    /// Create a passing entry
    pub fn pass(duration: Duration) -> Self {
        Self {
            status: CheckStatus::Pass,
            message: None,
            duration,
        }
    }

    /// Create a failing entry with a message
    pub fn fail(duration: Duration, message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Fail,
            message: Some(message.into()),
            duration,
        }
    }
}

/// Health report returned by a single plugin's health hook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Overall state of the plugin
    pub state: HealthState,

    /// Optional message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Detailed per-check results, when the plugin provides them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<BTreeMap<String, CheckEntry>>,
}

impl HealthReport {
    /// Create a healthy report
    pub fn healthy() -> Self {
        Self {
            state: HealthState::Healthy,
            message: None,
            checks: None,
        }
    }

    /// Create a degraded report with a message
    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            state: HealthState::Degraded,
            message: Some(message.into()),
            checks: None,
        }
    }

    /// Create an unhealthy report with a message
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            state: HealthState::Unhealthy,
            message: Some(message.into()),
            checks: None,
        }
    }

    /// Attach a named check result
    pub fn with_check(mut self, name: impl Into<String>, entry: CheckEntry) -> Self {
        self.checks
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), entry);
        self
    }
}

/// Aggregated health of every active plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedHealth {
    /// Combined state across all plugins
    pub state: HealthState,

    /// Merged check map, keyed `plugin:check` (or `plugin` for synthesized
    /// entries)
    pub checks: BTreeMap<String, CheckEntry>,

    /// When the snapshot was captured
    pub captured_at: chrono::DateTime<chrono::Utc>,
}

impl AggregatedHealth {
    /// Create an empty, healthy snapshot
    pub fn empty() -> Self {
        Self {
            state: HealthState::Healthy,
            checks: BTreeMap::new(),
            captured_at: chrono::Utc::now(),
        }
    }
}
