//! Refresh telemetry
//!
//! Sinks are fire-and-forget: they return nothing and must not block or fail
//! the refresh that reports to them.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{error, info};

use crate::cache::ArtifactId;
use crate::freshness::FreshnessStatus;

/// Named refresh events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TelemetryEvent {
    #[serde(rename = "refresh-triggered")]
    RefreshTriggered,
    #[serde(rename = "refresh-complete")]
    RefreshComplete,
    #[serde(rename = "refresh-failed")]
    RefreshFailed,
}

impl TelemetryEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            TelemetryEvent::RefreshTriggered => "refresh-triggered",
            TelemetryEvent::RefreshComplete => "refresh-complete",
            TelemetryEvent::RefreshFailed => "refresh-failed",
        }
    }
}

impl fmt::Display for TelemetryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Properties attached to every refresh event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryProperties {
    pub artifact_id: String,
    pub previous_status: FreshnessStatus,
    /// Event-specific extras (e.g. the checksum of a written artifact)
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl TelemetryProperties {
    pub fn new(artifact: &ArtifactId, previous_status: FreshnessStatus) -> Self {
        Self {
            artifact_id: artifact.to_string(),
            previous_status,
            extra: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Receives refresh events and errors
pub trait TelemetrySink: Send + Sync {
    fn send_event(&self, event: TelemetryEvent, properties: &TelemetryProperties);

    fn send_exception(&self, error: &(dyn std::error::Error + 'static), properties: &TelemetryProperties);
}

/// Emits telemetry as structured `tracing` events on the `telemetry` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn send_event(&self, event: TelemetryEvent, properties: &TelemetryProperties) {
        let extra = serde_json::to_string(&properties.extra).unwrap_or_default();
        info!(
            target: "telemetry",
            event = event.as_str(),
            artifact_id = %properties.artifact_id,
            previous_status = %properties.previous_status,
            extra = %extra,
            "event"
        );
    }

    fn send_exception(&self, error: &(dyn std::error::Error + 'static), properties: &TelemetryProperties) {
        error!(
            target: "telemetry",
            artifact_id = %properties.artifact_id,
            previous_status = %properties.previous_status,
            error = %error,
            "exception"
        );
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTelemetry;

impl TelemetrySink for NullTelemetry {
    fn send_event(&self, _event: TelemetryEvent, _properties: &TelemetryProperties) {}

    fn send_exception(&self, _error: &(dyn std::error::Error + 'static), _properties: &TelemetryProperties) {}
}
