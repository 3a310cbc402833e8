//! Best-effort telemetry for install attempts.
//!
//! Events are fire-and-forget: sinks are infallible by signature, and the
//! orchestrator never waits on one. Losing telemetry can never affect the
//! state machine.

use serde::Serialize;

use crate::detector::DetectionMethod;

/// One telemetry event per install-attempt transition.
///
/// Serializes with kebab-case event names (`attempt-clicked`, ...) matching
/// the analytics wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum TelemetryEvent {
    /// A user triggered an install and the link built successfully.
    AttemptClicked {
        /// Descriptor id
        id: String,
        /// Descriptor display name
        name: String,
    },
    /// The link builder rejected the descriptor.
    AttemptError {
        /// Descriptor id
        id: String,
        /// Descriptor display name
        name: String,
        /// Human-readable rejection reason
        reason: String,
        /// True when the rejection was a security rejection rather than a
        /// shape problem - the split catalog-quality monitoring needs.
        security: bool,
    },
    /// Detection concluded an external handler took over.
    AttemptSucceeded {
        /// Descriptor id
        id: String,
        /// Descriptor display name
        name: String,
        /// Which signal won the race
        method: DetectionMethod,
    },
    /// Detection concluded nothing handled the link.
    AttemptFailed {
        /// Descriptor id
        id: String,
        /// Descriptor display name
        name: String,
        /// The branch that resolved the race (timeout or unknown)
        method: DetectionMethod,
    },
    /// Detection was disabled; success is assumed, not confirmed.
    AssumedSuccess {
        /// Descriptor id
        id: String,
        /// Descriptor display name
        name: String,
    },
}

/// Receives telemetry events. Must never block or fail.
pub trait TelemetrySink: Send + Sync {
    /// Records one event.
    fn record(&self, event: &TelemetryEvent);
}

/// Default sink: structured `tracing` lines under the
/// `applink::telemetry` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record(&self, event: &TelemetryEvent) {
        match serde_json::to_string(event) {
            Ok(payload) => {
                tracing::info!(target: "applink::telemetry", %payload, "telemetry event");
            }
            Err(err) => {
                tracing::warn!(target: "applink::telemetry", error = %err, "unserializable telemetry event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_kebab_case_names() {
        let event = TelemetryEvent::AttemptFailed {
            id: "weather".to_string(),
            name: "Weather".to_string(),
            method: DetectionMethod::Timeout,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "attempt-failed");
        assert_eq!(json["method"], "timeout");
    }

    #[test]
    fn assumed_success_is_a_distinct_event() {
        let event = TelemetryEvent::AssumedSuccess {
            id: "weather".to_string(),
            name: "Weather".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "assumed-success");
    }
}
