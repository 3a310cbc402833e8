// Copyright 2024 Paul Adamson
// Licensed under the Apache License, Version 2.0

//! Install-attempt orchestration: the façade install surfaces drive.
//!
//! Sequences builder then detector, emits telemetry for every transition, and
//! exposes the transient state a card UI renders (spinner, fallback prompt,
//! success flash). This is the only stateful component; builder and detector
//! are stateless per call.
//!
//! State is per-instance. Each independent install surface (every card on a
//! directory page) owns its own orchestrator, so one card's fallback prompt
//! can never leak onto another.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use applink_protocol::IntegrationDescriptor;

use crate::detector::{DEFAULT_DETECT_TIMEOUT, Detection, DetectionMethod, HandoffDetector};
use crate::error::BuildError;
use crate::link::{self, BuiltLink};
use crate::telemetry::{TelemetryEvent, TelemetrySink, TracingSink};

/// UI-facing state of the current install attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallState {
    /// No attempt in flight.
    Idle,
    /// Builder is validating the descriptor.
    Building,
    /// Builder rejected the descriptor; `reason` is user-displayable.
    BuildFailed {
        /// Why the descriptor cannot be installed
        reason: String,
    },
    /// Navigation issued, detection race running.
    Racing,
    /// Detection concluded the app took over. `assumed` marks the
    /// optimistic no-detection path - assumed, not confirmed, and the UI
    /// copy must say so.
    Succeeded {
        /// True when success was assumed rather than detected
        assumed: bool,
    },
    /// Detection concluded nothing handled the link; show manual-download
    /// guidance. Dismissable back to [`InstallState::Idle`].
    FallbackNeeded,
}

/// How one [`attempt_install`](InstallOrchestrator::attempt_install) call
/// resolved.
#[derive(Debug)]
pub enum InstallOutcome {
    /// The builder rejected the descriptor; no navigation happened.
    BuildFailed(BuildError),
    /// Detection confirmed the handoff.
    Confirmed(Detection),
    /// Detection gave up; the UI should offer the manual download.
    FallbackNeeded(Detection),
    /// Detection disabled; navigation issued and success assumed after the
    /// fixed delay.
    Assumed,
    /// A newer attempt started while this one was racing; its resolution
    /// was ignored and no state or events were produced for it.
    Superseded,
}

/// Terminal record of one attempt.
#[derive(Debug)]
pub struct InstallReport {
    /// Descriptor the attempt was for.
    pub descriptor_id: String,
    /// How it resolved.
    pub outcome: InstallOutcome,
    /// Advisory warnings from the builder (empty on build failure).
    pub warnings: Vec<String>,
}

/// Orchestrator tuning.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorOptions {
    /// Run the detection race after navigating. When false, the
    /// orchestrator opens the link and assumes success after
    /// `assumed_success_delay`.
    pub detect: bool,
    /// Deadline for the detection race.
    pub detect_timeout: Duration,
    /// Optimistic-path delay between navigation and the assumed-success
    /// transition.
    pub assumed_success_delay: Duration,
    /// How long `Succeeded` stays displayed before auto-clearing to `Idle`.
    pub success_display_window: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            detect: true,
            detect_timeout: DEFAULT_DETECT_TIMEOUT,
            assumed_success_delay: Duration::from_millis(500),
            success_display_window: Duration::from_secs(3),
        }
    }
}

type InstallCallback = Box<dyn Fn(&IntegrationDescriptor) + Send + Sync>;

/// Shared slots the auto-clear task needs after `attempt_install` returns.
struct AttemptState {
    state: Mutex<InstallState>,
    current: Mutex<Option<String>>,
    /// Monotonic attempt counter. A resolution carrying a stale generation
    /// mutates nothing - the orchestrator only holds one active-attempt
    /// context, and a newer attempt owns it.
    generation: AtomicU64,
}

/// Sequences one install attempt at a time and owns its UI state.
pub struct InstallOrchestrator {
    detector: HandoffDetector,
    sink: Arc<dyn TelemetrySink>,
    options: OrchestratorOptions,
    shared: Arc<AttemptState>,
    on_success: Option<InstallCallback>,
    on_failure: Option<InstallCallback>,
}

impl InstallOrchestrator {
    /// Creates an orchestrator with default options and the tracing
    /// telemetry sink.
    pub fn new(detector: HandoffDetector) -> Self {
        Self {
            detector,
            sink: Arc::new(TracingSink),
            options: OrchestratorOptions::default(),
            shared: Arc::new(AttemptState {
                state: Mutex::new(InstallState::Idle),
                current: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
            on_success: None,
            on_failure: None,
        }
    }

    /// Replaces the telemetry sink.
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replaces the options.
    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    /// Registers a callback invoked on confirmed or assumed success.
    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(&IntegrationDescriptor) + Send + Sync + 'static,
    {
        self.on_success = Some(Box::new(callback));
        self
    }

    /// Registers a callback invoked on build failure or failed detection.
    pub fn on_failure<F>(mut self, callback: F) -> Self
    where
        F: Fn(&IntegrationDescriptor) + Send + Sync + 'static,
    {
        self.on_failure = Some(Box::new(callback));
        self
    }

    /// Current UI state.
    pub fn state(&self) -> InstallState {
        self.shared.state.lock().clone()
    }

    /// Whether `descriptor_id` is the attempt this orchestrator is
    /// currently tracking (e.g. "is this card's spinner active").
    pub fn is_current(&self, descriptor_id: &str) -> bool {
        self.shared
            .current
            .lock()
            .as_deref()
            .is_some_and(|current| current == descriptor_id)
    }

    /// Dismisses a terminal state back to [`InstallState::Idle`].
    ///
    /// No-op while an attempt is building or racing.
    pub fn dismiss(&self) {
        let mut cleared = false;
        {
            let mut state = self.shared.state.lock();
            if matches!(
                *state,
                InstallState::BuildFailed { .. }
                    | InstallState::Succeeded { .. }
                    | InstallState::FallbackNeeded
            ) {
                *state = InstallState::Idle;
                cleared = true;
            }
        }
        if cleared {
            *self.shared.current.lock() = None;
        }
    }

    /// Runs one install attempt to its terminal state.
    ///
    /// Build failure resolves immediately - the detector never runs and no
    /// navigation side effect occurs. Otherwise an `attempt-clicked` event
    /// is emitted and the attempt proceeds per
    /// [`OrchestratorOptions::detect`]. Every terminal state produces
    /// exactly one report, at most one callback, and its telemetry event;
    /// a superseded attempt produces only the report.
    ///
    /// Starting a new attempt while one is racing overwrites the tracked
    /// descriptor without cancelling the in-flight race; the browser-level
    /// effects of the earlier navigation already happened and are not
    /// cancellable.
    pub async fn attempt_install(&self, descriptor: &IntegrationDescriptor) -> InstallReport {
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.shared.current.lock() = Some(descriptor.id.clone());
        *self.shared.state.lock() = InstallState::Building;

        let built = match link::build(descriptor) {
            Ok(built) => built,
            Err(err) => return self.resolve_build_failure(generation, descriptor, err),
        };
        for warning in &built.warnings {
            tracing::warn!(id = %descriptor.id, warning, "install link advisory");
        }

        self.sink.record(&TelemetryEvent::AttemptClicked {
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
        });

        if self.options.detect {
            self.race(generation, descriptor, built).await
        } else {
            self.open_and_assume(generation, descriptor, built).await
        }
    }

    fn resolve_build_failure(
        &self,
        generation: u64,
        descriptor: &IntegrationDescriptor,
        err: BuildError,
    ) -> InstallReport {
        self.sink.record(&TelemetryEvent::AttemptError {
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            reason: err.to_string(),
            security: err.is_security_rejection(),
        });
        self.transition(
            generation,
            InstallState::BuildFailed {
                reason: err.to_string(),
            },
        );
        self.notify_failure(descriptor);
        InstallReport {
            descriptor_id: descriptor.id.clone(),
            outcome: InstallOutcome::BuildFailed(err),
            warnings: Vec::new(),
        }
    }

    async fn race(
        &self,
        generation: u64,
        descriptor: &IntegrationDescriptor,
        built: BuiltLink,
    ) -> InstallReport {
        self.transition(generation, InstallState::Racing);
        let detection = self
            .detector
            .detect(&built.uri, self.options.detect_timeout)
            .await;

        if self.is_stale(generation) {
            return self.superseded(descriptor, built.warnings);
        }

        let outcome = if detection.success {
            self.transition(generation, InstallState::Succeeded { assumed: false });
            self.sink.record(&TelemetryEvent::AttemptSucceeded {
                id: descriptor.id.clone(),
                name: descriptor.name.clone(),
                method: detection.method,
            });
            self.notify_success(descriptor);
            self.schedule_clear(generation);
            InstallOutcome::Confirmed(detection)
        } else {
            self.transition(generation, InstallState::FallbackNeeded);
            self.sink.record(&TelemetryEvent::AttemptFailed {
                id: descriptor.id.clone(),
                name: descriptor.name.clone(),
                method: detection.method,
            });
            self.notify_failure(descriptor);
            InstallOutcome::FallbackNeeded(detection)
        };

        InstallReport {
            descriptor_id: descriptor.id.clone(),
            outcome,
            warnings: built.warnings,
        }
    }

    async fn open_and_assume(
        &self,
        generation: u64,
        descriptor: &IntegrationDescriptor,
        built: BuiltLink,
    ) -> InstallReport {
        if let Err(err) = self.detector.open(&built.uri) {
            // The link was valid; the failure is environmental. Classified
            // like a failed detection, not a build error.
            tracing::debug!(id = %descriptor.id, error = %err, "open without detection failed");
            let detection = Detection {
                success: false,
                method: DetectionMethod::Unknown,
                elapsed: Duration::ZERO,
            };
            self.transition(generation, InstallState::FallbackNeeded);
            self.sink.record(&TelemetryEvent::AttemptFailed {
                id: descriptor.id.clone(),
                name: descriptor.name.clone(),
                method: detection.method,
            });
            self.notify_failure(descriptor);
            return InstallReport {
                descriptor_id: descriptor.id.clone(),
                outcome: InstallOutcome::FallbackNeeded(detection),
                warnings: built.warnings,
            };
        }

        tokio::time::sleep(self.options.assumed_success_delay).await;
        if self.is_stale(generation) {
            return self.superseded(descriptor, built.warnings);
        }

        self.transition(generation, InstallState::Succeeded { assumed: true });
        self.sink.record(&TelemetryEvent::AssumedSuccess {
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
        });
        self.notify_success(descriptor);
        self.schedule_clear(generation);
        InstallReport {
            descriptor_id: descriptor.id.clone(),
            outcome: InstallOutcome::Assumed,
            warnings: built.warnings,
        }
    }

    fn superseded(
        &self,
        descriptor: &IntegrationDescriptor,
        warnings: Vec<String>,
    ) -> InstallReport {
        tracing::debug!(id = %descriptor.id, "attempt superseded, resolution ignored");
        InstallReport {
            descriptor_id: descriptor.id.clone(),
            outcome: InstallOutcome::Superseded,
            warnings,
        }
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.shared.generation.load(Ordering::SeqCst) != generation
    }

    fn transition(&self, generation: u64, next: InstallState) {
        if self.is_stale(generation) {
            return;
        }
        *self.shared.state.lock() = next;
    }

    fn notify_success(&self, descriptor: &IntegrationDescriptor) {
        if let Some(callback) = &self.on_success {
            callback(descriptor);
        }
    }

    fn notify_failure(&self, descriptor: &IntegrationDescriptor) {
        if let Some(callback) = &self.on_failure {
            callback(descriptor);
        }
    }

    /// Arms the success auto-clear: after the display window, a still-
    /// current `Succeeded` state drops back to `Idle`.
    fn schedule_clear(&self, generation: u64) {
        let shared = Arc::clone(&self.shared);
        let window = self.options.success_display_window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if shared.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            let mut cleared = false;
            {
                let mut state = shared.state.lock();
                if matches!(*state, InstallState::Succeeded { .. }) {
                    *state = InstallState::Idle;
                    cleared = true;
                }
            }
            if cleared {
                *shared.current.lock() = None;
            }
        });
    }
}

impl std::fmt::Debug for InstallOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallOrchestrator")
            .field("state", &self.state())
            .field("options", &self.options)
            .finish()
    }
}
