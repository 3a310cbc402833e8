// Copyright 2024 Paul Adamson
// Licensed under the Apache License, Version 2.0

//! Handoff detection: navigate to an install link and classify whether an
//! external protocol handler intercepted it.
//!
//! There is no acknowledgment channel. An app that handles the scheme takes
//! OS focus away from the page; an unregistered scheme is usually a silent
//! no-op. So detection is a race: passive focus-loss signals against a
//! timeout, first branch wins, everything else is torn down immediately.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::Result;
use crate::link::HandoffUri;
use crate::signals::{PageSignal, SignalBus};

/// Default time to wait for a focus-loss signal before giving up.
///
/// Long enough for the OS confirmation dialog handshake on slow machines,
/// short enough that a user without the app isn't staring at a spinner. If
/// the handshake outlasts this, a real installation is misreported as
/// failure - an accepted limitation of signal-only detection, tunable per
/// call, not something to fix by waiting forever.
pub const DEFAULT_DETECT_TIMEOUT: Duration = Duration::from_millis(2500);

/// Performs the actual navigation to a custom-scheme URI.
///
/// Implementations point a hidden embedded navigation context (an offscreen
/// frame in a webview host) at the URI and remove it shortly after,
/// independent of outcome. The OS takes it from there; nothing about the
/// handler resolution is observable through this trait.
pub trait Navigator: Send + Sync {
    /// Attempts the navigation. Errors indicate the attempt itself was
    /// disallowed (e.g. a sandboxed context), not that no handler exists.
    fn navigate(&self, uri: &str) -> Result<()>;
}

/// Which race branch resolved a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    /// Page visibility went hidden - strongest success signal.
    Visibility,
    /// Window lost focus without a visibility change.
    Blur,
    /// Neither signal arrived before the deadline.
    Timeout,
    /// The navigation attempt itself failed.
    Unknown,
}

impl DetectionMethod {
    /// Wire/telemetry name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::Visibility => "visibility",
            DetectionMethod::Blur => "blur",
            DetectionMethod::Timeout => "timeout",
            DetectionMethod::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one detection race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    /// Whether an external handler is believed to have taken over.
    pub success: bool,
    /// The branch that won the race.
    pub method: DetectionMethod,
    /// Wall time from just before navigation to resolution.
    pub elapsed: Duration,
}

impl Detection {
    fn resolved(success: bool, method: DetectionMethod, elapsed: Duration) -> Self {
        tracing::debug!(
            success,
            method = method.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            "handoff detection resolved"
        );
        Self {
            success,
            method,
            elapsed,
        }
    }
}

/// Races passive focus-loss signals against a timeout to classify a handoff.
///
/// Stateless per invocation; the same detector can serve any number of
/// sequential attempts.
pub struct HandoffDetector {
    navigator: Arc<dyn Navigator>,
    signals: Arc<SignalBus>,
}

impl HandoffDetector {
    /// Creates a detector over the given navigation seam and signal bus.
    pub fn new(navigator: Arc<dyn Navigator>, signals: Arc<SignalBus>) -> Self {
        Self { navigator, signals }
    }

    /// The signal bus host environments feed page signals into.
    pub fn signals(&self) -> &Arc<SignalBus> {
        &self.signals
    }

    /// Navigates to `uri` and waits for the first of visibility-hidden,
    /// window-blur, or the timeout.
    ///
    /// Waiters are armed before navigating so a handler that grabs focus
    /// instantly cannot win unobserved. Exactly one branch resolves; the
    /// losing branches are dropped the moment a winner is picked, and the
    /// bus prunes their entries on its next emit. A navigation error
    /// resolves immediately as a failed detection with method
    /// [`DetectionMethod::Unknown`] - it never propagates.
    pub async fn detect(&self, uri: &HandoffUri, timeout: Duration) -> Detection {
        let visibility = self
            .signals
            .register_waiter(|s| matches!(s, PageSignal::VisibilityHidden));
        let blur = self
            .signals
            .register_waiter(|s| matches!(s, PageSignal::WindowBlur));

        let started = Instant::now();
        tracing::debug!(timeout_ms = timeout.as_millis() as u64, "starting handoff detection");

        if let Err(err) = self.navigator.navigate(uri.as_str()) {
            tracing::debug!(error = %err, "handoff navigation failed");
            return Detection::resolved(false, DetectionMethod::Unknown, started.elapsed());
        }

        tokio::select! {
            biased;
            result = visibility => match result {
                Ok(_) => Detection::resolved(true, DetectionMethod::Visibility, started.elapsed()),
                Err(_) => Detection::resolved(false, DetectionMethod::Unknown, started.elapsed()),
            },
            result = blur => match result {
                Ok(_) => Detection::resolved(true, DetectionMethod::Blur, started.elapsed()),
                Err(_) => Detection::resolved(false, DetectionMethod::Unknown, started.elapsed()),
            },
            _ = tokio::time::sleep(timeout) => {
                Detection::resolved(false, DetectionMethod::Timeout, started.elapsed())
            }
        }
    }

    /// Navigates without classification, for contexts that don't need
    /// detection. Returns as soon as the navigation was attempted.
    pub fn open(&self, uri: &HandoffUri) -> Result<()> {
        self.navigator.navigate(uri.as_str())
    }
}
