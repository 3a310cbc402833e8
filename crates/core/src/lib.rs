//! applink: install-link building and handoff detection for AppLink.
//!
//! The AppLink directory page lets a user hand a catalog connector off to
//! the locally installed AppLink desktop app through its custom URI scheme,
//! then infers - from passive focus-loss signals only - whether the app
//! actually took over. This crate is that core, as a library: no UI, no
//! persistence, no fetching.
//!
//! Data flows one way: descriptor to validated URI, to attempted navigation,
//! to classified outcome, to UI state transition.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use applink::{HandoffDetector, InstallOrchestrator, InstallState, SignalBus};
//!
//! # async fn run(navigator: Arc<dyn applink::Navigator>, descriptor: applink_protocol::IntegrationDescriptor) {
//! // One orchestrator per install surface; the host webview bridge feeds
//! // visibility/blur signals into the bus.
//! let signals = Arc::new(SignalBus::new());
//! let orchestrator = InstallOrchestrator::new(HandoffDetector::new(navigator, Arc::clone(&signals)));
//!
//! let report = orchestrator.attempt_install(&descriptor).await;
//! if orchestrator.state() == InstallState::FallbackNeeded {
//!     // show the manual-download prompt
//! }
//! # }
//! ```

pub mod detector;
pub mod error;
pub mod link;
pub mod orchestrator;
pub mod signals;
pub mod telemetry;

pub use detector::{
    DEFAULT_DETECT_TIMEOUT, Detection, DetectionMethod, HandoffDetector, Navigator,
};
pub use error::{BuildError, Error, Result};
pub use link::{
    BuildOptions, BuiltLink, HandoffUri, MAX_URI_LENGTH, SCHEME_PREFIX, build, build_with,
    command_preview,
};
pub use orchestrator::{
    InstallOrchestrator, InstallOutcome, InstallReport, InstallState, OrchestratorOptions,
};
pub use signals::{PageSignal, SignalBus};
pub use telemetry::{TelemetryEvent, TelemetrySink, TracingSink};

// Re-export the catalog wire types for convenience
pub use applink_protocol;
