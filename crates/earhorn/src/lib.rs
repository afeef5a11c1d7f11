//! Earhorn: Non-invasive introspection for live audio graphs
//!
//! Earhorn augments an externally-driven synthesis graph with observation:
//! it taps the output signal path to expose real-time spectral features and
//! can capture that signal to an encoded audio asset on demand. The host
//! keeps full control of the graph; earhorn only watches and records.
//!
//! Four components, wired through one session:
//!
//! - **GraphTap** - wraps the host's connection primitive and splices an
//!   always-on analysis node into output wiring, leaving the audible path
//!   unchanged
//! - **SpectralAnalyzer** - pull-model feature extraction over the tap's
//!   current frequency-domain snapshot
//! - **CaptureSession** - Idle/Recording state machine that records the
//!   tapped source through a second fan-out and finalizes chunks into one
//!   base64-encoded asset
//! - **DurationEstimator** - heuristic scan of pattern source text to bound
//!   an automatic full-pattern capture
//!
//! The host side is abstracted behind [`AudioGraph`]; see `host.rs`. All
//! results are plain serializable data suitable for JSON transport.

pub mod analyzer;
pub mod capture;
pub mod duration;
pub mod host;
pub mod session;
pub mod tap;

pub use analyzer::{
    analyze, features_from_spectrum, AnalyzeError, BandEnergies, Brightness, ConnectionStatus,
    FeatureVector,
};
pub use capture::{CaptureConfig, CaptureError, CaptureResult, CaptureSession};
pub use duration::{estimate, DurationEstimate, EstimateError};
pub use host::{AudioGraph, ContextId, HostError, NodeKind, NodeRef, Recorder, RecorderEvent};
pub use session::{SessionConfig, SessionError, TapSession};
pub use tap::{GraphTap, TapConfig, TapError, TapState};
