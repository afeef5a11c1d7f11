//! Session façade - one owner for tap, analyzer, and capture state
//!
//! A [`TapSession`] is created at session initialization, owns the host
//! graph handle plus all mutable tap/capture state, and is torn down when
//! the session ends. There are no process-wide globals.
//!
//! Everything runs in one cooperative execution context: the `&mut self`
//! methods serialize access, so no locking is needed. The state-machine
//! precondition checks (reject `start_recording` while recording, and so
//! on) do the logical serialization.

use serde_json::json;
use tracing::info;

use crate::analyzer::{self, AnalyzeError, FeatureVector};
use crate::capture::{CaptureConfig, CaptureError, CaptureResult, CaptureSession};
use crate::duration::{self, DurationEstimate, EstimateError};
use crate::host::{AudioGraph, NodeRef};
use crate::tap::{GraphTap, TapConfig, TapError, TapState};

/// Configuration for a session
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub tap: TapConfig,
    pub capture: CaptureConfig,
}

/// Any error a session operation can return
///
/// Not-ready conditions, capability failures, and unexpected host failures
/// all surface here as values; no session operation panics, and nothing is
/// fatal - every failure is recoverable by retrying once preconditions are
/// met.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Tap(#[from] TapError),

    #[error(transparent)]
    Analyze(#[from] AnalyzeError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Estimate(#[from] EstimateError),
}

impl SessionError {
    /// Convert to the `{error, ...}` JSON shape used at the host boundary
    ///
    /// The analyzer's not-connected reply carries `connected: false` so
    /// hosts can probe readiness without parsing message text.
    pub fn to_reply(&self) -> serde_json::Value {
        match self {
            SessionError::Analyze(AnalyzeError::NotConnected) => json!({
                "connected": false,
                "error": self.to_string(),
            }),
            _ => json!({ "error": self.to_string() }),
        }
    }
}

/// A live introspection session over a host audio graph
pub struct TapSession<G: AudioGraph> {
    graph: G,
    tap: GraphTap,
    capture: CaptureSession,
}

impl<G: AudioGraph> TapSession<G> {
    /// Install a session over the host graph with default configuration
    pub fn install(graph: G) -> Result<Self, SessionError> {
        Self::with_config(graph, SessionConfig::default())
    }

    /// Install a session with explicit configuration
    ///
    /// Fails fast when the graph cannot be observed (no terminal output);
    /// the transform size is fixed for the lifetime of the session.
    pub fn with_config(graph: G, config: SessionConfig) -> Result<Self, SessionError> {
        let tap = GraphTap::install(&graph, config.tap)?;
        let capture = CaptureSession::new(config.capture);

        info!("tap session installed");

        Ok(Self {
            graph,
            tap,
            capture,
        })
    }

    /// The wrapped connection primitive
    ///
    /// Hosts must route all node wiring through this instead of the raw
    /// [`AudioGraph::connect`]. Must never block; it runs synchronously on
    /// every graph connection.
    pub fn connect(&mut self, source: NodeRef, dest: NodeRef) -> Result<(), SessionError> {
        self.tap.connect(&mut self.graph, source, dest)?;
        Ok(())
    }

    /// Compute a fresh feature vector from the current spectrum
    pub fn analyze(&mut self) -> Result<FeatureVector, SessionError> {
        Ok(analyzer::analyze(&self.graph, self.tap.state_mut())?)
    }

    /// Start capturing the tapped source
    pub fn start_recording(&mut self) -> Result<(), SessionError> {
        Ok(self.capture.start(&mut self.graph, self.tap.state())?)
    }

    /// Stop capturing and wait for the encoder to finalize
    pub async fn stop_recording(&mut self) -> Result<CaptureResult, SessionError> {
        Ok(self.capture.stop(&mut self.graph).await?)
    }

    /// Estimate a pattern's playback duration from its source text
    pub fn estimate_duration(&self, source: &str) -> Result<DurationEstimate, SessionError> {
        Ok(duration::estimate(source)?)
    }

    pub fn is_recording(&self) -> bool {
        self.capture.is_recording()
    }

    pub fn tap_state(&self) -> &TapState {
        self.tap.state()
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut G {
        &mut self.graph
    }

    /// Tear down tap and capture state
    ///
    /// Any in-flight recording is dropped without finalizing; the capture
    /// fan-out is disconnected where legal. Called automatically on drop.
    pub fn shutdown(&mut self) {
        self.capture.shutdown(&mut self.graph);
        self.tap.clear();
        info!("tap session shut down");
    }
}

impl<G: AudioGraph> Drop for TapSession<G> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
