//! Capture session - record the tapped source to an encoded asset
//!
//! Records the same source node the tap observed into a second, independent
//! fan-out so the live monitoring path is untouched:
//!
//! ```text
//!   source ──▶ analyser ──▶ destination     (live path, untouched)
//!      │
//!      └─────▶ capture destination ──▶ encoder ──▶ chunks
//! ```
//!
//! State machine is `Idle → Recording → Idle` with no pause/resume. One
//! capture at a time; a second `start()` is rejected, never queued. `stop()`
//! is the only suspending operation: it waits for the encoder's single
//! finalize event before resolving, with no timeout of its own.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::host::{AudioGraph, HostError, NodeRef, Recorder, RecorderEvent};
use crate::tap::TapState;

/// Default encoder emission interval
pub const DEFAULT_TIMESLICE: Duration = Duration::from_millis(100);

/// Default encoder MIME type: opus in a webm container
pub const DEFAULT_MIME_TYPE: &str = "audio/webm;codecs=opus";

/// Configuration for capture sessions
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// MIME type requested from the host's encoder
    pub mime_type: String,
    /// Container label reported in [`CaptureResult::format`]
    pub format: String,
    /// How often the encoder emits chunks
    pub timeslice: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            format: "webm".to_string(),
            timeslice: DEFAULT_TIMESLICE,
        }
    }
}

/// Finalized capture, ready for JSON transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
    pub success: bool,
    /// Wall-clock capture length in seconds, 1 decimal
    pub duration: f64,
    /// Size of the concatenated encoded blob
    pub size_bytes: usize,
    pub format: String,
    /// Base64 of the encoded blob
    pub audio_data: String,
}

/// Errors from capture operations
///
/// The first four are expected not-ready states a caller routinely probes
/// for; their messages are stable.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not currently recording")]
    NotRecording,

    #[error("Analyzer not connected - play pattern first")]
    AnalyzerNotConnected,

    #[error("Source node not available - play pattern first")]
    SourceUnavailable,

    #[error("Stream capture not supported by this host: {0}")]
    Unsupported(String),

    /// The recorder's event channel closed before its stop marker arrived
    #[error("recorder event channel closed before finalize")]
    FinalizeLost,

    #[error(transparent)]
    Host(HostError),
}

impl From<HostError> for CaptureError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::Unsupported(msg) => CaptureError::Unsupported(msg),
            other => CaptureError::Host(other),
        }
    }
}

/// Records the tapped source into an encoded audio asset
#[derive(Default)]
pub struct CaptureSession {
    config: CaptureConfig,
    recording: bool,
    recorder: Option<Box<dyn Recorder>>,
    events: Option<UnboundedReceiver<RecorderEvent>>,
    chunks: Vec<Vec<u8>>,
    started_at_millis: i64,
    source: Option<NodeRef>,
    capture_dest: Option<NodeRef>,
}

impl CaptureSession {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Begin recording the tapped source
    ///
    /// Requires that the tap has both an analyser and an observed source
    /// node, i.e. something has played since session start.
    pub fn start<G: AudioGraph + ?Sized>(
        &mut self,
        graph: &mut G,
        tap: &TapState,
    ) -> Result<(), CaptureError> {
        if self.recording {
            return Err(CaptureError::AlreadyRecording);
        }
        if tap.analyser.is_none() {
            return Err(CaptureError::AnalyzerNotConnected);
        }
        let source = tap.source.ok_or(CaptureError::SourceUnavailable)?;

        let capture_dest = graph.create_stream_destination(source.context)?;

        // Second, independent fan-out; the live monitoring path is untouched.
        graph.connect(source, capture_dest)?;

        let mut recorder = graph.create_recorder(capture_dest, &self.config.mime_type)?;
        let events = recorder.take_events().ok_or_else(|| {
            CaptureError::Host(HostError::Backend(
                "recorder provided no event channel".to_string(),
            ))
        })?;
        recorder.start(self.config.timeslice)?;

        self.recorder = Some(recorder);
        self.events = Some(events);
        self.chunks.clear();
        self.started_at_millis = graph.now_millis();
        self.source = Some(source);
        self.capture_dest = Some(capture_dest);
        self.recording = true;

        info!(
            mime_type = %self.config.mime_type,
            timeslice_ms = self.config.timeslice.as_millis() as u64,
            "capture started"
        );

        Ok(())
    }

    /// Finalize the recording and return the encoded asset
    ///
    /// Waits for the encoder's finalize event; there is no cancellation once
    /// the stop has been requested.
    pub async fn stop<G: AudioGraph + ?Sized>(
        &mut self,
        graph: &mut G,
    ) -> Result<CaptureResult, CaptureError> {
        if !self.recording {
            return Err(CaptureError::NotRecording);
        }

        // Leave the recorder in place until the stop request is accepted, so
        // a host error here keeps the session stoppable.
        self.recorder
            .as_mut()
            .ok_or(CaptureError::NotRecording)?
            .request_stop()?;

        let mut finalize_lost = false;
        match self.events.take() {
            Some(mut events) => loop {
                match events.recv().await {
                    Some(RecorderEvent::Data(chunk)) => {
                        if !chunk.is_empty() {
                            self.chunks.push(chunk);
                        }
                    }
                    Some(RecorderEvent::Stopped) => break,
                    None => {
                        finalize_lost = true;
                        break;
                    }
                }
            },
            None => finalize_lost = true,
        }

        let blob: Vec<u8> = self.chunks.concat();
        let duration =
            ((graph.now_millis() - self.started_at_millis) as f64 / 1000.0 * 10.0).round() / 10.0;

        // The fan-out comes down on every exit path, including a lost
        // finalize; a failed disconnect must not discard a finished capture.
        let source = self.source.take();
        let capture_dest = self.capture_dest.take();
        self.reset();

        if let (Some(source), Some(dest)) = (source, capture_dest) {
            if source.same_context(&dest) {
                if let Err(err) = graph.disconnect(source, dest) {
                    warn!(%err, "capture fan-out disconnect failed; wiring left for context teardown");
                }
            } else {
                // Cross-context disconnect is invalid on the host side; leave
                // the wiring for context teardown.
                debug!(
                    source_context = %source.context,
                    dest_context = %dest.context,
                    "skipping cross-context capture disconnect"
                );
            }
        }

        if finalize_lost {
            return Err(CaptureError::FinalizeLost);
        }

        let result = CaptureResult {
            success: true,
            duration,
            size_bytes: blob.len(),
            format: self.config.format.clone(),
            audio_data: STANDARD.encode(&blob),
        };

        info!(
            duration = result.duration,
            size_bytes = result.size_bytes,
            format = %result.format,
            "capture finalized"
        );

        Ok(result)
    }

    /// Tear down without finalizing; any in-flight chunks are dropped
    pub fn shutdown<G: AudioGraph + ?Sized>(&mut self, graph: &mut G) {
        if let (Some(source), Some(dest)) = (self.source, self.capture_dest) {
            if source.same_context(&dest) {
                let _ = graph.disconnect(source, dest);
            }
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.recording = false;
        self.recorder = None;
        self.events = None;
        self.chunks.clear();
        self.source = None;
        self.capture_dest = None;
    }
}
