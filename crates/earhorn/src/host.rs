//! Host environment abstraction
//!
//! Earhorn never drives an audio backend directly. The host owns the live
//! synthesis graph and hands the session an [`AudioGraph`] implementation;
//! the session wraps the host's connection primitive once at install time
//! and the host routes all wiring through the wrapper from then on.
//!
//! Node identity is explicit: every handle carries its execution context and
//! a tagged [`NodeKind`], so the tap branches on real variants instead of
//! inspecting runtime type names.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

/// Kind of node a handle points at, as known to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A signal-producing node (oscillator, sample player, ...)
    Source,
    /// A frequency-analysis node created through [`AudioGraph::create_analyser`]
    Analysis,
    /// The terminal output sink of an execution context
    Destination,
    /// Anything else (effects, gain stages, stream destinations, ...)
    Other,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Source => "source",
            NodeKind::Analysis => "analysis",
            NodeKind::Destination => "destination",
            NodeKind::Other => "other",
        }
    }
}

/// Identity of an execution context within the host
///
/// Nodes can only be wired to nodes in the same context; earhorn uses
/// context equality to decide whether a disconnect is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(pub Uuid);

impl ContextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle to a node in the host's graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub id: Uuid,
    pub context: ContextId,
    pub kind: NodeKind,
}

impl NodeRef {
    pub fn new(context: ContextId, kind: NodeKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            context,
            kind,
        }
    }

    /// True when both handles belong to the same execution context
    pub fn same_context(&self, other: &NodeRef) -> bool {
        self.context == other.context
    }
}

/// Errors surfaced by host primitives
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("operation not supported by host: {0}")]
    Unsupported(String),

    #[error("unknown node: {0}")]
    UnknownNode(Uuid),

    #[error("host backend error: {0}")]
    Backend(String),
}

/// Event emitted by a [`Recorder`] on its event channel
///
/// The host contract: after [`Recorder::request_stop`], any remaining
/// `Data` events are delivered followed by exactly one `Stopped`. Exactly
/// one `Stopped` resolves exactly one pending stop.
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    /// One encoded chunk, emitted roughly once per timeslice
    Data(Vec<u8>),
    /// The encoder has finalized; no further events follow
    Stopped,
}

/// An encoder bound to a capturable stream destination
pub trait Recorder: Send {
    /// Begin encoding, emitting a chunk roughly every `timeslice`
    fn start(&mut self, timeslice: Duration) -> Result<(), HostError>;

    /// Request asynchronous finalization
    fn request_stop(&mut self) -> Result<(), HostError>;

    /// Take the event receiver; yields chunks then the final `Stopped` marker.
    /// Returns `None` if already taken.
    fn take_events(&mut self) -> Option<UnboundedReceiver<RecorderEvent>>;
}

/// The host's graph primitives, consumed by the session
///
/// `connect` here is the *raw* primitive. Hosts must not call it directly
/// once a session is installed; all wiring goes through
/// [`crate::TapSession::connect`], which forwards or splices as needed.
pub trait AudioGraph: Send {
    /// Wire one node to another (raw primitive, wrapped by the tap)
    fn connect(&mut self, source: NodeRef, dest: NodeRef) -> Result<(), HostError>;

    /// Remove the wiring between two nodes
    fn disconnect(&mut self, source: NodeRef, dest: NodeRef) -> Result<(), HostError>;

    /// The terminal output sink, if this host exposes one
    fn destination(&self) -> Option<NodeRef>;

    /// Create a frequency-analysis node with a fixed transform size
    fn create_analyser(
        &mut self,
        context: ContextId,
        fft_size: usize,
    ) -> Result<NodeRef, HostError>;

    /// Copy the current byte-valued magnitude spectrum into `out`
    ///
    /// `out.len()` equals half the analyser's transform size; one byte per
    /// frequency bin, 0-255.
    fn read_frequency_data(&self, analyser: NodeRef, out: &mut [u8]) -> Result<(), HostError>;

    /// Create a capturable stream destination in the given context
    ///
    /// Hosts that cannot capture return [`HostError::Unsupported`].
    fn create_stream_destination(&mut self, context: ContextId) -> Result<NodeRef, HostError>;

    /// Create an encoder bound to a stream destination
    fn create_recorder(
        &mut self,
        dest: NodeRef,
        mime_type: &str,
    ) -> Result<Box<dyn Recorder>, HostError>;

    /// Monotonic wall-clock milliseconds
    fn now_millis(&self) -> i64;
}
