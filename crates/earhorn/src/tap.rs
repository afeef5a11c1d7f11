//! Graph tap - transparent observation of the output signal path
//!
//! The tap wraps the host's connection primitive. Non-terminal wiring is
//! forwarded untouched; a connection whose destination is the terminal
//! output sink is spliced so the signal also flows through an always-on
//! frequency-analysis node:
//!
//! ```text
//!   source ──▶ destination            (what the host asked for)
//!
//!   source ──▶ analyser ──▶ destination   (what actually gets wired)
//! ```
//!
//! The audible path is unchanged; the analyser is a pass-through with a
//! readable magnitude spectrum. One analyser exists per execution context
//! and is reused across repeated output connections.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::host::{AudioGraph, ContextId, HostError, NodeKind, NodeRef};

/// Default spectral transform size, fixed for the session lifetime
pub const DEFAULT_FFT_SIZE: usize = 2048;

/// Configuration for the graph tap
#[derive(Debug, Clone)]
pub struct TapConfig {
    /// Transform size of the analysis node; the frequency buffer holds
    /// `fft_size / 2` bins
    pub fft_size: usize,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
        }
    }
}

/// Observable state of the tap, read by the analyzer and capture session
#[derive(Debug, Default)]
pub struct TapState {
    /// Analysis node spliced into the most recent output connection
    pub analyser: Option<NodeRef>,
    /// Reusable frequency-bin buffer, `fft_size / 2` bytes once allocated
    pub frequency_buffer: Option<Vec<u8>>,
    /// True once an output connection has been spliced
    pub connected: bool,
    /// Timestamp of the most recent splice
    pub connected_at_millis: i64,
    /// The source node observed wiring into the terminal output
    pub source: Option<NodeRef>,
}

/// Errors from tap installation and interception
#[derive(Debug, thiserror::Error)]
pub enum TapError {
    #[error("host graph exposes no terminal output; nothing to intercept")]
    NoTerminalOutput,

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Intercepts output wiring and maintains [`TapState`]
pub struct GraphTap {
    config: TapConfig,
    state: TapState,
    /// One analysis node per execution context, reused across installs
    /// and repeated output connections
    analysers: HashMap<ContextId, NodeRef>,
}

impl GraphTap {
    /// Install the tap over the host's connection primitive
    ///
    /// Fails fast when the host exposes no terminal output sink - a graph
    /// with nothing to intercept must be rejected at install time rather
    /// than silently left unobserved.
    pub fn install<G: AudioGraph + ?Sized>(graph: &G, config: TapConfig) -> Result<Self, TapError> {
        if graph.destination().is_none() {
            return Err(TapError::NoTerminalOutput);
        }

        info!(fft_size = config.fft_size, "graph tap installed");

        Ok(Self {
            config,
            state: TapState::default(),
            analysers: HashMap::new(),
        })
    }

    /// The wrapped connection primitive
    ///
    /// Hosts call this instead of [`AudioGraph::connect`]. Destination is
    /// the terminal sink: splice in the analyser and record the source.
    /// Anything else: forward the connection unmodified.
    pub fn connect<G: AudioGraph + ?Sized>(
        &mut self,
        graph: &mut G,
        source: NodeRef,
        dest: NodeRef,
    ) -> Result<(), TapError> {
        let is_terminal = graph
            .destination()
            .map(|d| d.id == dest.id)
            .unwrap_or(false);

        debug!(
            source_kind = source.kind.as_str(),
            dest_kind = dest.kind.as_str(),
            is_terminal,
            "connection intercepted"
        );

        if !is_terminal {
            graph.connect(source, dest)?;
            return Ok(());
        }

        let analyser = self.analyser_for(graph, source.context)?;

        graph.connect(source, analyser)?;
        graph.connect(analyser, dest)?;

        self.state.analyser = Some(analyser);
        if self.state.frequency_buffer.is_none() {
            self.state.frequency_buffer = Some(vec![0; self.config.fft_size / 2]);
        }
        self.state.connected = true;
        self.state.connected_at_millis = graph.now_millis();
        self.state.source = Some(source);

        info!(
            source_kind = source.kind.as_str(),
            context = %source.context,
            "output connection spliced through analyser"
        );

        Ok(())
    }

    /// Get or create the analysis node for an execution context
    fn analyser_for<G: AudioGraph + ?Sized>(
        &mut self,
        graph: &mut G,
        context: ContextId,
    ) -> Result<NodeRef, TapError> {
        if let Some(existing) = self.analysers.get(&context) {
            debug!(context = %context, "reusing existing analyser");
            return Ok(*existing);
        }

        let analyser = graph.create_analyser(context, self.config.fft_size)?;
        debug_assert_eq!(analyser.kind, NodeKind::Analysis);
        self.analysers.insert(context, analyser);
        debug!(context = %context, fft_size = self.config.fft_size, "created analyser");

        Ok(analyser)
    }

    pub fn config(&self) -> &TapConfig {
        &self.config
    }

    pub fn state(&self) -> &TapState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut TapState {
        &mut self.state
    }

    /// Number of distinct analysis nodes created so far
    pub fn analyser_count(&self) -> usize {
        self.analysers.len()
    }

    /// Drop all tap state; used at session teardown
    pub fn clear(&mut self) {
        self.state = TapState::default();
        self.analysers.clear();
    }
}
