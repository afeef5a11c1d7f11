//! In-memory mock host for integration tests
//!
//! `MockHost` is a cheap-clone handle over shared state, so a test can hand
//! one clone to the session and keep another to advance the clock, swap the
//! spectrum, or inspect wiring.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use earhorn::{
    AudioGraph, ContextId, HostError, NodeKind, NodeRef, Recorder, RecorderEvent,
};

struct HostInner {
    destination: Option<NodeRef>,
    edges: Vec<(NodeRef, NodeRef)>,
    disconnects: Vec<(NodeRef, NodeRef)>,
    spectrum: Vec<u8>,
    now: i64,
    analysers_created: usize,
    recorder_chunks: Vec<Vec<u8>>,
    capture_supported: bool,
}

#[derive(Clone)]
pub struct MockHost {
    inner: Arc<Mutex<HostInner>>,
}

impl MockHost {
    pub fn new() -> Self {
        let context = ContextId::new();
        Self {
            inner: Arc::new(Mutex::new(HostInner {
                destination: Some(NodeRef::new(context, NodeKind::Destination)),
                edges: Vec::new(),
                disconnects: Vec::new(),
                spectrum: vec![0; 1024],
                now: 1_000,
                analysers_created: 0,
                recorder_chunks: vec![vec![0xAA; 64], vec![0xBB; 64]],
                capture_supported: true,
            })),
        }
    }

    pub fn without_destination() -> Self {
        let host = Self::new();
        host.inner.lock().unwrap().destination = None;
        host
    }

    pub fn context(&self) -> ContextId {
        self.inner.lock().unwrap().destination.unwrap().context
    }

    pub fn terminal(&self) -> NodeRef {
        self.inner.lock().unwrap().destination.unwrap()
    }

    pub fn new_source(&self) -> NodeRef {
        NodeRef::new(self.context(), NodeKind::Source)
    }

    pub fn set_spectrum(&self, spectrum: Vec<u8>) {
        self.inner.lock().unwrap().spectrum = spectrum;
    }

    pub fn advance(&self, millis: i64) {
        self.inner.lock().unwrap().now += millis;
    }

    pub fn set_recorder_chunks(&self, chunks: Vec<Vec<u8>>) {
        self.inner.lock().unwrap().recorder_chunks = chunks;
    }

    pub fn edges(&self) -> Vec<(NodeRef, NodeRef)> {
        self.inner.lock().unwrap().edges.clone()
    }

    pub fn disconnects(&self) -> Vec<(NodeRef, NodeRef)> {
        self.inner.lock().unwrap().disconnects.clone()
    }

    pub fn analysers_created(&self) -> usize {
        self.inner.lock().unwrap().analysers_created
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioGraph for MockHost {
    fn connect(&mut self, source: NodeRef, dest: NodeRef) -> Result<(), HostError> {
        self.inner.lock().unwrap().edges.push((source, dest));
        Ok(())
    }

    fn disconnect(&mut self, source: NodeRef, dest: NodeRef) -> Result<(), HostError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .edges
            .retain(|(s, d)| !(s.id == source.id && d.id == dest.id));
        inner.disconnects.push((source, dest));
        Ok(())
    }

    fn destination(&self) -> Option<NodeRef> {
        self.inner.lock().unwrap().destination
    }

    fn create_analyser(
        &mut self,
        context: ContextId,
        _fft_size: usize,
    ) -> Result<NodeRef, HostError> {
        let mut inner = self.inner.lock().unwrap();
        inner.analysers_created += 1;
        Ok(NodeRef::new(context, NodeKind::Analysis))
    }

    fn read_frequency_data(&self, _analyser: NodeRef, out: &mut [u8]) -> Result<(), HostError> {
        let inner = self.inner.lock().unwrap();
        let n = out.len().min(inner.spectrum.len());
        out[..n].copy_from_slice(&inner.spectrum[..n]);
        Ok(())
    }

    fn create_stream_destination(&mut self, context: ContextId) -> Result<NodeRef, HostError> {
        let inner = self.inner.lock().unwrap();
        if !inner.capture_supported {
            return Err(HostError::Unsupported(
                "mock host capture disabled".to_string(),
            ));
        }
        Ok(NodeRef::new(context, NodeKind::Other))
    }

    fn create_recorder(
        &mut self,
        _dest: NodeRef,
        _mime_type: &str,
    ) -> Result<Box<dyn Recorder>, HostError> {
        let chunks = self.inner.lock().unwrap().recorder_chunks.clone();
        Ok(Box::new(MockRecorder::new(chunks)))
    }

    fn now_millis(&self) -> i64 {
        self.inner.lock().unwrap().now
    }
}

/// Recorder that buffers its configured chunks and emits them, followed by
/// the stop marker, when finalization is requested.
pub struct MockRecorder {
    tx: UnboundedSender<RecorderEvent>,
    rx: Option<UnboundedReceiver<RecorderEvent>>,
    chunks: Vec<Vec<u8>>,
}

impl MockRecorder {
    pub fn new(chunks: Vec<Vec<u8>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Some(rx),
            chunks,
        }
    }
}

impl Recorder for MockRecorder {
    fn start(&mut self, _timeslice: Duration) -> Result<(), HostError> {
        Ok(())
    }

    fn request_stop(&mut self) -> Result<(), HostError> {
        for chunk in self.chunks.drain(..) {
            let _ = self.tx.send(RecorderEvent::Data(chunk));
        }
        let _ = self.tx.send(RecorderEvent::Stopped);
        Ok(())
    }

    fn take_events(&mut self) -> Option<UnboundedReceiver<RecorderEvent>> {
        self.rx.take()
    }
}
