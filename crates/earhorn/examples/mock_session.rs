//! Drive a full earhorn session against an in-memory mock host
//!
//! Run with: cargo run -p earhorn --example mock_session

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use earhorn::{
    AudioGraph, ContextId, HostError, NodeKind, NodeRef, Recorder, RecorderEvent, TapSession,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let host = ToyHost::new();
    let mut session = TapSession::install(host.clone())?;

    println!("Probing before anything has played:");
    match session.analyze() {
        Ok(_) => println!("  unexpected feature vector"),
        Err(err) => println!("  {}", err.to_reply()),
    }

    // The host wires a pattern source to its terminal output through the
    // session; the tap splices an analyser in transparently.
    let source = NodeRef::new(host.context(), NodeKind::Source);
    session.connect(source, host.terminal())?;

    host.set_spectrum(demo_spectrum());
    let features = session.analyze()?;
    println!("\nSpectral features:");
    println!("{}", serde_json::to_string_pretty(&features)?);

    let pattern = r#"setcpm(120) sound("bd hh sd hh").slow(4)"#;
    let estimate = session.estimate_duration(pattern)?;
    println!(
        "\nPattern runs an estimated {}s ({})",
        estimate.seconds, estimate.formatted
    );

    session.start_recording()?;
    host.advance((estimate.seconds * 1000.0) as i64);
    let capture = session.stop_recording().await?;
    println!(
        "\nCaptured {}s of {} audio, {} bytes ({} base64 chars)",
        capture.duration,
        capture.format,
        capture.size_bytes,
        capture.audio_data.len()
    );

    Ok(())
}

/// Low-heavy spectrum with a mid-range peak
fn demo_spectrum() -> Vec<u8> {
    (0..1024)
        .map(|i| match i {
            0..=7 => 180,
            8..=63 => 120,
            64..=127 => 90,
            128..=511 => 30,
            _ => 5,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Toy host: just enough of an audio graph to exercise the session
// ---------------------------------------------------------------------------

struct ToyInner {
    destination: NodeRef,
    edges: Vec<(NodeRef, NodeRef)>,
    spectrum: Vec<u8>,
    now: i64,
}

#[derive(Clone)]
struct ToyHost {
    inner: Arc<Mutex<ToyInner>>,
}

impl ToyHost {
    fn new() -> Self {
        let context = ContextId::new();
        Self {
            inner: Arc::new(Mutex::new(ToyInner {
                destination: NodeRef::new(context, NodeKind::Destination),
                edges: Vec::new(),
                spectrum: vec![0; 1024],
                now: 0,
            })),
        }
    }

    fn context(&self) -> ContextId {
        self.inner.lock().unwrap().destination.context
    }

    fn terminal(&self) -> NodeRef {
        self.inner.lock().unwrap().destination
    }

    fn set_spectrum(&self, spectrum: Vec<u8>) {
        self.inner.lock().unwrap().spectrum = spectrum;
    }

    fn advance(&self, millis: i64) {
        self.inner.lock().unwrap().now += millis;
    }
}

impl AudioGraph for ToyHost {
    fn connect(&mut self, source: NodeRef, dest: NodeRef) -> Result<(), HostError> {
        self.inner.lock().unwrap().edges.push((source, dest));
        Ok(())
    }

    fn disconnect(&mut self, source: NodeRef, dest: NodeRef) -> Result<(), HostError> {
        self.inner
            .lock()
            .unwrap()
            .edges
            .retain(|(s, d)| !(s.id == source.id && d.id == dest.id));
        Ok(())
    }

    fn destination(&self) -> Option<NodeRef> {
        Some(self.inner.lock().unwrap().destination)
    }

    fn create_analyser(
        &mut self,
        context: ContextId,
        _fft_size: usize,
    ) -> Result<NodeRef, HostError> {
        Ok(NodeRef::new(context, NodeKind::Analysis))
    }

    fn read_frequency_data(&self, _analyser: NodeRef, out: &mut [u8]) -> Result<(), HostError> {
        let inner = self.inner.lock().unwrap();
        let n = out.len().min(inner.spectrum.len());
        out[..n].copy_from_slice(&inner.spectrum[..n]);
        Ok(())
    }

    fn create_stream_destination(&mut self, context: ContextId) -> Result<NodeRef, HostError> {
        Ok(NodeRef::new(context, NodeKind::Other))
    }

    fn create_recorder(
        &mut self,
        _dest: NodeRef,
        _mime_type: &str,
    ) -> Result<Box<dyn Recorder>, HostError> {
        Ok(Box::new(ToyRecorder::new()))
    }

    fn now_millis(&self) -> i64 {
        self.inner.lock().unwrap().now
    }
}

struct ToyRecorder {
    tx: UnboundedSender<RecorderEvent>,
    rx: Option<UnboundedReceiver<RecorderEvent>>,
}

impl ToyRecorder {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx: Some(rx) }
    }
}

impl Recorder for ToyRecorder {
    fn start(&mut self, _timeslice: Duration) -> Result<(), HostError> {
        Ok(())
    }

    fn request_stop(&mut self) -> Result<(), HostError> {
        // Stand-in for encoder output: a few fixed-size chunks
        for seed in 0..4u8 {
            let _ = self.tx.send(RecorderEvent::Data(vec![seed; 256]));
        }
        let _ = self.tx.send(RecorderEvent::Stopped);
        Ok(())
    }

    fn take_events(&mut self) -> Option<UnboundedReceiver<RecorderEvent>> {
        self.rx.take()
    }
}
