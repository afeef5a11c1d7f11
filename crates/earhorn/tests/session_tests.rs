//! End-to-end session tests against the mock host

mod fixtures;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pretty_assertions::assert_eq;

use earhorn::{Brightness, SessionError, TapSession};
use fixtures::MockHost;

#[test]
fn analyze_before_any_connection_is_not_connected() {
    let host = MockHost::new();
    let mut session = TapSession::install(host).unwrap();

    let err = session.analyze().unwrap_err();
    assert_eq!(err.to_string(), "Analyzer not connected");

    let reply = err.to_reply();
    assert_eq!(reply["connected"], false);
    assert_eq!(reply["error"], "Analyzer not connected");
}

#[test]
fn install_fails_without_terminal_output() {
    let host = MockHost::without_destination();
    let result = TapSession::install(host);

    assert!(matches!(result, Err(SessionError::Tap(_))));
}

#[test]
fn non_terminal_wiring_is_forwarded_unmodified() {
    let host = MockHost::new();
    let mut session = TapSession::install(host.clone()).unwrap();

    let source = host.new_source();
    let effect = earhorn::NodeRef::new(host.context(), earhorn::NodeKind::Other);
    session.connect(source, effect).unwrap();

    assert_eq!(host.edges(), vec![(source, effect)]);
    assert_eq!(host.analysers_created(), 0);
    assert!(!session.tap_state().connected);
}

#[test]
fn output_connection_enables_analysis() {
    let host = MockHost::new();
    let mut session = TapSession::install(host.clone()).unwrap();

    let source = host.new_source();
    session.connect(source, host.terminal()).unwrap();

    host.set_spectrum(vec![20; 1024]);
    host.advance(250);

    let features = session.analyze().unwrap();
    assert!(features.connected);
    assert_eq!(features.average, 20.0);
    assert_eq!(features.band_energies.bass, 20);
    assert_eq!(features.brightness_label, Brightness::Bright);
    assert!(features.is_playing);
    assert_eq!(features.connection_status.age_ms, 250);
    assert!(features.connection_status.has_data);
}

#[test]
fn repeated_output_connections_reuse_one_analyser() {
    let host = MockHost::new();
    let mut session = TapSession::install(host.clone()).unwrap();

    session.connect(host.new_source(), host.terminal()).unwrap();
    session.connect(host.new_source(), host.terminal()).unwrap();

    assert_eq!(host.analysers_created(), 1);
    // Each splice is two real connections through the same analyser
    assert_eq!(host.edges().len(), 4);
}

#[test]
fn recording_before_any_playback_is_rejected() {
    let host = MockHost::new();
    let mut session = TapSession::install(host).unwrap();

    let err = session.start_recording().unwrap_err();
    assert_eq!(err.to_string(), "Analyzer not connected - play pattern first");
}

#[tokio::test]
async fn full_capture_round_trip() {
    let host = MockHost::new();
    let mut session = TapSession::install(host.clone()).unwrap();

    session.connect(host.new_source(), host.terminal()).unwrap();

    session.start_recording().unwrap();
    assert!(session.is_recording());

    host.advance(500);
    let result = session.stop_recording().await.unwrap();

    assert!(result.success);
    assert_eq!(result.duration, 0.5);
    assert_eq!(result.format, "webm");
    assert_eq!(result.size_bytes, 128);

    let decoded = STANDARD.decode(&result.audio_data).unwrap();
    assert_eq!(decoded.len(), 128);
    assert!(decoded[..64].iter().all(|&b| b == 0xAA));
    assert!(decoded[64..].iter().all(|&b| b == 0xBB));

    assert!(!session.is_recording());
    // Capture fan-out was torn down; live monitoring path still wired
    assert_eq!(host.disconnects().len(), 1);
    assert_eq!(host.edges().len(), 2);
}

#[tokio::test]
async fn capture_state_machine_rejections() {
    let host = MockHost::new();
    let mut session = TapSession::install(host.clone()).unwrap();

    let err = session.stop_recording().await.unwrap_err();
    assert_eq!(err.to_string(), "Not currently recording");

    session.connect(host.new_source(), host.terminal()).unwrap();
    session.start_recording().unwrap();

    let err = session.start_recording().unwrap_err();
    assert_eq!(err.to_string(), "Already recording");
    assert!(session.is_recording());

    // Still stoppable; the rejected start changed nothing
    host.advance(100);
    let result = session.stop_recording().await.unwrap();
    assert_eq!(result.duration, 0.1);

    // And a fresh capture can begin
    host.set_recorder_chunks(vec![vec![1]]);
    session.start_recording().unwrap();
    host.advance(200);
    let result = session.stop_recording().await.unwrap();
    assert_eq!(result.duration, 0.2);
    assert_eq!(result.size_bytes, 1);
}

#[test]
fn duration_estimates_flow_through_session() {
    let host = MockHost::new();
    let session = TapSession::install(host).unwrap();

    let est = session
        .estimate_duration(r#"setcpm(120) sound("bd").slow(4).slow(2)"#)
        .unwrap();
    assert_eq!(est.cycles_per_minute, 120.0);
    assert_eq!(est.cycle_count, 4.0);
    assert_eq!(est.seconds, 2.0);
    assert_eq!(est.formatted, "0:02");

    let est = session.estimate_duration(r#"sound("bd hh")"#).unwrap();
    assert_eq!(est.seconds, 60.0);
    assert_eq!(est.formatted, "1:00");
}

#[test]
fn feature_vector_serializes_for_transport() {
    let host = MockHost::new();
    let mut session = TapSession::install(host.clone()).unwrap();

    session.connect(host.new_source(), host.terminal()).unwrap();
    host.set_spectrum(vec![10; 1024]);

    let features = session.analyze().unwrap();
    let json = serde_json::to_value(&features).unwrap();

    assert_eq!(json["connected"], true);
    assert_eq!(json["bandEnergies"]["highMid"], 10);
    assert_eq!(json["connectionStatus"]["hasData"], true);
}
