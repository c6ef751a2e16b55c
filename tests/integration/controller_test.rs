//! Integration tests for the playback controller
//!
//! Drives the state machine against the instrumented fake platform.

use crate::test_utils::{encode_samples, sample_payload, FakeAudio, FakePlatform, RecordingDecoder};
use serene_player::audio::{
    EncodedAudioPayload, ErrorCode, OutputEvent, PlaybackController, TransportState,
    SOURCE_SAMPLE_RATE,
};

type TestController = PlaybackController<FakePlatform, RecordingDecoder>;

fn controller(audio: &FakeAudio) -> TestController {
    PlaybackController::with_decoder(audio.platform(), audio.decoder(), SOURCE_SAMPLE_RATE)
}

#[test]
fn test_load_decodes_to_ready_without_acquiring_device() {
    let audio = FakeAudio::new();
    let mut controller = controller(&audio);

    let session = controller.load(&sample_payload());
    let snapshot = controller.snapshot();

    assert_eq!(snapshot.session, Some(session));
    assert_eq!(snapshot.state, TransportState::Ready);
    assert!(!snapshot.is_playing && !snapshot.is_loading && !snapshot.is_finished);
    assert_eq!(snapshot.error, None);
    assert_eq!(snapshot.playback_rate, 1.0);
    assert_eq!(controller.buffer().map(|b| b.frames()), Some(24_000));
    assert_eq!(audio.contexts_opened(), 0);
    assert_eq!(audio.calls(), vec!["decode"]);
}

#[test]
fn test_invalid_payload_errors_and_disables_transport() {
    let audio = FakeAudio::new();
    let mut controller = controller(&audio);

    let session = controller.load(&EncodedAudioPayload::from("@@not base64@@"));

    assert_eq!(controller.state(), TransportState::Errored);
    assert_eq!(controller.error(), Some(ErrorCode::AudioUnavailable));
    assert_eq!(controller.snapshot().error.map(|c| c.key()), Some("player.audioErrorBody"));

    controller.toggle_play_pause(session);
    controller.play(session);

    assert_eq!(controller.state(), TransportState::Errored);
    assert_eq!(audio.contexts_opened(), 0);
    assert_eq!(audio.nodes_started(), 0);
}

#[test]
fn test_odd_length_payload_errors() {
    let audio = FakeAudio::new();
    let mut controller = controller(&audio);

    // Three bytes.
    controller.load(&EncodedAudioPayload::from("AAAB"));

    assert_eq!(controller.error(), Some(ErrorCode::AudioUnavailable));
    assert!(controller.buffer().is_none());
}

#[test]
fn test_toggle_plays_pauses_and_reuses_context() {
    let audio = FakeAudio::new();
    let mut controller = controller(&audio);
    let session = controller.load(&sample_payload());

    controller.toggle_play_pause(session);
    assert_eq!(controller.state(), TransportState::Playing);
    assert!(controller.snapshot().is_playing);
    assert_eq!(audio.open_contexts(), 1);
    assert_eq!(audio.live_nodes(), 1);

    controller.toggle_play_pause(session);
    assert_eq!(controller.state(), TransportState::Ready);
    assert_eq!(audio.live_nodes(), 0);
    assert_eq!(audio.open_contexts(), 1);

    controller.toggle_play_pause(session);
    assert_eq!(controller.state(), TransportState::Playing);
    assert_eq!(audio.nodes_started(), 2);
    assert_eq!(audio.contexts_opened(), 1);
}

#[test]
fn test_resume_restarts_from_beginning_with_fresh_node() {
    let audio = FakeAudio::new();
    let mut controller = controller(&audio);
    let session = controller.load(&sample_payload());

    controller.play(session);
    controller.pause(session);
    controller.play(session);

    // Each play hands the whole buffer to a brand new node.
    assert_eq!(audio.nodes_started(), 2);
    assert_eq!(audio.last_start_frames(), Some(24_000));
    assert_eq!(audio.live_nodes(), 1);
}

#[test]
fn test_natural_end_finishes_once_and_releases_resources() {
    let audio = FakeAudio::new();
    let mut controller = controller(&audio);
    let session = controller.load(&sample_payload());
    controller.play(session);

    assert!(audio.finish_newest());
    let event = controller.poll_output_ended();

    assert!(matches!(event, Some(OutputEvent::Ended(_))));
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.state, TransportState::Finished);
    assert!(snapshot.is_finished);
    assert!(!snapshot.is_playing);
    assert!(!controller.has_active_output());
    assert_eq!(audio.open_contexts(), 0);

    // Finished is terminal for the session.
    assert_eq!(controller.poll_output_ended(), None);
    controller.toggle_play_pause(session);
    controller.play(session);
    assert_eq!(controller.state(), TransportState::Finished);
    assert_eq!(audio.nodes_started(), 1);
}

#[test]
fn test_poll_without_completion_is_quiet() {
    let audio = FakeAudio::new();
    let mut controller = controller(&audio);
    let session = controller.load(&sample_payload());

    assert_eq!(controller.poll_output_ended(), None);
    controller.play(session);
    assert_eq!(controller.poll_output_ended(), None);
    assert_eq!(controller.state(), TransportState::Playing);
}

#[test]
fn test_completion_of_stopped_node_is_ignored() {
    let audio = FakeAudio::new();
    let mut controller = controller(&audio);
    let session = controller.load(&sample_payload());

    controller.play(session);
    let first = controller.active_output().unwrap();
    controller.pause(session);
    controller.play(session);

    // The first node's subscription was dropped on pause.
    assert!(!audio.finish_oldest());
    assert_eq!(controller.poll_output_ended(), None);

    controller.handle_output_ended(first);
    assert_eq!(controller.state(), TransportState::Playing);
    assert!(controller.has_active_output());
}

#[test]
fn test_pause_swallows_already_stopped() {
    let audio = FakeAudio::new();
    audio.set_stop_reports_already_stopped(true);
    let mut controller = controller(&audio);
    let session = controller.load(&sample_payload());

    controller.play(session);
    controller.pause(session);

    assert_eq!(controller.state(), TransportState::Ready);
    assert_eq!(controller.error(), None);
}

#[test]
fn test_toggle_twice_swallows_already_stopped() {
    let audio = FakeAudio::new();
    audio.set_stop_reports_already_stopped(true);
    let mut controller = controller(&audio);
    let session = controller.load(&sample_payload());

    controller.toggle_play_pause(session);
    assert_eq!(controller.state(), TransportState::Playing);
    controller.toggle_play_pause(session);

    assert_eq!(controller.state(), TransportState::Ready);
    assert_eq!(controller.error(), None);
    assert!(!controller.has_active_output());
}

#[test]
fn test_new_payload_tears_down_before_decoding() {
    let audio = FakeAudio::new();
    let mut controller = controller(&audio);
    let first = controller.load(&sample_payload());
    controller.play(first);
    audio.clear_calls();

    let second = controller.load(&encode_samples(&[1, 2, 3, 4]));

    assert_ne!(first, second);
    assert_eq!(audio.calls(), vec!["stop", "close", "decode"]);
    assert_eq!(audio.live_nodes(), 0);
    assert_eq!(audio.open_contexts(), 0);
    assert_eq!(controller.state(), TransportState::Ready);
    assert_eq!(controller.buffer().map(|b| b.frames()), Some(4));
}

#[test]
fn test_superseded_session_controls_are_noops() {
    let audio = FakeAudio::new();
    let mut controller = controller(&audio);
    let old = controller.load(&sample_payload());
    let current = controller.load(&sample_payload());
    audio.clear_calls();

    controller.toggle_play_pause(old);
    controller.play(old);
    controller.set_playback_rate(old, 2.0);

    assert!(audio.calls().is_empty());
    assert_eq!(controller.current_session(), Some(current));
    assert_eq!(controller.state(), TransportState::Ready);
    assert_eq!(controller.snapshot().playback_rate, 1.0);
}

#[test]
fn test_rate_applies_on_next_play_and_live() {
    let audio = FakeAudio::new();
    let mut controller = controller(&audio);
    let session = controller.load(&sample_payload());

    controller.set_playback_rate(session, 1.5);
    assert_eq!(controller.snapshot().playback_rate, 1.5);
    controller.play(session);
    assert!(audio.calls().contains(&"start_output(1.5)".to_string()));

    controller.set_playback_rate(session, 0.75);
    assert_eq!(audio.last_rate(), Some(0.75));
    assert_eq!(controller.snapshot().playback_rate, 0.75);
    assert_eq!(controller.state(), TransportState::Playing);
}

#[test]
fn test_invalid_rates_are_ignored() {
    let audio = FakeAudio::new();
    let mut controller = controller(&audio);
    let session = controller.load(&sample_payload());
    controller.set_playback_rate(session, 1.25);

    for rate in [0.0, -1.0, f32::NAN, f32::INFINITY] {
        controller.set_playback_rate(session, rate);
    }

    assert_eq!(controller.snapshot().playback_rate, 1.25);
}

#[test]
fn test_rate_accepted_while_loading_and_toggle_ignored() {
    let audio = FakeAudio::new();
    let mut controller = controller(&audio);

    let session = controller.begin_session(&sample_payload());
    assert!(controller.snapshot().is_loading);

    controller.toggle_play_pause(session);
    controller.set_playback_rate(session, 1.75);
    assert_eq!(controller.state(), TransportState::Loading);

    controller.complete_load(session);
    controller.play(session);
    assert_eq!(audio.last_rate(), Some(1.75));
}

#[test]
fn test_rate_resets_for_new_session() {
    let audio = FakeAudio::new();
    let mut controller = controller(&audio).with_default_rate(1.25);
    let session = controller.load(&sample_payload());
    assert_eq!(controller.snapshot().playback_rate, 1.25);

    controller.set_playback_rate(session, 2.0);
    controller.load(&sample_payload());

    assert_eq!(controller.snapshot().playback_rate, 1.25);
}

#[test]
fn test_device_unavailable_errors_session() {
    let audio = FakeAudio::new();
    audio.set_fail_open(true);
    let mut controller = controller(&audio);
    let session = controller.load(&sample_payload());

    controller.play(session);

    assert_eq!(controller.state(), TransportState::Errored);
    assert_eq!(controller.error(), Some(ErrorCode::DeviceUnavailable));

    // No retry from Errored.
    audio.set_fail_open(false);
    controller.toggle_play_pause(session);
    assert_eq!(audio.contexts_opened(), 0);
}

#[test]
fn test_start_failure_releases_context() {
    let audio = FakeAudio::new();
    audio.set_fail_start(true);
    let mut controller = controller(&audio);
    let session = controller.load(&sample_payload());

    controller.play(session);

    assert_eq!(controller.error(), Some(ErrorCode::DeviceUnavailable));
    assert_eq!(audio.open_contexts(), 0);
    assert_eq!(audio.calls().last().map(String::as_str), Some("close"));
}

#[test]
fn test_lost_output_returns_to_ready() {
    let audio = FakeAudio::new();
    let mut controller = controller(&audio);
    let session = controller.load(&sample_payload());
    controller.play(session);

    audio.lose_newest();
    let event = controller.poll_output_ended();

    assert!(matches!(event, Some(OutputEvent::Lost(_))));
    assert_eq!(controller.state(), TransportState::Ready);

    controller.play(session);
    assert_eq!(controller.state(), TransportState::Playing);
}

#[test]
fn test_unload_is_idempotent() {
    let audio = FakeAudio::new();
    let mut controller = controller(&audio);
    let session = controller.load(&sample_payload());
    controller.play(session);

    controller.unload();
    controller.unload();

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.state, TransportState::Idle);
    assert_eq!(snapshot.session, None);
    assert_eq!(audio.live_nodes(), 0);
    assert_eq!(audio.open_contexts(), 0);
}

#[test]
fn test_drop_releases_resources() {
    let audio = FakeAudio::new();
    {
        let mut controller = controller(&audio);
        let session = controller.load(&sample_payload());
        controller.play(session);
        assert_eq!(audio.open_contexts(), 1);
    }
    assert_eq!(audio.live_nodes(), 0);
    assert_eq!(audio.open_contexts(), 0);
}

#[test]
fn test_empty_payload_plays_and_finishes() {
    let audio = FakeAudio::new();
    let mut controller = controller(&audio);
    let session = controller.load(&EncodedAudioPayload::from(""));

    assert_eq!(controller.state(), TransportState::Ready);
    controller.play(session);
    assert_eq!(audio.last_start_frames(), Some(0));

    audio.finish_newest();
    controller.poll_output_ended();
    assert_eq!(controller.state(), TransportState::Finished);
}

#[tokio::test]
async fn test_async_completion_delivery() {
    let audio = FakeAudio::new();
    let mut controller = controller(&audio);
    let session = controller.load(&sample_payload());
    controller.play(session);

    let signaller = audio.clone();
    tokio::spawn(async move {
        tokio::task::yield_now().await;
        signaller.finish_newest();
    });

    let event = controller.output_ended().await;
    controller.handle_output_event(event);

    assert_eq!(controller.state(), TransportState::Finished);
}
