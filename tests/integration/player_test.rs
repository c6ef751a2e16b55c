//! Integration tests for the async player service

use crate::test_utils::{sample_payload, FakeAudio};
use serene_player::audio::{
    EncodedAudioPayload, ErrorCode, PlaybackController, TransportState, SOURCE_SAMPLE_RATE,
};
use serene_player::player::{
    Player, PlayerError, PlayerHandle, PlayerStateUpdate, COMMAND_BUFFER_SIZE,
    STATE_UPDATE_CAPACITY,
};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

fn spawn_player(audio: &FakeAudio) -> (PlayerHandle, JoinHandle<()>) {
    let controller =
        PlaybackController::with_decoder(audio.platform(), audio.decoder(), SOURCE_SAMPLE_RATE);
    let (mut player, handle) = Player::new(controller, STATE_UPDATE_CAPACITY, COMMAND_BUFFER_SIZE);
    let task = tokio::spawn(async move { player.run().await });
    (handle, task)
}

async fn wait_for<F>(
    updates: &mut broadcast::Receiver<PlayerStateUpdate>,
    matches: F,
) -> PlayerStateUpdate
where
    F: Fn(&PlayerStateUpdate) -> bool,
{
    let wait = async {
        loop {
            match updates.recv().await {
                Ok(update) if matches(&update) => return update,
                Ok(_) => continue,
                Err(e) => panic!("state updates ended: {}", e),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(2), wait)
        .await
        .expect("timed out waiting for state update")
}

#[tokio::test]
async fn test_load_broadcasts_loading_then_ready() {
    let audio = FakeAudio::new();
    let (handle, _task) = spawn_player(&audio);
    let mut updates = handle.subscribe();

    let controls = handle.load(sample_payload()).await.unwrap();

    let loading = wait_for(&mut updates, |u| matches!(u, PlayerStateUpdate::StateChanged(_))).await;
    assert!(matches!(loading, PlayerStateUpdate::StateChanged(s) if s.is_loading));
    let ready = wait_for(&mut updates, |u| matches!(u, PlayerStateUpdate::StateChanged(_))).await;
    assert!(
        matches!(ready, PlayerStateUpdate::StateChanged(s) if s.state == TransportState::Ready && s.session == Some(controls.session()))
    );
}

#[tokio::test]
async fn test_toggle_and_natural_end() {
    let audio = FakeAudio::new();
    let (handle, _task) = spawn_player(&audio);
    let mut updates = handle.subscribe();
    let controls = handle.load(sample_payload()).await.unwrap();

    controls.toggle_play_pause().await.unwrap();
    let snapshot = controls.snapshot().await.unwrap();
    assert!(snapshot.is_playing);
    assert_eq!(audio.live_nodes(), 1);

    assert!(audio.finish_newest());
    wait_for(&mut updates, |u| matches!(u, PlayerStateUpdate::StateChanged(s) if s.is_finished)).await;

    let snapshot = controls.snapshot().await.unwrap();
    assert_eq!(snapshot.state, TransportState::Finished);
    assert!(!snapshot.is_playing);
    assert_eq!(audio.open_contexts(), 0);
}

#[tokio::test]
async fn test_pause_then_resume() {
    let audio = FakeAudio::new();
    let (handle, _task) = spawn_player(&audio);
    let controls = handle.load(sample_payload()).await.unwrap();

    controls.play().await.unwrap();
    controls.pause().await.unwrap();
    assert_eq!(controls.snapshot().await.unwrap().state, TransportState::Ready);

    controls.toggle_play_pause().await.unwrap();
    assert!(controls.snapshot().await.unwrap().is_playing);
    assert_eq!(audio.nodes_started(), 2);
}

#[tokio::test]
async fn test_decode_failure_broadcasts_error() {
    let audio = FakeAudio::new();
    let (handle, _task) = spawn_player(&audio);
    let mut updates = handle.subscribe();

    let controls = handle.load(EncodedAudioPayload::from("%%%")).await.unwrap();

    let update = wait_for(&mut updates, |u| matches!(u, PlayerStateUpdate::Error { .. })).await;
    assert_eq!(
        update,
        PlayerStateUpdate::Error {
            session: controls.session(),
            code: ErrorCode::AudioUnavailable
        }
    );
    let snapshot = controls.snapshot().await.unwrap();
    assert_eq!(snapshot.error, Some(ErrorCode::AudioUnavailable));
    assert!(!snapshot.controls_enabled());
}

#[tokio::test]
async fn test_rate_change_is_broadcast_and_applied_live() {
    let audio = FakeAudio::new();
    let (handle, _task) = spawn_player(&audio);
    let mut updates = handle.subscribe();
    let controls = handle.load(sample_payload()).await.unwrap();
    controls.play().await.unwrap();

    controls.set_playback_rate(1.5).await.unwrap();

    let update = wait_for(&mut updates, |u| matches!(u, PlayerStateUpdate::RateChanged { .. })).await;
    assert_eq!(
        update,
        PlayerStateUpdate::RateChanged {
            session: controls.session(),
            rate: 1.5
        }
    );
    assert_eq!(audio.last_rate(), Some(1.5));
    assert!(controls.snapshot().await.unwrap().is_playing);
}

#[tokio::test]
async fn test_superseded_controls_are_inert() {
    let audio = FakeAudio::new();
    let (handle, _task) = spawn_player(&audio);
    let old = handle.load(sample_payload()).await.unwrap();
    old.play().await.unwrap();

    let current = handle.load(sample_payload()).await.unwrap();
    assert_eq!(audio.live_nodes(), 0);

    old.toggle_play_pause().await.unwrap();
    old.set_playback_rate(2.0).await.unwrap();

    let old_view = old.snapshot().await.unwrap();
    assert_eq!(old_view.state, TransportState::Idle);
    assert!(!old_view.is_playing);

    let current_view = current.snapshot().await.unwrap();
    assert_eq!(current_view.state, TransportState::Ready);
    assert_eq!(current_view.playback_rate, 1.0);
    assert_eq!(audio.live_nodes(), 0);
}

#[tokio::test]
async fn test_superseded_snapshot_keeps_its_own_rate() {
    let audio = FakeAudio::new();
    let (handle, _task) = spawn_player(&audio);
    let old = handle.load(sample_payload()).await.unwrap();
    old.set_playback_rate(1.5).await.unwrap();

    let current = handle.load(sample_payload()).await.unwrap();
    current.set_playback_rate(2.0).await.unwrap();

    let old_view = old.snapshot().await.unwrap();
    assert_eq!(old_view.state, TransportState::Idle);
    assert_eq!(old_view.playback_rate, 1.5);
    assert_eq!(current.snapshot().await.unwrap().playback_rate, 2.0);
}

#[tokio::test]
async fn test_superseded_before_rate_change_reports_starting_rate() {
    let audio = FakeAudio::new();
    let (handle, _task) = spawn_player(&audio);
    let old = handle.load(sample_payload()).await.unwrap();
    let current = handle.load(sample_payload()).await.unwrap();
    current.set_playback_rate(0.75).await.unwrap();

    assert_eq!(old.snapshot().await.unwrap().playback_rate, 1.0);
}

#[tokio::test]
async fn test_shutdown_releases_resources() {
    let audio = FakeAudio::new();
    let (handle, task) = spawn_player(&audio);
    let mut updates = handle.subscribe();
    let controls = handle.load(sample_payload()).await.unwrap();
    controls.play().await.unwrap();

    handle.shutdown().await.unwrap();
    wait_for(&mut updates, |u| *u == PlayerStateUpdate::Stopped).await;
    task.await.unwrap();

    assert_eq!(audio.live_nodes(), 0);
    assert_eq!(audio.open_contexts(), 0);
    assert!(matches!(controls.toggle_play_pause().await, Err(PlayerError::ChannelClosed)));
    assert!(matches!(handle.snapshot().await, Err(PlayerError::ChannelClosed)));
}

#[tokio::test]
async fn test_dropping_handles_stops_player() {
    let audio = FakeAudio::new();
    let (handle, task) = spawn_player(&audio);
    let controls = handle.load(sample_payload()).await.unwrap();
    controls.play().await.unwrap();

    drop(controls);
    drop(handle);

    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("player did not stop")
        .unwrap();
    assert_eq!(audio.open_contexts(), 0);
}

#[tokio::test]
async fn test_unload_returns_to_idle() {
    let audio = FakeAudio::new();
    let (handle, _task) = spawn_player(&audio);
    let controls = handle.load(sample_payload()).await.unwrap();
    controls.play().await.unwrap();

    handle.unload().await.unwrap();

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, TransportState::Idle);
    assert_eq!(snapshot.session, None);
    assert_eq!(audio.open_contexts(), 0);
}
