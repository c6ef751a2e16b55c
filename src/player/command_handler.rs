use super::{Player, PlayerCommand, PlayerStateUpdate, PLAYER_LOG_TARGET};
use crate::audio::{
    AudioPlatform, EncodedAudioPayload, OutputEvent, PayloadDecoder, PlayerSnapshot, SessionId,
};
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, trace};

/// Applies one command. Returns `false` when the loop should exit.
pub fn dispatch<P: AudioPlatform, D: PayloadDecoder>(
    player: &mut Player<P, D>,
    command: PlayerCommand,
) -> bool {
    match command {
        PlayerCommand::Load { payload, respond_to } => handle_load(player, payload, respond_to),
        PlayerCommand::Play { session } => {
            player.controller.play(session);
            player.publish_snapshot();
        }
        PlayerCommand::Pause { session } => {
            player.controller.pause(session);
            player.publish_snapshot();
        }
        PlayerCommand::TogglePlayPause { session } => {
            player.controller.toggle_play_pause(session);
            player.publish_snapshot();
        }
        PlayerCommand::SetPlaybackRate { session, rate } => {
            handle_set_playback_rate(player, session, rate)
        }
        PlayerCommand::Unload => {
            player.controller.unload();
            player.publish_snapshot();
        }
        PlayerCommand::GetSnapshot(responder) => handle_get_snapshot(player, responder),
        PlayerCommand::Shutdown => {
            info!(target: PLAYER_LOG_TARGET, "Shutdown command received. Exiting run loop.");
            return false;
        }
    }
    true
}

#[instrument(skip(player, payload, respond_to), fields(payload_len = payload.len()))]
pub fn handle_load<P: AudioPlatform, D: PayloadDecoder>(
    player: &mut Player<P, D>,
    payload: EncodedAudioPayload,
    respond_to: oneshot::Sender<(SessionId, f32)>,
) {
    let session = player.controller.begin_session(&payload);
    // Subscribers see `Loading` before the decode runs.
    player.publish_snapshot();
    player.controller.complete_load(session);
    player.publish_snapshot();

    let rate = player.controller.snapshot().playback_rate;
    if respond_to.send((session, rate)).is_err() {
        debug!(target: PLAYER_LOG_TARGET, session = %session, "Load requester went away before the response.");
    }
}

#[instrument(skip(player))]
pub fn handle_set_playback_rate<P: AudioPlatform, D: PayloadDecoder>(
    player: &mut Player<P, D>,
    session: SessionId,
    rate: f32,
) {
    let before = player.controller.snapshot().playback_rate;
    player.controller.set_playback_rate(session, rate);
    let after = player.controller.snapshot().playback_rate;
    if player.controller.current_session() == Some(session) && after != before {
        player.broadcast_update(PlayerStateUpdate::RateChanged { session, rate: after });
    }
    player.publish_snapshot();
}

pub fn handle_get_snapshot<P: AudioPlatform, D: PayloadDecoder>(
    player: &Player<P, D>,
    responder: oneshot::Sender<PlayerSnapshot>,
) {
    // Ignore error if receiver dropped.
    let _ = responder.send(player.controller.snapshot());
}

#[instrument(skip(player))]
pub fn handle_output_event<P: AudioPlatform, D: PayloadDecoder>(
    player: &mut Player<P, D>,
    event: OutputEvent,
) {
    trace!(target: PLAYER_LOG_TARGET, "Output event: {:?}", event);
    player.controller.handle_output_event(event);
    player.publish_snapshot();
}
