use super::{command_handler, Player, PlayerStateUpdate, PLAYER_LOG_TARGET};
use crate::audio::{AudioPlatform, PayloadDecoder};
use tracing::{info, trace};

/// Runs the player's command processing loop.
pub async fn run_player_loop<P: AudioPlatform, D: PayloadDecoder>(player: &mut Player<P, D>) {
    info!(target: PLAYER_LOG_TARGET, "Player run loop started.");

    loop {
        tokio::select! {
            biased; // Commands first, so a pause wins over a racing end-of-buffer.

            // --- Command Processing ---
            command = player.command_rx.recv() => {
                let Some(command) = command else {
                    info!(target: PLAYER_LOG_TARGET, "All player handles dropped. Exiting run loop.");
                    break;
                };
                trace!(target: PLAYER_LOG_TARGET, "Received command: {:?}", command);
                if !command_handler::dispatch(player, command) {
                    break;
                }
            }

            // --- Output Completion ---
            event = player.controller.output_ended(), if player.controller.has_active_output() => {
                command_handler::handle_output_event(player, event);
            }
        }
    }

    info!(target: PLAYER_LOG_TARGET, "Player run loop finished. Releasing audio resources.");
    player.controller.unload();
    player.publish_snapshot();
    player.broadcast_update(PlayerStateUpdate::Stopped);
    info!(target: PLAYER_LOG_TARGET, "Player task cleanup complete.");
}
