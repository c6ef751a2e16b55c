//! Async player service: owns a [`PlaybackController`] inside one tokio task
//! and serialises every request through a command channel.

use crate::audio::{AudioPlatform, PayloadDecoder, PcmDecoder, PlaybackController, PlayerSnapshot};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, instrument, trace};

mod command_handler;
mod handle;
mod run_loop;
mod state;

pub use handle::{PlayerError, PlayerHandle, SessionControls};
pub use state::{PlayerCommand, PlayerStateUpdate};

const PLAYER_LOG_TARGET: &str = "serene_player::player";

/// Default capacity of the state broadcast channel.
pub const STATE_UPDATE_CAPACITY: usize = 32;
/// Default capacity of the command channel.
pub const COMMAND_BUFFER_SIZE: usize = 32;

/// Drives one playback controller from commands and output completions.
pub struct Player<P: AudioPlatform, D: PayloadDecoder = PcmDecoder> {
    controller: PlaybackController<P, D>,

    // --- Communication ---
    command_rx: mpsc::Receiver<PlayerCommand>,
    state_update_tx: broadcast::Sender<PlayerStateUpdate>,

    // Last snapshot broadcast, to publish only real changes.
    last_snapshot: PlayerSnapshot,
}

impl<P: AudioPlatform, D: PayloadDecoder> Player<P, D> {
    /// Creates a new Player and the handle used to control it.
    /// The Player itself should be run in a separate task using `Player::run`.
    pub fn new(
        controller: PlaybackController<P, D>,
        state_update_capacity: usize,
        command_buffer_size: usize,
    ) -> (Self, PlayerHandle) {
        let (command_tx, command_rx) = mpsc::channel(command_buffer_size);
        let (state_update_tx, _) = broadcast::channel(state_update_capacity);
        let last_snapshot = controller.snapshot();

        let player = Player {
            controller,
            command_rx,
            state_update_tx: state_update_tx.clone(),
            last_snapshot,
        };
        (player, PlayerHandle::new(command_tx, state_update_tx))
    }

    /// Subscribes to player state updates.
    pub fn subscribe_state_updates(&self) -> broadcast::Receiver<PlayerStateUpdate> {
        self.state_update_tx.subscribe()
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.controller.snapshot()
    }

    /// Sends a state update via the broadcast channel, logging errors.
    fn broadcast_update(&self, update: PlayerStateUpdate) {
        trace!(target: PLAYER_LOG_TARGET, "Broadcasting state update: {:?}", update);
        if self.state_update_tx.send(update.clone()).is_err() {
            // No receivers is normal when nothing is listening yet.
            debug!(target: PLAYER_LOG_TARGET, "No active listeners for state update: {:?}", update);
        }
    }

    /// Broadcasts the controller snapshot if it changed since the last one.
    fn publish_snapshot(&mut self) {
        let snapshot = self.controller.snapshot();
        if snapshot == self.last_snapshot {
            return;
        }
        if let (Some(session), Some(code)) = (snapshot.session, snapshot.error) {
            if self.last_snapshot.error != Some(code) || self.last_snapshot.session != Some(session) {
                self.broadcast_update(PlayerStateUpdate::Error { session, code });
            }
        }
        self.last_snapshot = snapshot.clone();
        self.broadcast_update(PlayerStateUpdate::StateChanged(snapshot));
    }

    /// Runs the player's command processing loop. This should be spawned as a Tokio task.
    #[instrument(skip(self))]
    pub async fn run(&mut self) {
        run_loop::run_player_loop(self).await;
    }
}
