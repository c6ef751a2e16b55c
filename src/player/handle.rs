//! Client side of the player task.

use super::{PlayerCommand, PlayerStateUpdate, PLAYER_LOG_TARGET};
use crate::audio::{EncodedAudioPayload, PlayerSnapshot, SessionId, TransportState};
use thiserror::Error;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("player task is no longer running")]
    ChannelClosed,
}

/// Cloneable handle for sending commands to a running [`Player`](super::Player).
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    command_tx: mpsc::Sender<PlayerCommand>,
    state_update_tx: broadcast::Sender<PlayerStateUpdate>,
}

impl PlayerHandle {
    pub(super) fn new(
        command_tx: mpsc::Sender<PlayerCommand>,
        state_update_tx: broadcast::Sender<PlayerStateUpdate>,
    ) -> Self {
        PlayerHandle {
            command_tx,
            state_update_tx,
        }
    }

    async fn send(&self, command: PlayerCommand) -> Result<(), PlayerError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| PlayerError::ChannelClosed)
    }

    /// Starts a new session for `payload`. Resolves once decoding finished
    /// (successfully or not); the outcome is in the session's snapshot.
    #[instrument(skip(self, payload), fields(payload_len = payload.len()))]
    pub async fn load(&self, payload: EncodedAudioPayload) -> Result<SessionControls, PlayerError> {
        let (respond_to, response) = oneshot::channel();
        self.send(PlayerCommand::Load { payload, respond_to }).await?;
        let (session, rate) = response.await.map_err(|_| PlayerError::ChannelClosed)?;
        debug!(target: PLAYER_LOG_TARGET, session = %session, "Session controls issued.");
        Ok(SessionControls {
            session,
            handle: self.clone(),
            last_rate: Arc::new(AtomicU32::new(rate.to_bits())),
        })
    }

    pub async fn snapshot(&self) -> Result<PlayerSnapshot, PlayerError> {
        let (tx, rx) = oneshot::channel();
        self.send(PlayerCommand::GetSnapshot(tx)).await?;
        rx.await.map_err(|_| PlayerError::ChannelClosed)
    }

    pub async fn unload(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Unload).await
    }

    /// Asks the player to tear down and exit its loop.
    pub async fn shutdown(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Shutdown).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerStateUpdate> {
        self.state_update_tx.subscribe()
    }
}

/// Transport controls bound to one session.
///
/// Once a newer payload supersedes the session, every control becomes a
/// no-op and the snapshot reports `Idle` with the session's last known rate.
#[derive(Debug, Clone)]
pub struct SessionControls {
    session: SessionId,
    handle: PlayerHandle,
    // Rate last observed while this session was current. Shared by clones.
    last_rate: Arc<AtomicU32>,
}

impl SessionControls {
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerStateUpdate> {
        self.handle.subscribe()
    }

    pub async fn play(&self) -> Result<(), PlayerError> {
        self.handle
            .send(PlayerCommand::Play { session: self.session })
            .await
    }

    pub async fn pause(&self) -> Result<(), PlayerError> {
        self.handle
            .send(PlayerCommand::Pause { session: self.session })
            .await
    }

    pub async fn toggle_play_pause(&self) -> Result<(), PlayerError> {
        self.handle
            .send(PlayerCommand::TogglePlayPause { session: self.session })
            .await
    }

    /// Resolves once the player has applied or ignored the rate.
    pub async fn set_playback_rate(&self, rate: f32) -> Result<(), PlayerError> {
        self.handle
            .send(PlayerCommand::SetPlaybackRate {
                session: self.session,
                rate,
            })
            .await?;
        // Commands run in order, so this observes the outcome.
        self.snapshot().await.map(|_| ())
    }

    /// The player snapshot as seen by this session.
    pub async fn snapshot(&self) -> Result<PlayerSnapshot, PlayerError> {
        let snapshot = self.handle.snapshot().await?;
        if snapshot.session == Some(self.session) {
            self.last_rate
                .store(snapshot.playback_rate.to_bits(), Ordering::Relaxed);
            return Ok(snapshot);
        }
        Ok(PlayerSnapshot {
            session: Some(self.session),
            state: TransportState::Idle,
            is_playing: false,
            is_loading: false,
            is_finished: false,
            error: None,
            playback_rate: f32::from_bits(self.last_rate.load(Ordering::Relaxed)),
        })
    }
}
