use crate::audio::{EncodedAudioPayload, ErrorCode, PlayerSnapshot, SessionId};
use tokio::sync::oneshot;

/// Commands that can be sent to the Player task.
#[derive(Debug)]
pub enum PlayerCommand {
    /// Supersede the current session with a new payload.
    Load {
        payload: EncodedAudioPayload,
        /// The new session and the rate it starts with.
        respond_to: oneshot::Sender<(SessionId, f32)>,
    },
    Play { session: SessionId },
    Pause { session: SessionId },
    TogglePlayPause { session: SessionId },
    SetPlaybackRate { session: SessionId, rate: f32 },
    Unload,
    GetSnapshot(oneshot::Sender<PlayerSnapshot>),
    Shutdown,
}

/// Updates broadcast by the Player task about its state changes.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerStateUpdate {
    /// Any change of the presentation snapshot.
    StateChanged(PlayerSnapshot),
    RateChanged { session: SessionId, rate: f32 },
    /// A session entered `Errored`.
    Error { session: SessionId, code: ErrorCode },
    /// The player task exited; no further updates follow.
    Stopped,
}
