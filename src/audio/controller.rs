//! Playback controller: owns one decoded buffer per session and mediates
//! every play/pause/rate/finish transition for it.
//!
//! States: `Idle → Loading → Ready ⇄ Playing → Finished`, with `Errored`
//! reachable from `Loading` (decode failure) and `Ready` (device failure).
//! Supplying a new payload or unloading tears the previous session down
//! before anything else happens. At most one platform context and one
//! output node exist per controller at any time.
//!
//! Pause is a full stop: the next play restarts the buffer from the start.

use crate::audio::{
    buffer::{DecodedAudioBuffer, EncodedAudioPayload, SOURCE_SAMPLE_RATE},
    decoder::{PayloadDecoder, PcmDecoder},
    error::{ErrorCode, PlaybackError, PlatformError},
    platform::{AudioContext, AudioPlatform, OutputNode},
};
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

const LOG_TARGET: &str = "serene_player::audio::controller";

/// Rate applied to a new session unless configured otherwise.
pub const DEFAULT_PLAYBACK_RATE: f32 = 1.0;

/// Identifies one decode-through-playback lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        SessionId(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one output node; completions from older nodes are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputHandleId(u64);

/// Transport state of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    Loading,
    /// Decoded and stopped; also the paused state.
    Ready,
    Playing,
    Finished,
    Errored,
}

/// What the presentation layer sees.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub session: Option<SessionId>,
    pub state: TransportState,
    pub is_playing: bool,
    pub is_loading: bool,
    pub is_finished: bool,
    pub error: Option<ErrorCode>,
    pub playback_rate: f32,
}

impl PlayerSnapshot {
    /// Transport controls are usable only for a decoded, non-terminal session.
    pub fn controls_enabled(&self) -> bool {
        matches!(self.state, TransportState::Ready | TransportState::Playing)
    }
}

/// Completion outcome of the active output node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEvent {
    /// The node played its buffer to the end.
    Ended(OutputHandleId),
    /// The node went away without reaching the end.
    Lost(OutputHandleId),
}

struct PlaybackSession {
    id: SessionId,
    payload: EncodedAudioPayload,
    buffer: Option<Arc<DecodedAudioBuffer>>,
    rate: f32,
    state: TransportState,
    error: Option<ErrorCode>,
}

struct ActiveOutput {
    handle: OutputHandleId,
    node: Box<dyn OutputNode>,
    ended: oneshot::Receiver<()>,
}

/// Single-owner playback state machine over an [`AudioPlatform`].
pub struct PlaybackController<P: AudioPlatform, D: PayloadDecoder = PcmDecoder> {
    platform: P,
    decoder: D,
    sample_rate: u32,
    default_rate: f32,
    session: Option<PlaybackSession>,
    context: Option<Box<dyn AudioContext>>,
    output: Option<ActiveOutput>,
    next_handle: u64,
}

impl<P: AudioPlatform> PlaybackController<P, PcmDecoder> {
    /// Controller for the speech-synthesis contract (S16LE mono at 24 kHz).
    pub fn new(platform: P) -> Self {
        Self::with_decoder(platform, PcmDecoder, SOURCE_SAMPLE_RATE)
    }
}

impl<P: AudioPlatform, D: PayloadDecoder> PlaybackController<P, D> {
    pub fn with_decoder(platform: P, decoder: D, sample_rate: u32) -> Self {
        PlaybackController {
            platform,
            decoder,
            sample_rate,
            default_rate: DEFAULT_PLAYBACK_RATE,
            session: None,
            context: None,
            output: None,
            next_handle: 0,
        }
    }

    /// Rate given to each new session.
    pub fn with_default_rate(mut self, rate: f32) -> Self {
        if is_valid_rate(rate) {
            self.default_rate = rate;
        } else {
            warn!(target: LOG_TARGET, "Ignoring invalid default playback rate {}.", rate);
        }
        self
    }

    // --- Session lifecycle ---

    /// Supersedes any current session with a new one and decodes it.
    pub fn load(&mut self, payload: &EncodedAudioPayload) -> SessionId {
        let id = self.begin_session(payload);
        self.complete_load(id);
        id
    }

    /// Tears down the current session and enters `Loading` for a new one.
    /// The previous output node and context are released before this returns.
    #[instrument(skip(self, payload), fields(payload_len = payload.len()))]
    pub fn begin_session(&mut self, payload: &EncodedAudioPayload) -> SessionId {
        self.teardown();
        let id = SessionId::new();
        info!(target: LOG_TARGET, session = %id, "New playback session, loading payload.");
        self.session = Some(PlaybackSession {
            id,
            payload: payload.clone(),
            buffer: None,
            rate: self.default_rate,
            state: TransportState::Loading,
            error: None,
        });
        id
    }

    /// Decodes the payload of a session in `Loading`.
    #[instrument(skip(self), fields(session = %session))]
    pub fn complete_load(&mut self, session: SessionId) {
        let payload = match self.current(session) {
            Some(current) if current.state == TransportState::Loading => current.payload.clone(),
            Some(current) => {
                debug!(target: LOG_TARGET, "Session is {:?}, nothing to load.", current.state);
                return;
            }
            None => return,
        };

        let result = self.decoder.decode(&payload, self.sample_rate);
        match result {
            Ok(buffer) => {
                info!(
                    target: LOG_TARGET,
                    "Payload decoded: {} frames ({:.2}s).", buffer.frames(), buffer.duration().as_secs_f64()
                );
                if let Some(current) = self.session.as_mut() {
                    current.buffer = Some(Arc::new(buffer));
                    current.state = TransportState::Ready;
                }
            }
            Err(e) => self.fail_session(PlaybackError::Decode(e)),
        }
    }

    /// Ends the current session (→ `Idle`), releasing all platform resources.
    #[instrument(skip(self))]
    pub fn unload(&mut self) {
        if self.session.is_some() {
            info!(target: LOG_TARGET, "Unloading playback session.");
        }
        self.teardown();
    }

    // --- Transport ---

    /// Starts the buffer from position zero. Only valid in `Ready`.
    #[instrument(skip(self), fields(session = %session))]
    pub fn play(&mut self, session: SessionId) {
        let Some(current) = self.current_mut(session) else {
            return;
        };
        if current.state != TransportState::Ready || current.error.is_some() {
            debug!(target: LOG_TARGET, "Play ignored in state {:?}.", current.state);
            return;
        }
        let Some(buffer) = current.buffer.clone() else {
            warn!(target: LOG_TARGET, "Ready session without a buffer; play ignored.");
            return;
        };
        let rate = current.rate;

        // Any leftover node is stopped before a new one exists.
        self.release_output();

        if self.context.is_none() {
            match self.platform.open_context(buffer.spec()) {
                Ok(context) => {
                    debug!(target: LOG_TARGET, "Platform audio context acquired.");
                    self.context = Some(context);
                }
                Err(e) => {
                    self.fail_session(PlaybackError::ResourceAcquisitionFailed(e));
                    return;
                }
            }
        }

        let (ended_tx, ended_rx) = oneshot::channel();
        let started = match self.context.as_mut() {
            Some(context) => context.start_output(buffer, rate, ended_tx),
            None => Err(PlatformError::DeviceUnavailable("no output context".to_string())),
        };
        match started {
            Ok(node) => {
                let handle = OutputHandleId(self.next_handle);
                self.next_handle += 1;
                self.output = Some(ActiveOutput {
                    handle,
                    node,
                    ended: ended_rx,
                });
                if let Some(current) = self.session.as_mut() {
                    current.state = TransportState::Playing;
                }
                info!(target: LOG_TARGET, handle = handle.0, "Playback started at rate {}.", rate);
            }
            Err(e) => self.fail_session(PlaybackError::ResourceAcquisitionFailed(e)),
        }
    }

    /// Stops output and returns to `Ready`. Only valid in `Playing`.
    #[instrument(skip(self), fields(session = %session))]
    pub fn pause(&mut self, session: SessionId) {
        let Some(current) = self.current_mut(session) else {
            return;
        };
        if current.state != TransportState::Playing {
            debug!(target: LOG_TARGET, "Pause ignored in state {:?}.", current.state);
            return;
        }
        current.state = TransportState::Ready;
        self.release_output();
        info!(target: LOG_TARGET, "Playback stopped; next play restarts from the beginning.");
    }

    /// `Ready → Playing`, `Playing → Ready`; a no-op in every other state.
    pub fn toggle_play_pause(&mut self, session: SessionId) {
        match self.current(session).map(|s| s.state) {
            Some(TransportState::Ready) => self.play(session),
            Some(TransportState::Playing) => self.pause(session),
            Some(state) => {
                debug!(target: LOG_TARGET, "Toggle ignored in state {:?}.", state);
            }
            None => {}
        }
    }

    /// Accepts any finite positive rate, in any state of the current session.
    /// Applied to the live node immediately, otherwise on the next play.
    #[instrument(skip(self), fields(session = %session))]
    pub fn set_playback_rate(&mut self, session: SessionId, rate: f32) {
        if !is_valid_rate(rate) {
            warn!(target: LOG_TARGET, "Ignoring invalid playback rate {}.", rate);
            return;
        }
        let Some(current) = self.current_mut(session) else {
            return;
        };
        current.rate = rate;
        match &self.output {
            Some(output) => {
                output.node.set_playback_rate(rate);
                debug!(target: LOG_TARGET, "Playback rate {} applied to live output.", rate);
            }
            None => debug!(target: LOG_TARGET, "Playback rate {} stored for next play.", rate),
        }
    }

    // --- Completion ---

    /// Non-blocking check of the active node's completion.
    /// Returns the event if one was handled.
    pub fn poll_output_ended(&mut self) -> Option<OutputEvent> {
        let output = self.output.as_mut()?;
        let event = match output.ended.try_recv() {
            Ok(()) => OutputEvent::Ended(output.handle),
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => OutputEvent::Lost(output.handle),
        };
        self.handle_output_event(event);
        Some(event)
    }

    /// Waits for the active node to complete. Pending forever when no node
    /// is active; pair it with [`has_active_output`](Self::has_active_output).
    pub async fn output_ended(&mut self) -> OutputEvent {
        match self.output.as_mut() {
            Some(output) => match (&mut output.ended).await {
                Ok(()) => OutputEvent::Ended(output.handle),
                Err(_) => OutputEvent::Lost(output.handle),
            },
            None => std::future::pending().await,
        }
    }

    /// Natural end of the node identified by `handle`.
    pub fn handle_output_ended(&mut self, handle: OutputHandleId) {
        self.handle_output_event(OutputEvent::Ended(handle));
    }

    /// Applies a completion event. Events for superseded nodes are ignored.
    #[instrument(skip(self))]
    pub fn handle_output_event(&mut self, event: OutputEvent) {
        let handle = match event {
            OutputEvent::Ended(h) | OutputEvent::Lost(h) => h,
        };
        if self.output.as_ref().map(|o| o.handle) != Some(handle) {
            trace!(target: LOG_TARGET, "Ignoring completion from stale output {:?}.", handle);
            return;
        }
        // The node is done either way; drop it (and its subscription).
        self.output = None;

        let Some(current) = self.session.as_mut() else {
            return;
        };
        if current.state != TransportState::Playing {
            return;
        }
        match event {
            OutputEvent::Ended(_) => {
                current.state = TransportState::Finished;
                info!(target: LOG_TARGET, session = %current.id, "Playback finished naturally.");
                self.release_context();
            }
            OutputEvent::Lost(_) => {
                current.state = TransportState::Ready;
                warn!(target: LOG_TARGET, session = %current.id, "Output ended without completing; back to ready.");
            }
        }
    }

    // --- Queries ---

    pub fn snapshot(&self) -> PlayerSnapshot {
        match &self.session {
            Some(s) => PlayerSnapshot {
                session: Some(s.id),
                state: s.state,
                is_playing: s.state == TransportState::Playing,
                is_loading: s.state == TransportState::Loading,
                is_finished: s.state == TransportState::Finished,
                error: s.error,
                playback_rate: s.rate,
            },
            None => PlayerSnapshot {
                session: None,
                state: TransportState::Idle,
                is_playing: false,
                is_loading: false,
                is_finished: false,
                error: None,
                playback_rate: self.default_rate,
            },
        }
    }

    pub fn state(&self) -> TransportState {
        self.session.as_ref().map_or(TransportState::Idle, |s| s.state)
    }

    pub fn current_session(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn error(&self) -> Option<ErrorCode> {
        self.session.as_ref().and_then(|s| s.error)
    }

    pub fn buffer(&self) -> Option<&Arc<DecodedAudioBuffer>> {
        self.session.as_ref().and_then(|s| s.buffer.as_ref())
    }

    pub fn active_output(&self) -> Option<OutputHandleId> {
        self.output.as_ref().map(|o| o.handle)
    }

    pub fn has_active_output(&self) -> bool {
        self.output.is_some()
    }

    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    // --- Internals ---

    fn current(&self, session: SessionId) -> Option<&PlaybackSession> {
        match &self.session {
            Some(s) if s.id == session => Some(s),
            _ => {
                debug!(target: LOG_TARGET, "Ignoring request for stale session {}.", session);
                None
            }
        }
    }

    fn current_mut(&mut self, session: SessionId) -> Option<&mut PlaybackSession> {
        match &mut self.session {
            Some(s) if s.id == session => Some(s),
            _ => {
                debug!(target: LOG_TARGET, "Ignoring request for stale session {}.", session);
                None
            }
        }
    }

    fn fail_session(&mut self, err: PlaybackError) {
        error!(target: LOG_TARGET, "Playback session failed: {}", err);
        self.release_output();
        self.release_context();
        if let Some(current) = self.session.as_mut() {
            current.state = TransportState::Errored;
            current.error = Some(err.code());
        }
    }

    /// Stops and forgets the active node. Stop failures are swallowed.
    fn release_output(&mut self) {
        if let Some(mut output) = self.output.take() {
            match output.node.stop() {
                Ok(()) => debug!(target: LOG_TARGET, handle = output.handle.0, "Output node stopped."),
                Err(e) if e.is_benign() => {
                    trace!(target: LOG_TARGET, handle = output.handle.0, "Output node already stopped.");
                }
                Err(e) => warn!(target: LOG_TARGET, handle = output.handle.0, "Error stopping output node (ignored): {}", e),
            }
        }
    }

    /// Closes the platform context. Close failures are swallowed.
    fn release_context(&mut self) {
        if let Some(mut context) = self.context.take() {
            match context.close() {
                Ok(()) => debug!(target: LOG_TARGET, "Platform audio context released."),
                Err(e) if e.is_benign() => {}
                Err(e) => warn!(target: LOG_TARGET, "Error closing audio context (ignored): {}", e),
            }
        }
    }

    fn teardown(&mut self) {
        self.release_output();
        self.release_context();
        self.session = None;
    }
}

impl<P: AudioPlatform, D: PayloadDecoder> Drop for PlaybackController<P, D> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn is_valid_rate(rate: f32) -> bool {
    rate.is_finite() && rate > 0.0
}
