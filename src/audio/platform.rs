//! Contract between the playback controller and a platform audio subsystem.
//!
//! A platform offers exactly four things: opening an output context for a
//! signal spec, starting an output node that plays one shared buffer from the
//! start, adjusting that node's rate multiplier while it plays, and a one-shot
//! notification when the node reaches the end of the buffer on its own.

use crate::audio::buffer::DecodedAudioBuffer;
use crate::audio::error::PlatformError;
use std::sync::Arc;
use symphonia::core::audio::SignalSpec;
use tokio::sync::oneshot;

/// Fired once by a node that played its buffer to the end. Never fired on a
/// manual stop. Dropping the receiving half unsubscribes.
pub type EndedSender = oneshot::Sender<()>;

/// Factory for output contexts (one per controller at a time).
pub trait AudioPlatform: Send {
    fn open_context(&self, spec: SignalSpec) -> Result<Box<dyn AudioContext>, PlatformError>;
}

/// An opened output device.
pub trait AudioContext: Send {
    /// Starts playing `buffer` from position zero at `rate`.
    fn start_output(
        &mut self,
        buffer: Arc<DecodedAudioBuffer>,
        rate: f32,
        on_ended: EndedSender,
    ) -> Result<Box<dyn OutputNode>, PlatformError>;

    /// Releases the device. Calling it twice returns `AlreadyStopped`.
    fn close(&mut self) -> Result<(), PlatformError>;
}

/// One playback of a buffer on a context.
pub trait OutputNode: Send {
    /// Changes the rate multiplier without interrupting output.
    fn set_playback_rate(&self, rate: f32);

    /// Stops output immediately. Returns `AlreadyStopped` when the node
    /// already finished or was stopped before.
    fn stop(&mut self) -> Result<(), PlatformError>;
}

impl<P: AudioPlatform + ?Sized> AudioPlatform for Box<P> {
    fn open_context(&self, spec: SignalSpec) -> Result<Box<dyn AudioContext>, PlatformError> {
        (**self).open_context(spec)
    }
}

impl<P: AudioPlatform + Sync + ?Sized> AudioPlatform for Arc<P> {
    fn open_context(&self, spec: SignalSpec) -> Result<Box<dyn AudioContext>, PlatformError> {
        (**self).open_context(spec)
    }
}
