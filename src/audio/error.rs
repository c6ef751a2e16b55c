use std::io;
use thiserror::Error;

/// Failures turning a base64 payload into PCM samples.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid base64 encoding: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
    #[error("truncated sample: {len} bytes is not a multiple of the 2-byte sample width")]
    TruncatedSample { len: usize },
    #[error("invalid sample rate: must be greater than zero")]
    InvalidSampleRate,
}

/// Errors reported by a platform audio backend.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("output already stopped")]
    AlreadyStopped,
    #[error("audio backend error: {0}")]
    Backend(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl PlatformError {
    /// Stop/close races that carry no information for the caller.
    pub fn is_benign(&self) -> bool {
        matches!(self, PlatformError::AlreadyStopped)
    }
}

impl From<alsa::Error> for PlatformError {
    fn from(e: alsa::Error) -> Self {
        PlatformError::Backend(format!("ALSA: {}", e))
    }
}

/// Stable, display-ready error keys surfaced to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The payload could not be decoded.
    AudioUnavailable,
    /// No output device/context could be acquired.
    DeviceUnavailable,
}

impl ErrorCode {
    /// Message-catalog key for this error.
    pub fn key(&self) -> &'static str {
        match self {
            ErrorCode::AudioUnavailable => "player.audioErrorBody",
            ErrorCode::DeviceUnavailable => "player.audioDeviceUnavailable",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// A session-ending failure, converted into `Errored` state by the controller.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("resource acquisition failed: {0}")]
    ResourceAcquisitionFailed(#[source] PlatformError),
}

impl PlaybackError {
    pub fn code(&self) -> ErrorCode {
        match self {
            PlaybackError::Decode(_) => ErrorCode::AudioUnavailable,
            PlaybackError::ResourceAcquisitionFailed(_) => ErrorCode::DeviceUnavailable,
        }
    }
}
