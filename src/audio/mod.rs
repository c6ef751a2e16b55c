//! Audio decoding and playback control.
//!
//! `decoder` turns synthesis payloads into buffers, `controller` drives a
//! buffer through one playback session, and `platform` is the contract a
//! backend (`alsa_output` on Linux) implements to make it audible.

pub mod alsa_handler;
pub mod alsa_output;
pub mod buffer;
pub mod controller;
pub mod decoder;
pub mod error;
pub mod platform;
pub mod rate;

pub use alsa_output::AlsaPlatform;
pub use buffer::{DecodedAudioBuffer, EncodedAudioPayload, SOURCE_CHANNELS, SOURCE_SAMPLE_RATE};
pub use controller::{
    OutputEvent, OutputHandleId, PlaybackController, PlayerSnapshot, SessionId, TransportState,
    DEFAULT_PLAYBACK_RATE,
};
pub use decoder::{decode, PayloadDecoder, PcmDecoder};
pub use error::{DecodeError, ErrorCode, PlatformError, PlaybackError};
pub use platform::{AudioContext, AudioPlatform, EndedSender, OutputNode};
