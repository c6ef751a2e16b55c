use std::sync::Arc;
use std::time::Duration;
use symphonia::core::audio::{AudioBuffer, Channels, Signal, SignalSpec};

/// Sample rate of payloads produced by the speech-synthesis service.
pub const SOURCE_SAMPLE_RATE: u32 = 24_000;
/// Payloads are always mono.
pub const SOURCE_CHANNELS: usize = 1;

/// Base64 string carrying little-endian signed 16-bit mono PCM.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedAudioPayload(Arc<str>);

impl EncodedAudioPayload {
    pub fn new(encoded: impl Into<Arc<str>>) -> Self {
        EncodedAudioPayload(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for EncodedAudioPayload {
    fn from(s: String) -> Self {
        EncodedAudioPayload::new(s)
    }
}

impl From<&str> for EncodedAudioPayload {
    fn from(s: &str) -> Self {
        EncodedAudioPayload::new(s)
    }
}

/// Immutable planar f32 audio, normalised to [-1.0, 1.0).
///
/// Built once per session by the decoder and shared read-only with the
/// single live output node.
pub struct DecodedAudioBuffer {
    inner: AudioBuffer<f32>,
}

impl DecodedAudioBuffer {
    /// Wraps per-channel sample planes. All planes must have the same length.
    pub fn from_planes(sample_rate: u32, planes: Vec<Vec<f32>>) -> Self {
        let frames = planes.first().map_or(0, Vec::len);
        let spec = SignalSpec::new(sample_rate, channels_for(planes.len().max(1)));
        let mut inner = AudioBuffer::<f32>::new(frames as u64, spec);
        inner.render_reserved(Some(frames));
        for (ch, plane) in planes.iter().enumerate() {
            inner.chan_mut(ch).copy_from_slice(&plane[..frames]);
        }
        DecodedAudioBuffer { inner }
    }

    /// Mono buffer from a single plane.
    pub fn mono(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self::from_planes(sample_rate, vec![samples])
    }

    pub fn spec(&self) -> SignalSpec {
        *self.inner.spec()
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.spec().rate
    }

    pub fn channel_count(&self) -> usize {
        self.inner.spec().channels.count()
    }

    pub fn frames(&self) -> usize {
        self.inner.frames()
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Samples of one channel.
    pub fn channel(&self, ch: usize) -> &[f32] {
        self.inner.chan(ch)
    }

    /// Playing time at rate 1.0.
    pub fn duration(&self) -> Duration {
        if self.sample_rate() == 0 {
            return Duration::ZERO;
        }
        let nanos = self.frames() as u128 * 1_000_000_000 / u128::from(self.sample_rate());
        Duration::from_nanos(nanos as u64)
    }
}

impl std::fmt::Debug for DecodedAudioBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedAudioBuffer")
            .field("sample_rate", &self.sample_rate())
            .field("channels", &self.channel_count())
            .field("frames", &self.frames())
            .finish()
    }
}

// Channel positions are consecutive bits starting at FRONT_LEFT.
fn channels_for(count: usize) -> Channels {
    Channels::from_bits_truncate((1u32 << count.min(31)) - 1)
}
