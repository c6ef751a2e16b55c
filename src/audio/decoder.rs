use crate::audio::buffer::{DecodedAudioBuffer, EncodedAudioPayload};
use crate::audio::error::DecodeError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{debug, instrument, trace};

const LOG_TARGET: &str = "serene_player::audio::decoder";

/// Bytes per 16-bit sample.
const SAMPLE_WIDTH: usize = 2;
/// Full-scale divisor for signed 16-bit PCM.
const I16_SCALE: f32 = 32768.0;

/// Decodes a base64 payload of little-endian signed 16-bit mono PCM.
///
/// The sample rate is not inferred from the payload; the caller supplies it.
/// Every sample is `i16 as f32 / 32768.0`, so decoding the same payload twice
/// yields bit-identical output. Nothing is returned on failure, not even a
/// partial buffer.
#[instrument(skip(payload), fields(payload_len = payload.len()))]
pub fn decode(
    payload: &EncodedAudioPayload,
    sample_rate: u32,
) -> Result<DecodedAudioBuffer, DecodeError> {
    if sample_rate == 0 {
        return Err(DecodeError::InvalidSampleRate);
    }

    let bytes = STANDARD.decode(payload.as_str())?;
    trace!(target: LOG_TARGET, "Base64 decoded into {} bytes.", bytes.len());

    let samples = pcm_s16le_to_f32(&bytes)?;
    debug!(
        target: LOG_TARGET,
        "Decoded {} mono samples at {} Hz.", samples.len(), sample_rate
    );
    Ok(DecodedAudioBuffer::mono(sample_rate, samples))
}

/// Converts raw S16LE bytes into normalised f32 samples.
pub fn pcm_s16le_to_f32(bytes: &[u8]) -> Result<Vec<f32>, DecodeError> {
    if bytes.len() % SAMPLE_WIDTH != 0 {
        return Err(DecodeError::TruncatedSample { len: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(SAMPLE_WIDTH)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / I16_SCALE)
        .collect())
}

/// Turns an encoded payload into a playable buffer.
///
/// The controller decodes through this trait so alternative source formats
/// (or instrumented decoders) can be swapped in without touching it.
pub trait PayloadDecoder: Send {
    fn decode(
        &self,
        payload: &EncodedAudioPayload,
        sample_rate: u32,
    ) -> Result<DecodedAudioBuffer, DecodeError>;
}

/// The speech-synthesis contract: raw mono S16LE PCM.
#[derive(Debug, Default, Clone, Copy)]
pub struct PcmDecoder;

impl PayloadDecoder for PcmDecoder {
    fn decode(
        &self,
        payload: &EncodedAudioPayload,
        sample_rate: u32,
    ) -> Result<DecodedAudioBuffer, DecodeError> {
        decode(payload, sample_rate)
    }
}
