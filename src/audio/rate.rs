//! Linear playback-rate scaling and device sample-rate conversion.

use crate::audio::error::PlatformError;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::{debug, trace};

const LOG_TARGET: &str = "serene_player::audio::rate";

/// Input chunk size for device-rate conversion.
const RESAMPLE_CHUNK_FRAMES: usize = 1024;

/// Reads a planar buffer at a fractional, adjustable speed.
///
/// Each output frame advances the read position by `step` source frames and
/// linearly interpolates between the two neighbouring samples. A step of 1.0
/// reproduces the source exactly.
#[derive(Debug, Default, Clone)]
pub struct RateScaler {
    position: f64,
}

impl RateScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends up to `max_frames` interleaved frames to `out`.
    /// Returns the number of frames produced; zero means end of source.
    pub fn render(
        &mut self,
        planes: &[&[f32]],
        step: f64,
        max_frames: usize,
        out: &mut Vec<f32>,
    ) -> usize {
        let source_frames = planes.first().map_or(0, |p| p.len());
        let mut produced = 0;

        while produced < max_frames {
            let idx = self.position as usize;
            if idx >= source_frames {
                break;
            }
            let frac = (self.position - idx as f64) as f32;
            for plane in planes {
                let a = plane[idx];
                let b = plane.get(idx + 1).copied().unwrap_or(a);
                out.push(a + (b - a) * frac);
            }
            self.position += step;
            produced += 1;
        }

        trace!(target: LOG_TARGET, "Rendered {} frames (position {:.2}/{}).", produced, self.position, source_frames);
        produced
    }
}

/// Converts planar audio from `source_rate` to `target_rate` with a sinc
/// resampler. Returns the input unchanged when the rates already match.
pub fn resample_planes(
    planes: &[&[f32]],
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<Vec<f32>>, PlatformError> {
    if source_rate == target_rate || planes.is_empty() {
        return Ok(planes.iter().map(|p| p.to_vec()).collect());
    }

    let frames = planes[0].len();
    let ratio = target_rate as f64 / source_rate as f64;
    let expected = (frames as f64 * ratio).round() as usize;
    debug!(
        target: LOG_TARGET,
        "Resampling {} frames from {} Hz to {} Hz.", frames, source_rate, target_rate
    );

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler =
        SincFixedIn::<f32>::new(ratio, 2.0, params, RESAMPLE_CHUNK_FRAMES, planes.len())
            .map_err(|e| PlatformError::Backend(format!("Failed to create resampler: {}", e)))?;

    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + RESAMPLE_CHUNK_FRAMES); planes.len()];
    let append = |output: &mut Vec<Vec<f32>>, chunk: Vec<Vec<f32>>| {
        for (dst, src) in output.iter_mut().zip(chunk) {
            dst.extend_from_slice(&src);
        }
    };

    let mut pos = 0;
    while frames - pos >= resampler.input_frames_next() {
        let n = resampler.input_frames_next();
        let chunk: Vec<&[f32]> = planes.iter().map(|p| &p[pos..pos + n]).collect();
        let resampled = resampler
            .process(&chunk, None)
            .map_err(|e| PlatformError::Backend(format!("Resampling failed: {}", e)))?;
        append(&mut output, resampled);
        pos += n;
    }
    if pos < frames {
        let chunk: Vec<&[f32]> = planes.iter().map(|p| &p[pos..]).collect();
        let resampled = resampler
            .process_partial(Some(chunk.as_slice()), None)
            .map_err(|e| PlatformError::Backend(format!("Resampling failed: {}", e)))?;
        append(&mut output, resampled);
    }
    // Flush the filter tail.
    let tail = resampler
        .process_partial(None::<&[&[f32]]>, None)
        .map_err(|e| PlatformError::Backend(format!("Resampling failed: {}", e)))?;
    append(&mut output, tail);

    let delay = resampler.output_delay();
    for plane in output.iter_mut() {
        plane.drain(..delay.min(plane.len()));
        plane.truncate(expected);
    }
    Ok(output)
}
