use crate::audio::error::PlatformError;
use alsa::nix::errno::Errno;
use alsa::pcm::{Access, Format, Frames, HwParams, State as PcmState, PCM};
use alsa::{Direction, ValueOr};
use std::ffi::CString;
use symphonia::core::audio::SignalSpec;
use tracing::{debug, error, info, instrument, warn};

const LOG_TARGET: &str = "serene_player::audio::alsa_handler";

/// Requested device buffer, in microseconds. Bounds how long a rate change
/// waits behind already queued audio.
pub const BUFFER_TIME_US: u32 = 100_000;
/// Requested period, in microseconds.
pub const PERIOD_TIME_US: u32 = 25_000;

/// Start once all but one period is queued. Never zero, so a device that
/// grants a single period still waits for data.
pub fn start_threshold(buffer_size: Frames, period_size: Frames) -> Frames {
    let threshold = buffer_size - period_size;
    if threshold > 0 {
        threshold
    } else {
        period_size.min(buffer_size).max(1)
    }
}

/// Manages the ALSA PCM device for audio output.
pub struct AlsaPcmHandler {
    device_name: String,
    pcm: Option<PCM>,
}

impl AlsaPcmHandler {
    /// Creates a new handler for the specified ALSA device.
    pub fn new(device_name: &str) -> Self {
        info!(target: LOG_TARGET, "Creating new AlsaPcmHandler for device: {}", device_name);
        AlsaPcmHandler {
            device_name: device_name.to_string(),
            pcm: None,
        }
    }

    /// Opens the device for S16 interleaved output with the given spec.
    /// Closes any existing PCM device first. Returns the negotiated rate.
    #[instrument(skip(self, spec), fields(device = %self.device_name, rate = spec.rate, channels = spec.channels.count()))]
    pub fn initialize(&mut self, spec: SignalSpec) -> Result<u32, PlatformError> {
        info!(
            target: LOG_TARGET,
            "Initializing ALSA PCM device '{}' with spec: rate={}, channels={}",
            self.device_name, spec.rate, spec.channels.count()
        );

        self.close();

        let device = CString::new(self.device_name.clone())
            .map_err(|e| PlatformError::DeviceUnavailable(format!("Invalid device name: {}", e)))?;

        // Non-blocking, so a full device never stalls a writer holding the handler lock.
        let pcm = PCM::open(&device, Direction::Playback, true).map_err(|e| {
            PlatformError::DeviceUnavailable(format!("Cannot open '{}': {}", self.device_name, e))
        })?;

        let actual_rate = {
            let hwp = HwParams::any(&pcm)?;
            hwp.set_access(Access::RWInterleaved)?;
            hwp.set_format(Format::s16())?;
            hwp.set_channels(spec.channels.count() as u32)?;
            hwp.set_rate_near(spec.rate, ValueOr::Nearest).map_err(|e| {
                error!(target: LOG_TARGET, "Failed to set ALSA rate near {}: {}", spec.rate, e);
                PlatformError::DeviceUnavailable(format!(
                    "Failed to set sample rate {}: {}",
                    spec.rate, e
                ))
            })?;
            let actual_rate = hwp.get_rate()?;
            if actual_rate != spec.rate {
                warn!(
                    target: LOG_TARGET,
                    "ALSA rate negotiation: requested={}, actual={}", spec.rate, actual_rate
                );
            }
            if let Err(e) = hwp.set_buffer_time_near(BUFFER_TIME_US, ValueOr::Nearest) {
                warn!(target: LOG_TARGET, "Device kept its default buffer time: {}", e);
            }
            if let Err(e) = hwp.set_period_time_near(PERIOD_TIME_US, ValueOr::Nearest) {
                warn!(target: LOG_TARGET, "Device kept its default period time: {}", e);
            }
            pcm.hw_params(&hwp)?;

            let swp = pcm.sw_params_current()?;
            let buffer_size = hwp.get_buffer_size()?;
            let period_size = hwp.get_period_size()?;
            swp.set_start_threshold(start_threshold(buffer_size, period_size))?;
            pcm.sw_params(&swp)?;
            debug!(
                target: LOG_TARGET,
                "ALSA parameters applied (rate={}, buffer={}, period={}).", actual_rate, buffer_size, period_size
            );
            actual_rate
        };

        self.pcm = Some(pcm);
        info!(target: LOG_TARGET, "ALSA initialized successfully.");
        Ok(actual_rate)
    }

    /// Writes S16LE interleaved samples without blocking, recovering from underruns.
    /// Returns `Ok(0)` when the device is full or an underrun was recovered;
    /// the caller should retry.
    pub fn write_s16_buffer(&self, buffer: &[i16]) -> Result<usize, PlatformError> {
        let pcm = self.pcm.as_ref().ok_or(PlatformError::AlreadyStopped)?;
        if pcm.state() == PcmState::Setup {
            // A previous stop dropped the stream; it must be prepared again.
            pcm.prepare()?;
        }
        let io = pcm.io_i16()?;

        match io.writei(buffer) {
            Ok(frames_written) => Ok(frames_written),
            Err(e) if e.errno() == Errno::EAGAIN => Ok(0),
            Err(e) if e.errno() == Errno::EPIPE => {
                warn!(target: LOG_TARGET, "ALSA buffer underrun (EPIPE), recovering.");
                pcm.recover(libc::EPIPE, true)?;
                Ok(0)
            }
            Err(e) => {
                error!(target: LOG_TARGET, "ALSA write error: {}", e);
                Err(e.into())
            }
        }
    }

    /// Starts the stream if it is still waiting for its start threshold.
    /// Short buffers never reach the threshold on their own.
    pub fn kick(&self) -> Result<(), PlatformError> {
        if let Some(pcm) = &self.pcm {
            if pcm.state() == PcmState::Prepared {
                debug!(target: LOG_TARGET, "Starting ALSA stream below threshold.");
                pcm.start()?;
            }
        }
        Ok(())
    }

    /// Frames written but not yet audible. Zero once the device ran dry.
    pub fn pending_frames(&self) -> usize {
        match &self.pcm {
            Some(pcm) if pcm.state() == PcmState::Running => {
                pcm.delay().map(|d| d.max(0) as usize).unwrap_or(0)
            }
            _ => 0,
        }
    }

    /// Discards queued audio immediately; the stream is re-prepared on the next write.
    pub fn drop_pending(&self) -> Result<(), PlatformError> {
        match &self.pcm {
            Some(pcm) => match pcm.state() {
                PcmState::Running | PcmState::Prepared | PcmState::XRun => {
                    debug!(target: LOG_TARGET, "Dropping pending ALSA frames.");
                    pcm.drop()?;
                    Ok(())
                }
                _ => Ok(()),
            },
            None => Err(PlatformError::AlreadyStopped),
        }
    }

    /// Closes the ALSA PCM device if it's open, dropping any queued audio.
    pub fn close(&mut self) {
        if let Some(pcm) = self.pcm.take() {
            debug!(target: LOG_TARGET, "Closing ALSA PCM device (state: {:?})...", pcm.state());
            if pcm.state() == PcmState::Running || pcm.state() == PcmState::Prepared {
                if let Err(e) = pcm.drop() {
                    warn!(target: LOG_TARGET, "Error dropping ALSA buffer during close (ignored): {}", e);
                }
            }
            debug!(target: LOG_TARGET, "ALSA PCM closed.");
        }
    }

    pub fn is_open(&self) -> bool {
        self.pcm.is_some()
    }
}

impl Drop for AlsaPcmHandler {
    fn drop(&mut self) {
        debug!(target: LOG_TARGET, "Dropping AlsaPcmHandler.");
        self.close();
    }
}
