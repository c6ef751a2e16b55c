use crate::audio::{
    alsa_handler::AlsaPcmHandler,
    buffer::DecodedAudioBuffer,
    error::PlatformError,
    platform::{AudioContext, AudioPlatform, EndedSender, OutputNode},
    rate::{self, RateScaler},
};
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use symphonia::core::audio::SignalSpec;
use tracing::{debug, error, info, instrument, trace, warn};

const LOG_TARGET: &str = "serene_player::audio::alsa_output";

/// Frames rendered and written per ALSA call (~10ms at 48kHz).
const WRITE_CHUNK_FRAMES: usize = 512;
/// Poll interval while waiting for the device to play out its queue.
const PLAYOUT_POLL: Duration = Duration::from_millis(5);
/// Back-off while the device buffer is full.
const WRITE_RETRY: Duration = Duration::from_millis(2);

const NODE_RUNNING: u8 = 0;
const NODE_STOPPED: u8 = 1;
const NODE_FINISHED: u8 = 2;

/// Linux ALSA implementation of the platform audio contract.
#[derive(Debug, Clone)]
pub struct AlsaPlatform {
    device_name: String,
}

impl AlsaPlatform {
    pub fn new(device_name: &str) -> Self {
        AlsaPlatform {
            device_name: device_name.to_string(),
        }
    }
}

impl AudioPlatform for AlsaPlatform {
    #[instrument(skip(self), fields(device = %self.device_name))]
    fn open_context(&self, spec: SignalSpec) -> Result<Box<dyn AudioContext>, PlatformError> {
        let mut handler = AlsaPcmHandler::new(&self.device_name);
        let device_rate = handler.initialize(spec)?;
        Ok(Box::new(AlsaContext {
            handler: Arc::new(Mutex::new(handler)),
            spec,
            device_rate,
            converted: None,
            closed: false,
        }))
    }
}

/// An opened ALSA device. Output nodes render on a dedicated thread
/// that polls the non-blocking device.
pub struct AlsaContext {
    handler: Arc<Mutex<AlsaPcmHandler>>,
    spec: SignalSpec,
    device_rate: u32,
    // The last buffer converted to the device rate, reused on restart.
    converted: Option<(Arc<DecodedAudioBuffer>, Arc<Vec<Vec<f32>>>)>,
    closed: bool,
}

impl AlsaContext {
    fn device_planes(
        &mut self,
        buffer: &Arc<DecodedAudioBuffer>,
    ) -> Result<Arc<Vec<Vec<f32>>>, PlatformError> {
        if let Some((source, planes)) = &self.converted {
            if Arc::ptr_eq(source, buffer) {
                return Ok(Arc::clone(planes));
            }
        }
        let source: Vec<&[f32]> = (0..buffer.channel_count()).map(|ch| buffer.channel(ch)).collect();
        let planes = Arc::new(rate::resample_planes(&source, buffer.sample_rate(), self.device_rate)?);
        self.converted = Some((Arc::clone(buffer), Arc::clone(&planes)));
        Ok(planes)
    }
}

impl AudioContext for AlsaContext {
    #[instrument(skip(self, buffer, on_ended), fields(frames = buffer.frames()))]
    fn start_output(
        &mut self,
        buffer: Arc<DecodedAudioBuffer>,
        rate: f32,
        on_ended: EndedSender,
    ) -> Result<Box<dyn OutputNode>, PlatformError> {
        if self.closed {
            return Err(PlatformError::DeviceUnavailable("output context is closed".to_string()));
        }
        if buffer.channel_count() != self.spec.channels.count() {
            return Err(PlatformError::Backend(format!(
                "buffer has {} channels, device opened for {}",
                buffer.channel_count(),
                self.spec.channels.count()
            )));
        }

        let planes = self.device_planes(&buffer)?;
        let control = Arc::new(NodeControl::new(rate));
        let handler = Arc::clone(&self.handler);
        let thread_control = Arc::clone(&control);

        info!(target: LOG_TARGET, "Starting ALSA output thread ({} device frames).", planes.first().map_or(0, Vec::len));
        thread::Builder::new()
            .name("alsa-output".to_string())
            .spawn(move || run_output(handler, planes, thread_control, on_ended))?;

        Ok(Box::new(AlsaOutputNode {
            control,
            handler: Arc::clone(&self.handler),
        }))
    }

    fn close(&mut self) -> Result<(), PlatformError> {
        if self.closed {
            return Err(PlatformError::AlreadyStopped);
        }
        self.closed = true;
        self.converted = None;
        lock_handler(&self.handler).close();
        info!(target: LOG_TARGET, "ALSA output context closed.");
        Ok(())
    }
}

impl Drop for AlsaContext {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.close();
        }
    }
}

/// State shared between a node handle and its output thread.
struct NodeControl {
    rate_bits: AtomicU32,
    state: AtomicU8,
}

impl NodeControl {
    fn new(rate: f32) -> Self {
        NodeControl {
            rate_bits: AtomicU32::new(rate.to_bits()),
            state: AtomicU8::new(NODE_RUNNING),
        }
    }

    fn rate(&self) -> f32 {
        f32::from_bits(self.rate_bits.load(Ordering::Relaxed))
    }

    fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == NODE_RUNNING
    }

    /// Moves out of `Running`; only the first transition wins.
    fn leave_running(&self, to: u8) -> bool {
        self.state
            .compare_exchange(NODE_RUNNING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Handle to one playback on an ALSA context.
pub struct AlsaOutputNode {
    control: Arc<NodeControl>,
    handler: Arc<Mutex<AlsaPcmHandler>>,
}

impl OutputNode for AlsaOutputNode {
    fn set_playback_rate(&self, rate: f32) {
        debug!(target: LOG_TARGET, "Output rate multiplier set to {}.", rate);
        self.control.rate_bits.store(rate.to_bits(), Ordering::Relaxed);
    }

    fn stop(&mut self) -> Result<(), PlatformError> {
        if !self.control.leave_running(NODE_STOPPED) {
            return Err(PlatformError::AlreadyStopped);
        }
        // The output thread re-checks the state under this lock before writing.
        lock_handler(&self.handler).drop_pending()?;
        debug!(target: LOG_TARGET, "ALSA output node stopped.");
        Ok(())
    }
}

impl Drop for AlsaOutputNode {
    fn drop(&mut self) {
        if self.control.is_running() {
            let _ = self.stop();
        }
    }
}

fn lock_handler(handler: &Mutex<AlsaPcmHandler>) -> MutexGuard<'_, AlsaPcmHandler> {
    handler.lock().unwrap_or_else(|poisoned| {
        error!(target: LOG_TARGET, "ALSA handler mutex poisoned; continuing with inner value.");
        poisoned.into_inner()
    })
}

fn to_s16(sample: f32) -> i16 {
    (sample * 32768.0).clamp(-32768.0, 32767.0) as i16
}

/// Output thread body: renders, writes, waits for play-out, then signals.
fn run_output(
    handler: Arc<Mutex<AlsaPcmHandler>>,
    planes: Arc<Vec<Vec<f32>>>,
    control: Arc<NodeControl>,
    on_ended: EndedSender,
) {
    let plane_refs: Vec<&[f32]> = planes.iter().map(Vec::as_slice).collect();
    let channels = plane_refs.len().max(1);
    let mut scaler = RateScaler::new();
    let mut scratch = Vec::with_capacity(WRITE_CHUNK_FRAMES * channels);

    loop {
        if !control.is_running() {
            debug!(target: LOG_TARGET, "Output thread exiting: node stopped.");
            return;
        }
        scratch.clear();
        // Planes are already at the device rate, so the step is the multiplier.
        let produced = scaler.render(&plane_refs, control.rate() as f64, WRITE_CHUNK_FRAMES, &mut scratch);
        if produced == 0 {
            break;
        }
        let s16: Vec<i16> = scratch.iter().copied().map(to_s16).collect();
        if let Err(e) = write_all(&handler, &s16, channels, &control) {
            error!(target: LOG_TARGET, "ALSA output failed: {}", e);
            // Dropping `on_ended` unsent tells the controller the output died.
            control.leave_running(NODE_FINISHED);
            return;
        }
    }

    if let Err(e) = lock_handler(&handler).kick() {
        warn!(target: LOG_TARGET, "Failed to start short ALSA stream: {}", e);
    }
    loop {
        if !control.is_running() {
            return;
        }
        if lock_handler(&handler).pending_frames() == 0 {
            break;
        }
        thread::sleep(PLAYOUT_POLL);
    }

    if control.leave_running(NODE_FINISHED) {
        info!(target: LOG_TARGET, "Buffer played to the end.");
        if on_ended.send(()).is_err() {
            trace!(target: LOG_TARGET, "End-of-buffer listener already gone.");
        }
    }
}

fn write_all(
    handler: &Mutex<AlsaPcmHandler>,
    s16: &[i16],
    channels: usize,
    control: &NodeControl,
) -> Result<(), PlatformError> {
    write_frames(s16.len() / channels, |offset| {
        let guard = lock_handler(handler);
        // Re-checked under the lock so a concurrent `stop` wins.
        if !control.is_running() || !guard.is_open() {
            return Ok(None);
        }
        guard.write_s16_buffer(&s16[offset * channels..]).map(Some)
    })
}

/// Feeds `total_frames` through `write`, which is called with the current
/// frame offset and returns the frames accepted, or `None` to stop early.
/// Zero accepted frames means the device is full: back off and retry.
/// `write` takes the handler lock per call, so it is free between retries.
pub fn write_frames<F>(total_frames: usize, mut write: F) -> Result<(), PlatformError>
where
    F: FnMut(usize) -> Result<Option<usize>, PlatformError>,
{
    let mut offset = 0;
    while offset < total_frames {
        let Some(written) = write(offset)? else {
            return Ok(());
        };
        if written == 0 {
            thread::sleep(WRITE_RETRY);
            continue;
        }
        offset += written.min(total_frames - offset);
        trace!(target: LOG_TARGET, "Wrote {} frames to ALSA ({}/{}).", written, offset, total_frames);
    }
    Ok(())
}
