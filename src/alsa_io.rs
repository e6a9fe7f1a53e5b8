//! ALSA-backed capture and playback devices (feature `alsa-io`).
//!
//! Each device opens its PCM up front so the negotiated rate is known before
//! a pipeline starts, then drives its callback from a dedicated OS thread
//! (NOT an async task; realtime audio I/O must not contend with the network
//! runtime). Unregistering stops and joins the thread, which is what makes
//! the no-in-flight-callback guarantee hold.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction, ValueOr};

use crate::device::{BlockCallback, CallbackHandle, CaptureDevice, PlaybackDevice};
use crate::error::AudioError;
use crate::player::PlaybackSource;

/// Parameters negotiated with the ALSA hardware.
#[derive(Debug, Clone)]
struct PcmParams {
    sample_rate: u32,
    channels: u32,
    period_size: usize,
}

fn open_pcm(
    device: &str,
    direction: Direction,
    sample_rate: u32,
    channels: u32,
    period_size: Option<usize>,
    dir_name: &str,
) -> Result<(PCM, PcmParams), AudioError> {
    let unavailable =
        |e: alsa::Error| AudioError::DeviceUnavailable(format!("{dir_name} '{device}': {e}"));

    let pcm = PCM::new(device, direction, false).map_err(unavailable)?;

    {
        let hwp = HwParams::any(&pcm).map_err(unavailable)?;
        hwp.set_access(Access::RWInterleaved).map_err(unavailable)?;
        hwp.set_format(Format::FloatLE).map_err(unavailable)?;
        hwp.set_channels(channels).map_err(unavailable)?;
        hwp.set_rate_near(sample_rate, ValueOr::Nearest)
            .map_err(unavailable)?;
        if let Some(ps) = period_size {
            hwp.set_period_size_near(ps as alsa::pcm::Frames, ValueOr::Nearest)
                .map_err(unavailable)?;
        }
        pcm.hw_params(&hwp).map_err(unavailable)?;
    }

    // Read back what the hardware actually agreed to.
    let params = {
        let hwp = pcm.hw_params_current().map_err(unavailable)?;
        PcmParams {
            sample_rate: hwp.get_rate().map_err(unavailable)?,
            channels: hwp.get_channels().map_err(unavailable)?,
            period_size: hwp.get_period_size().map_err(unavailable)? as usize,
        }
    };

    log::info!(
        "ALSA {}: device={}, rate={}, channels={}, period_size={}",
        dir_name,
        device,
        params.sample_rate,
        params.channels,
        params.period_size,
    );

    Ok((pcm, params))
}

struct Worker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Worker {
    fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.handle.join();
    }
}

// ======================== Capture ========================

/// Microphone backed by an ALSA capture PCM.
pub struct AlsaCaptureDevice {
    pcm: Option<PCM>,
    params: PcmParams,
    worker: Option<Worker>,
}

impl AlsaCaptureDevice {
    /// Open an ALSA capture device (e.g. "default", "plughw:0,0").
    ///
    /// The requested rate and channel count are negotiated with the hardware;
    /// read the actual rate back via [`CaptureDevice::sample_rate`].
    pub fn open(device: &str, sample_rate: u32, channels: u32) -> Result<Self, AudioError> {
        let (pcm, params) = open_pcm(device, Direction::Capture, sample_rate, channels, None, "capture")?;
        Ok(Self {
            pcm: Some(pcm),
            params,
            worker: None,
        })
    }
}

impl CaptureDevice for AlsaCaptureDevice {
    fn sample_rate(&self) -> u32 {
        self.params.sample_rate
    }

    fn register(&mut self, mut callback: BlockCallback) -> Result<CallbackHandle, AudioError> {
        let pcm = self.pcm.take().ok_or_else(|| {
            AudioError::DeviceUnavailable("capture device already registered".into())
        })?;
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        let channels = self.params.channels as usize;
        let period_size = self.params.period_size;

        let handle = thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || {
                let io = match pcm.io_f32() {
                    Ok(io) => io,
                    Err(e) => {
                        log::error!("ALSA capture io: {e}");
                        return;
                    }
                };
                let mut read_buf = vec![0.0f32; period_size * channels];
                while thread_running.load(Ordering::Relaxed) {
                    match io.readi(&mut read_buf) {
                        Ok(frames) => callback(&read_buf[..frames * channels]),
                        Err(e) => {
                            log::warn!("ALSA capture error: {e}, recovering...");
                            if let Err(e2) = pcm.prepare() {
                                log::error!("failed to recover PCM capture: {e2}");
                                break;
                            }
                        }
                    }
                }
                log::info!("capture thread stopped");
            })
            .map_err(|e| AudioError::DeviceUnavailable(format!("capture thread: {e}")))?;

        self.worker = Some(Worker { running, handle });
        Ok(CallbackHandle::new(1))
    }

    fn unregister(&mut self, _handle: CallbackHandle) {
        if let Some(worker) = self.worker.take() {
            worker.stop();
        }
    }
}

// ======================== Playback ========================

/// Speaker backed by an ALSA playback PCM.
pub struct AlsaPlaybackDevice {
    pcm: Option<PCM>,
    params: PcmParams,
    worker: Option<Worker>,
}

impl AlsaPlaybackDevice {
    /// Open an ALSA playback device. `period_size` of 0 lets ALSA decide;
    /// pass [`crate::AudioConfig::effective_buffer_size`] to align device
    /// blocks with the configured block size.
    pub fn open(
        device: &str,
        sample_rate: u32,
        channels: u32,
        period_size: usize,
    ) -> Result<Self, AudioError> {
        let period = if period_size > 0 { Some(period_size) } else { None };
        let (pcm, params) =
            open_pcm(device, Direction::Playback, sample_rate, channels, period, "playback")?;
        Ok(Self {
            pcm: Some(pcm),
            params,
            worker: None,
        })
    }
}

impl PlaybackDevice for AlsaPlaybackDevice {
    fn sample_rate(&self) -> u32 {
        self.params.sample_rate
    }

    fn register(&mut self, mut source: PlaybackSource) -> Result<CallbackHandle, AudioError> {
        let pcm = self.pcm.take().ok_or_else(|| {
            AudioError::DeviceUnavailable("playback device already registered".into())
        })?;
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        let channels = self.params.channels as usize;
        let period_size = self.params.period_size;

        let handle = thread::Builder::new()
            .name("audio-playback".into())
            .spawn(move || {
                let io = match pcm.io_f32() {
                    Ok(io) => io,
                    Err(e) => {
                        log::error!("ALSA playback io: {e}");
                        return;
                    }
                };
                // The blocking writei paces this loop at the device cadence.
                let mut block = vec![0.0f32; period_size * channels];
                while thread_running.load(Ordering::Relaxed) {
                    source.pull(&mut block);
                    let mut written = 0;
                    while written < period_size {
                        match io.writei(&block[written * channels..]) {
                            Ok(n) => written += n,
                            Err(e) => {
                                log::warn!("ALSA playback error: {e}, recovering...");
                                if let Err(e2) = pcm.prepare() {
                                    log::error!("failed to recover PCM playback: {e2}");
                                    return;
                                }
                                break; // drop the rest of this block after an XRUN
                            }
                        }
                    }
                }
                log::info!("playback thread stopped");
            })
            .map_err(|e| AudioError::DeviceUnavailable(format!("playback thread: {e}")))?;

        self.worker = Some(Worker { running, handle });
        Ok(CallbackHandle::new(1))
    }

    fn unregister(&mut self, _handle: CallbackHandle) {
        if let Some(worker) = self.worker.take() {
            worker.stop();
        }
    }
}
