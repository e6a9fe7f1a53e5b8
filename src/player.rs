//! Playback pipeline: wire packets in, device blocks out.
//!
//! Two independent cadences meet at the playback queue. Packets arrive on the
//! network's schedule and are decoded and resampled right there, so the
//! device's fixed-cadence pull only ever copies samples out of the queue.
//! Underruns are served with silence; the device callback never blocks and
//! never sees an error.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::codec::Decoder;
use crate::config::AudioConfig;
use crate::device::{CallbackHandle, PlaybackDevice};
use crate::error::AudioError;
use crate::queue::{lock_queue, PlaybackQueue};
use crate::resample::Resampler;
use crate::StreamState;

/// The playback-side stream: transport to speaker.
pub struct Player {
    config: AudioConfig,
    state: StreamState,
    decoder: Option<Decoder>,
    resampler: Option<Resampler>,
    queue: Arc<Mutex<PlaybackQueue>>,
    /// Playback gain as f32 bits, shared with the pull handle.
    volume: Arc<AtomicU32>,
    handle: Option<CallbackHandle>,
    device_rate: u32,
}

impl Player {
    /// Validate the configuration; acquires nothing yet.
    pub fn new(config: AudioConfig) -> Result<Self, AudioError> {
        config.validate()?;
        let channels = config.channels;
        Ok(Self {
            config,
            state: StreamState::Idle,
            decoder: None,
            resampler: None,
            queue: Arc::new(Mutex::new(PlaybackQueue::new(0, channels))),
            volume: Arc::new(AtomicU32::new(1.0f32.to_bits())),
            handle: None,
            device_rate: 0,
        })
    }

    /// Construct decoder and resampler against the device's native rate,
    /// size the queue cap, and wire the pull source into the device.
    ///
    /// Only legal from `Idle`. On failure every acquired resource is released
    /// and the player returns to `Idle`.
    pub fn start(&mut self, device: &mut dyn PlaybackDevice) -> Result<(), AudioError> {
        if self.state != StreamState::Idle {
            return Err(AudioError::Configuration(format!(
                "cannot start player from {:?}",
                self.state
            )));
        }
        self.state = StreamState::Starting;
        match self.wire(device) {
            Ok(()) => {
                self.state = StreamState::Active;
                log::info!(
                    "player started: wire {} Hz -> device {} Hz, {} ch, queue cap {} samples",
                    self.config.wire_sample_rate,
                    self.device_rate,
                    self.config.channels,
                    self.config.queue_capacity(self.device_rate),
                );
                Ok(())
            }
            Err(e) => {
                self.decoder = None;
                self.resampler = None;
                self.state = StreamState::Idle;
                Err(e)
            }
        }
    }

    fn wire(&mut self, device: &mut dyn PlaybackDevice) -> Result<(), AudioError> {
        let device_rate = device.sample_rate();
        self.decoder = Some(Decoder::new(&self.config)?);
        self.resampler = Some(Resampler::new(
            self.config.wire_sample_rate,
            device_rate,
            self.config.channels,
        )?);
        {
            let mut q = lock_queue(&self.queue);
            q.set_capacity(self.config.queue_capacity(device_rate));
            q.clear();
        }
        let handle = device.register(self.source())?;
        self.handle = Some(handle);
        self.device_rate = device_rate;
        Ok(())
    }

    /// Feed one wire packet. Any order, any rate; out-of-order and duplicate
    /// packets degrade quality but are tolerated as-is.
    ///
    /// Decode and resample happen here, on arrival, so the device pull path
    /// stays a plain copy. Malformed packets become a silence frame. Packets
    /// arriving outside `Active` are dropped.
    pub fn write_packet(&mut self, packet: &[u8]) {
        if self.state != StreamState::Active {
            log::debug!("packet ignored while {:?}", self.state);
            return;
        }
        let (Some(decoder), Some(resampler)) = (self.decoder.as_mut(), self.resampler.as_mut())
        else {
            return;
        };
        let frame = decoder.decode_or_silence(packet);
        let resampled = resampler.resample(&frame);
        lock_queue(&self.queue).push(&resampled);
    }

    /// The pull handle handed to the playback device.
    ///
    /// Valid for the lifetime of the player; pulls against a stopped player
    /// simply yield silence.
    pub fn source(&self) -> PlaybackSource {
        PlaybackSource {
            queue: Arc::clone(&self.queue),
            volume: Arc::clone(&self.volume),
        }
    }

    /// Unwire the device pull, then release decoder and resampler state and
    /// clear the queue.
    ///
    /// The unregister happens first so no in-flight pull can observe freed
    /// state. A stop of a non-active player is a no-op.
    pub fn stop(&mut self, device: &mut dyn PlaybackDevice) {
        if self.state != StreamState::Active {
            return;
        }
        self.state = StreamState::Stopping;
        if let Some(handle) = self.handle.take() {
            device.unregister(handle);
        }
        self.decoder = None;
        self.resampler = None;
        lock_queue(&self.queue).clear();
        self.state = StreamState::Idle;
        log::info!("player stopped");
    }

    /// Playback gain, applied on the pull path. 1.0 is unity.
    pub fn set_volume(&self, gain: f32) {
        self.volume.store(gain.to_bits(), Ordering::Relaxed);
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    /// Samples currently buffered for playback.
    pub fn buffered(&self) -> usize {
        lock_queue(&self.queue).len()
    }

    /// Samples evicted by queue overflow since start.
    pub fn overflow_dropped(&self) -> u64 {
        lock_queue(&self.queue).dropped()
    }

    pub fn state(&self) -> StreamState {
        self.state
    }
}

/// The device-facing half of the playback pipeline.
///
/// `pull` is the only operation on the realtime path: one lock, one copy, one
/// optional gain multiply. It never blocks on the network, never allocates,
/// and never fails.
pub struct PlaybackSource {
    queue: Arc<Mutex<PlaybackQueue>>,
    volume: Arc<AtomicU32>,
}

impl PlaybackSource {
    /// Fill `out` (one device block, interleaved) from the queue, or with
    /// silence when fewer samples are buffered than requested.
    ///
    /// Returns `true` when real audio was delivered.
    pub fn pull(&mut self, out: &mut [f32]) -> bool {
        let served = lock_queue(&self.queue).read_or_silence(out);
        if served {
            let gain = f32::from_bits(self.volume.load(Ordering::Relaxed));
            if gain != 1.0 {
                for sample in out.iter_mut() {
                    *sample *= gain;
                }
            }
        }
        served
    }
}
