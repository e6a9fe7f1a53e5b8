//! Capture pipeline: device blocks in, wire packets out.
//!
//! Driven entirely by the capture device's processing callback. Each block is
//! resampled from the device rate to the wire rate, fed to the encoder (which
//! buffers partial frames), and every resulting packet is handed to the
//! transport in order. Sends are fire-and-forget: a transport that is not
//! ready costs the packet, never memory or blocking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::codec::Encoder;
use crate::config::AudioConfig;
use crate::device::{BlockCallback, CallbackHandle, CaptureDevice};
use crate::error::AudioError;
use crate::resample::Resampler;
use crate::transport::PacketSink;
use crate::StreamState;

/// Everything the capture callback touches, behind one lock.
struct CapturePipeline {
    resampler: Resampler,
    encoder: Encoder,
    sink: Box<dyn PacketSink>,
}

impl CapturePipeline {
    fn process_block(&mut self, block: &[f32], muted: bool) {
        let zeros;
        let block = if muted {
            // Keep packets flowing while muted, matching a gain of zero.
            zeros = vec![0.0; block.len()];
            &zeros[..]
        } else {
            block
        };

        let resampled = self.resampler.resample(block);
        match self.encoder.encode(&resampled) {
            Ok(packets) => {
                for packet in packets {
                    if let Err(e) = self.sink.try_send(packet) {
                        log::debug!("wire packet dropped: {e}");
                    }
                }
            }
            Err(e) => log::error!("encode error: {e}"),
        }
    }
}

/// The capture-side stream: microphone to transport.
pub struct Streamer {
    config: AudioConfig,
    state: StreamState,
    pipeline: Option<Arc<Mutex<CapturePipeline>>>,
    muted: Arc<AtomicBool>,
    handle: Option<CallbackHandle>,
}

impl Streamer {
    /// Validate the configuration; acquires nothing yet.
    pub fn new(config: AudioConfig) -> Result<Self, AudioError> {
        config.validate()?;
        Ok(Self {
            config,
            state: StreamState::Idle,
            pipeline: None,
            muted: Arc::new(AtomicBool::new(false)),
            handle: None,
        })
    }

    /// Construct resampler and encoder, then wire the device callback.
    ///
    /// Only legal from `Idle`. On failure every acquired resource is released
    /// and the streamer returns to `Idle`.
    pub fn start(
        &mut self,
        device: &mut dyn CaptureDevice,
        sink: Box<dyn PacketSink>,
    ) -> Result<(), AudioError> {
        if self.state != StreamState::Idle {
            return Err(AudioError::Configuration(format!(
                "cannot start streamer from {:?}",
                self.state
            )));
        }
        self.state = StreamState::Starting;
        match self.wire(device, sink) {
            Ok(()) => {
                self.state = StreamState::Active;
                log::info!(
                    "streamer started: device {} Hz -> wire {} Hz, {} ch",
                    device.sample_rate(),
                    self.config.wire_sample_rate,
                    self.config.channels,
                );
                Ok(())
            }
            Err(e) => {
                self.pipeline = None;
                self.state = StreamState::Idle;
                Err(e)
            }
        }
    }

    fn wire(
        &mut self,
        device: &mut dyn CaptureDevice,
        sink: Box<dyn PacketSink>,
    ) -> Result<(), AudioError> {
        let resampler = Resampler::new(
            device.sample_rate(),
            self.config.wire_sample_rate,
            self.config.channels,
        )?;
        let encoder = Encoder::new(&self.config)?;
        let pipeline = Arc::new(Mutex::new(CapturePipeline {
            resampler,
            encoder,
            sink,
        }));

        let cb_pipeline = Arc::clone(&pipeline);
        let cb_muted = Arc::clone(&self.muted);
        let callback: BlockCallback = Box::new(move |block| {
            let muted = cb_muted.load(Ordering::Relaxed);
            let mut p = cb_pipeline
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            p.process_block(block, muted);
        });

        let handle = device.register(callback)?;
        self.pipeline = Some(pipeline);
        self.handle = Some(handle);
        Ok(())
    }

    /// Unwire the device callback, then release codec and resampler state.
    ///
    /// The unregister happens first so no in-flight callback can touch freed
    /// state. Safe to call in any state; a stop of a non-active streamer is a
    /// no-op.
    pub fn stop(&mut self, device: &mut dyn CaptureDevice) {
        if self.state != StreamState::Active {
            return;
        }
        self.state = StreamState::Stopping;
        if let Some(handle) = self.handle.take() {
            device.unregister(handle);
        }
        self.pipeline = None;
        self.state = StreamState::Idle;
        log::info!("streamer stopped");
    }

    /// Zero outgoing audio without tearing down the stream.
    pub fn mute(&self) {
        self.muted.store(true, Ordering::Relaxed);
        log::debug!("mic muted");
    }

    pub fn unmute(&self) {
        self.muted.store(false, Ordering::Relaxed);
        log::debug!("mic unmuted");
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> StreamState {
        self.state
    }
}
