//! Device boundary traits.
//!
//! Device acquisition and scheduling live outside the pipeline; the pipeline
//! only needs a native sample rate and an explicit way to wire and unwire its
//! callback. Registration returns a handle that must be unregistered on stop.

use crate::error::AudioError;
use crate::player::PlaybackSource;

/// Callback invoked by a capture device with each fixed-size block of
/// interleaved f32 samples at the device's native rate.
pub type BlockCallback = Box<dyn FnMut(&[f32]) + Send>;

/// Opaque proof of a registered callback. Not cloneable: exactly one
/// unregister per register.
#[derive(Debug)]
pub struct CallbackHandle {
    id: u64,
}

impl CallbackHandle {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// A source of fixed-cadence capture blocks (a microphone).
pub trait CaptureDevice {
    /// Native sample rate the device delivers blocks at.
    fn sample_rate(&self) -> u32;

    /// Wire the processing callback. Fails with `DeviceUnavailable` when the
    /// device cannot be acquired.
    fn register(&mut self, callback: BlockCallback) -> Result<CallbackHandle, AudioError>;

    /// Disconnect the callback. Must be synchronous: when this returns, no
    /// callback invocation is in flight and none will follow, so the caller
    /// may safely release state the callback captured.
    fn unregister(&mut self, handle: CallbackHandle);
}

/// A sink pulling fixed-cadence playback blocks (a speaker).
pub trait PlaybackDevice {
    /// Native sample rate the device pulls blocks at.
    fn sample_rate(&self) -> u32;

    /// Wire the pull source the device will drain on its own cadence.
    fn register(&mut self, source: PlaybackSource) -> Result<CallbackHandle, AudioError>;

    /// Disconnect the pull source; same synchronous guarantee as
    /// [`CaptureDevice::unregister`].
    fn unregister(&mut self, handle: CallbackHandle);
}
