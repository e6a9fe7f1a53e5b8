//! Stream configuration.
//!
//! Everything here describes the wire side of a stream: the rate samples are
//! resampled to before encoding, the channel count, and the Opus profile.
//! Device-native rates are read from the devices at start, never configured.

use serde::{Deserialize, Serialize};

use crate::error::AudioError;

/// Opus application profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecApplication {
    /// Tuned for speech.
    Voip,
    /// Tuned for general audio.
    Audio,
    /// Minimum coding delay.
    LowDelay,
}

impl CodecApplication {
    pub(crate) fn to_opus(self) -> opus::Application {
        match self {
            CodecApplication::Voip => opus::Application::Voip,
            CodecApplication::Audio => opus::Application::Audio,
            CodecApplication::LowDelay => opus::Application::LowDelay,
        }
    }
}

/// Audio stream configuration, shared by both pipeline directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate on the wire, i.e. the Opus codec rate (8000, 12000, 16000,
    /// 24000, or 48000).
    pub wire_sample_rate: u32,
    /// Channel count on the wire (1 or 2). Blocks are interleaved; the
    /// pipeline performs no remixing.
    pub channels: usize,
    /// Opus application profile.
    pub application: CodecApplication,
    /// Codec frame duration in ms (10, 20, 40, or 60).
    pub frame_duration_ms: u32,
    /// Preferred device block size in samples per channel. Device backends
    /// may consult this when configuring period sizes.
    pub buffer_size: usize,
    /// Derive `buffer_size` from the wire rate (`rate / 6000 * 1024`) instead
    /// of using the configured value.
    pub calc_buffer: bool,
    /// Maximum buffered playback audio in ms. Oldest samples are dropped when
    /// packets arrive faster than the device drains them.
    pub max_queue_ms: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            wire_sample_rate: 24000,
            channels: 1,
            application: CodecApplication::Voip,
            frame_duration_ms: 20,
            buffer_size: 4096,
            calc_buffer: false,
            max_queue_ms: 2000,
        }
    }
}

impl AudioConfig {
    /// Validate the rate/channel/profile combination.
    ///
    /// Called by every pipeline constructor before any resource acquisition.
    pub fn validate(&self) -> Result<(), AudioError> {
        match self.wire_sample_rate {
            8000 | 12000 | 16000 | 24000 | 48000 => {}
            other => {
                return Err(AudioError::Configuration(format!(
                    "unsupported wire sample rate: {other}"
                )));
            }
        }
        if self.channels == 0 || self.channels > 2 {
            return Err(AudioError::Configuration(format!(
                "unsupported channel count: {}",
                self.channels
            )));
        }
        match self.frame_duration_ms {
            10 | 20 | 40 | 60 => {}
            other => {
                return Err(AudioError::Configuration(format!(
                    "unsupported frame duration: {other} ms"
                )));
            }
        }
        if !self.calc_buffer && self.buffer_size == 0 {
            return Err(AudioError::Configuration(
                "buffer_size must be non-zero".into(),
            ));
        }
        if self.max_queue_ms == 0 {
            return Err(AudioError::Configuration(
                "max_queue_ms must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Codec frame size in samples per channel.
    pub fn frame_size(&self) -> usize {
        (self.wire_sample_rate * self.frame_duration_ms / 1000) as usize
    }

    /// Codec frame size in interleaved samples across all channels.
    pub fn frame_samples(&self) -> usize {
        self.frame_size() * self.channels
    }

    /// Device block size in samples per channel, honoring `calc_buffer`.
    pub fn effective_buffer_size(&self) -> usize {
        if self.calc_buffer {
            (self.wire_sample_rate as usize / 6000) * 1024
        } else {
            self.buffer_size
        }
    }

    /// Playback queue capacity in interleaved samples for a given device rate.
    pub fn queue_capacity(&self, device_rate: u32) -> usize {
        (device_rate as u64 * self.max_queue_ms as u64 / 1000) as usize * self.channels
    }

    pub(crate) fn opus_channels(&self) -> opus::Channels {
        if self.channels == 1 {
            opus::Channels::Mono
        } else {
            opus::Channels::Stereo
        }
    }
}
