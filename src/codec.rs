//! Opus codec adapter enforcing the fixed-frame-size contract.
//!
//! The encoder accepts arbitrary-length input and buffers the remainder of a
//! partial frame across calls, emitting one packet per complete frame. The
//! decoder always yields exactly one configured frame of samples; malformed
//! packets are reported as `AudioError::Codec` so the caller can substitute
//! silence instead of surfacing the failure to a device callback.

use bytes::Bytes;

use crate::config::AudioConfig;
use crate::error::AudioError;

/// Upper bound for one encoded packet, matching the recommended libopus
/// output buffer.
const MAX_PACKET_BYTES: usize = 4000;

/// Decode scratch space: 120 ms at 48 kHz, the largest frame Opus can emit.
const MAX_DECODE_FRAMES: usize = 5760;

// ======================== Encoder ========================

/// Fixed-size-in, variable-size-out Opus encoder.
pub struct Encoder {
    encoder: opus::Encoder,
    /// Samples waiting for a full frame.
    pending: Vec<f32>,
    frame_samples: usize,
}

impl Encoder {
    pub fn new(config: &AudioConfig) -> Result<Self, AudioError> {
        config.validate()?;
        let encoder = opus::Encoder::new(
            config.wire_sample_rate,
            config.opus_channels(),
            config.application.to_opus(),
        )?;
        let frame_samples = config.frame_samples();
        Ok(Self {
            encoder,
            pending: Vec::with_capacity(frame_samples * 2),
            frame_samples,
        })
    }

    /// Feed interleaved wire-rate samples; returns zero or more packets.
    ///
    /// Input of any length is accepted. Leftover samples short of a frame are
    /// held until the next call; nothing else is buffered.
    pub fn encode(&mut self, samples: &[f32]) -> Result<Vec<Bytes>, AudioError> {
        self.pending.extend_from_slice(samples);
        let mut packets = Vec::new();
        while self.pending.len() >= self.frame_samples {
            let frame: Vec<f32> = self.pending.drain(..self.frame_samples).collect();
            let data = self.encoder.encode_vec_float(&frame, MAX_PACKET_BYTES)?;
            packets.push(Bytes::from(data));
        }
        Ok(packets)
    }

    /// Interleaved samples per codec frame.
    pub fn frame_samples(&self) -> usize {
        self.frame_samples
    }

    /// Samples currently buffered short of a full frame.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

// ======================== Decoder ========================

/// Variable-size-in, fixed-size-out Opus decoder.
pub struct Decoder {
    decoder: opus::Decoder,
    channels: usize,
    frame_samples: usize,
    scratch: Vec<f32>,
}

impl Decoder {
    pub fn new(config: &AudioConfig) -> Result<Self, AudioError> {
        config.validate()?;
        let decoder = opus::Decoder::new(config.wire_sample_rate, config.opus_channels())?;
        Ok(Self {
            decoder,
            channels: config.channels,
            frame_samples: config.frame_samples(),
            scratch: vec![0.0; MAX_DECODE_FRAMES * config.channels],
        })
    }

    /// Decode one packet to exactly one frame of interleaved samples.
    ///
    /// A valid packet whose duration differs from the configured frame is
    /// fitted (truncated or zero-padded) to the contract length.
    pub fn decode(&mut self, packet: &[u8]) -> Result<Vec<f32>, AudioError> {
        let decoded = self.decoder.decode_float(packet, &mut self.scratch, false)?;
        let mut frame = self.scratch[..decoded * self.channels].to_vec();
        if frame.len() != self.frame_samples {
            log::debug!(
                "packet decoded to {} samples, fitting to frame size {}",
                frame.len(),
                self.frame_samples
            );
            frame.resize(self.frame_samples, 0.0);
        }
        Ok(frame)
    }

    /// Decode with local recovery: malformed packets become a silence frame.
    ///
    /// This is the form used on the playback arrival path, which must never
    /// propagate a failure toward the device callback.
    pub fn decode_or_silence(&mut self, packet: &[u8]) -> Vec<f32> {
        match self.decode(packet) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("decode failed ({e}), substituting silence frame");
                self.silence_frame()
            }
        }
    }

    /// One frame of zeros at the configured frame size.
    pub fn silence_frame(&self) -> Vec<f32> {
        vec![0.0; self.frame_samples]
    }

    /// Interleaved samples per codec frame.
    pub fn frame_samples(&self) -> usize {
        self.frame_samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodecApplication;

    fn config() -> AudioConfig {
        AudioConfig::default() // 24 kHz mono, 20 ms frames: 480 samples
    }

    fn tone(n: usize) -> Vec<f32> {
        (0..n).map(|i| (i as f32 * 0.05).sin() * 0.5).collect()
    }

    #[test]
    fn encoder_buffers_partial_frames_across_calls() {
        let mut enc = Encoder::new(&config()).unwrap();
        assert_eq!(enc.frame_samples(), 480);

        let packets = enc.encode(&tone(300)).unwrap();
        assert!(packets.is_empty());
        assert_eq!(enc.pending_len(), 300);

        let packets = enc.encode(&tone(300)).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(enc.pending_len(), 120);
    }

    #[test]
    fn encoder_emits_multiple_packets_for_large_blocks() {
        let mut enc = Encoder::new(&config()).unwrap();
        let packets = enc.encode(&tone(480 * 3 + 100)).unwrap();
        assert_eq!(packets.len(), 3);
        assert_eq!(enc.pending_len(), 100);
        for p in &packets {
            assert!(!p.is_empty());
            assert!(p.len() <= MAX_PACKET_BYTES);
        }
    }

    #[test]
    fn round_trip_preserves_frame_length_and_finiteness() {
        let cfg = config();
        let mut enc = Encoder::new(&cfg).unwrap();
        let mut dec = Decoder::new(&cfg).unwrap();

        let packets = enc.encode(&tone(480 * 4)).unwrap();
        assert_eq!(packets.len(), 4);
        for p in packets {
            let frame = dec.decode(&p).unwrap();
            assert_eq!(frame.len(), 480);
            assert!(frame.iter().all(|s| s.is_finite()));
        }
    }

    #[test]
    fn stereo_round_trip() {
        let cfg = AudioConfig {
            channels: 2,
            application: CodecApplication::Audio,
            ..Default::default()
        };
        let mut enc = Encoder::new(&cfg).unwrap();
        let mut dec = Decoder::new(&cfg).unwrap();
        let packets = enc.encode(&tone(960 * 2)).unwrap();
        assert_eq!(packets.len(), 2);
        let frame = dec.decode(&packets[0]).unwrap();
        assert_eq!(frame.len(), 960);
    }

    #[test]
    fn corrupted_packet_never_reaches_the_caller_as_a_failure() {
        let mut dec = Decoder::new(&config()).unwrap();
        let garbage: Vec<u8> = (0..37).map(|i| (i * 89) as u8).collect();
        let frame = dec.decode_or_silence(&garbage);
        assert_eq!(frame.len(), 480);
        assert!(frame.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn silence_frame_matches_configured_length() {
        let dec = Decoder::new(&config()).unwrap();
        let frame = dec.silence_frame();
        assert_eq!(frame.len(), 480);
        assert!(frame.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn rejects_invalid_config_before_acquisition() {
        let cfg = AudioConfig {
            wire_sample_rate: 11025,
            ..Default::default()
        };
        assert!(matches!(
            Encoder::new(&cfg),
            Err(AudioError::Configuration(_))
        ));
        assert!(Decoder::new(&cfg).is_err());
    }
}
