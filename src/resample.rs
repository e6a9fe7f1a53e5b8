//! Streaming sample rate conversion by linear interpolation.
//!
//! The resampler keeps a fractional position and a one-frame history across
//! calls, so feeding a stream in arbitrary chunks produces the same output as
//! resampling the whole stream at once. One instance per stream direction.

use crate::error::AudioError;

/// Converts interleaved f32 samples from a source rate to a target rate.
pub struct Resampler {
    source_rate: u32,
    target_rate: u32,
    channels: usize,
    /// Source frames advanced per output frame.
    step: f64,
    /// Position of the next output frame, measured from the history frame
    /// (0.0 = exactly at the history frame, 1.0 = at the first input frame).
    pos: f64,
    /// Last source frame of the previous call, one sample per channel.
    history: Vec<f32>,
    primed: bool,
}

impl Resampler {
    /// Create a resampler for one stream direction.
    ///
    /// * `source_rate` - Input sample rate in Hz
    /// * `target_rate` - Output sample rate in Hz
    /// * `channels`    - Interleaved channel count
    pub fn new(source_rate: u32, target_rate: u32, channels: usize) -> Result<Self, AudioError> {
        if source_rate == 0 || target_rate == 0 {
            return Err(AudioError::Configuration(format!(
                "invalid resample rates: {source_rate} -> {target_rate}"
            )));
        }
        if channels == 0 {
            return Err(AudioError::Configuration("resampler needs at least one channel".into()));
        }
        Ok(Self {
            source_rate,
            target_rate,
            channels,
            step: source_rate as f64 / target_rate as f64,
            pos: 0.0,
            history: vec![0.0; channels],
            primed: false,
        })
    }

    /// Convert one chunk of interleaved samples.
    ///
    /// Input length is caller-determined and may vary call to call; state is
    /// carried so consecutive calls behave as one continuous stream. An empty
    /// input yields an empty output and leaves the state untouched.
    pub fn resample(&mut self, input: &[f32]) -> Vec<f32> {
        if input.is_empty() {
            return Vec::new();
        }
        if self.source_rate == self.target_rate {
            return input.to_vec();
        }

        debug_assert_eq!(input.len() % self.channels, 0);
        let frames = input.len() / self.channels;

        if !self.primed {
            // First call in a stream: the first input frame doubles as its
            // own predecessor.
            self.history.copy_from_slice(&input[..self.channels]);
            self.primed = true;
        }

        let expected = ((frames as f64 - self.pos) / self.step).ceil() as usize + 1;
        let mut output = Vec::with_capacity(expected * self.channels);

        while self.pos < frames as f64 {
            let idx = self.pos as usize;
            let frac = (self.pos - idx as f64) as f32;
            for c in 0..self.channels {
                let s0 = if idx == 0 {
                    self.history[c]
                } else {
                    input[(idx - 1) * self.channels + c]
                };
                let s1 = input[idx * self.channels + c];
                output.push(s0 + (s1 - s0) * frac);
            }
            self.pos += self.step;
        }

        // Carry the fractional remainder into the next call and keep the last
        // frame as interpolation history.
        self.pos -= frames as f64;
        self.history
            .copy_from_slice(&input[(frames - 1) * self.channels..]);

        output
    }

    /// Return to the fresh-stream state.
    pub fn reset(&mut self) {
        self.pos = 0.0;
        self.primed = false;
        self.history.fill(0.0);
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}
