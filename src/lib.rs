//! audiowire - real-time audio over a message-oriented transport.
//!
//! Captured audio is resampled to a shared wire rate, Opus-encoded, and sent
//! as opaque packets; received packets are decoded, resampled to the playback
//! device's native rate, and served to the device through a jitter buffer
//! that substitutes silence on underrun.
//!
//! The two pipelines are [`Streamer`] (capture side) and [`Player`] (playback
//! side). Devices and the transport are collaborators behind the traits in
//! [`device`] and [`transport`]; a WebSocket link and an optional ALSA
//! backend (feature `alsa-io`) are included.

pub mod codec;
pub mod config;
pub mod device;
pub mod error;
pub mod player;
pub mod queue;
pub mod resample;
pub mod streamer;
pub mod transport;

#[cfg(feature = "alsa-io")]
pub mod alsa_io;

pub use config::{AudioConfig, CodecApplication};
pub use error::AudioError;
pub use player::{Player, PlaybackSource};
pub use streamer::Streamer;
pub use transport::{PacketSink, WsLink, WsSink};

/// Lifecycle of a pipeline in either direction.
///
/// `Idle -> Starting -> Active -> Stopping -> Idle`; there is no way back
/// from `Active` to `Starting`. Stop checks resources for existence before
/// release, so stopping twice is safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Starting,
    Active,
    Stopping,
}
