//! Error taxonomy for the audio pipeline.
//!
//! Anything raised on a realtime callback path (decode failures, transport
//! backpressure) is recovered locally by the pipelines as silence substitution
//! or a dropped packet. Only construction and start/stop boundaries report
//! errors to the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    /// A capture or playback device could not be acquired. Fatal to stream
    /// start; never retried by the pipeline.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Opus encode/decode failure. On the playback path this is recovered
    /// locally by substituting a silence frame.
    #[error("codec error: {0}")]
    Codec(#[from] opus::Error),

    /// The transport cannot accept a packet right now. The packet is dropped,
    /// not queued; the send path never blocks.
    #[error("transport not ready")]
    TransportUnready,

    /// Transport connection failure at the connect boundary.
    #[error("transport error: {0}")]
    Transport(String),

    /// Invalid rate/channel/profile combination, or a start/stop call in the
    /// wrong stream state. Reported before any resource acquisition.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}
