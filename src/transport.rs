//! Transport boundary: best-effort packet send plus a WebSocket link.
//!
//! The pipelines only ever see [`PacketSink`]. `WsLink` is the bundled
//! implementation: a tokio-tungstenite client that ships wire packets as
//! binary frames and hands inbound binary frames to the caller. Delivery is
//! best-effort in both directions; a link that falls behind drops packets
//! instead of queueing without bound. Reconnect policy belongs to the caller.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

use crate::error::AudioError;

/// Packets the link will hold for the writer before dropping new ones.
const OUTBOUND_DEPTH: usize = 64;
/// Inbound packets held for a lagging receiver before dropping.
const INBOUND_DEPTH: usize = 256;

/// Best-effort, non-blocking packet sender.
///
/// `try_send` must not block and must not retry; when the transport cannot
/// accept a packet it fails with `TransportUnready` and the packet is gone.
pub trait PacketSink: Send {
    fn try_send(&mut self, packet: Bytes) -> Result<(), AudioError>;
}

// ======================== WebSocket link ========================

/// Handle to a running WebSocket audio link.
#[derive(Debug)]
pub struct WsLink {
    out_tx: mpsc::Sender<Bytes>,
    task: JoinHandle<()>,
}

impl WsLink {
    /// Connect to a WebSocket endpoint and spawn the I/O task.
    ///
    /// Returns the link plus the receiver of inbound wire packets, to be fed
    /// to a [`crate::player::Player`]. Fails with `AudioError::Transport`;
    /// the link never reconnects on its own.
    pub async fn connect(url: &str) -> Result<(Self, mpsc::Receiver<Bytes>), AudioError> {
        let url = Url::parse(url).map_err(|e| AudioError::Transport(format!("bad url: {e}")))?;
        log::info!("connecting to {url}...");
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| AudioError::Transport(e.to_string()))?;
        log::info!("connected");

        let (mut write, mut read) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::channel::<Bytes>(OUTBOUND_DEPTH);
        let (in_tx, in_rx) = mpsc::channel::<Bytes>(INBOUND_DEPTH);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = read.next() => {
                        match msg {
                            Some(Ok(Message::Binary(data))) => {
                                if in_tx.try_send(data).is_err() {
                                    log::debug!("inbound packet dropped, receiver lagging");
                                }
                            }
                            Some(Ok(Message::Close(frame))) => {
                                log::info!("server closed connection: {frame:?}");
                                break;
                            }
                            Some(Ok(_)) => {} // text/ping/pong carry no audio
                            Some(Err(e)) => {
                                log::warn!("websocket error: {e}");
                                break;
                            }
                            None => {
                                log::info!("websocket stream ended");
                                break;
                            }
                        }
                    }
                    packet = out_rx.recv() => {
                        match packet {
                            Some(packet) => {
                                if let Err(e) = write.send(Message::Binary(packet)).await {
                                    log::warn!("websocket send failed: {e}");
                                    break;
                                }
                            }
                            None => break, // link handle dropped
                        }
                    }
                }
            }
        });

        Ok((Self { out_tx, task }, in_rx))
    }

    /// A cloneable send handle for a capture pipeline.
    pub fn sink(&self) -> WsSink {
        WsSink {
            tx: self.out_tx.clone(),
        }
    }

    /// Drop the send side and wait for the I/O task to wind down.
    pub async fn close(self) {
        drop(self.out_tx);
        let _ = self.task.await;
    }
}

/// [`PacketSink`] backed by the link's bounded outbound channel.
#[derive(Clone)]
pub struct WsSink {
    tx: mpsc::Sender<Bytes>,
}

impl PacketSink for WsSink {
    fn try_send(&mut self, packet: Bytes) -> Result<(), AudioError> {
        self.tx
            .try_send(packet)
            .map_err(|_| AudioError::TransportUnready)
    }
}
