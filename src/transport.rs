//! Peer transport: one WebRTC connection carrying the microphone track, the
//! remote agent's audio and the `oai-events` control channel.
//!
//! [`Negotiator::open`] performs the offer/answer handshake and hands back a
//! [`Transport`] together with the stream of [`TransportEvent`]s it reports.
//! The session controller consumes those events on its own task.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::capture::MediaStream;
use crate::credential::Credential;
use crate::error::Result;
use crate::types::ClientEvent;

mod channel;
mod negotiator;
mod peer;
mod signaling;
mod stun;

pub use channel::ChannelGate;
pub use negotiator::RtcNegotiator;
pub use signaling::{HttpSignaling, Signaling};

#[cfg(test)]
pub use signaling::MockSignaling;

/// What the transport reports to the session, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// ICE reached a connected state.
    Connected,
    /// Connectivity was lost after it had been established.
    Disconnected,
    /// Connectivity could not be established, or the connection died.
    Failed,
    /// The control channel opened and the session configuration went out.
    ChannelOpen,
    ChannelError(String),
    /// The control channel closed without the session asking for it.
    ChannelClosed,
    /// One inbound control-channel message.
    Message(String),
    /// The remote audio track arrived.
    RemoteTrack,
}

/// Playback target for the remote audio track. Receives Opus packets.
pub trait AudioSink: Send {
    fn play(&mut self, packet: &[u8]);
}

/// Opens a playback sink when the remote track arrives.
pub trait AudioOutput: Send + Sync {
    fn open_sink(&self) -> anyhow::Result<Box<dyn AudioSink>>;
}

/// A negotiated connection.
pub trait Transport: Send + Sync {
    /// Sends `events` back to back on the control channel. Nothing else is
    /// written between them. Fails with `ChannelNotOpen` before the channel
    /// opened and `Closed` after [`Transport::close`].
    fn send_all(&self, events: Vec<ClientEvent>) -> Result<()>;

    fn send(&self, event: ClientEvent) -> Result<()> {
        self.send_all(vec![event])
    }

    /// Routes the remote audio track into `sink`.
    fn attach_incoming_audio(&self, sink: Box<dyn AudioSink>);

    /// Closes the channel, then the connection. Idempotent, and safe on a
    /// transport whose channel never opened.
    fn close(&self);
}

pub struct OpenedTransport {
    pub transport: Arc<dyn Transport>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
pub trait Negotiator: Send + Sync {
    /// Builds the connection around `stream` and completes the handshake.
    /// Fails with `TokenUnavailable` for an empty credential and
    /// `Negotiation` for any signaling or SDP failure.
    async fn open(&self, credential: Credential, stream: MediaStream) -> Result<OpenedTransport>;
}
