use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use str0m::channel::ChannelId;
use str0m::media::{Frequency, MediaKind, MediaTime, Mid, Pt};
use str0m::net::{Protocol, Receive};
use str0m::{Event, IceConnectionState, Input, Output, Rtc};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use super::channel::{self, ChannelGate};
use super::{AudioSink, Transport, TransportEvent};
use crate::capture::MediaStream;
use crate::error::{Result, SessionError};
use crate::types::ClientEvent;

/// 20 ms Opus frames.
const FRAMES_PER_SECOND: u64 = 50;
const RECV_BUFFER: usize = 2000;

pub(crate) enum Command {
    Send(Vec<String>),
    AttachSink(Box<dyn AudioSink>),
    Close,
}

/// Handle the session holds. All work happens on the [`PeerDriver`] task.
pub(crate) struct PeerTransport {
    commands: mpsc::UnboundedSender<Command>,
    open: Arc<AtomicBool>,
    closed: AtomicBool,
}

impl PeerTransport {
    pub(crate) fn new(commands: mpsc::UnboundedSender<Command>, open: Arc<AtomicBool>) -> Self {
        Self {
            commands,
            open,
            closed: AtomicBool::new(false),
        }
    }
}

impl Transport for PeerTransport {
    fn send_all(&self, events: Vec<ClientEvent>) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SessionError::Closed);
        }
        if !self.open.load(Ordering::Acquire) {
            return Err(SessionError::ChannelNotOpen);
        }
        for event in &events {
            tracing::debug!("sending {}", event.kind());
        }
        let payloads = channel::encode(&events)?;
        self.commands
            .send(Command::Send(payloads))
            .map_err(|_| SessionError::Closed)
    }

    fn attach_incoming_audio(&self, sink: Box<dyn AudioSink>) {
        if self.commands.send(Command::AttachSink(sink)).is_err() {
            tracing::debug!("transport gone, dropping audio sink");
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // the driver may already have exited
        let _ = self.commands.send(Command::Close);
    }
}

/// Negotiated audio send parameters.
pub(crate) struct AudioParams {
    pub mid: Mid,
    pub pt: Pt,
    pub clock_rate: Frequency,
}

/// Owns the `Rtc` and its socket and runs the sans-IO loop.
pub(crate) struct PeerDriver {
    rtc: Rtc,
    socket: UdpSocket,
    local_addr: SocketAddr,
    audio: AudioParams,
    channel_id: ChannelId,
    gate: ChannelGate,
    stream: MediaStream,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<TransportEvent>,
    sink: Option<Box<dyn AudioSink>>,
    rtp_offset: u64,
    connected: bool,
    remote_track: bool,
    closing: bool,
    terminated: bool,
}

impl PeerDriver {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        rtc: Rtc,
        socket: UdpSocket,
        local_addr: SocketAddr,
        audio: AudioParams,
        channel_id: ChannelId,
        gate: ChannelGate,
        stream: MediaStream,
        commands: mpsc::UnboundedReceiver<Command>,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            rtc,
            socket,
            local_addr,
            audio,
            channel_id,
            gate,
            stream,
            commands,
            events,
            sink: None,
            rtp_offset: 0,
            connected: false,
            remote_track: false,
            closing: false,
            terminated: false,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut frames = self.stream.take_frames();
        if frames.is_none() {
            tracing::warn!("microphone frames already taken, sending no audio");
        }
        let mut buf = vec![0u8; RECV_BUFFER];

        while let Some(timeout) = self.drain().await {
            let sleep = tokio::time::sleep_until(tokio::time::Instant::from_std(timeout));
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Send(payloads)) => {
                        if let Err(e) = self.write_channel(&payloads) {
                            self.channel_error(e);
                        }
                    }
                    Some(Command::AttachSink(sink)) => self.sink = Some(sink),
                    Some(Command::Close) | None => self.begin_close(),
                },
                frame = next_frame(&mut frames) => match frame {
                    Some(frame) => self.write_audio(frame),
                    None => {
                        tracing::debug!("microphone frame queue closed");
                        frames = None;
                    }
                },
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((n, source)) => self.receive(source, &buf[..n]),
                    Err(e) => tracing::warn!("udp receive failed: {}", e),
                },
                _ = sleep => {
                    if let Err(e) = self.rtc.handle_input(Input::Timeout(Instant::now())) {
                        tracing::warn!("rtc timeout handling failed: {}", e);
                    }
                }
            }
        }

        if !self.closing {
            self.terminate(TransportEvent::Failed);
        }
        self.sink = None;
        tracing::info!("peer connection closed");
    }

    /// Flushes pending output. `None` once the connection is dead.
    async fn drain(&mut self) -> Option<Instant> {
        loop {
            if !self.rtc.is_alive() {
                return None;
            }
            match self.rtc.poll_output() {
                Ok(Output::Timeout(timeout)) => return Some(timeout),
                Ok(Output::Transmit(transmit)) => {
                    if let Err(e) = self.socket.send_to(&transmit.contents, transmit.destination).await {
                        tracing::warn!("udp send to {} failed: {}", transmit.destination, e);
                    }
                }
                Ok(Output::Event(event)) => self.handle_event(event),
                Err(e) => {
                    tracing::error!("rtc poll failed: {}", e);
                    return None;
                }
            }
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::IceConnectionStateChange(state) => self.ice_state(state),
            Event::ChannelOpen(id, label) if id == self.channel_id => {
                tracing::info!("data channel {} open", label);
                let Some(config) = self.gate.on_open() else {
                    return;
                };
                let written = channel::encode(&[config])
                    .map_err(|e| e.to_string())
                    .and_then(|payloads| self.write_channel(&payloads));
                match written {
                    Ok(()) => {
                        tracing::debug!("session configuration sent");
                        self.gate.confirm_open();
                        self.emit(TransportEvent::ChannelOpen);
                    }
                    Err(e) => self.channel_error(e),
                }
            }
            Event::ChannelData(data) if data.id == self.channel_id => {
                if data.binary {
                    tracing::warn!("unexpected binary message: {} bytes", data.data.len());
                    return;
                }
                match String::from_utf8(data.data) {
                    Ok(text) => self.emit(TransportEvent::Message(text)),
                    Err(e) => tracing::warn!("control message is not utf-8: {}", e),
                }
            }
            Event::ChannelClose(id) if id == self.channel_id => {
                if self.gate.on_close() && !self.closing {
                    tracing::warn!("data channel closed by remote");
                    self.terminate(TransportEvent::ChannelClosed);
                }
            }
            Event::MediaAdded(media) if media.kind == MediaKind::Audio => {
                if !self.remote_track {
                    self.remote_track = true;
                    tracing::info!("remote audio track added: mid={}", media.mid);
                    self.emit(TransportEvent::RemoteTrack);
                }
            }
            Event::MediaData(media) => {
                if let Some(sink) = self.sink.as_mut() {
                    sink.play(&media.data);
                }
            }
            _ => {}
        }
    }

    fn ice_state(&mut self, state: IceConnectionState) {
        tracing::debug!("ice connection state: {:?}", state);
        match state {
            IceConnectionState::Connected | IceConnectionState::Completed => {
                if !self.connected {
                    self.connected = true;
                    self.emit(TransportEvent::Connected);
                }
            }
            IceConnectionState::Disconnected if !self.closing => {
                if self.connected {
                    self.terminate(TransportEvent::Disconnected);
                } else {
                    self.terminate(TransportEvent::Failed);
                }
            }
            _ => {}
        }
    }

    fn write_channel(&mut self, payloads: &[String]) -> std::result::Result<(), String> {
        if !self.gate.is_open() {
            return Err("control channel is not open".to_string());
        }
        let mut channel = self
            .rtc
            .channel(self.channel_id)
            .ok_or_else(|| "control channel not available".to_string())?;
        for payload in payloads {
            channel
                .write(false, payload.as_bytes())
                .map_err(|e| format!("control channel write failed: {}", e))?;
        }
        Ok(())
    }

    fn write_audio(&mut self, frame: Bytes) {
        let rtp_time = self.rtp_offset;
        self.rtp_offset += self.audio.clock_rate.get() as u64 / FRAMES_PER_SECOND;

        // muted tracks keep the clock running
        if !self.connected || !self.stream.is_enabled() {
            return;
        }
        let Some(writer) = self.rtc.writer(self.audio.mid) else {
            tracing::warn!("audio track writer not available");
            return;
        };
        let media_time = MediaTime::new(rtp_time, self.audio.clock_rate);
        if let Err(e) = writer.write(self.audio.pt, Instant::now(), media_time, frame.to_vec()) {
            tracing::warn!("audio track write failed: {}", e);
        }
    }

    fn receive(&mut self, source: SocketAddr, contents: &[u8]) {
        let receive = match Receive::new(Protocol::Udp, source, self.local_addr, contents) {
            Ok(receive) => receive,
            Err(e) => {
                tracing::debug!("ignoring datagram from {}: {}", source, e);
                return;
            }
        };
        if let Err(e) = self.rtc.handle_input(Input::Receive(Instant::now(), receive)) {
            tracing::warn!("rtc input failed: {}", e);
        }
    }

    fn channel_error(&mut self, message: String) {
        tracing::error!("data channel error: {}", message);
        if !self.closing {
            self.terminate(TransportEvent::ChannelError(message));
        }
    }

    fn begin_close(&mut self) {
        if self.closing {
            return;
        }
        self.closing = true;
        self.gate.on_close();
        self.rtc.disconnect();
        tracing::debug!("peer connection closing");
    }

    /// Reports the first terminal event and shuts the connection down.
    fn terminate(&mut self, event: TransportEvent) {
        if !self.terminated {
            self.terminated = true;
            self.emit(event);
        }
        self.begin_close();
    }

    fn emit(&self, event: TransportEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("transport events receiver dropped");
        }
    }
}

async fn next_frame(frames: &mut Option<mpsc::Receiver<Bytes>>) -> Option<Bytes> {
    match frames {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent;
    use crate::types::audio::Voice;

    fn transport() -> (PeerTransport, mpsc::UnboundedReceiver<Command>, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));
        (PeerTransport::new(tx, open.clone()), rx, open)
    }

    #[test]
    fn sends_wait_for_the_channel() {
        let (transport, mut commands, open) = transport();
        assert_eq!(
            transport.send(agent::session_update(Voice::Ash)).unwrap_err(),
            SessionError::ChannelNotOpen
        );
        assert!(commands.try_recv().is_err());

        open.store(true, Ordering::Release);
        transport.send(agent::session_update(Voice::Ash)).unwrap();
        let Ok(Command::Send(payloads)) = commands.try_recv() else {
            panic!("expected a send command");
        };
        assert_eq!(payloads.len(), 1);
        assert!(payloads[0].starts_with(r#"{"type":"session.update""#));
    }

    #[test]
    fn close_is_idempotent() {
        let (transport, mut commands, open) = transport();
        open.store(true, Ordering::Release);
        transport.close();
        transport.close();
        assert!(matches!(commands.try_recv(), Ok(Command::Close)));
        assert!(commands.try_recv().is_err());
        assert_eq!(
            transport.send(agent::session_update(Voice::Ash)).unwrap_err(),
            SessionError::Closed
        );
    }

    #[test]
    fn close_after_driver_exit_is_quiet() {
        let (transport, commands, _) = transport();
        drop(commands);
        transport.close();
        transport.close();
    }
}
