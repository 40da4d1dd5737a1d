use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};

use super::state::{EndCause, Notice, SessionState, SpeechBuffer};
use super::{CallPhase, InterruptionPolicy, SessionEvent, SessionStatus};
use crate::capture::{CaptureGuard, MediaStream};
use crate::consts::RECIPE_TOOL_NAME;
use crate::credential::CredentialProvider;
use crate::decoder::{self, ControlEvent};
use crate::error::{FailureCause, Result, SessionError};
use crate::tools::{self, InvocationState, RecipeBridge, ToolResult};
use crate::transcript::{Role, Transcript, TranscriptLine, TranscriptMode};
use crate::transport::{AudioOutput, Negotiator, OpenedTransport, Transport, TransportEvent};
use crate::types::events::client::ResponseCancelEvent;
use crate::types::ClientEvent;

pub(crate) enum Command {
    Start,
    End,
    ToggleMic,
    Flush(oneshot::Sender<()>),
}

/// Results of spawned suspensions, tagged with the epoch they started in.
enum Completion {
    MicAcquired {
        epoch: u64,
        result: Result<MediaStream>,
    },
    Negotiated {
        epoch: u64,
        previous: CallPhase,
        result: Result<OpenedTransport>,
    },
    Transport {
        epoch: u64,
        event: TransportEvent,
    },
    ToolFinished {
        epoch: u64,
        call_id: String,
        result: ToolResult,
    },
}

pub(crate) struct Collaborators {
    pub capture: CaptureGuard,
    pub negotiator: Arc<dyn Negotiator>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub audio_output: Option<Arc<dyn AudioOutput>>,
    pub bridge: RecipeBridge,
    pub interruption: InterruptionPolicy,
}

pub(crate) struct Controller {
    parts: Collaborators,
    state: SessionState,
    transcript: Transcript,
    speech: SpeechBuffer,
    /// Bumped on every teardown. Completions from older epochs are stale.
    epoch: u64,
    stream: Option<MediaStream>,
    transport: Option<Arc<dyn Transport>>,
    acquiring: bool,
    negotiating: bool,
    published_phase: CallPhase,
    commands: mpsc::UnboundedReceiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    status: watch::Sender<SessionStatus>,
    transcript_tx: watch::Sender<Vec<TranscriptLine>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Controller {
    pub(crate) fn new(
        parts: Collaborators,
        commands: mpsc::UnboundedReceiver<Command>,
        status: watch::Sender<SessionStatus>,
        transcript_tx: watch::Sender<Vec<TranscriptLine>>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let (completions_tx, completions) = mpsc::unbounded_channel();
        Self {
            parts,
            state: SessionState::default(),
            transcript: Transcript::new(),
            speech: SpeechBuffer::default(),
            epoch: 0,
            stream: None,
            transport: None,
            acquiring: false,
            negotiating: false,
            published_phase: CallPhase::Idle,
            commands,
            completions_tx,
            completions,
            status,
            transcript_tx,
            events,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        tracing::debug!("all session handles dropped");
                        self.end();
                        break;
                    }
                },
                Some(completion) = self.completions.recv() => self.handle_completion(completion),
            }
            self.publish();
        }
        self.publish();
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start => self.start(),
            Command::End => self.end(),
            Command::ToggleMic => self.toggle_mic(),
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::MicAcquired { epoch, result } => self.on_mic_acquired(epoch, result),
            Completion::Negotiated { epoch, previous, result } => self.on_negotiated(epoch, previous, result),
            Completion::Transport { epoch, event } => {
                if epoch == self.epoch {
                    self.on_transport_event(event);
                } else {
                    tracing::debug!("dropping stale transport event {:?}", event);
                }
            }
            Completion::ToolFinished { epoch, call_id, result } => {
                if epoch == self.epoch {
                    self.on_tool_finished(call_id, result);
                } else {
                    tracing::debug!("dropping stale tool result for {}", call_id);
                }
            }
        }
    }

    fn start(&mut self) {
        if matches!(self.state.phase(), CallPhase::Connecting | CallPhase::Connected) {
            tracing::debug!("start ignored, call already {:?}", self.state.phase());
            return;
        }
        let Some(stream) = self.stream.clone().filter(|_| self.state.mic_enabled()) else {
            self.state.set_notice(Notice::EnableMicFirst);
            return;
        };

        let previous = self.state.phase();
        self.state.set_phase(CallPhase::Connecting);
        self.negotiating = true;
        tracing::info!("starting call");

        let epoch = self.epoch;
        let credentials = self.parts.credentials.clone();
        let negotiator = self.parts.negotiator.clone();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = match credentials.fetch().await {
                Ok(credential) => negotiator.open(credential, stream).await,
                Err(e) => Err(e),
            };
            let _ = tx.send(Completion::Negotiated { epoch, previous, result });
        });
    }

    fn on_negotiated(&mut self, epoch: u64, previous: CallPhase, result: Result<OpenedTransport>) {
        if epoch != self.epoch {
            if let Ok(opened) = result {
                tracing::debug!("closing transport negotiated for an ended call");
                opened.transport.close();
            }
            return;
        }
        self.negotiating = false;
        match result {
            Ok(opened) => {
                tracing::info!("transport negotiated, waiting for connectivity");
                self.transport = Some(opened.transport);
                self.forward_transport_events(opened.events);
            }
            Err(SessionError::TokenUnavailable) => {
                tracing::warn!("no credential, call not started");
                self.state.set_phase(previous);
                self.state.set_notice(Notice::Failure(SessionError::TokenUnavailable));
            }
            Err(e) => {
                tracing::error!("negotiation failed: {}", e);
                self.fail(e);
            }
        }
    }

    fn forward_transport_events(&self, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
        let epoch = self.epoch;
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if tx.send(Completion::Transport { epoch, event }).is_err() {
                    break;
                }
            }
        });
    }

    fn end(&mut self) {
        let active = self.stream.is_some()
            || self.transport.is_some()
            || self.acquiring
            || self.negotiating
            || self.state.phase() != CallPhase::Ended;
        self.teardown();
        if active {
            tracing::info!("call stopped");
            self.state.end(EndCause::Stopped);
        }
    }

    fn fail(&mut self, error: SessionError) {
        self.teardown();
        self.state.end(EndCause::Failed(error));
    }

    /// Releases everything the call holds. Safe to repeat.
    fn teardown(&mut self) {
        self.epoch += 1;
        self.acquiring = false;
        self.negotiating = false;
        if let Some(stream) = self.stream.take() {
            CaptureGuard::release(&stream);
        }
        if let Some(transport) = self.transport.take() {
            transport.close();
        }
        self.speech.clear();
        self.state.set_speaking(false);
        self.state.set_mic(false);
    }

    fn toggle_mic(&mut self) {
        if self.acquiring {
            tracing::debug!("microphone acquisition pending, toggle ignored");
            return;
        }
        if self.state.mic_enabled() {
            if let Some(stream) = &self.stream {
                CaptureGuard::set_enabled(stream, false);
            }
            self.state.set_mic(false);
            return;
        }
        if let Some(stream) = self.stream.as_ref().filter(|s| !s.is_released()) {
            CaptureGuard::set_enabled(stream, true);
            self.state.set_mic(true);
            return;
        }

        self.acquiring = true;
        let epoch = self.epoch;
        let capture = self.parts.capture.clone();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = capture.acquire().await;
            let _ = tx.send(Completion::MicAcquired { epoch, result });
        });
    }

    fn on_mic_acquired(&mut self, epoch: u64, result: Result<MediaStream>) {
        if epoch != self.epoch {
            if let Ok(stream) = result {
                tracing::debug!("releasing microphone acquired for an ended call");
                CaptureGuard::release(&stream);
            }
            return;
        }
        self.acquiring = false;
        match result {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state.set_mic(true);
            }
            Err(e) => self.state.set_notice(Notice::Failure(e)),
        }
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => self.mark_connected(),
            TransportEvent::ChannelOpen => self.state.set_notice(Notice::ChannelReady),
            TransportEvent::Message(raw) => self.on_control_event(decoder::decode(&raw)),
            TransportEvent::RemoteTrack => self.attach_playback(),
            TransportEvent::Disconnected => self.transport_failed(FailureCause::Disconnected),
            TransportEvent::Failed => self.transport_failed(FailureCause::IceFailed),
            TransportEvent::ChannelClosed => self.transport_failed(FailureCause::ChannelClosed),
            TransportEvent::ChannelError(message) => {
                tracing::error!("control channel error: {}", message);
                self.transport_failed(FailureCause::ChannelError);
            }
        }
    }

    fn transport_failed(&mut self, cause: FailureCause) {
        tracing::warn!("transport failure: {}", cause);
        self.fail(SessionError::TransportFailure(cause));
    }

    fn mark_connected(&mut self) {
        if self.state.phase() == CallPhase::Connecting {
            self.state.set_phase(CallPhase::Connected);
            tracing::info!("call connected");
        }
    }

    fn attach_playback(&mut self) {
        let (Some(output), Some(transport)) = (&self.parts.audio_output, &self.transport) else {
            tracing::debug!("remote track arrived, no audio output configured");
            return;
        };
        match output.open_sink() {
            Ok(sink) => transport.attach_incoming_audio(sink),
            Err(e) => tracing::warn!("failed to open audio output: {}", e),
        }
    }

    fn on_control_event(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::UserTranscript { text } => {
                if self.speech.is_active() {
                    tracing::debug!("user transcript landed while the assistant is still speaking");
                }
                if !text.trim().is_empty() {
                    self.transcript.append(TranscriptLine::new(Role::User, text), TranscriptMode::Final);
                }
            }
            ControlEvent::AssistantTranscriptDelta { text } => {
                if text.is_empty() {
                    return;
                }
                let previous = self
                    .transcript
                    .last()
                    .filter(|line| line.role == Role::Assistant)
                    .map(|line| line.text.clone());
                let partial = self.speech.push(&text, previous.as_deref());
                self.state.set_speaking(true);
                let index = self.show_speech(self.speech.line(), partial, TranscriptMode::Partial);
                self.speech.set_line(index);
            }
            ControlEvent::AssistantTranscriptDone { text } => {
                let line = self.speech.line();
                let settled = self.speech.finish(&text);
                self.state.set_speaking(false);
                if !text.trim().is_empty() {
                    self.show_speech(line, settled, TranscriptMode::Final);
                }
            }
            ControlEvent::ResponseDone => {
                self.speech.clear();
                self.state.set_speaking(false);
                self.state.clear_notice(&Notice::NoQuery);
            }
            ControlEvent::FunctionCallArgumentsDone {
                call_id,
                name,
                arguments_json,
            } => self.on_function_call(call_id, name, arguments_json),
            ControlEvent::SessionUpdated { connected } => {
                if connected {
                    self.mark_connected();
                }
            }
            ControlEvent::UserSpeechStarted => self.on_user_speech(),
            ControlEvent::ErrorEvent { message } => {
                self.emit(SessionEvent::ServerError(message.clone()));
                self.state.set_notice(Notice::Server(message));
            }
            ControlEvent::SessionCreated | ControlEvent::Other => {}
        }
    }

    /// Draws assistant speech. A response whose line is no longer the last
    /// one is revised in place; otherwise it goes through the normal merge.
    /// Returns the index of the line it landed on.
    fn show_speech(&mut self, line: Option<usize>, text: String, mode: TranscriptMode) -> usize {
        if let Some(index) = line.filter(|&index| index + 1 < self.transcript.len()) {
            if self.transcript.revise(index, Role::Assistant, text.as_str()) {
                return index;
            }
        }
        self.transcript.append(TranscriptLine::new(Role::Assistant, text), mode);
        self.transcript.len().saturating_sub(1)
    }

    fn on_user_speech(&mut self) {
        if !self.state.assistant_speaking() {
            return;
        }
        tracing::info!("user interrupted the assistant");
        self.emit(SessionEvent::Interrupted);
        if self.parts.interruption == InterruptionPolicy::CancelResponse {
            self.send_all(vec![ClientEvent::ResponseCancel(ResponseCancelEvent::new())]);
            self.speech.clear();
            self.state.set_speaking(false);
        }
    }

    fn on_function_call(&mut self, call_id: String, name: String, arguments_json: String) {
        if name != RECIPE_TOOL_NAME {
            tracing::warn!("agent called unknown tool {:?} ({})", name, call_id);
            self.answer_tool(&call_id, ToolResult::failed(tools::UNKNOWN_TOOL));
            return;
        }

        let mut invocation = RecipeBridge::receive(&call_id, &arguments_json);
        self.emit(SessionEvent::ToolCall {
            call_id: call_id.clone(),
            query: invocation.query().map(str::to_string),
        });
        if invocation.state() == InvocationState::Failed {
            self.state.set_notice(Notice::NoQuery);
            self.answer_tool(&call_id, ToolResult::failed(tools::NO_QUERY));
            return;
        }

        self.state.set_notice(Notice::Searching);
        let epoch = self.epoch;
        let bridge = self.parts.bridge.clone();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = bridge.execute(&mut invocation).await;
            let _ = tx.send(Completion::ToolFinished { epoch, call_id, result });
        });
    }

    fn on_tool_finished(&mut self, call_id: String, result: ToolResult) {
        self.state.clear_notice(&Notice::Searching);
        self.answer_tool(&call_id, result);
    }

    /// Sends the output item and the continuation as one batch.
    fn answer_tool(&mut self, call_id: &str, result: ToolResult) {
        self.send_all(tools::response_events(call_id, &result));
        self.emit(SessionEvent::ToolAnswered {
            call_id: call_id.to_string(),
            count: result.count,
            error: result.error,
        });
    }

    fn send_all(&self, events: Vec<ClientEvent>) {
        let Some(transport) = &self.transport else {
            tracing::warn!("no transport, dropping {} outbound events", events.len());
            return;
        };
        if let Err(e) = transport.send_all(events) {
            tracing::warn!("failed to send on control channel: {}", e);
        }
    }

    fn emit(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn publish(&mut self) {
        let phase = self.state.phase();
        if phase != self.published_phase {
            self.published_phase = phase;
            self.emit(SessionEvent::PhaseChanged(phase));
        }

        let status = self.state.status(self.transport.is_some());
        self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            tracing::debug!("status: {}", status.message);
            *current = status;
            true
        });

        let lines = self.transcript.lines();
        self.transcript_tx.send_if_modified(|current| {
            if current.as_slice() == lines {
                return false;
            }
            *current = lines.to_vec();
            true
        });
    }
}
