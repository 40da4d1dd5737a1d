//! Session state machine.
//!
//! A session owns one call at a time. [`SessionBuilder::spawn`] starts the
//! controller task and returns a [`SessionHandle`]; every command, transport
//! report and completed suspension is handled on that one task, in order.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::capture::{CaptureGuard, MediaStream, MicrophoneSource};
use crate::config::Config;
use crate::credential::{CredentialProvider, HttpCredentialProvider};
use crate::error::{Result, SessionError};
use crate::tools::{HttpRecipeLookup, IdentityStore, RecipeBridge, RecipeLookup, StaticIdentity};
use crate::transcript::TranscriptLine;
use crate::transport::{AudioOutput, Negotiator, RtcNegotiator};

mod controller;
mod state;

use controller::{Collaborators, Command, Controller};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallPhase {
    #[default]
    Idle,
    Connecting,
    Connected,
    Ended,
}

/// What to do when the user starts talking over the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterruptionPolicy {
    /// Report the interruption and let the server handle the turn.
    #[default]
    Observe,
    /// Also send `response.cancel`.
    CancelResponse,
}

/// Everything a caller can observe about the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub phase: CallPhase,
    pub mic_enabled: bool,
    pub assistant_speaking: bool,
    pub call_active: bool,
    pub message: String,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            phase: CallPhase::Idle,
            mic_enabled: false,
            assistant_speaking: false,
            call_active: false,
            message: "Idle".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PhaseChanged(CallPhase),
    /// The user started speaking while the assistant was talking.
    Interrupted,
    ToolCall { call_id: String, query: Option<String> },
    ToolAnswered { call_id: String, count: usize, error: Option<String> },
    ServerError(String),
}

/// Collaborators owned by the application shell and shared with the
/// session for its whole lifetime.
#[derive(Clone)]
pub struct AppContext {
    client: reqwest::Client,
    lookup: Arc<dyn RecipeLookup>,
    identity: Arc<dyn IdentityStore>,
}

impl AppContext {
    pub fn new(client: reqwest::Client, lookup: Arc<dyn RecipeLookup>, identity: Arc<dyn IdentityStore>) -> Self {
        Self { client, lookup, identity }
    }

    pub fn from_config(config: &Config) -> Self {
        let client = reqwest::Client::new();
        let lookup = HttpRecipeLookup::new(client.clone(), config.api_url());
        let identity = StaticIdentity::new(config.user_id().map(str::to_string));
        Self::new(client, Arc::new(lookup), Arc::new(identity))
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn identity(&self) -> &Arc<dyn IdentityStore> {
        &self.identity
    }

    pub fn bridge(&self) -> RecipeBridge {
        RecipeBridge::new(self.lookup.clone(), self.identity.clone())
    }
}

/// Used when no microphone was configured. Every acquisition is refused.
struct NoMicrophone;

#[async_trait]
impl MicrophoneSource for NoMicrophone {
    async fn acquire(&self) -> Result<MediaStream> {
        Err(SessionError::PermissionDenied)
    }
}

pub struct SessionBuilder {
    config: Config,
    context: Option<AppContext>,
    microphone: Option<Arc<dyn MicrophoneSource>>,
    negotiator: Option<Arc<dyn Negotiator>>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    audio_output: Option<Arc<dyn AudioOutput>>,
}

impl SessionBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            context: None,
            microphone: None,
            negotiator: None,
            credentials: None,
            audio_output: None,
        }
    }

    pub fn with_context(mut self, context: AppContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_microphone(mut self, microphone: Arc<dyn MicrophoneSource>) -> Self {
        self.microphone = Some(microphone);
        self
    }

    pub fn with_negotiator(mut self, negotiator: Arc<dyn Negotiator>) -> Self {
        self.negotiator = Some(negotiator);
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_audio_output(mut self, output: Arc<dyn AudioOutput>) -> Self {
        self.audio_output = Some(output);
        self
    }

    /// Starts the controller task. Must be called inside a tokio runtime.
    pub fn spawn(self) -> SessionHandle {
        let config = self.config;
        let context = self.context.unwrap_or_else(|| AppContext::from_config(&config));
        let negotiator = self
            .negotiator
            .unwrap_or_else(|| Arc::new(RtcNegotiator::from_config(context.client().clone(), &config)));
        let credentials = self
            .credentials
            .unwrap_or_else(|| Arc::new(HttpCredentialProvider::new(context.client().clone(), config.api_url())));
        let microphone = self.microphone.unwrap_or_else(|| Arc::new(NoMicrophone));

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SessionStatus::default());
        let (transcript_tx, transcript_rx) = watch::channel(Vec::new());
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let controller = Controller::new(
            Collaborators {
                capture: CaptureGuard::new(microphone),
                negotiator,
                credentials,
                audio_output: self.audio_output,
                bridge: context.bridge(),
                interruption: config.interruption(),
            },
            command_rx,
            status_tx,
            transcript_tx,
            events_tx.clone(),
        );
        tokio::spawn(controller.run());
        tracing::debug!("session controller started");

        SessionHandle {
            commands: command_tx,
            status: status_rx,
            transcript: transcript_rx,
            events: events_tx,
        }
    }
}

/// Cheap to clone. The session ends when the last handle is dropped.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SessionStatus>,
    transcript: watch::Receiver<Vec<TranscriptLine>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Starts a call. Requires the microphone to be live.
    pub fn start(&self) -> Result<()> {
        self.send(Command::Start)
    }

    /// Ends the call and releases the microphone. Idempotent.
    pub fn end(&self) -> Result<()> {
        self.send(Command::End)
    }

    pub fn toggle_mic(&self) -> Result<()> {
        self.send(Command::ToggleMic)
    }

    /// Resolves once every command sent before it has been handled.
    pub async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Flush(tx))?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub fn current_status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    pub fn current_transcript(&self) -> Vec<TranscriptLine> {
        self.transcript.borrow().clone()
    }

    pub fn transcript(&self) -> watch::Receiver<Vec<TranscriptLine>> {
        self.transcript.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| SessionError::Closed)
    }
}
