use crate::error::SessionError;
use crate::session::{CallPhase, SessionStatus};

/// Transient status text. Overrides the phase text until the next phase,
/// mic or speaking change.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Notice {
    EnableMicFirst,
    ChannelReady,
    Searching,
    NoQuery,
    Failure(SessionError),
    Server(String),
}

impl Notice {
    fn text(&self) -> String {
        match self {
            Notice::EnableMicFirst => "Enable mic first".to_string(),
            Notice::ChannelReady => "Data channel ready".to_string(),
            Notice::Searching => "Searching recipes...".to_string(),
            Notice::NoQuery => "Error: No query provided".to_string(),
            Notice::Failure(e) => e.to_string(),
            Notice::Server(message) => format!("Error: {}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EndCause {
    Stopped,
    Failed(SessionError),
}

/// Typed session state. The status string is derived from it and never read
/// back.
#[derive(Debug, Clone, Default)]
pub(crate) struct SessionState {
    phase: CallPhase,
    mic_enabled: bool,
    assistant_speaking: bool,
    notice: Option<Notice>,
    end_cause: Option<EndCause>,
}

impl SessionState {
    pub fn phase(&self) -> CallPhase {
        self.phase
    }

    pub fn mic_enabled(&self) -> bool {
        self.mic_enabled
    }

    pub fn assistant_speaking(&self) -> bool {
        self.assistant_speaking
    }

    #[cfg(test)]
    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn set_phase(&mut self, phase: CallPhase) -> bool {
        if self.phase == phase {
            return false;
        }
        self.phase = phase;
        self.notice = None;
        if phase != CallPhase::Ended {
            self.end_cause = None;
        }
        true
    }

    pub fn end(&mut self, cause: EndCause) {
        self.set_phase(CallPhase::Ended);
        self.end_cause = Some(cause);
    }

    pub fn set_mic(&mut self, enabled: bool) {
        if self.mic_enabled != enabled {
            self.mic_enabled = enabled;
            self.notice = None;
        }
    }

    pub fn set_speaking(&mut self, speaking: bool) {
        if self.assistant_speaking == speaking {
            return;
        }
        self.assistant_speaking = speaking;
        if self.notice != Some(Notice::Searching) {
            self.notice = None;
        }
    }

    pub fn set_notice(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    /// Drops the notice if it is `notice`.
    pub fn clear_notice(&mut self, notice: &Notice) {
        if self.notice.as_ref() == Some(notice) {
            self.notice = None;
        }
    }

    pub fn status_message(&self) -> String {
        if let Some(notice) = &self.notice {
            return notice.text();
        }
        match self.phase {
            CallPhase::Idle if self.mic_enabled => "Mic live (call not started)".to_string(),
            CallPhase::Idle => "Idle".to_string(),
            CallPhase::Connecting => "Initializing connection...".to_string(),
            CallPhase::Connected if self.assistant_speaking => "In call (assistant speaking)".to_string(),
            CallPhase::Connected if self.mic_enabled => "In call (mic live)".to_string(),
            CallPhase::Connected => "In call (mic muted)".to_string(),
            CallPhase::Ended if self.mic_enabled => "Mic live (call not started)".to_string(),
            CallPhase::Ended => match &self.end_cause {
                Some(EndCause::Stopped) => "Call stopped".to_string(),
                Some(EndCause::Failed(e)) => e.to_string(),
                None => "Call ended".to_string(),
            },
        }
    }

    pub fn status(&self, transport_present: bool) -> SessionStatus {
        SessionStatus {
            phase: self.phase,
            mic_enabled: self.mic_enabled,
            assistant_speaking: self.assistant_speaking,
            call_active: transport_present && self.phase != CallPhase::Ended,
            message: self.status_message(),
        }
    }
}

/// Accumulates one assistant response's transcript deltas.
///
/// A response that continues an assistant line already on screen keeps that
/// line's text as its base, so partial updates extend it instead of
/// overwriting it. The buffer also remembers which transcript line the
/// response is drawn into, so a user line landing mid-response does not
/// split it.
#[derive(Debug, Clone, Default)]
pub(crate) struct SpeechBuffer {
    base: Option<String>,
    text: String,
    active: bool,
    line: Option<usize>,
}

impl SpeechBuffer {
    /// Adds a delta. `previous` is the current assistant line, if the last
    /// line belongs to the assistant. Returns the text to show as partial.
    pub fn push(&mut self, delta: &str, previous: Option<&str>) -> String {
        if !self.active {
            self.active = true;
            self.base = previous.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());
        }
        self.text.push_str(delta);
        self.compose(&self.text)
    }

    /// Final text for the response. Clears the buffer.
    pub fn finish(&mut self, transcript: &str) -> String {
        let text = if self.active { self.compose(transcript) } else { transcript.to_string() };
        self.clear();
        text
    }

    pub fn clear(&mut self) {
        self.base = None;
        self.text.clear();
        self.active = false;
        self.line = None;
    }

    /// Transcript line holding the response so far.
    pub fn line(&self) -> Option<usize> {
        self.line.filter(|_| self.active)
    }

    pub fn set_line(&mut self, index: usize) {
        if self.active {
            self.line = Some(index);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn compose(&self, text: &str) -> String {
        match &self.base {
            Some(base) => format!("{} {}", base, text.trim()),
            None => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureCause;

    #[test]
    fn idle_text_follows_mic() {
        let mut state = SessionState::default();
        assert_eq!(state.status_message(), "Idle");
        state.set_mic(true);
        assert_eq!(state.status_message(), "Mic live (call not started)");
    }

    #[test]
    fn in_call_text() {
        let mut state = SessionState::default();
        state.set_mic(true);
        state.set_phase(CallPhase::Connecting);
        assert_eq!(state.status_message(), "Initializing connection...");
        state.set_phase(CallPhase::Connected);
        assert_eq!(state.status_message(), "In call (mic live)");
        state.set_speaking(true);
        assert_eq!(state.status_message(), "In call (assistant speaking)");
        state.set_speaking(false);
        state.set_mic(false);
        assert_eq!(state.status_message(), "In call (mic muted)");
    }

    #[test]
    fn notice_overrides_until_next_change() {
        let mut state = SessionState::default();
        state.set_notice(Notice::EnableMicFirst);
        assert_eq!(state.status_message(), "Enable mic first");
        state.set_mic(true);
        assert_eq!(state.status_message(), "Mic live (call not started)");

        state.set_phase(CallPhase::Connected);
        state.set_notice(Notice::Server("bad voice".into()));
        assert_eq!(state.status_message(), "Error: bad voice");
        state.set_speaking(true);
        assert!(state.notice().is_none());
    }

    #[test]
    fn searching_survives_speech() {
        let mut state = SessionState::default();
        state.set_phase(CallPhase::Connected);
        state.set_notice(Notice::Searching);
        state.set_speaking(true);
        assert_eq!(state.status_message(), "Searching recipes...");
        state.clear_notice(&Notice::NoQuery);
        assert_eq!(state.status_message(), "Searching recipes...");
        state.clear_notice(&Notice::Searching);
        assert_eq!(state.status_message(), "In call (assistant speaking)");
    }

    #[test]
    fn ended_names_the_cause() {
        let mut state = SessionState::default();
        state.set_phase(CallPhase::Connected);
        state.end(EndCause::Failed(SessionError::TransportFailure(FailureCause::IceFailed)));
        assert_eq!(state.status_message(), "Connection failed");
        state.end(EndCause::Stopped);
        assert_eq!(state.status_message(), "Call stopped");

        let status = state.status(true);
        assert_eq!(status.phase, CallPhase::Ended);
        assert!(!status.call_active);
    }

    #[test]
    fn call_active_needs_a_transport() {
        let mut state = SessionState::default();
        state.set_phase(CallPhase::Connecting);
        assert!(!state.status(false).call_active);
        assert!(state.status(true).call_active);
    }

    #[test]
    fn deltas_accumulate() {
        let mut buffer = SpeechBuffer::default();
        assert_eq!(buffer.push("Hel", None), "Hel");
        assert_eq!(buffer.push("lo there", None), "Hello there");
        buffer.set_line(3);
        assert_eq!(buffer.line(), Some(3));
        assert_eq!(buffer.finish("Hello there."), "Hello there.");
        assert!(!buffer.is_active());
        assert_eq!(buffer.line(), None);
    }

    #[test]
    fn response_continues_previous_assistant_line() {
        let mut buffer = SpeechBuffer::default();
        assert_eq!(buffer.push("Here", Some("Let me check.")), "Let me check. Here");
        // the base is captured once per response
        assert_eq!(buffer.push(" you go", Some("Let me check. Here")), "Let me check. Here you go");
        assert_eq!(buffer.finish("Here you go"), "Let me check. Here you go");
        assert_eq!(buffer.finish("Standalone"), "Standalone");
    }
}
