pub mod client;
pub mod server;

use client::*;
use server::*;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate(SessionUpdateEvent),
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate(ConversationItemCreateEvent),
    #[serde(rename = "response.create")]
    ResponseCreate(ResponseCreateEvent),
    #[serde(rename = "response.cancel")]
    ResponseCancel(ResponseCancelEvent),
}

impl ClientEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::SessionUpdate(_) => "session.update",
            ClientEvent::ConversationItemCreate(_) => "conversation.item.create",
            ClientEvent::ResponseCreate(_) => "response.create",
            ClientEvent::ResponseCancel(_) => "response.cancel",
        }
    }
}

/// Server events the client acts on. Every other `type` lands in `Unknown`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "error")]
    Error(ErrorEvent),
    #[serde(rename = "session.created")]
    SessionCreated(SessionCreatedEvent),
    #[serde(rename = "session.updated")]
    SessionUpdated(SessionUpdatedEvent),
    #[serde(rename = "input_audio_buffer.speech_started")]
    InputAudioBufferSpeechStarted(InputAudioBufferSpeechStartedEvent),
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    ConversationItemInputAudioTranscriptionCompleted(ConversationItemInputAudioTranscriptionCompletedEvent),
    #[serde(rename = "response.done")]
    ResponseDone(ResponseDoneEvent),
    #[serde(rename = "response.audio_transcript.delta")]
    ResponseAudioTranscriptDelta(ResponseAudioTranscriptDeltaEvent),
    #[serde(rename = "response.audio_transcript.done")]
    ResponseAudioTranscriptDone(ResponseAudioTranscriptDoneEvent),
    #[serde(rename = "response.function_call_arguments.done")]
    ResponseFunctionCallArgumentsDone(ResponseFunctionCallArgumentsDoneEvent),
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FunctionCallOutputItem, Item};

    #[test]
    fn client_events_carry_type_discriminator() {
        let event = ClientEvent::ResponseCreate(ResponseCreateEvent::new());
        assert_eq!(serde_json::to_string(&event).unwrap(), r#"{"type":"response.create"}"#);

        let event = ClientEvent::ConversationItemCreate(ConversationItemCreateEvent::new(Item::FunctionCallOutput(
            FunctionCallOutputItem::new("call_7", "{}".to_string()),
        )));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "conversation.item.create");
        assert_eq!(json["item"]["type"], "function_call_output");
        assert_eq!(json["item"]["call_id"], "call_7");
        assert!(json.get("event_id").is_none());
    }

    #[test]
    fn unknown_server_types_deserialize() {
        let event: ServerEvent = serde_json::from_str(r#"{"type":"rate_limits.updated","rate_limits":[]}"#).unwrap();
        assert!(matches!(event, ServerEvent::Unknown));
    }

    #[test]
    fn transcript_delta_tolerates_missing_indices() {
        let event: ServerEvent =
            serde_json::from_str(r#"{"type":"response.audio_transcript.delta","delta":"Hel"}"#).unwrap();
        let ServerEvent::ResponseAudioTranscriptDelta(delta) = event else {
            panic!("expected a transcript delta");
        };
        assert_eq!(delta.delta(), "Hel");
        assert_eq!(delta.event_id(), "");
    }

    #[test]
    fn session_updated_exposes_status() {
        let event: ServerEvent =
            serde_json::from_str(r#"{"type":"session.updated","event_id":"e1","session":{"id":"s","status":"connected"}}"#)
                .unwrap();
        let ServerEvent::SessionUpdated(updated) = event else {
            panic!("expected session.updated");
        };
        assert_eq!(updated.session().status(), Some("connected"));
    }
}
