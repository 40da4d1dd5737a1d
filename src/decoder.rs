//! Control-channel event decoder.
//!
//! Every inbound message decodes to a [`ControlEvent`]. Unknown or malformed
//! payloads become [`ControlEvent::Other`] so the channel is never torn down
//! by a message the client does not understand.

use crate::error::SessionError;
use crate::types::ServerEvent;

#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    UserTranscript { text: String },
    AssistantTranscriptDelta { text: String },
    AssistantTranscriptDone { text: String },
    FunctionCallArgumentsDone { call_id: String, name: String, arguments_json: String },
    SessionCreated,
    SessionUpdated { connected: bool },
    UserSpeechStarted,
    ResponseDone,
    ErrorEvent { message: String },
    Other,
}

pub fn decode(raw: &str) -> ControlEvent {
    match try_decode(raw) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("{}", e);
            ControlEvent::Other
        }
    }
}

fn try_decode(raw: &str) -> Result<ControlEvent, SessionError> {
    let json = serde_json::from_str::<serde_json::Value>(raw)
        .map_err(|e| SessionError::MalformedEvent(e.to_string()))?;
    let event_type = json.get("type").and_then(|v| v.as_str()).unwrap_or("unknown").to_string();
    let event_id = json.get("event_id").and_then(|v| v.as_str()).unwrap_or("unknown");
    tracing::debug!("received message: {}, id={}", event_type, event_id);

    if event_type.contains("function") || event_type == "response.output_item.added" {
        tracing::debug!("function call progress: {}", json);
    }

    let event = serde_json::from_value::<ServerEvent>(json)
        .map_err(|e| SessionError::MalformedEvent(format!("{}: {}", event_type, e)))?;

    Ok(match event {
        ServerEvent::ConversationItemInputAudioTranscriptionCompleted(data) => ControlEvent::UserTranscript {
            text: data.transcript().to_string(),
        },
        ServerEvent::ResponseAudioTranscriptDelta(data) => ControlEvent::AssistantTranscriptDelta {
            text: data.delta().to_string(),
        },
        ServerEvent::ResponseAudioTranscriptDone(data) => ControlEvent::AssistantTranscriptDone {
            text: data.transcript().to_string(),
        },
        ServerEvent::ResponseFunctionCallArgumentsDone(data) => ControlEvent::FunctionCallArgumentsDone {
            call_id: data.call_id().to_string(),
            name: data.name().to_string(),
            arguments_json: data.arguments().to_string(),
        },
        ServerEvent::SessionCreated(data) => {
            tracing::info!("session created: id={:?}, model={:?}", data.session().id(), data.session().model());
            ControlEvent::SessionCreated
        }
        ServerEvent::SessionUpdated(data) => ControlEvent::SessionUpdated {
            connected: data.session().status() == Some("connected"),
        },
        ServerEvent::InputAudioBufferSpeechStarted(_) => ControlEvent::UserSpeechStarted,
        ServerEvent::ResponseDone(data) => {
            tracing::debug!("response done: status={:?}", data.response().status());
            ControlEvent::ResponseDone
        }
        ServerEvent::Error(data) => {
            let message = data
                .error()
                .map(|details| details.message())
                .filter(|message| !message.is_empty())
                .unwrap_or("Unknown error");
            tracing::error!("server error: {}", message);
            ControlEvent::ErrorEvent {
                message: message.to_string(),
            }
        }
        ServerEvent::Unknown => ControlEvent::Other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_user_transcript() {
        let event = decode(
            r#"{"type":"conversation.item.input_audio_transcription.completed","event_id":"e1","item_id":"i1","content_index":0,"transcript":"Hello"}"#,
        );
        assert_eq!(event, ControlEvent::UserTranscript { text: "Hello".into() });
    }

    #[test]
    fn recognizes_assistant_transcript_stream() {
        assert_eq!(
            decode(r#"{"type":"response.audio_transcript.delta","delta":"Hel"}"#),
            ControlEvent::AssistantTranscriptDelta { text: "Hel".into() }
        );
        assert_eq!(
            decode(r#"{"type":"response.audio_transcript.done","transcript":"Hello there"}"#),
            ControlEvent::AssistantTranscriptDone { text: "Hello there".into() }
        );
    }

    #[test]
    fn recognizes_function_call_done() {
        let event = decode(
            r#"{"type":"response.function_call_arguments.done","call_id":"call_1","name":"get-recipes","arguments":"{\"query\":\"pasta\"}"}"#,
        );
        assert_eq!(
            event,
            ControlEvent::FunctionCallArgumentsDone {
                call_id: "call_1".into(),
                name: "get-recipes".into(),
                arguments_json: r#"{"query":"pasta"}"#.into(),
            }
        );
    }

    #[test]
    fn session_updated_reports_connected_status() {
        assert_eq!(
            decode(r#"{"type":"session.updated","session":{"status":"connected"}}"#),
            ControlEvent::SessionUpdated { connected: true }
        );
        assert_eq!(
            decode(r#"{"type":"session.updated","session":{"id":"sess_1"}}"#),
            ControlEvent::SessionUpdated { connected: false }
        );
        assert_eq!(decode(r#"{"type":"session.created","session":{}}"#), ControlEvent::SessionCreated);
    }

    #[test]
    fn error_message_falls_back() {
        assert_eq!(
            decode(r#"{"type":"error","error":{"type":"invalid_request_error","message":"bad voice"}}"#),
            ControlEvent::ErrorEvent { message: "bad voice".into() }
        );
        assert_eq!(
            decode(r#"{"type":"error"}"#),
            ControlEvent::ErrorEvent { message: "Unknown error".into() }
        );
    }

    #[test]
    fn unknown_and_malformed_decode_to_other() {
        assert_eq!(decode(r#"{"type":"rate_limits.updated","rate_limits":[]}"#), ControlEvent::Other);
        assert_eq!(decode(r#"{"type":"response.function_call_arguments.delta","delta":"{"}"#), ControlEvent::Other);
        assert_eq!(decode("not json"), ControlEvent::Other);
        assert_eq!(decode(r#"{"no_type":true}"#), ControlEvent::Other);
        assert_eq!(decode(r#"["array"]"#), ControlEvent::Other);
        // known type, wrong shape
        assert_eq!(decode(r#"{"type":"response.function_call_arguments.done","call_id":7}"#), ControlEvent::Other);
    }
}
