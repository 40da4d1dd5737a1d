//! The Sulten persona and the configuration sent once the control channel opens.

use serde_json::json;

use crate::consts::RECIPE_TOOL_NAME;
use crate::types::audio::{AudioFormat, ServerVadTurnDetection, TranscriptionModel, TurnDetection, Voice};
use crate::types::events::client::SessionUpdateEvent;
use crate::types::session::SessionConfigurator;
use crate::types::tools::{FunctionTool, Tool, ToolChoice};
use crate::types::{ClientEvent, Session};

pub const PERSONA_INSTRUCTIONS: &str = "You are Sulten, a cooking assistant with access to a recipe database. \
CRITICAL RULE: You do NOT have recipe information in your training data. Whenever users ask about recipes, dishes, \
meals, or cooking ideas, you MUST call the get-recipes tool FIRST before responding. Never suggest recipes from your \
own knowledge. After calling get-recipes and receiving results, present them to the user naturally. If asked about \
non-cooking topics, politely decline. Be friendly and conversational.";

const RECIPE_TOOL_DESCRIPTION: &str = "Searches the recipe database for recipes. Call this tool for ANY recipe-related \
question including: specific dishes (pasta, chicken), occasions (Christmas, Halloween), dietary needs (vegetarian, \
vegan), cooking time, difficulty, cuisine type, or general meal ideas. Always call this before suggesting recipes.";

const QUERY_DESCRIPTION: &str = "The user's recipe search request. Examples: 'Christmas recipes', 'easy pasta dishes', \
'vegetarian dinner ideas', 'quick meals', 'Italian cuisine'";

const VAD_THRESHOLD: f32 = 0.5;
const VAD_PREFIX_PADDING_MS: i32 = 300;
const VAD_SILENCE_DURATION_MS: i32 = 500;

/// The `get-recipes` declaration: one required string parameter, `query`.
pub fn recipe_tool() -> Tool {
    Tool::Function(FunctionTool::new(
        RECIPE_TOOL_NAME,
        RECIPE_TOOL_DESCRIPTION,
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": QUERY_DESCRIPTION,
                }
            },
            "required": ["query"],
        }),
    ))
}

pub fn session_config(voice: Voice) -> Session {
    SessionConfigurator::new()
        .with_modalities_enable_audio()
        .with_instructions(PERSONA_INSTRUCTIONS)
        .with_voice(voice)
        .with_input_audio_format(AudioFormat::Pcm16)
        .with_output_audio_format(AudioFormat::Pcm16)
        .with_input_audio_transcription_enable(TranscriptionModel::Whisper)
        .with_turn_detection_enable(TurnDetection::ServerVad(
            ServerVadTurnDetection::default()
                .with_threshold(VAD_THRESHOLD)
                .with_prefix_padding_ms(VAD_PREFIX_PADDING_MS)
                .with_silence_duration_ms(VAD_SILENCE_DURATION_MS),
        ))
        .with_tool_choice(ToolChoice::Auto)
        .with_tools(vec![recipe_tool()])
        .build()
}

pub fn session_update(voice: Voice) -> ClientEvent {
    ClientEvent::SessionUpdate(SessionUpdateEvent::new(session_config(voice)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_update_declares_the_recipe_tool() {
        let json = serde_json::to_value(session_update(Voice::Ash)).unwrap();
        assert_eq!(json["type"], "session.update");

        let session = &json["session"];
        assert_eq!(session["modalities"], json!(["text", "audio"]));
        assert_eq!(session["voice"], "ash");
        assert_eq!(session["output_audio_format"], "pcm16");
        assert_eq!(session["tool_choice"], "auto");
        assert_eq!(session["turn_detection"]["type"], "server_vad");
        assert_eq!(session["turn_detection"]["prefix_padding_ms"], 300);
        assert_eq!(session["turn_detection"]["silence_duration_ms"], 500);

        let tool = &session["tools"][0];
        assert_eq!(tool["type"], "function");
        assert_eq!(tool["name"], "get-recipes");
        assert_eq!(tool["parameters"]["required"], json!(["query"]));
        assert_eq!(tool["parameters"]["properties"]["query"]["type"], "string");
    }

    #[test]
    fn persona_forces_tool_use() {
        assert!(PERSONA_INSTRUCTIONS.contains("MUST call the get-recipes tool"));
    }
}
