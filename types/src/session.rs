use crate::audio::{AudioFormat, InputAudioTranscription, TranscriptionModel, TurnDetection, Voice};
use crate::tools::{Tool, ToolChoice};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Session {
    /// The set of modalities the model can respond with. To disable audio, set this to ["text"].
    /// To enable audio, set this to ["text", "audio"].
    modalities: Vec<String>,

    /// The default system instructions prepended to model calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,

    /// The voice the model uses to respond. Cannot be changed once the model has responded with audio at least once.
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<Voice>,

    /// The format of input audio. Options are "pcm16", "g711_ulaw", "g711_alaw".
    #[serde(skip_serializing_if = "Option::is_none")]
    input_audio_format: Option<AudioFormat>,

    /// The format of output audio. Options are "pcm16", "g711_ulaw", "g711_alaw".
    #[serde(skip_serializing_if = "Option::is_none")]
    output_audio_format: Option<AudioFormat>,

    /// Configuration for input audio transcription. Omitted to turn off
    #[serde(skip_serializing_if = "Option::is_none")]
    input_audio_transcription: Option<InputAudioTranscription>,

    /// Configuration for turn detection. Omitted to turn off
    #[serde(skip_serializing_if = "Option::is_none")]
    turn_detection: Option<TurnDetection>,

    /// Tools(Functions) available to the model.
    #[serde(default)]
    tools: Vec<Tool>,

    /// How the model chooses tools. Options are "auto", "none", "required", or specify a function.
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,

    /// Sampling temperature for the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,

    /// Maximum number of output tokens. Use "inf" for infinity.
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<MaxOutputTokens>,
}

impl Session {
    pub fn modalities(&self) -> &[String] {
        &self.modalities
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn voice(&self) -> Option<&Voice> {
        self.voice.as_ref()
    }

    pub fn turn_detection(&self) -> Option<&TurnDetection> {
        self.turn_detection.as_ref()
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn tool_choice(&self) -> Option<&ToolChoice> {
        self.tool_choice.as_ref()
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum MaxOutputTokens {
    Number(i32),
    Infinity(String),
}

pub struct SessionConfigurator {
    session: Session,
}

impl Default for SessionConfigurator {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionConfigurator {
    pub fn new() -> Self {
        Self {
            session: Session {
                modalities: vec!["text".to_string(), "audio".to_string()],
                instructions: None,
                voice: None,
                input_audio_format: None,
                output_audio_format: None,
                input_audio_transcription: None,
                turn_detection: None,
                tools: vec![],
                tool_choice: Some(ToolChoice::Auto),
                temperature: None,
                max_output_tokens: None,
            },
        }
    }

    pub fn with_modalities(mut self, modalities: Vec<String>) -> Self {
        self.session.modalities = modalities;
        self
    }

    pub fn with_modalities_enable_audio(mut self) -> Self {
        self.session.modalities = vec!["text".to_string(), "audio".to_string()];
        self
    }

    pub fn with_instructions(mut self, instructions: &str) -> Self {
        self.session.instructions = Some(instructions.to_string());
        self
    }

    pub fn with_voice(mut self, voice: Voice) -> Self {
        self.session.voice = Some(voice);
        self
    }

    pub fn with_input_audio_format(mut self, format: AudioFormat) -> Self {
        self.session.input_audio_format = Some(format);
        self
    }

    pub fn with_output_audio_format(mut self, format: AudioFormat) -> Self {
        self.session.output_audio_format = Some(format);
        self
    }

    pub fn with_input_audio_transcription_enable(mut self, model: TranscriptionModel) -> Self {
        self.session.input_audio_transcription = Some(InputAudioTranscription::new().with_model(model));
        self
    }

    pub fn with_turn_detection_enable(mut self, turn_detection: TurnDetection) -> Self {
        self.session.turn_detection = Some(turn_detection);
        self
    }

    pub fn with_turn_detection_disable(mut self) -> Self {
        self.session.turn_detection = None;
        self
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.session.tools = tools;
        self
    }

    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.session.tool_choice = Some(tool_choice);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.session.temperature = Some(temperature);
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: MaxOutputTokens) -> Self {
        self.session.max_output_tokens = Some(max_output_tokens);
        self
    }

    pub fn build(self) -> Session {
        self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ServerVadTurnDetection;

    #[test]
    fn unset_options_are_omitted() {
        let session = SessionConfigurator::new().build();
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["modalities"], serde_json::json!(["text", "audio"]));
        assert_eq!(json["tool_choice"], "auto");
        assert!(json.get("temperature").is_none());
        assert!(json.get("voice").is_none());
        assert!(json.get("turn_detection").is_none());
    }

    #[test]
    fn configured_session_serializes_wire_names() {
        let session = SessionConfigurator::new()
            .with_voice(Voice::Ash)
            .with_input_audio_format(AudioFormat::Pcm16)
            .with_output_audio_format(AudioFormat::Pcm16)
            .with_input_audio_transcription_enable(TranscriptionModel::Whisper)
            .with_turn_detection_enable(TurnDetection::ServerVad(
                ServerVadTurnDetection::default().with_silence_duration_ms(500),
            ))
            .build();
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["voice"], "ash");
        assert_eq!(json["input_audio_format"], "pcm16");
        assert_eq!(json["input_audio_transcription"]["model"], "whisper-1");
        assert_eq!(json["turn_detection"]["type"], "server_vad");
        assert_eq!(json["turn_detection"]["silence_duration_ms"], 500);
    }
}
