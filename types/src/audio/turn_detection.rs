/// How the server decides the user has finished speaking.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnDetection {
    ServerVad(ServerVadTurnDetection),
}

impl Default for TurnDetection {
    fn default() -> Self {
        TurnDetection::ServerVad(ServerVadTurnDetection::default())
    }
}

/// Voice activity detection tuned for conversational turns.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ServerVadTurnDetection {
    /// 0.0 to 1.0. Higher needs louder speech to trigger.
    threshold: f32,
    prefix_padding_ms: i32,
    /// Silence after which the turn ends.
    silence_duration_ms: i32,
}

impl Default for ServerVadTurnDetection {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
        }
    }
}

impl ServerVadTurnDetection {
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_prefix_padding_ms(mut self, ms: i32) -> Self {
        self.prefix_padding_ms = ms;
        self
    }

    pub fn with_silence_duration_ms(mut self, ms: i32) -> Self {
        self.silence_duration_ms = ms;
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn prefix_padding_ms(&self) -> i32 {
        self.prefix_padding_ms
    }

    pub fn silence_duration_ms(&self) -> i32 {
        self.silence_duration_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_vad_is_tagged() {
        let json = serde_json::to_value(TurnDetection::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "server_vad",
                "threshold": 0.5,
                "prefix_padding_ms": 300,
                "silence_duration_ms": 500,
            })
        );
    }

    #[test]
    fn threshold_is_clamped() {
        let vad = ServerVadTurnDetection::default().with_threshold(1.7);
        assert_eq!(vad.threshold(), 1.0);
    }
}
