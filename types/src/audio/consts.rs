use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::convert::Infallible;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum Voice {
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Sage,
    Shimmer,
    Verse,
    Custom(String),
}

impl Voice {
    pub fn as_str(&self) -> &str {
        match self {
            Voice::Alloy => "alloy",
            Voice::Ash => "ash",
            Voice::Ballad => "ballad",
            Voice::Coral => "coral",
            Voice::Echo => "echo",
            Voice::Sage => "sage",
            Voice::Shimmer => "shimmer",
            Voice::Verse => "verse",
            Voice::Custom(s) => s,
        }
    }
}

impl From<&str> for Voice {
    fn from(s: &str) -> Self {
        match s {
            "alloy" => Voice::Alloy,
            "ash" => Voice::Ash,
            "ballad" => Voice::Ballad,
            "coral" => Voice::Coral,
            "echo" => Voice::Echo,
            "sage" => Voice::Sage,
            "shimmer" => Voice::Shimmer,
            "verse" => Voice::Verse,
            _ => Voice::Custom(s.to_string()),
        }
    }
}

impl FromStr for Voice {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Voice::from(s))
    }
}

impl Serialize for Voice {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Voice {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Voice::from(s.as_str()))
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub enum AudioFormat {
    #[serde(rename = "pcm16")]
    Pcm16,
    #[serde(rename = "g711_ulaw")]
    Mulaw,
    #[serde(rename = "g711_alaw")]
    Alaw,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptionModel {
    Whisper,
    Custom(String),
}

impl Serialize for TranscriptionModel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            TranscriptionModel::Whisper => serializer.serialize_str("whisper-1"),
            TranscriptionModel::Custom(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for TranscriptionModel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "whisper-1" => TranscriptionModel::Whisper,
            _ => TranscriptionModel::Custom(s),
        })
    }
}

#[cfg(test)]
mod test {

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    struct AudioConsts {
        #[serde(skip_serializing_if = "Option::is_none")]
        voice: Option<super::Voice>,
        #[serde(skip_serializing_if = "Option::is_none")]
        audio_format: Option<super::AudioFormat>,
    }

    #[test]
    fn test_serialize() {
        let consts = AudioConsts {
            voice: Some(super::Voice::Ash),
            audio_format: Some(super::AudioFormat::Pcm16),
        };
        let json = serde_json::to_string(&consts).unwrap();
        assert_eq!(json, r#"{"voice":"ash","audio_format":"pcm16"}"#);

        let consts = AudioConsts {
            voice: Some(super::Voice::Custom("marin".to_string())),
            audio_format: None,
        };
        let json = serde_json::to_string(&consts).unwrap();
        assert_eq!(json, r#"{"voice":"marin"}"#);
    }

    #[test]
    fn test_deserialize() {
        let json = r#"{"voice":"verse","audio_format":"g711_ulaw"}"#;
        let consts: AudioConsts = serde_json::from_str(json).unwrap();
        assert_eq!(consts.voice, Some(super::Voice::Verse));
        assert_eq!(consts.audio_format, Some(super::AudioFormat::Mulaw));

        let json = r#"{"voice":"cedar"}"#;
        let consts: AudioConsts = serde_json::from_str(json).unwrap();
        assert_eq!(consts.voice, Some(super::Voice::Custom("cedar".to_string())));
        assert_eq!(consts.audio_format, None);
    }

    #[test]
    fn voice_from_config_string() {
        let voice: super::Voice = "ash".parse().unwrap();
        assert_eq!(voice, super::Voice::Ash);
    }
}
