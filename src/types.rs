
use std::fmt;

use serde::{Deserialize, Serialize};

/// Speaker label used for scene headings and narrative lines.
pub const ACTION_LABEL: &str = "ACTION";

/// Who an utterance belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Speaker {
    Action,
    Character(String),
}

impl Speaker {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Action => ACTION_LABEL,
            Self::Character(name) => name,
        }
    }

    pub fn is_action(&self) -> bool {
        matches!(self, Self::Action)
    }

    /// Label with spaces replaced by underscores, for file names.
    pub fn file_stem(&self) -> String {
        self.as_str().replace(' ', "_")
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Speaker {
    fn from(label: String) -> Self {
        if label == ACTION_LABEL {
            Self::Action
        } else {
            Self::Character(label)
        }
    }
}

impl From<Speaker> for String {
    fn from(speaker: Speaker) -> Self {
        match speaker {
            Speaker::Action => ACTION_LABEL.to_string(),
            Speaker::Character(name) => name,
        }
    }
}

/// One attributed unit of screenplay text.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub speaker: Speaker,
    pub text: String,
    /// 1-based line where the utterance began.
    pub source_line: usize,
}

impl Utterance {
    pub fn action(text: impl Into<String>, source_line: usize) -> Self {
        Self {
            speaker: Speaker::Action,
            text: text.into(),
            source_line,
        }
    }

    pub fn dialogue(name: impl Into<String>, text: impl Into<String>, source_line: usize) -> Self {
        Self {
            speaker: Speaker::Character(name.into()),
            text: text.into(),
            source_line,
        }
    }
}

/// Opaque voice identifier handed to a synthesizer: a model path for Piper,
/// a speaker id for VOICEVOX.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct VoiceId(String);

impl VoiceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VoiceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speaker_serializes_as_plain_label() {
        let utterance = Utterance::dialogue("ALEX (V.O.)", "Run.", 7);
        let json = serde_json::to_string(&utterance).unwrap();
        assert_eq!(json, r#"{"speaker":"ALEX (V.O.)","text":"Run.","source_line":7}"#);

        let action: Utterance = serde_json::from_str(r#"{"speaker":"ACTION","text":"INT. LAB","source_line":3}"#).unwrap();
        assert!(action.speaker.is_action());
    }

    #[test]
    fn file_stem_replaces_spaces() {
        assert_eq!(Speaker::Character("REGULAR CUSTOMER".into()).file_stem(), "REGULAR_CUSTOMER");
        assert_eq!(Speaker::Action.file_stem(), "ACTION");
    }
}
