//! Character → voice mapping loaded from a JSON config.
//!
//! ```json
//! {
//!     "_default": "voices/en_US-lessac-medium.onnx",
//!     "MARCUS": "voices/en_US-ryan-high.onnx",
//!     "ALEX": { "voice": "voices/en_US-amy-medium.onnx", "note": "lead" }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::classifier::base_character_name;
use crate::error::{ScreenplayError, ScreenplayErrorDescription};
use crate::types::VoiceId;

pub const DEFAULT_VOICE_KEY: &str = "_default";

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum VoiceEntry {
    Path(String),
    Detailed {
        #[serde(default)]
        voice: String,
    },
}

impl VoiceEntry {
    fn voice(&self) -> &str {
        match self {
            Self::Path(voice) => voice,
            Self::Detailed { voice } => voice,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceMap {
    characters: BTreeMap<String, VoiceId>,
    default: Option<VoiceId>,
    /// Directory of the config file, if loaded from one.
    base_dir: Option<PathBuf>,
}

impl VoiceMap {
    /// One voice for every speaker.
    pub fn single(voice: impl Into<VoiceId>) -> Self {
        Self {
            characters: BTreeMap::new(),
            default: Some(voice.into()),
            base_dir: None,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let raw: BTreeMap<String, VoiceEntry> = serde_json::from_str(json)?;
        let mut map = Self::default();

        for (name, entry) in raw {
            let voice = entry.voice().trim();
            if voice.is_empty() {
                log::warn!("No voice given for '{}', skipping", name);
                continue;
            }
            if name == DEFAULT_VOICE_KEY {
                map.default = Some(VoiceId::new(voice));
            } else {
                map.characters.insert(name, VoiceId::new(voice));
            }
        }

        Ok(map)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScreenplayError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| ScreenplayError::read(path, e))?;
        let mut map = Self::from_json_str(&json).map_err(|e| {
            ScreenplayError::new(ScreenplayErrorDescription::VoiceConfig {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        })?;
        map.base_dir = path.parent().map(Path::to_path_buf);

        log::debug!("Character mappings in {}:", path.display());
        for (name, voice) in &map.characters {
            log::debug!("  '{}' -> {}", name, voice);
        }

        Ok(map)
    }

    /// True when no per-character voices are configured.
    pub fn is_single_voice(&self) -> bool {
        self.characters.is_empty()
    }

    pub fn default_voice(&self) -> Option<&VoiceId> {
        self.default.as_ref()
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Configured voice for a speaker label: exact label first, then the name
    /// without its `(V.O.)`-style annotation. Does not fall back to the default.
    pub fn lookup(&self, speaker: &str) -> Option<&VoiceId> {
        self.characters
            .get(speaker)
            .or_else(|| self.characters.get(base_character_name(speaker)))
    }

    /// Every distinct voice, default included, in name order.
    pub fn voices(&self) -> BTreeSet<&VoiceId> {
        self.characters.values().chain(self.default.iter()).collect()
    }
}
