
pub mod error;
pub mod types;
pub mod classifier;
pub mod parser;
pub mod reformat;
pub mod audio;
pub mod voices;
pub mod synth;
pub mod scripts;
pub mod convert;

#[cfg(feature = "voicevox")]
mod vvc;

pub mod deps {
    pub use serde_json;
    pub use serde;
}

#[cfg(feature = "voicevox")]
pub use vvc::*;

pub use error::{
    ErrorDescription,
    GenericError,
    ScreenplayError,
    ScreenplayErrorDescription,
};

pub use types::{Speaker, Utterance, VoiceId, ACTION_LABEL};
pub use parser::{parse_file, parse_str, ParseOptions, ScreenplayParser};
pub use reformat::{format_file, format_screenplay};
pub use audio::{AudioAssembler, AudioClip};
pub use voices::VoiceMap;
pub use synth::{PiperSynthesizer, Synthesizer};
pub use convert::{BatchReport, ConvertOptions, FileOutcome, OutputMode, ScreenplayConverter};
