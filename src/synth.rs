
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Deserialize;

use crate::audio::AudioClip;
use crate::error::{ScreenplayError, ScreenplayErrorDescription};
use crate::types::VoiceId;

/// Text-to-speech backend: text plus a voice in, mono PCM out.
pub trait Synthesizer {
    /// Makes a voice available. Called once per distinct voice before any synthesis.
    fn load_voice(&mut self, voice: &VoiceId) -> Result<(), ScreenplayError>;

    fn synthesize(&self, text: &str, voice: &VoiceId) -> Result<AudioClip, ScreenplayError>;
}

impl<S: Synthesizer + ?Sized> Synthesizer for Box<S> {
    fn load_voice(&mut self, voice: &VoiceId) -> Result<(), ScreenplayError> {
        (**self).load_voice(voice)
    }

    fn synthesize(&self, text: &str, voice: &VoiceId) -> Result<AudioClip, ScreenplayError> {
        (**self).synthesize(text, voice)
    }
}

pub const PIPER_DEFAULT_SAMPLE_RATE: u32 = 22050;

#[derive(Deserialize, Debug)]
struct PiperModelConfig {
    audio: PiperAudioConfig,
}

#[derive(Deserialize, Debug)]
struct PiperAudioConfig {
    sample_rate: u32,
}

#[derive(Debug, Clone)]
struct PiperVoice {
    model: PathBuf,
    sample_rate: u32,
}

/// Runs the `piper` executable once per request.
#[derive(Debug, Clone)]
pub struct PiperSynthesizer {
    program: PathBuf,
    search_dirs: Vec<PathBuf>,
    use_cuda: bool,
    voices: HashMap<VoiceId, PiperVoice>,
}

impl Default for PiperSynthesizer {
    fn default() -> Self {
        Self::new("piper")
    }
}

impl PiperSynthesizer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            search_dirs: Vec::new(),
            use_cuda: false,
            voices: HashMap::new(),
        }
    }

    /// Directories searched, in order, for relative model paths.
    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.push(dir.into());
        self
    }

    pub fn with_cuda(mut self, use_cuda: bool) -> Self {
        self.use_cuda = use_cuda;
        self
    }

    /// Resolves a model path: as given if absolute, else under each search
    /// directory by relative path, then by bare file name.
    pub fn resolve_model(&self, voice: &VoiceId) -> Option<PathBuf> {
        let path = Path::new(voice.as_str());
        if path.is_absolute() || self.search_dirs.is_empty() {
            return path.is_file().then(|| path.to_path_buf());
        }

        let by_path = self.search_dirs.iter().map(|dir| dir.join(path));
        let by_name = path
            .file_name()
            .into_iter()
            .flat_map(|name| self.search_dirs.iter().map(move |dir| dir.join(name)));

        by_path.chain(by_name).find(|candidate| candidate.is_file())
    }

    fn model_sample_rate(model: &Path) -> u32 {
        let mut config_path = model.as_os_str().to_owned();
        config_path.push(".json");

        let parsed = fs::read_to_string(&config_path)
            .ok()
            .and_then(|json| serde_json::from_str::<PiperModelConfig>(&json).ok());

        match parsed {
            Some(config) => config.audio.sample_rate,
            None => {
                log::warn!(
                    "No readable model config next to {}, assuming {} Hz",
                    model.display(),
                    PIPER_DEFAULT_SAMPLE_RATE
                );
                PIPER_DEFAULT_SAMPLE_RATE
            },
        }
    }
}

impl Synthesizer for PiperSynthesizer {
    fn load_voice(&mut self, voice: &VoiceId) -> Result<(), ScreenplayError> {
        if self.voices.contains_key(voice) {
            return Ok(());
        }

        let model = self
            .resolve_model(voice)
            .ok_or_else(|| ScreenplayError::new(ScreenplayErrorDescription::VoiceNotFound(voice.to_string())))?;
        let sample_rate = Self::model_sample_rate(&model);

        log::info!("Loading voice: {} ({} Hz)", model.display(), sample_rate);
        self.voices.insert(voice.clone(), PiperVoice { model, sample_rate });
        Ok(())
    }

    fn synthesize(&self, text: &str, voice: &VoiceId) -> Result<AudioClip, ScreenplayError> {
        let piper_voice = self
            .voices
            .get(voice)
            .ok_or_else(|| ScreenplayError::new(ScreenplayErrorDescription::VoiceNotFound(voice.to_string())))?;

        let mut command = Command::new(&self.program);
        command
            .arg("--model")
            .arg(&piper_voice.model)
            .arg("--output-raw")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if self.use_cuda {
            command.arg("--cuda");
        }

        let mut child = command
            .spawn()
            .map_err(|e| ScreenplayError::synthesis(format!("failed to spawn {}: {}", self.program.display(), e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ScreenplayError::synthesis("piper stdin unavailable"))?;
        let input = text.to_owned();
        let writer = std::thread::spawn(move || stdin.write_all(input.as_bytes()));

        let output = child
            .wait_with_output()
            .map_err(|e| ScreenplayError::synthesis(format!("piper did not finish: {}", e)))?;

        match writer.join() {
            Ok(Ok(())) => {},
            Ok(Err(e)) => return Err(ScreenplayError::synthesis(format!("failed to write text to piper: {}", e))),
            Err(_) => return Err(ScreenplayError::synthesis("piper stdin writer panicked")),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::error!("piper failed for voice {}: {}", voice, stderr.trim());
            return Err(ScreenplayError::synthesis(format!("piper exited with {}", output.status)));
        }

        Ok(AudioClip::from_raw_pcm(&output.stdout, piper_voice.sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_path_then_bare_file_name() {
        let config_dir = tempfile::tempdir().unwrap();
        let shared_dir = tempfile::tempdir().unwrap();
        fs::create_dir(config_dir.path().join("voices")).unwrap();
        fs::write(config_dir.path().join("voices/ryan.onnx"), b"").unwrap();
        fs::write(shared_dir.path().join("amy.onnx"), b"").unwrap();

        let piper = PiperSynthesizer::default()
            .with_search_dir(config_dir.path())
            .with_search_dir(shared_dir.path());

        assert_eq!(
            piper.resolve_model(&VoiceId::new("voices/ryan.onnx")),
            Some(config_dir.path().join("voices/ryan.onnx"))
        );
        assert_eq!(
            piper.resolve_model(&VoiceId::new("voices/amy.onnx")),
            Some(shared_dir.path().join("amy.onnx"))
        );
        assert_eq!(piper.resolve_model(&VoiceId::new("voices/missing.onnx")), None);
    }

    #[test]
    fn load_voice_reads_sample_rate_from_model_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("lessac.onnx"), b"").unwrap();
        fs::write(dir.path().join("lessac.onnx.json"), r#"{"audio": {"sample_rate": 16000}, "num_speakers": 1}"#).unwrap();

        let mut piper = PiperSynthesizer::default().with_search_dir(dir.path());
        piper.load_voice(&VoiceId::new("lessac.onnx")).unwrap();
        assert_eq!(piper.voices[&VoiceId::new("lessac.onnx")].sample_rate, 16000);
    }

    #[test]
    fn missing_model_is_voice_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut piper = PiperSynthesizer::default().with_search_dir(dir.path());
        let err = piper.load_voice(&VoiceId::new("nope.onnx")).unwrap_err();
        assert!(matches!(err.as_inner(), ScreenplayErrorDescription::VoiceNotFound(_)));
    }

    #[test]
    fn unloaded_voice_cannot_synthesize() {
        let piper = PiperSynthesizer::default();
        assert!(piper.synthesize("Hello.", &VoiceId::new("x.onnx")).is_err());
    }
}
