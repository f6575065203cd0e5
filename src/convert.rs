//! Turns parsed utterances into audio files through a [`Synthesizer`].

use std::borrow::Cow;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;

use crate::audio::{AudioAssembler, AudioClip, DEFAULT_LINE_GAP};
use crate::error::{ScreenplayError, ScreenplayErrorDescription};
use crate::parser::{self, ParseOptions};
use crate::synth::Synthesizer;
use crate::types::{Speaker, Utterance, VoiceId};
use crate::voices::VoiceMap;

/// Separator spoken between utterances in single-voice renders.
pub const SINGLE_VOICE_JOINER: &str = ". ... ";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputMode {
    /// One WAV per utterance
    #[default]
    Separate,
    /// One WAV per screenplay, default voice only
    Single,
    /// One WAV per screenplay, each speaker with their own voice
    Combine,
}

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub mode: OutputMode,
    /// Prepend `<speaker> says:` to dialogue in single and combined renders.
    pub narrator_prefix: bool,
    pub line_gap: Duration,
    pub parse: ParseOptions,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            mode: OutputMode::default(),
            narrator_prefix: false,
            line_gap: DEFAULT_LINE_GAP,
            parse: ParseOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Written files, in utterance order for separate mode.
    Converted(Vec<PathBuf>),
    NoDialogue,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub converted: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, ScreenplayError)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct ScreenplayConverter<S: Synthesizer> {
    synthesizer: S,
    voices: VoiceMap,
    loaded: HashSet<VoiceId>,
    default_voice: VoiceId,
    options: ConvertOptions,
}

impl<S: Synthesizer> ScreenplayConverter<S> {
    /// Loads every distinct voice of `voices` into the synthesizer. Voices that
    /// fail to load are skipped; the default falls back to the first loaded voice.
    pub fn new(mut synthesizer: S, voices: VoiceMap, options: ConvertOptions) -> Result<Self, ScreenplayError> {
        let mut loaded = HashSet::new();
        let mut first_loaded = None;

        for voice in voices.voices() {
            match synthesizer.load_voice(voice) {
                Ok(()) => {
                    if first_loaded.is_none() {
                        first_loaded = Some(voice.clone());
                    }
                    loaded.insert(voice.clone());
                },
                Err(e) => log::warn!("{}, skipping...", e),
            }
        }

        let default_voice = match voices.default_voice() {
            Some(voice) if loaded.contains(voice) => voice.clone(),
            declared => {
                let fallback = first_loaded.ok_or_else(|| ScreenplayError::new(ScreenplayErrorDescription::NoVoicesLoaded))?;
                if declared.is_some() {
                    log::warn!("Default voice not available, using {}", fallback);
                }
                fallback
            },
        };

        Ok(Self {
            synthesizer,
            voices,
            loaded,
            default_voice,
            options,
        })
    }

    pub fn default_voice(&self) -> &VoiceId {
        &self.default_voice
    }

    /// Mapped voice when it loaded, otherwise the default.
    pub fn voice_for(&self, speaker: &Speaker) -> &VoiceId {
        match self.voices.lookup(speaker.as_str()) {
            Some(voice) if self.loaded.contains(voice) => {
                log::debug!("Character '{}' -> {}", speaker, voice);
                voice
            },
            _ => {
                log::debug!("Character '{}' -> default voice", speaker);
                &self.default_voice
            },
        }
    }

    fn spoken_text<'a>(&self, utterance: &'a Utterance) -> Cow<'a, str> {
        if self.options.narrator_prefix && !utterance.speaker.is_action() {
            Cow::Owned(format!("{} says: {}", utterance.speaker, utterance.text))
        } else {
            Cow::Borrowed(&utterance.text)
        }
    }

    /// Everything in one pass with the default voice.
    pub fn render_single(&self, utterances: &[Utterance]) -> Result<AudioClip, ScreenplayError> {
        let text = utterances
            .iter()
            .map(|utterance| self.spoken_text(utterance))
            .collect::<Vec<_>>()
            .join(SINGLE_VOICE_JOINER);

        log::info!("Generating audio for {} lines (single voice)...", utterances.len());
        self.synthesizer.synthesize(&text, &self.default_voice)
    }

    /// Each utterance in its speaker's voice, joined with silence.
    pub fn render_combined(&self, utterances: &[Utterance]) -> Result<AudioClip, ScreenplayError> {
        log::info!("Generating audio for {} lines (multiple voices)...", utterances.len());
        let mut assembler = AudioAssembler::new(self.options.line_gap);

        for (i, utterance) in utterances.iter().enumerate() {
            let voice = self.voice_for(&utterance.speaker);
            let clip = self.synthesizer.synthesize(&self.spoken_text(utterance), voice)?;
            if clip.is_empty() {
                log::warn!("No audio for line {} ({})", utterance.source_line, utterance.speaker);
            }
            assembler.push(&clip)?;
            log::info!("  [{}/{}] {}", i + 1, utterances.len(), utterance.speaker);
        }

        log::debug!("Assembled {} segments", assembler.segments());
        assembler
            .finish()
            .ok_or_else(|| ScreenplayError::synthesis("nothing to render"))
    }

    /// The whole screenplay as one clip: single voice when that is the mode or
    /// no character voices are configured, otherwise combined.
    pub fn render(&self, utterances: &[Utterance]) -> Result<AudioClip, ScreenplayError> {
        match self.effective_mode() {
            OutputMode::Single => self.render_single(utterances),
            _ if self.voices.is_single_voice() => self.render_single(utterances),
            _ => self.render_combined(utterances),
        }
    }

    /// One `NNNN_SPEAKER.wav` per utterance inside `dir`. Numbered files left
    /// in `dir` by an earlier run are removed first.
    pub fn write_separate(&self, utterances: &[Utterance], dir: &Path) -> Result<Vec<PathBuf>, ScreenplayError> {
        fs::create_dir_all(dir).map_err(|e| ScreenplayError::write(dir, e))?;
        remove_stale_segments(dir)?;
        let mut written = Vec::with_capacity(utterances.len());

        for (i, utterance) in utterances.iter().enumerate() {
            let filename = format!("{:04}_{}.wav", i + 1, utterance.speaker.file_stem());
            let path = dir.join(&filename);

            let voice = self.voice_for(&utterance.speaker);
            let clip = self.synthesizer.synthesize(&utterance.text, voice)?;
            if clip.is_empty() {
                log::warn!("No audio for line {} ({})", utterance.source_line, utterance.speaker);
            }
            clip.write_wav(&path)?;

            log::info!("  [{}/{}] {}", i + 1, utterances.len(), filename);
            written.push(path);
        }

        Ok(written)
    }

    fn effective_mode(&self) -> OutputMode {
        match self.options.mode {
            OutputMode::Combine if self.voices.is_single_voice() => {
                log::info!("No character voices configured, rendering with a single voice");
                OutputMode::Single
            },
            mode => mode,
        }
    }

    /// Renders parsed utterances under `output_dir`: into the directory `name`
    /// in separate mode, otherwise into `name.wav`. `name` may contain
    /// subdirectories.
    pub fn convert_utterances(&self, utterances: &[Utterance], name: &Path, output_dir: &Path) -> Result<FileOutcome, ScreenplayError> {
        if utterances.is_empty() {
            return Ok(FileOutcome::NoDialogue);
        }

        let target = output_dir.join(name);
        let written = match self.effective_mode() {
            OutputMode::Separate => self.write_separate(utterances, &target)?,
            _ => {
                let clip = self.render(utterances)?;

                let mut path = target.into_os_string();
                path.push(".wav");
                let path = PathBuf::from(path);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).map_err(|e| ScreenplayError::write(parent, e))?;
                }

                clip.write_wav(&path)?;
                log::info!("Audio saved to: {}", path.display());
                vec![path]
            },
        };

        Ok(FileOutcome::Converted(written))
    }

    /// Converts one screenplay. Its output is named after its path relative to
    /// `input_root` (see [`output_name`]).
    pub fn convert_file(&self, screenplay: &Path, input_root: &Path, output_dir: &Path) -> Result<FileOutcome, ScreenplayError> {
        let utterances = parser::parse_file(screenplay, self.options.parse)?;
        log::info!("Extracted {} dialogue/action lines from {}", utterances.len(), screenplay.display());

        self.convert_utterances(&utterances, &output_name(screenplay, input_root), output_dir)
    }

    /// Converts each file independently; one file failing does not stop the rest.
    /// Two screenplays mapping to the same output name fail instead of
    /// overwriting each other.
    pub fn convert_batch(&self, screenplays: &[PathBuf], input_root: &Path, output_dir: &Path) -> BatchReport {
        let mut report = BatchReport::default();
        let mut names = HashSet::new();

        for screenplay in screenplays {
            log::info!("Processing: {}", screenplay.display());

            let name = output_name(screenplay, input_root);
            if !names.insert(name.clone()) {
                let e = ScreenplayError::new(ScreenplayErrorDescription::DuplicateOutput(output_dir.join(name)));
                log::error!("Failed to convert {}: {}", screenplay.display(), e);
                report.failed.push((screenplay.clone(), e));
                continue;
            }

            match self.convert_file(screenplay, input_root, output_dir) {
                Ok(FileOutcome::Converted(_)) => report.converted.push(screenplay.clone()),
                Ok(FileOutcome::NoDialogue) => {
                    log::info!("  No dialogue found, skipping...");
                    report.skipped.push(screenplay.clone());
                },
                Err(e) => {
                    log::error!("Failed to convert {}: {}", screenplay.display(), e);
                    report.failed.push((screenplay.clone(), e));
                },
            }
        }

        report
    }
}

/// Output name for a screenplay: its path relative to `input_root` without the
/// extension (`Act 1/scene1.txt` -> `Act 1/scene1`). Falls back to the bare
/// file stem when the screenplay is not below `input_root` or is the root itself.
pub fn output_name(screenplay: &Path, input_root: &Path) -> PathBuf {
    let relative = match screenplay.strip_prefix(input_root) {
        Ok(relative) if relative.file_name().is_some() => relative,
        _ => Path::new(screenplay.file_name().unwrap_or(OsStr::new("screenplay"))),
    };
    relative.with_extension("")
}

fn is_segment_file(name: &str) -> bool {
    name.ends_with(".wav")
        && name.get(..4).is_some_and(|index| index.bytes().all(|b| b.is_ascii_digit()))
        && name.get(4..).is_some_and(|rest| rest.starts_with('_'))
}

fn remove_stale_segments(dir: &Path) -> Result<(), ScreenplayError> {
    let entries = fs::read_dir(dir).map_err(|e| ScreenplayError::read(dir, e))?;
    let mut removed = 0;

    for entry in entries {
        let entry = entry.map_err(|e| ScreenplayError::read(dir, e))?;
        let is_file = entry.file_type().is_ok_and(|kind| kind.is_file());
        if is_file && is_segment_file(&entry.file_name().to_string_lossy()) {
            let path = entry.path();
            fs::remove_file(&path).map_err(|e| ScreenplayError::write(&path, e))?;
            removed += 1;
        }
    }

    if removed > 0 {
        log::debug!("Removed {} numbered file(s) from an earlier run in {}", removed, dir.display());
    }
    Ok(())
}
