use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use screenplay_tts::{
    scripts, AudioClip, ConvertOptions, OutputMode, ParseOptions, ScreenplayConverter, ScreenplayError,
    ScreenplayErrorDescription, Synthesizer, Utterance, VoiceId, VoiceMap,
};

const DRAFT: &str = "\
Act One - FULL SCRIPT
INT. LAB - NIGHT
MARCUS paces near the console.
MARCUS
(quietly)
We should not be here.
Not tonight.

ALEX (V.O.)
\"Too late for that.\"
";

type CallLog = Rc<RefCell<Vec<(String, String)>>>;

/// Answers every request with 100 samples of silence at 8 kHz.
struct RecordingSynthesizer {
    known: Vec<&'static str>,
    calls: CallLog,
}

impl Synthesizer for RecordingSynthesizer {
    fn load_voice(&mut self, voice: &VoiceId) -> Result<(), ScreenplayError> {
        if self.known.contains(&voice.as_str()) {
            Ok(())
        } else {
            Err(ScreenplayError::new(ScreenplayErrorDescription::VoiceNotFound(voice.to_string())))
        }
    }

    fn synthesize(&self, text: &str, voice: &VoiceId) -> Result<AudioClip, ScreenplayError> {
        self.calls.borrow_mut().push((text.to_string(), voice.to_string()));
        Ok(AudioClip::new(vec![0; 100], 8000))
    }
}

fn expected_utterances() -> Vec<Utterance> {
    vec![
        Utterance::action("INT. LAB - NIGHT", 2),
        Utterance::action("Marcus paces near the console.", 3),
        Utterance::action("Marcus, quietly.", 4),
        Utterance::dialogue("MARCUS", "We should not be here. Not tonight.", 7),
        Utterance::dialogue("ALEX (V.O.)", "Too late for that.", 11),
    ]
}

fn write_voice_config(dir: &Path) -> VoiceMap {
    let path = dir.join("character_voices.json");
    fs::write(&path, r#"{"_default": "narrator", "MARCUS": "low", "ALEX": {"voice": "high"}}"#).unwrap();
    VoiceMap::load(&path).unwrap()
}

#[test]
fn formatted_draft_parses_into_utterances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("act1.txt");
    fs::write(&path, DRAFT).unwrap();

    let preview = screenplay_tts::format_file(&path, true).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), DRAFT);

    let formatted = screenplay_tts::format_file(&path, false).unwrap();
    assert_eq!(formatted, preview);
    assert_eq!(fs::read_to_string(&path).unwrap(), formatted);
    assert_eq!(screenplay_tts::format_screenplay(&formatted), formatted);

    let utterances = screenplay_tts::parse_file(&path, ParseOptions::default()).unwrap();
    assert_eq!(utterances, expected_utterances());
}

#[test]
fn parse_reports_unreadable_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = screenplay_tts::parse_file(dir.path().join("missing.txt"), ParseOptions::default()).unwrap_err();
    assert!(matches!(err.as_inner(), ScreenplayErrorDescription::Read { .. }));
    assert!(err.to_string().contains("missing.txt"));
}

#[test]
fn combined_batch_writes_one_wav_per_screenplay() {
    let dir = tempfile::tempdir().unwrap();
    let scripts_dir = dir.path().join("scripts");
    fs::create_dir_all(scripts_dir.join("drafts")).unwrap();
    fs::write(scripts_dir.join("act1.txt"), screenplay_tts::format_screenplay(DRAFT)).unwrap();
    fs::write(scripts_dir.join("main.txt"), DRAFT).unwrap();
    fs::write(scripts_dir.join("drafts").join("ideas.txt"), "Nothing here yet.\n").unwrap();

    let screenplays = scripts::collect_screenplays(&scripts_dir).unwrap();
    assert_eq!(screenplays, vec![scripts_dir.join("act1.txt"), scripts_dir.join("drafts").join("ideas.txt")]);

    let calls = CallLog::default();
    let synthesizer = RecordingSynthesizer { known: vec!["narrator", "low", "high"], calls: calls.clone() };
    let options = ConvertOptions {
        mode: OutputMode::Combine,
        narrator_prefix: true,
        line_gap: Duration::from_millis(50),
        ..ConvertOptions::default()
    };
    let converter = ScreenplayConverter::new(synthesizer, write_voice_config(dir.path()), options).unwrap();

    let out = dir.path().join("audio_output");
    let report = converter.convert_batch(&screenplays, &scripts_dir, &out);
    assert!(report.is_success());
    assert_eq!(report.converted, vec![scripts_dir.join("act1.txt")]);
    assert_eq!(report.skipped, vec![scripts_dir.join("drafts").join("ideas.txt")]);

    let reader = hound::WavReader::open(out.join("act1.wav")).unwrap();
    assert_eq!(reader.spec().sample_rate, 8000);
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.len(), 5 * 100 + 4 * 400);

    let calls = calls.borrow();
    let voices = calls.iter().map(|(_, voice)| voice.as_str()).collect::<Vec<_>>();
    assert_eq!(voices, vec!["narrator", "narrator", "narrator", "low", "high"]);
    assert_eq!(calls[3].0, "MARCUS says: We should not be here. Not tonight.");
    assert_eq!(calls[4].0, "ALEX (V.O.) says: Too late for that.");
}

#[test]
fn separate_mode_writes_numbered_files() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("act1.txt");
    fs::write(&script, screenplay_tts::format_screenplay(DRAFT)).unwrap();

    let calls = CallLog::default();
    let synthesizer = RecordingSynthesizer { known: vec!["solo"], calls: calls.clone() };
    let options = ConvertOptions {
        parse: ParseOptions { line_by_line: true, ..ParseOptions::default() },
        ..ConvertOptions::default()
    };
    let converter = ScreenplayConverter::new(synthesizer, VoiceMap::single("solo"), options).unwrap();

    let report = converter.convert_batch(&[script], dir.path(), &dir.path().join("out"));
    assert!(report.is_success());

    let mut written = fs::read_dir(dir.path().join("out").join("act1"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    written.sort();
    assert_eq!(
        written,
        vec![
            "0001_ACTION.wav",
            "0002_ACTION.wav",
            "0003_ACTION.wav",
            "0004_MARCUS.wav",
            "0005_MARCUS.wav",
            "0006_ALEX_(V.O.).wav",
        ]
    );
    assert!(calls.borrow().iter().all(|(_, voice)| voice == "solo"));
}

#[test]
fn unknown_voices_fall_back_to_the_default() {
    let dir = tempfile::tempdir().unwrap();
    let calls = CallLog::default();
    let synthesizer = RecordingSynthesizer { known: vec!["narrator"], calls };

    let converter = ScreenplayConverter::new(synthesizer, write_voice_config(dir.path()), ConvertOptions::default()).unwrap();
    assert_eq!(converter.default_voice().as_str(), "narrator");
    assert_eq!(converter.voice_for(&"MARCUS".to_string().into()).as_str(), "narrator");
}

#[test]
fn acts_with_repeated_scene_names_get_their_own_folders() {
    let dir = tempfile::tempdir().unwrap();
    let scripts_dir = dir.path().join("scripts");
    for act in ["Act 1", "Act 2"] {
        fs::create_dir_all(scripts_dir.join(act)).unwrap();
    }
    fs::write(scripts_dir.join("Act 1").join("scene1.txt"), "SCREENPLAY\nMARCUS\n    Hi.\nLEA\n    Hey.\n").unwrap();
    fs::write(scripts_dir.join("Act 2").join("scene1.txt"), "SCREENPLAY\nALEX\n    Bye.\n").unwrap();

    let screenplays = scripts::collect_screenplays(&scripts_dir).unwrap();
    let synthesizer = RecordingSynthesizer { known: vec!["solo"], calls: CallLog::default() };
    let converter = ScreenplayConverter::new(synthesizer, VoiceMap::single("solo"), ConvertOptions::default()).unwrap();

    let out = dir.path().join("out");
    let report = converter.convert_batch(&screenplays, &scripts_dir, &out);
    assert_eq!(report.converted.len(), 2);

    let listing = |path: &Path| {
        let mut names = fs::read_dir(path)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        names.sort();
        names
    };
    assert_eq!(listing(&out.join("Act 1").join("scene1")), vec!["0001_MARCUS.wav", "0002_LEA.wav"]);
    assert_eq!(listing(&out.join("Act 2").join("scene1")), vec!["0001_ALEX.wav"]);
}
