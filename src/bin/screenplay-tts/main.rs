
#[cfg(feature = "playback")]
pub(crate) mod audio_output;

use screenplay_tts::{
    self as screenplay,
    scripts,
    ConvertOptions,
    OutputMode,
    ParseOptions,
    PiperSynthesizer,
    ScreenplayConverter,
    Synthesizer,
    VoiceMap,
};

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

pub(crate) const DEFAULT_VOICEVOX_DICT: &str = "./voicevox_core/open_jtalk_dic_utf_8-1.11";

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Engine {
    /// External `piper` executable
    Piper,
    /// VOICEVOX core (requires the `voicevox` feature)
    Voicevox,
}

#[derive(Debug, Parser)]
#[command(about = "Screenplay dialogue extraction and text-to-speech", long_about = None, version)]
struct Cli {
    #[command(subcommand)]
    subcommand: Command,
}

#[derive(Debug, Args)]
struct ParseArgs {
    /// Emit one utterance per dialogue line instead of merging blocks
    #[arg(long)]
    line_by_line: bool,

    /// Start parsing at line 1 instead of after a SCREENPLAY / FULL SCRIPT marker
    #[arg(long)]
    no_marker: bool,
}

impl ParseArgs {
    fn options(&self) -> ParseOptions {
        ParseOptions {
            line_by_line: self.line_by_line,
            require_script_marker: !self.no_marker,
        }
    }
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
struct VoiceSource {
    /// One voice for every speaker
    #[arg(long)]
    voice_model: Option<String>,

    /// JSON file mapping character names to voices
    #[arg(long)]
    voice_config: Option<PathBuf>,
}

#[derive(Debug, Args)]
#[cfg_attr(not(feature = "voicevox"), allow(dead_code))]
struct SynthesisArgs {
    #[command(flatten)]
    voice: VoiceSource,

    /// Synthesis backend
    #[arg(long, value_enum, default_value_t = Engine::Piper)]
    engine: Engine,

    /// Shared directory searched for voice models
    #[arg(long, default_value = "voices")]
    voices_dir: PathBuf,

    /// Path to the piper executable
    #[arg(long, default_value = "piper")]
    piper: PathBuf,

    /// Run piper on the GPU
    #[arg(long)]
    cuda: bool,

    /// Open JTalk dictionary directory for VOICEVOX
    #[arg(long, default_value = DEFAULT_VOICEVOX_DICT)]
    voicevox_dict: PathBuf,

    /// VOICEVOX speed scale
    #[arg(long, default_value_t = 1.0)]
    speed_scale: f64,

    /// Prefix dialogue with "<SPEAKER> says:" in single and combined output
    #[arg(long)]
    narrator_prefix: bool,

    /// Silence between lines in combined output, in milliseconds
    #[arg(long, default_value_t = 500)]
    line_gap_ms: u64,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the utterances extracted from a screenplay
    #[command(arg_required_else_help = true)]
    Parse {
        file: PathBuf,

        #[command(flatten)]
        parse: ParseArgs,

        /// JSON output
        #[arg(long)]
        json: bool,
    },

    /// Reformat screenplays in place for TTS-friendly layout
    #[command(arg_required_else_help = true)]
    Format {
        /// A .txt file or a directory of them
        path: PathBuf,

        /// Print the result instead of rewriting files
        #[arg(long)]
        dry_run: bool,
    },

    /// Convert screenplays to WAV files
    #[command(arg_required_else_help = true)]
    Convert {
        /// A screenplay file or a directory of them
        input: PathBuf,

        #[arg(long, default_value = "audio_output")]
        output_dir: PathBuf,

        #[arg(long, value_enum, default_value_t = OutputMode::Separate)]
        mode: OutputMode,

        #[command(flatten)]
        parse: ParseArgs,

        #[command(flatten)]
        synthesis: SynthesisArgs,
    },

    /// Synthesize a screenplay and play it on the default output device
    #[command(arg_required_else_help = true)]
    Play {
        file: PathBuf,

        #[command(flatten)]
        parse: ParseArgs,

        #[command(flatten)]
        synthesis: SynthesisArgs,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Cli::parse();

    match args.subcommand {
        Command::Parse { file, parse, json } => {
            let utterances = screenplay::parse_file(&file, parse.options())?;
            log::debug!("Extracted {} utterances from {}", utterances.len(), file.display());

            let mut stdout = std::io::stdout().lock();
            if json {
                let mut json = serde_json::to_string_pretty(&utterances)?;
                json.push('\n');
                stdout.write_all(json.as_bytes())?;
            } else {
                writeln!(stdout, "LINE\tSPEAKER\tTEXT")?;
                for utterance in utterances {
                    writeln!(stdout, "{}\t{}\t{}", utterance.source_line, utterance.speaker, utterance.text)?;
                }
            }
        },

        Command::Format { path, dry_run } => {
            let files = scripts::collect_text_files(&path)?;
            log::info!("Found {} file(s) to format", files.len());

            let mut formatted = 0;
            for file in &files {
                match screenplay::format_file(file, dry_run) {
                    Ok(content) => {
                        formatted += 1;
                        if dry_run {
                            println!("=== {} ===", file.display());
                            println!("{}", content);
                        } else {
                            log::info!("Formatted: {}", file.display());
                        }
                    },
                    Err(e) => log::error!("{}", e),
                }
            }

            log::info!("Formatted {} of {} file(s)", formatted, files.len());
        },

        Command::Convert { input, output_dir, mode, parse, synthesis } => {
            let screenplays = scripts::collect_screenplays(&input)?;
            log::info!("Found {} screenplay(s)", screenplays.len());

            let converter = build_converter(&synthesis, mode, parse.options())?;
            let report = converter.convert_batch(&screenplays, &input, &output_dir);

            log::info!(
                "Converted: {}, skipped: {}, failed: {}",
                report.converted.len(),
                report.skipped.len(),
                report.failed.len()
            );
            log::info!("Output directory: {}", output_dir.display());

            if !report.is_success() {
                anyhow::bail!("{} screenplay(s) failed to convert", report.failed.len());
            }
        },

        Command::Play { file, parse, synthesis } => {
            play(&file, &synthesis, parse.options())?;
        },
    }

    Ok(())
}

fn load_voices(source: &VoiceSource) -> anyhow::Result<VoiceMap> {
    match (&source.voice_model, &source.voice_config) {
        (_, Some(config)) => {
            log::info!("Loading character voice mappings from {}", config.display());
            Ok(VoiceMap::load(config)?)
        },
        (Some(model), None) => Ok(VoiceMap::single(model.as_str())),
        (None, None) => anyhow::bail!("Either --voice-model or --voice-config is required"),
    }
}

fn build_synthesizer(args: &SynthesisArgs, voices: &VoiceMap) -> anyhow::Result<Box<dyn Synthesizer>> {
    match args.engine {
        Engine::Piper => {
            let config_dir = voices.base_dir().unwrap_or(Path::new("."));
            let piper = PiperSynthesizer::new(&args.piper)
                .with_cuda(args.cuda)
                .with_search_dir(config_dir)
                .with_search_dir(&args.voices_dir);
            Ok(Box::new(piper))
        },
        Engine::Voicevox => voicevox_synthesizer(args),
    }
}

#[cfg(feature = "voicevox")]
fn voicevox_synthesizer(args: &SynthesisArgs) -> anyhow::Result<Box<dyn Synthesizer>> {
    log::info!("Initializing VOICEVOX...");
    screenplay::initialize(&args.voicevox_dict)?;
    log::info!("Initialized.");
    Ok(Box::new(screenplay::VoicevoxSynthesizer::new(args.speed_scale)?))
}

#[cfg(not(feature = "voicevox"))]
fn voicevox_synthesizer(_args: &SynthesisArgs) -> anyhow::Result<Box<dyn Synthesizer>> {
    anyhow::bail!("This build does not include the VOICEVOX engine (enable the `voicevox` feature)")
}

fn build_converter(
    args: &SynthesisArgs,
    mode: OutputMode,
    parse: ParseOptions,
) -> anyhow::Result<ScreenplayConverter<Box<dyn Synthesizer>>> {
    let voices = load_voices(&args.voice)?;
    let synthesizer = build_synthesizer(args, &voices)?;

    let options = ConvertOptions {
        mode,
        narrator_prefix: args.narrator_prefix,
        line_gap: Duration::from_millis(args.line_gap_ms),
        parse,
    };

    Ok(ScreenplayConverter::new(synthesizer, voices, options)?)
}

#[cfg(feature = "playback")]
fn play(file: &Path, args: &SynthesisArgs, parse: ParseOptions) -> anyhow::Result<()> {
    let utterances = screenplay::parse_file(file, parse)?;
    if utterances.is_empty() {
        log::warn!("No dialogue found in {}", file.display());
        return Ok(());
    }

    let converter = build_converter(args, OutputMode::Combine, parse)?;
    let audio = audio_output::AudioPlayer::new()?;

    let clip = converter.render(&utterances)?;
    log::info!("Playing {:.1}s of audio at {} Hz...", clip.duration().as_secs_f64(), audio.sample_rate());
    audio.play_clip(&clip)?;

    log::info!("Waiting for audio to finish...");
    audio.wait_blocking_until_empty();

    log::info!("Audio playback finished.");
    log::debug!("Processed blocks count: {}", audio.blocks_processed());
    Ok(())
}

#[cfg(not(feature = "playback"))]
fn play(_file: &Path, _args: &SynthesisArgs, _parse: ParseOptions) -> anyhow::Result<()> {
    anyhow::bail!("This build does not include audio playback (enable the `playback` feature)")
}
