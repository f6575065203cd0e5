use vvcore::{AccelerationMode, AudioQueryOptions, SynthesisOptions, VoicevoxCore};
use std::sync::OnceLock;
use std::ffi::CString;

use tokio::sync::mpsc;
use tokio::sync::oneshot;
use std::path::Path;
use std::fmt::Debug;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::audio::AudioClip;
use crate::error::{ErrorDescription, GenericError, ScreenplayError, ScreenplayErrorDescription};
use crate::synth::Synthesizer;
use crate::types::VoiceId;

static ENGINE: OnceLock<EngineHandle> = OnceLock::new();

type InternalError = GenericError<String>;

#[non_exhaustive]
pub enum EngineErrorDescription {
    AlreadyInitialized,
    InitializationFailed,
    NotInitialized,
}

impl ErrorDescription for EngineErrorDescription {
    #[allow(refining_impl_trait)]
    fn description(&self) -> &'static str {
        match self {
            Self::AlreadyInitialized => "VOICEVOX engine is already initialized",
            Self::InitializationFailed => "VOICEVOX engine failed to initialize",
            Self::NotInitialized => "VOICEVOX engine is not initialized",
        }
    }
}

pub type EngineError = GenericError<EngineErrorDescription>;

#[derive(Serialize, Deserialize, Debug, Clone)]
struct AudioQuery {
    accent_phrases: Vec<AccentPhrase>,
    speed_scale: f64,
    pitch_scale: f64,
    intonation_scale: f64,
    volume_scale: f64,
    pre_phoneme_length: f64,
    post_phoneme_length: f64,
    output_sampling_rate: i32,
    output_stereo: bool,
    kana: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct AccentPhrase {
    moras: Vec<Mora>,
    accent: i32,
    pause_mora: Option<Mora>,
    is_interrogative: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct Mora {
    text: String,
    vowel: String,
    vowel_length: f64,
    pitch: f64,
    consonant: Option<String>,
    consonant_length: Option<f64>,
}

struct EngineRequestData<Req, Res> {
    req: Req,
    res_sender: oneshot::Sender<Res>,
}

impl<Req, Res> EngineRequestData<Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    pub fn new(req: Req) -> (Self, oneshot::Receiver<Res>) {
        let (res_sender, res_receiver) = oneshot::channel();
        (Self {
            req,
            res_sender,
        }, res_receiver)
    }
}

impl<Req, Res> Debug for EngineRequestData<Req, Res>
where
    Req: Debug,
    Res: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRequestData")
            .field("req", &self.req)
            .field("res_sender", &self.res_sender)
            .finish()
    }
}

#[derive(Debug, Clone)]
struct SynthesisRequest {
    text: String,
    speaker_id: u32,
    speed_scale: f64,
}

#[derive(Debug)]
enum EngineRequest {
    Synthesis(EngineRequestData<SynthesisRequest, Result<Vec<u8>, InternalError>>),
}

struct Runner {
    vvc: VoicevoxCore,
    receiver: mpsc::Receiver<EngineRequest>,
}

impl Runner {
    fn start<P: AsRef<Path>>(open_jtalk_dict_dir: P) -> Result<EngineHandle, InternalError> {
        let dir = open_jtalk_dict_dir
            .as_ref()
            .to_str()
            .and_then(|dir| CString::new(dir).ok())
            .ok_or_else(|| InternalError::new("Failed to convert path to CString".to_string()))?;
        let vvc = VoicevoxCore::new_from_options(AccelerationMode::Auto, 0, true, dir.as_c_str())
            .map_err(|e| InternalError::new(VoicevoxCore::error_result_to_message(e).to_string()))?;

        let (req_sender, req_receiver) = mpsc::channel(100);

        let runner = Runner {
            vvc,
            receiver: req_receiver,
        };

        std::thread::spawn(move || {
            runner.run();
        });

        Ok(EngineHandle {
            sender: req_sender,
        })
    }

    fn synthesize(vvc: &VoicevoxCore, req: &SynthesisRequest) -> Result<Vec<u8>, InternalError> {
        let json = vvc
            .audio_query(&req.text, req.speaker_id, AudioQueryOptions { kana: false })
            .map_err(|e| InternalError::new(VoicevoxCore::error_result_to_message(e).to_string()))?;

        let mut query: AudioQuery = serde_json::from_str(json.as_str()).map_err(|e| {
            log::error!("Failed to parse audio query JSON: {}", e);
            InternalError::new("Failed to parse audio query JSON".to_string())
        })?;
        query.speed_scale = req.speed_scale;

        let json = serde_json::to_string(&query)
            .map_err(|e| InternalError::new(format!("Failed to encode audio query: {}", e)))?;
        log::debug!("Synthesizing with JSON: {}", json);

        vvc.synthesis(&json, req.speaker_id, SynthesisOptions { enable_interrogative_upspeak: true })
            .map(|wav| wav.as_slice().to_owned())
            .map_err(|e| InternalError::new(VoicevoxCore::error_result_to_message(e).to_string()))
    }

    fn run(self) {
        let vvc = self.vvc;
        let mut receiver = self.receiver;

        while let Some(request) = receiver.blocking_recv() {
            match request {
                EngineRequest::Synthesis(data) => {
                    let res = Self::synthesize(&vvc, &data.req);
                    let _ = data.res_sender.send(res);
                },
            }
        }

        log::warn!("Runner thread exited");
    }
}

#[derive(Debug, Clone)]
pub struct EngineHandle {
    sender: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    pub fn new() -> Result<EngineHandle, EngineError> {
        ENGINE.get().cloned().ok_or(EngineError::new(EngineErrorDescription::NotInitialized))
    }

    /// Returns WAV bytes.
    pub fn synthesize_blocking(&self, text: String, speaker_id: u32, speed_scale: f64) -> Result<Vec<u8>, ScreenplayError> {
        let (data, receiver) = EngineRequestData::new(SynthesisRequest { text, speaker_id, speed_scale });
        self.sender
            .blocking_send(EngineRequest::Synthesis(data))
            .map_err(|_| ScreenplayError::synthesis("VOICEVOX engine is not running"))?;
        receiver
            .blocking_recv()
            .map_err(|_| ScreenplayError::synthesis("VOICEVOX engine dropped the request"))?
            .map_err(|e| ScreenplayError::synthesis(e.into_inner()))
    }
}

pub fn initialize<P: AsRef<Path>>(dir: P) -> Result<(), EngineError> {
    let handle = Runner::start(dir).map_err(|e| {
        log::error!("VOICEVOX initialization failed: {}", e);
        EngineError::new(EngineErrorDescription::InitializationFailed)
    })?;
    ENGINE.set(handle).map_err(|_| EngineError::new(EngineErrorDescription::AlreadyInitialized))
}

/// VOICEVOX backend. Voice ids are numeric speaker ids.
#[derive(Debug, Clone)]
pub struct VoicevoxSynthesizer {
    handle: EngineHandle,
    speed_scale: f64,
    speakers: HashSet<u32>,
}

impl VoicevoxSynthesizer {
    /// Requires a prior call to [`initialize`].
    pub fn new(speed_scale: f64) -> Result<Self, EngineError> {
        Ok(Self {
            handle: EngineHandle::new()?,
            speed_scale,
            speakers: HashSet::new(),
        })
    }

    fn speaker_id(voice: &VoiceId) -> Result<u32, ScreenplayError> {
        voice
            .as_str()
            .trim()
            .parse()
            .map_err(|_| ScreenplayError::new(ScreenplayErrorDescription::VoiceNotFound(voice.to_string())))
    }
}

impl Synthesizer for VoicevoxSynthesizer {
    fn load_voice(&mut self, voice: &VoiceId) -> Result<(), ScreenplayError> {
        self.speakers.insert(Self::speaker_id(voice)?);
        Ok(())
    }

    fn synthesize(&self, text: &str, voice: &VoiceId) -> Result<AudioClip, ScreenplayError> {
        let speaker_id = Self::speaker_id(voice)?;
        if !self.speakers.contains(&speaker_id) {
            return Err(ScreenplayError::new(ScreenplayErrorDescription::VoiceNotFound(voice.to_string())));
        }

        let wav = self.handle.synthesize_blocking(text.to_owned(), speaker_id, self.speed_scale)?;
        AudioClip::from_wav_bytes(&wav)
    }
}
