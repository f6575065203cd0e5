
use std::io::{Cursor, Read};
use std::path::Path;
use std::time::Duration;

use hound::{WavReader, WavSpec, WavWriter};
use rubato::{Resampler, SincFixedIn, SincInterpolationType, SincInterpolationParameters, WindowFunction};

use crate::error::{ScreenplayError, ScreenplayErrorDescription};

pub const DEFAULT_LINE_GAP: Duration = Duration::from_millis(500);

fn sample_to_f64(sample: i16) -> f64 {
    sample as f64 / 32768.0
}

fn sample_from_f64(sample: f64) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f64).round() as i16
}

fn resample_error<E: std::fmt::Display>(err: E) -> ScreenplayError {
    ScreenplayError::new(ScreenplayErrorDescription::Resample(err.to_string()))
}

/// Mono 16-bit PCM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn silence(duration: Duration, sample_rate: u32) -> Self {
        let len = (duration.as_secs_f64() * sample_rate as f64).round() as usize;
        Self::new(vec![0; len], sample_rate)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Little-endian 16-bit mono PCM, as printed by `piper --output-raw`.
    pub fn from_raw_pcm(bytes: &[u8], sample_rate: u32) -> Self {
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Self::new(samples, sample_rate)
    }

    /// Decodes 16-bit integer WAV, averaging channels down to mono.
    pub fn from_wav<R: Read>(wav: R) -> Result<Self, ScreenplayError> {
        let mut reader = WavReader::new(wav)?;
        let spec = reader.spec();

        if (spec.sample_format, spec.bits_per_sample) != (hound::SampleFormat::Int, 16) {
            return Err(ScreenplayError::new(ScreenplayErrorDescription::Wav(hound::Error::Unsupported)));
        }

        let samples = reader.samples::<i16>().collect::<Result<Vec<_>, _>>()?;
        let channels = spec.channels.max(1) as usize;
        let mono = samples
            .chunks(channels)
            .map(|frame| {
                let sum = frame.iter().map(|&s| s as i32).sum::<i32>();
                (sum / frame.len() as i32) as i16
            })
            .collect();

        Ok(Self::new(mono, spec.sample_rate))
    }

    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self, ScreenplayError> {
        Self::from_wav(Cursor::new(bytes))
    }

    fn wav_spec(&self) -> WavSpec {
        WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    pub fn write_wav<P: AsRef<Path>>(&self, path: P) -> Result<(), ScreenplayError> {
        let mut writer = WavWriter::create(path.as_ref(), self.wav_spec())?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Windowed-sinc conversion to `target_rate`.
    pub fn resampled(&self, target_rate: u32) -> Result<AudioClip, ScreenplayError> {
        if target_rate == self.sample_rate || self.samples.is_empty() {
            return Ok(Self::new(self.samples.clone(), target_rate));
        }

        let resample_ratio = target_rate as f64 / self.sample_rate as f64;

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        let input_chunk_size = self.samples.len().min(1024);
        let mut resampler = SincFixedIn::<f64>::new(resample_ratio, 2.0, params, input_chunk_size, 1)
            .map_err(resample_error)?;

        let input = self.samples.iter().map(|&s| sample_to_f64(s)).collect::<Vec<_>>();
        let new_length = (input.len() as f64 * resample_ratio).round() as usize;
        let output_delay = resampler.output_delay();
        let mut output = Vec::with_capacity(new_length + output_delay);

        let mut input_buffer = vec![Vec::with_capacity(input_chunk_size)];
        let mut output_frames = vec![vec![0.0f64; resampler.output_frames_max()]];
        let mut input_index = 0;

        loop {
            let frames = resampler.input_frames_next();
            if frames > input.len() - input_index {
                break;
            }
            input_buffer[0].clear();
            input_buffer[0].extend_from_slice(&input[input_index..input_index + frames]);

            let (_, output_count) = resampler
                .process_into_buffer(&input_buffer, &mut output_frames, None)
                .map_err(resample_error)?;
            output.extend_from_slice(&output_frames[0][..output_count]);
            input_index += frames;
        }

        if input_index < input.len() {
            let frames = resampler.input_frames_next();
            input_buffer[0].clear();
            input_buffer[0].extend_from_slice(&input[input_index..]);
            input_buffer[0].resize(frames, 0.0);

            let (_, output_count) = resampler
                .process_into_buffer(&input_buffer, &mut output_frames, None)
                .map_err(resample_error)?;
            output.extend_from_slice(&output_frames[0][..output_count]);
        }

        while output.len() < new_length + output_delay {
            let (_, output_count) = resampler
                .process_partial_into_buffer(None::<&[Vec<f64>]>, &mut output_frames, None)
                .map_err(resample_error)?;
            output.extend_from_slice(&output_frames[0][..output_count]);
        }

        let samples = output[output_delay..output_delay + new_length]
            .iter()
            .map(|&s| sample_from_f64(s))
            .collect();

        Ok(Self::new(samples, target_rate))
    }
}

/// Concatenates clips with a fixed silence between consecutive segments.
/// The first segment fixes the output sample rate.
#[derive(Debug, Clone)]
pub struct AudioAssembler {
    gap: Duration,
    sample_rate: Option<u32>,
    samples: Vec<i16>,
    segments: usize,
}

impl Default for AudioAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_LINE_GAP)
    }
}

impl AudioAssembler {
    pub fn new(gap: Duration) -> Self {
        Self {
            gap,
            sample_rate: None,
            samples: Vec::new(),
            segments: 0,
        }
    }

    pub fn segments(&self) -> usize {
        self.segments
    }

    pub fn push(&mut self, clip: &AudioClip) -> Result<(), ScreenplayError> {
        let sample_rate = *self.sample_rate.get_or_insert(clip.sample_rate);

        if self.segments > 0 {
            self.samples.extend(AudioClip::silence(self.gap, sample_rate).samples);
        }

        if clip.sample_rate == sample_rate {
            self.samples.extend_from_slice(&clip.samples);
        } else {
            log::debug!("Resampling segment from {} Hz to {} Hz", clip.sample_rate, sample_rate);
            self.samples.extend(clip.resampled(sample_rate)?.samples);
        }

        self.segments += 1;
        Ok(())
    }

    /// `None` when nothing was pushed.
    pub fn finish(self) -> Option<AudioClip> {
        self.sample_rate.map(|rate| AudioClip::new(self.samples, rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_round_trip_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let clip = AudioClip::new(vec![0, 1000, -1000, i16::MAX, i16::MIN], 22050);
        clip.write_wav(&path).unwrap();
        assert_eq!(AudioClip::from_wav(std::fs::File::open(&path).unwrap()).unwrap(), clip);
    }

    #[test]
    fn stereo_wav_is_downmixed() {
        let spec = WavSpec { channels: 2, sample_rate: 16000, bits_per_sample: 16, sample_format: hound::SampleFormat::Int };
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut buffer, spec).unwrap();
            for sample in [100i16, 300, -200, -400] {
                writer.write_sample(sample).unwrap();
            }
            writer.finalize().unwrap();
        }
        let clip = AudioClip::from_wav_bytes(buffer.get_ref()).unwrap();
        assert_eq!(clip, AudioClip::new(vec![200, -300], 16000));
    }

    #[test]
    fn raw_pcm_is_little_endian() {
        let clip = AudioClip::from_raw_pcm(&[0x01, 0x00, 0xff, 0xff, 0x7f], 22050);
        assert_eq!(clip.samples, vec![1, -1]);
    }

    #[test]
    fn assembler_inserts_gap_between_segments_only() {
        let mut assembler = AudioAssembler::new(Duration::from_millis(500));
        assembler.push(&AudioClip::new(vec![1; 100], 1000)).unwrap();
        assembler.push(&AudioClip::new(vec![2; 50], 1000)).unwrap();
        assert_eq!(assembler.segments(), 2);

        let clip = assembler.finish().unwrap();
        assert_eq!(clip.sample_rate, 1000);
        assert_eq!(clip.samples.len(), 100 + 500 + 50);
        assert!(clip.samples[100..600].iter().all(|&s| s == 0));
        assert_eq!(clip.samples[600], 2);
    }

    #[test]
    fn empty_assembler_yields_nothing() {
        assert!(AudioAssembler::default().finish().is_none());
    }

    #[test]
    fn resampling_scales_length() {
        let samples = (0..22050).map(|i| ((i as f64 * 0.05).sin() * 8000.0) as i16).collect();
        let clip = AudioClip::new(samples, 22050);
        let resampled = clip.resampled(16000).unwrap();
        assert_eq!(resampled.sample_rate, 16000);
        assert_eq!(resampled.samples.len(), 16000);
    }

    #[test]
    fn assembler_resamples_mismatched_segments() {
        let mut assembler = AudioAssembler::new(Duration::ZERO);
        assembler.push(&AudioClip::new(vec![0; 16000], 16000)).unwrap();
        assembler.push(&AudioClip::new(vec![0; 22050], 22050)).unwrap();
        let clip = assembler.finish().unwrap();
        assert_eq!(clip.samples.len(), 32000);
        assert!((clip.duration().as_secs_f64() - 2.0).abs() < 1e-9);
    }
}
