
use std::collections::VecDeque;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, AtomicBool, Ordering};
use parking_lot::Mutex;

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    FromSample,
    Sample,
    StreamConfig,
};

use screenplay_tts::AudioClip;

pub(crate) fn format_sample<O: FromSample<i16> + Sample>(sample: i16) -> O {
    O::from_sample(sample)
}

/// Plays queued interleaved chunks on the default output device.
#[derive(Debug, Clone)]
pub(crate) struct AudioPlayer {
    chunk_queue: Arc<Mutex<VecDeque<Vec<i16>>>>,
    sample_rate: u32,
    channel_count: u16,
    state: Arc<Mutex<Option<AudioPlayerState>>>,
    blocks_processed: Arc<AtomicUsize>,
    is_playing: Arc<AtomicBool>,
}

#[derive(Debug, Clone)]
struct AudioPlayerState {
    buffer: Vec<i16>,
    pos: usize,
}

impl AudioPlayer {
    pub fn new() -> Result<Self, anyhow::Error> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or_else(|| anyhow::anyhow!("No default output device"))?;
        let mut supported_configs_range = device.supported_output_configs()?;
        let supported_config = supported_configs_range.next().ok_or_else(|| anyhow::anyhow!("No supported audio config"))?.with_max_sample_rate();
        let sample_format = supported_config.sample_format();
        let config: StreamConfig = supported_config.into();

        let player = Self {
            chunk_queue: Arc::new(Mutex::new(VecDeque::new())),
            sample_rate: config.sample_rate.0,
            channel_count: config.channels,
            state: Arc::new(Mutex::new(None)),
            blocks_processed: Arc::new(AtomicUsize::new(0)),
            is_playing: Arc::new(AtomicBool::new(false)),
        };

        let err_fn = |err| log::error!("an error occurred on the output audio stream: {}", err);

        let stream = match sample_format {
            cpal::SampleFormat::F32 => device.build_output_stream(&config, player.get_callback::<f32>(), err_fn, None)?,
            cpal::SampleFormat::F64 => device.build_output_stream(&config, player.get_callback::<f64>(), err_fn, None)?,
            cpal::SampleFormat::I16 => device.build_output_stream(&config, player.get_callback::<i16>(), err_fn, None)?,
            cpal::SampleFormat::U16 => device.build_output_stream(&config, player.get_callback::<u16>(), err_fn, None)?,
            cpal::SampleFormat::I32 => device.build_output_stream(&config, player.get_callback::<i32>(), err_fn, None)?,
            cpal::SampleFormat::U32 => device.build_output_stream(&config, player.get_callback::<u32>(), err_fn, None)?,
            _ => {
                return Err(anyhow::anyhow!("Unsupported sample format: {:?}", sample_format));
            },
        };

        stream.play()?;

        // The stream lives for the rest of the process.
        let _leaked_stream = Box::leak(Box::new(stream));

        log::debug!("Output device: {} Hz, {} channel(s)", player.sample_rate, player.channel_count);
        Ok(player)
    }

    fn get_callback<T>(&self) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static
    where
        T: FromSample<i16> + Sample,
    {
        let player = self.clone();
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            player.fill(data);
        }
    }

    fn fill<S: FromSample<i16> + Sample>(&self, buffer: &mut [S]) {
        let mut state = self.state.lock();
        self.blocks_processed.fetch_add(1, Ordering::Relaxed);

        if state.is_none() {
            let chunk = self.chunk_queue.lock().pop_front();
            match chunk {
                Some(chunk) => {
                    log::debug!("Playing chunk of {} samples", chunk.len());
                    *state = Some(AudioPlayerState { buffer: chunk, pos: 0 });
                },
                None => {
                    buffer.fill(S::EQUILIBRIUM);
                    self.is_playing.store(false, Ordering::Relaxed);
                    return;
                },
            }
        }

        self.is_playing.store(true, Ordering::Relaxed);

        let ended = match state.as_mut() {
            Some(current) => {
                let remaining = &current.buffer[current.pos..];
                let copied = remaining.len().min(buffer.len());
                for (out, sample) in buffer.iter_mut().zip(&remaining[..copied]) {
                    *out = format_sample::<S>(*sample);
                }
                buffer[copied..].fill(S::EQUILIBRIUM);
                current.pos += copied;
                current.pos >= current.buffer.len()
            },
            None => true,
        };

        if ended {
            *state = None;
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn blocks_processed(&self) -> usize {
        self.blocks_processed.load(Ordering::Relaxed)
    }

    pub fn play(&self, chunk: Vec<i16>) {
        if chunk.is_empty() {
            return;
        }
        self.chunk_queue.lock().push_back(chunk);
        self.is_playing.store(true, Ordering::Relaxed);
    }

    pub fn wait_blocking_until_empty(&self) {
        while self.is_playing.load(Ordering::Relaxed) {
            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    /// Queues a mono clip, resampled to the device rate and copied to every channel.
    pub fn play_clip(&self, clip: &AudioClip) -> Result<(), anyhow::Error> {
        if clip.is_empty() {
            return Ok(());
        }

        let clip = clip.resampled(self.sample_rate)?;
        let channels = self.channel_count as usize;
        let interleaved = clip
            .samples
            .iter()
            .flat_map(|sample| std::iter::repeat(*sample).take(channels))
            .collect::<Vec<_>>();

        self.play(interleaved);
        Ok(())
    }
}
