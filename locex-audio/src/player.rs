use crate::{AudioError, CueBank};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use locex_experiment::{CueDriver, CueError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};

pub const DEFAULT_VOLUME: f32 = 0.5;

struct Voice {
    samples: Arc<[f32]>,
    /// Index of the next stereo frame.
    frame: usize,
}

/// State shared between the sequencer thread and the output callback.
struct Playback {
    voice: Mutex<Option<Voice>>,
    playing: AtomicBool,
    volume: AtomicU32,
}

impl Playback {
    fn new(volume: f32) -> Self {
        Self {
            voice: Mutex::new(None),
            playing: AtomicBool::new(false),
            volume: AtomicU32::new(volume.clamp(0.0, 1.0).to_bits()),
        }
    }

    fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    fn start(&self, samples: Arc<[f32]>) {
        let mut voice = self.voice.lock().unwrap_or_else(PoisonError::into_inner);
        *voice = Some(Voice { samples, frame: 0 });
        self.playing.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        let mut voice = self.voice.lock().unwrap_or_else(PoisonError::into_inner);
        *voice = None;
        self.playing.store(false, Ordering::SeqCst);
    }

    /// Fills one device buffer. Silence once the voice runs out.
    fn fill<S>(&self, data: &mut [S], channels: usize)
    where
        S: SizedSample + FromSample<f32>,
    {
        let gain = self.volume();
        let mut voice = self.voice.lock().unwrap_or_else(PoisonError::into_inner);
        for frame in data.chunks_mut(channels.max(1)) {
            let next = voice.as_mut().and_then(|v| {
                let i = v.frame * 2;
                let pair = (*v.samples.get(i)?, *v.samples.get(i + 1)?);
                v.frame += 1;
                Some(pair)
            });
            let (left, right) = match next {
                Some((l, r)) => (l * gain, r * gain),
                None => {
                    if voice.take().is_some() {
                        self.playing.store(false, Ordering::SeqCst);
                    }
                    (0.0, 0.0)
                }
            };
            for (ch, out) in frame.iter_mut().enumerate() {
                let value = match ch {
                    0 => left,
                    1 => right,
                    _ => 0.0,
                };
                *out = S::from_sample(value.clamp(-1.0, 1.0));
            }
        }
    }
}

pub fn list_output_devices() -> Result<Vec<String>, AudioError> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| AudioError::Device(format!("failed to enumerate devices: {e}")))?
        .filter_map(|d| d.name().ok())
        .collect();
    Ok(devices)
}

fn open_device(name: Option<&str>) -> Result<Device, AudioError> {
    let host = cpal::default_host();
    if let Some(name) = name {
        let found = host
            .output_devices()
            .map_err(|e| AudioError::Device(format!("failed to enumerate devices: {e}")))?
            .find(|d| d.name().ok().as_deref() == Some(name));
        match found {
            Some(device) => return Ok(device),
            None => warn!(device = name, "Requested output device not found, using default"),
        }
    }
    host.default_output_device()
        .ok_or_else(|| AudioError::Device("no default output device".into()))
}

/// Plays decoded cues on a cpal output stream.
///
/// The stream runs for the player's whole lifetime and emits silence between
/// cues; `play` and `stop` only swap the active voice.
pub struct CpalCuePlayer {
    _stream: Stream,
    cues: HashMap<String, Arc<[f32]>>,
    playback: Arc<Playback>,
    sample_rate: u32,
}

impl CpalCuePlayer {
    pub fn new(bank: &CueBank, device: Option<&str>, volume: f32) -> Result<Self, AudioError> {
        let device = open_device(device)?;
        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::Device(format!("no output config: {e}")))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.config();
        let sample_rate = config.sample_rate.0;

        info!(
            device = %device.name().unwrap_or_else(|_| "unknown".into()),
            sample_rate,
            channels = config.channels,
            format = ?sample_format,
            "Opening audio output"
        );

        let cues = bank
            .iter()
            .map(|(id, cue)| (id.to_owned(), Arc::clone(cue.resampled(sample_rate).samples())))
            .collect();

        let playback = Arc::new(Playback::new(volume));
        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, Arc::clone(&playback))?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, Arc::clone(&playback))?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, Arc::clone(&playback))?,
            other => return Err(AudioError::UnsupportedFormat(format!("{other:?}"))),
        };
        stream
            .play()
            .map_err(|e| AudioError::Stream(format!("failed to start stream: {e}")))?;

        Ok(Self {
            _stream: stream,
            cues,
            playback,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn volume(&self) -> f32 {
        self.playback.volume()
    }
}

fn build_stream<S>(
    device: &Device,
    config: &StreamConfig,
    playback: Arc<Playback>,
) -> Result<Stream, AudioError>
where
    S: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    device
        .build_output_stream(
            config,
            move |data: &mut [S], _: &cpal::OutputCallbackInfo| playback.fill(data, channels),
            |err| error!(error = %err, "Audio stream error"),
            None,
        )
        .map_err(|e| AudioError::Stream(format!("failed to build stream: {e}")))
}

impl CueDriver for CpalCuePlayer {
    fn play(&mut self, sample_id: &str) -> Result<(), CueError> {
        let samples = self
            .cues
            .get(sample_id)
            .ok_or_else(|| CueError::Missing(sample_id.to_owned()))?;
        debug!(sample_id, "Cue started");
        self.playback.start(Arc::clone(samples));
        Ok(())
    }

    fn stop(&mut self) {
        self.playback.stop();
    }

    fn is_playing(&self) -> bool {
        self.playback.playing.load(Ordering::SeqCst)
    }
}

impl Drop for CpalCuePlayer {
    fn drop(&mut self) {
        self.playback.stop();
    }
}
