use crate::AudioError;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// A fully decoded cue: interleaved stereo `f32` frames at `sample_rate`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCue {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl DecodedCue {
    /// Wraps interleaved stereo samples. A trailing half frame is dropped.
    pub fn from_stereo(mut samples: Vec<f32>, sample_rate: u32) -> Self {
        samples.truncate(samples.len() & !1);
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    /// Folds any channel layout to stereo: mono is duplicated, extra channels dropped.
    pub fn from_interleaved(samples: &[f32], channels: usize, sample_rate: u32) -> Self {
        let stereo = match channels {
            0 => Vec::new(),
            1 => samples.iter().flat_map(|s| [*s, *s]).collect(),
            2 => samples.to_vec(),
            n => samples
                .chunks_exact(n)
                .flat_map(|frame| [frame[0], frame[1]])
                .collect(),
        };
        Self::from_stereo(stereo, sample_rate)
    }

    pub fn samples(&self) -> &Arc<[f32]> {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f32 / self.sample_rate as f32
    }

    /// Linear-interpolation rate conversion. Returns a clone when rates match.
    pub fn resampled(&self, target_rate: u32) -> DecodedCue {
        if target_rate == self.sample_rate || self.sample_rate == 0 || target_rate == 0 {
            return self.clone();
        }
        let frames = self.frames();
        if frames == 0 {
            return DecodedCue::from_stereo(Vec::new(), target_rate);
        }

        let ratio = self.sample_rate as f64 / target_rate as f64;
        let out_frames = ((frames as f64) / ratio).floor().max(1.0) as usize;
        let src = &self.samples;
        let mut out = Vec::with_capacity(out_frames * 2);
        for i in 0..out_frames {
            let pos = i as f64 * ratio;
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            let next = (idx + 1).min(frames - 1);
            for ch in 0..2 {
                let a = src[idx * 2 + ch];
                let b = src[next * 2 + ch];
                out.push(a + (b - a) * frac);
            }
        }
        DecodedCue::from_stereo(out, target_rate)
    }
}

/// Decodes a complete audio file held in memory.
///
/// `extension` is a format hint such as `"wav"` or `"mp3"`; probing also
/// works without it.
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedCue, AudioError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudioError::Decode(format!("unrecognized format: {e}")))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(AudioError::NoTrack)?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::Decode(format!("no decoder: {e}")))?;

    let mut interleaved = Vec::new();
    let mut channels = 0usize;
    let mut buf: Option<SampleBuffer<f32>> = None;
    let mut buf_shape = (0u64, 0usize);

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(AudioError::Decode(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(error = e, "Skipping corrupt packet");
                continue;
            }
            Err(e) => return Err(AudioError::Decode(e.to_string())),
        };

        let spec = *decoded.spec();
        channels = spec.channels.count();
        sample_rate = spec.rate;

        let needed = decoded.capacity() as u64;
        if buf.is_none() || buf_shape != (needed, channels) {
            buf = Some(SampleBuffer::<f32>::new(needed, spec));
            buf_shape = (needed, channels);
        }
        if let Some(sb) = buf.as_mut() {
            sb.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(sb.samples());
        }
    }

    if channels == 0 || interleaved.is_empty() {
        return Err(AudioError::NoTrack);
    }

    let cue = DecodedCue::from_interleaved(&interleaved, channels, sample_rate);
    debug!(
        channels,
        sample_rate,
        frames = cue.frames(),
        "Decoded cue"
    );
    Ok(cue)
}

/// Decoded cues for one experiment, keyed by sample id.
#[derive(Debug, Clone, Default)]
pub struct CueBank {
    cues: HashMap<String, Arc<DecodedCue>>,
}

impl CueBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sample_id: impl Into<String>, cue: DecodedCue) {
        self.cues.insert(sample_id.into(), Arc::new(cue));
    }

    pub fn get(&self, sample_id: &str) -> Option<&Arc<DecodedCue>> {
        self.cues.get(sample_id)
    }

    pub fn contains(&self, sample_id: &str) -> bool {
        self.cues.contains_key(sample_id)
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<DecodedCue>)> {
        self.cues.iter().map(|(k, v)| (k.as_str(), v))
    }
}
