//! PCM buffering and WAV framing for microphone capture.
//!
//! The capture callback pushes f32 samples into a bounded [`PcmBuffer`].
//! When the recording stops, the samples are framed as 16-bit PCM WAV with
//! `hound` so the backend can transcribe them directly.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use scribe_core::error::{Result, ScribeError};

/// Thread-safe sample buffer shared with the audio callback thread.
///
/// Holds at most `max_samples`; the oldest samples are dropped first.
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    samples: Arc<Mutex<Vec<f32>>>,
    max_samples: usize,
}

impl PcmBuffer {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: Arc::new(Mutex::new(Vec::new())),
            max_samples,
        }
    }

    /// Buffer for `secs` seconds of audio at the given format.
    pub fn for_duration(secs: u32, sample_rate: u32, channels: u16) -> Self {
        Self::new(secs as usize * sample_rate as usize * channels as usize)
    }

    pub fn push(&self, data: &[f32]) {
        if let Ok(mut buf) = self.samples.lock() {
            buf.extend_from_slice(data);
            if buf.len() > self.max_samples {
                let excess = buf.len() - self.max_samples;
                buf.drain(..excess);
            }
        }
    }

    /// Take all buffered samples, leaving the buffer empty.
    pub fn take(&self) -> Vec<f32> {
        self.samples
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.samples.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Average interleaved frames down to one channel.
pub fn downmix_to_mono(data: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    let ch = channels as usize;
    data.chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Linear-interpolation resample of a mono signal.
pub fn resample_linear(mono: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || mono.is_empty() {
        return mono.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (mono.len() as f64 / ratio).ceil() as usize;
    let last = mono.len() - 1;

    (0..out_len)
        .map(|i| {
            let src = i as f64 * ratio;
            let idx0 = (src.floor() as usize).min(last);
            let idx1 = (idx0 + 1).min(last);
            let frac = (src - idx0 as f64) as f32;
            mono[idx0] * (1.0 - frac) + mono[idx1] * frac
        })
        .collect()
}

/// Frame f32 samples as a 16-bit PCM WAV file.
pub fn encode_wav(samples: &[f32], sample_rate: u32, channels: u16) -> Result<Bytes> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(wav_error)?;
        for &sample in samples {
            let scaled = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(scaled).map_err(wav_error)?;
        }
        writer.finalize().map_err(wav_error)?;
    }
    Ok(Bytes::from(cursor.into_inner()))
}

fn wav_error(err: hound::Error) -> ScribeError {
    ScribeError::Audio(format!("Failed to encode WAV: {}", err))
}
