//! Real microphone capture via cpal.
//!
//! Captures f32 samples from the default (or named) input device, downmixes
//! and resamples them to the configured rate in the audio callback, and
//! frames the result as 16-bit PCM WAV when the stream is finished.
//!
//! Without the `cpal` feature, `open` returns `ScribeError::Audio`.

#[cfg(not(feature = "cpal"))]
use tracing::warn;

use scribe_core::config::RecordingConfig;
use scribe_core::error::Result;
#[cfg(not(feature = "cpal"))]
use scribe_core::error::ScribeError;

use crate::{CaptureStream, Microphone};

/// Microphone backed by the platform's default audio host.
#[derive(Debug, Clone)]
pub struct CpalMicrophone {
    config: RecordingConfig,
}

impl CpalMicrophone {
    pub fn new(config: RecordingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RecordingConfig {
        &self.config
    }
}

// =============================================================================
// cpal implementation
// =============================================================================

#[cfg(feature = "cpal")]
mod backend {
    use bytes::Bytes;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use tracing::{debug, info};

    use scribe_core::config::RecordingConfig;
    use scribe_core::error::{Result, ScribeError};

    use crate::wav::{downmix_to_mono, encode_wav, resample_linear, PcmBuffer};
    use crate::{CaptureStream, CapturedAudio};

    /// Wrapper to move a `cpal::Stream` into the recording session.
    ///
    /// Some cpal backends mark `Stream` as `!Send` via a raw-pointer marker.
    struct SendStream(cpal::Stream);

    // SAFETY: the stream handle is only stored to keep capture alive and then
    // dropped to stop it. Audio callbacks run on cpal's own thread and share
    // data with us only through `PcmBuffer`, which is `Sync`.
    unsafe impl Send for SendStream {}

    pub(super) struct CpalStream {
        stream: SendStream,
        buffer: PcmBuffer,
        sample_rate: u32,
    }

    impl CaptureStream for CpalStream {
        fn finish(self: Box<Self>) -> Result<CapturedAudio> {
            let CpalStream {
                stream,
                buffer,
                sample_rate,
            } = *self;
            // Dropping the stream stops capture and releases the device.
            drop(stream);

            let samples = buffer.take();
            debug!(samples = samples.len(), "Encoding captured audio");
            let wav: Bytes = encode_wav(&samples, sample_rate, 1)?;
            Ok(CapturedAudio {
                chunks: vec![wav],
                mime_type: "audio/wav".to_string(),
                extension: "wav".to_string(),
            })
        }
    }

    fn select_device(host: &cpal::Host, device_name: &str) -> Result<cpal::Device> {
        let denied = |detail: String| {
            ScribeError::PermissionDenied(format!(
                "Microphone access denied. Please allow microphone permissions. ({})",
                detail
            ))
        };

        if device_name == "default" {
            return host
                .default_input_device()
                .ok_or_else(|| denied("no default input device".to_string()));
        }

        let name_lower = device_name.to_lowercase();
        host.input_devices()
            .map_err(|e| denied(format!("failed to enumerate devices: {}", e)))?
            .find(|d| {
                d.name()
                    .map(|n| n.to_lowercase().contains(&name_lower))
                    .unwrap_or(false)
            })
            .ok_or_else(|| denied(format!("input device '{}' not found", device_name)))
    }

    pub(super) fn open_stream(config: &RecordingConfig) -> Result<CpalStream> {
        let host = cpal::default_host();
        let device = select_device(&host, &config.device_name)?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let supported = device.default_input_config().map_err(|e| {
            ScribeError::PermissionDenied(format!(
                "Microphone access denied. Please allow microphone permissions. ({})",
                e
            ))
        })?;
        let stream_config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        let device_rate = stream_config.sample_rate.0;
        let device_channels = stream_config.channels;
        let target_rate = config.sample_rate;
        let buffer = PcmBuffer::for_duration(config.max_buffer_secs, target_rate, 1);
        let sink = buffer.clone();

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mono = downmix_to_mono(data, device_channels);
                    sink.push(&resample_linear(&mono, device_rate, target_rate));
                },
                |err| tracing::error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| ScribeError::Audio(format!("Failed to build audio stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| ScribeError::Audio(format!("Failed to start audio stream: {}", e)))?;

        info!(
            device = %device_name,
            device_rate,
            device_channels,
            target_rate,
            "Microphone capture started"
        );

        Ok(CpalStream {
            stream: SendStream(stream),
            buffer,
            sample_rate: target_rate,
        })
    }
}

#[cfg(feature = "cpal")]
impl Microphone for CpalMicrophone {
    async fn open(&self) -> Result<Box<dyn CaptureStream>> {
        let stream = backend::open_stream(&self.config)?;
        Ok(Box::new(stream))
    }
}

// =============================================================================
// Stub without the cpal feature
// =============================================================================

#[cfg(not(feature = "cpal"))]
impl Microphone for CpalMicrophone {
    async fn open(&self) -> Result<Box<dyn CaptureStream>> {
        warn!("CpalMicrophone used without the `cpal` feature");
        Err(ScribeError::Audio(
            "Microphone capture requires the `cpal` feature".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_microphone_creation() {
        let config = RecordingConfig {
            device_name: "USB Mic".to_string(),
            sample_rate: 44100,
            ..RecordingConfig::default()
        };
        let mic = CpalMicrophone::new(config);
        assert_eq!(mic.config().device_name, "USB Mic");
        assert_eq!(mic.config().sample_rate, 44100);
    }

    #[cfg(not(feature = "cpal"))]
    #[tokio::test]
    async fn test_open_without_feature_is_audio_error() {
        let mic = CpalMicrophone::new(RecordingConfig::default());
        let result = mic.open().await;
        let err = match result {
            Ok(_) => panic!("expected an error without the cpal feature"),
            Err(e) => e,
        };
        assert!(matches!(err, ScribeError::Audio(_)));
        assert!(err.to_string().contains("requires the `cpal` feature"));
    }
}
