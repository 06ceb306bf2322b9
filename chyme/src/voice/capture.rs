use async_trait::async_trait;
use cpal::traits::{DeviceTrait as _, HostTrait as _, StreamTrait as _};
use cpal::{Device, FromSample, Sample as _, SampleFormat, SizedSample, Stream, StreamConfig};
use tokio::sync::{mpsc, oneshot};
use tokio::task::spawn_blocking;

use super::VoiceError;

#[derive(Debug, Clone)]
pub struct AudioFrame {
    // Normalized samples [-1.0, 1.0], channels interleaved.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Seam over the microphone. Production uses [`CpalCaptureSource`]; tests
/// script frames through a fake.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    async fn open(&self) -> Result<CaptureHandle, VoiceError>;
}

/// Live capture session. Dropping the handle releases the device; the
/// backing stream observes the closed stop channel and pauses.
pub struct CaptureHandle {
    frames: mpsc::Receiver<AudioFrame>,
    _stop: mpsc::Sender<()>,
}

impl CaptureHandle {
    pub fn new(frames: mpsc::Receiver<AudioFrame>, stop: mpsc::Sender<()>) -> Self {
        Self {
            frames,
            _stop: stop,
        }
    }

    pub async fn recv(&mut self) -> Option<AudioFrame> {
        self.frames.recv().await
    }
}

/// Default input device via cpal. The stream lives on the blocking pool and
/// is held open until the stop channel closes.
pub struct CpalCaptureSource;

impl CpalCaptureSource {
    const FRAME_BUFFER: usize = 100;

    fn build_input_stream<T>(
        device: &Device,
        config: &StreamConfig,
        sample_rate: u32,
        channels: u16,
        tx: mpsc::Sender<AudioFrame>,
    ) -> Result<Stream, VoiceError>
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        let data_fn = move |data: &[T], _: &cpal::InputCallbackInfo| {
            let samples: Vec<f32> = data.iter().map(|sample| f32::from_sample(*sample)).collect();
            let frame = AudioFrame {
                samples,
                sample_rate,
                channels,
            };
            // Never block the audio thread.
            match tx.try_send(frame) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!("Audio frame dropped: channel full");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        };
        let err_fn = |err| {
            tracing::error!("Audio capture stream error: {}", err);
        };
        device
            .build_input_stream(config, data_fn, err_fn, None)
            .map_err(|err| VoiceError::DeviceUnavailable(format!("cannot build input stream: {err}")))
    }

    fn open_stream(frame_tx: mpsc::Sender<AudioFrame>) -> Result<Stream, VoiceError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| VoiceError::DeviceUnavailable("no default input device".into()))?;
        let config = device
            .default_input_config()
            .map_err(|err| VoiceError::DeviceUnavailable(format!("cannot get input config: {err}")))?;
        let sample_format = config.sample_format();
        let sample_rate = config.sample_rate().0;
        let channels = config.channels();
        tracing::debug!(sample_rate, channels, ?sample_format, "Capture device config");
        let stream_config: StreamConfig = config.into();
        let stream = match sample_format {
            SampleFormat::I16 => Self::build_input_stream::<i16>(
                &device,
                &stream_config,
                sample_rate,
                channels,
                frame_tx,
            ),
            SampleFormat::U16 => Self::build_input_stream::<u16>(
                &device,
                &stream_config,
                sample_rate,
                channels,
                frame_tx,
            ),
            SampleFormat::F32 => Self::build_input_stream::<f32>(
                &device,
                &stream_config,
                sample_rate,
                channels,
                frame_tx,
            ),
            other => Err(VoiceError::DeviceUnavailable(format!(
                "unsupported sample format: {other:?}"
            ))),
        }?;
        stream
            .play()
            .map_err(|err| VoiceError::DeviceUnavailable(format!("cannot start stream: {err}")))?;
        Ok(stream)
    }
}

#[async_trait]
impl CaptureSource for CpalCaptureSource {
    async fn open(&self) -> Result<CaptureHandle, VoiceError> {
        let (frame_tx, frame_rx) = mpsc::channel(Self::FRAME_BUFFER);
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let (ready_tx, ready_rx) = oneshot::channel();
        spawn_blocking(move || match Self::open_stream(frame_tx) {
            Ok(stream) => {
                if ready_tx.send(Ok(())).is_err() {
                    return;
                }
                // Hold the stream until the handle is dropped.
                let _ = stop_rx.blocking_recv();
                if let Err(err) = stream.pause() {
                    tracing::error!("Failed to stop capture stream: {}", err);
                }
            }
            Err(err) => {
                let _ = ready_tx.send(Err(err));
            }
        });
        ready_rx
            .await
            .map_err(|_| VoiceError::DeviceUnavailable("capture task exited".into()))??;
        Ok(CaptureHandle::new(frame_rx, stop_tx))
    }
}
