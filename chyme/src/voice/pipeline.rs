use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chyme_types::AttachmentRef;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{CaptureSource, VoiceError};

/// Finalized capture, ready for preview or send. Becomes a message
/// attachment reference only at send time.
#[derive(Debug, Clone)]
pub struct VoiceClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    attachment: AttachmentRef,
}

impl VoiceClip {
    fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
            attachment: AttachmentRef::new(format!("voice://{}", Uuid::now_v7())),
        }
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        let frames = self.samples.len() as u64 / self.channels as u64;
        Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }

    /// Opaque playable reference for the presentation layer.
    pub fn attachment(&self) -> &AttachmentRef {
        &self.attachment
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    Preview,
}

/// Microphone capture state machine: Idle -> Recording -> Preview -> Idle.
/// Illegal transitions are no-ops. The capture handle and the elapsed ticker
/// are released on every exit from Recording, including drop.
pub struct VoicePipeline {
    source: Arc<dyn CaptureSource>,
    elapsed: Arc<AtomicU64>,
    inner: Mutex<Inner>,
}

struct Inner {
    state: RecorderState,
    buffer: Arc<Mutex<RecordBuffer>>,
    capture_task: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
    clip: Option<VoiceClip>,
}

#[derive(Default)]
struct RecordBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl VoicePipeline {
    pub fn new(source: Arc<dyn CaptureSource>) -> Self {
        Self {
            source,
            elapsed: Arc::new(AtomicU64::new(0)),
            inner: Mutex::new(Inner {
                state: RecorderState::Idle,
                buffer: Arc::new(Mutex::new(RecordBuffer::default())),
                capture_task: None,
                ticker: None,
                clip: None,
            }),
        }
    }

    /// Opens the capture device and starts buffering. On
    /// `DeviceUnavailable` the pipeline stays in Idle.
    pub async fn start(&self) -> Result<(), VoiceError> {
        {
            let inner = self.inner.lock();
            if inner.state == RecorderState::Recording {
                return Ok(());
            }
        }
        let mut handle = self.source.open().await?;
        let buffer = Arc::new(Mutex::new(RecordBuffer::default()));
        let capture_task = tokio::spawn({
            let buffer = buffer.clone();
            async move {
                while let Some(frame) = handle.recv().await {
                    let mut buffer = buffer.lock();
                    if buffer.sample_rate == 0 {
                        buffer.sample_rate = frame.sample_rate;
                        buffer.channels = frame.channels;
                    }
                    buffer.samples.extend_from_slice(&frame.samples);
                }
            }
        });
        self.elapsed.store(0, Ordering::Relaxed);
        let ticker = tokio::spawn({
            let elapsed = self.elapsed.clone();
            async move {
                let mut interval = tokio::time::interval(Duration::from_secs(1));
                interval.tick().await;
                loop {
                    interval.tick().await;
                    elapsed.fetch_add(1, Ordering::Relaxed);
                }
            }
        });
        let mut inner = self.inner.lock();
        if inner.state == RecorderState::Recording {
            // Lost the race against a concurrent start.
            capture_task.abort();
            ticker.abort();
            return Ok(());
        }
        inner.buffer = buffer;
        inner.capture_task = Some(capture_task);
        inner.ticker = Some(ticker);
        inner.clip = None;
        inner.state = RecorderState::Recording;
        tracing::debug!("Voice recording started");
        Ok(())
    }

    /// Finalizes the buffered audio into a clip and moves to Preview.
    /// Outside Recording this is a no-op returning the current preview.
    pub async fn stop(&self) -> Option<VoiceClip> {
        let (capture_task, buffer) = {
            let mut inner = self.inner.lock();
            if inner.state != RecorderState::Recording {
                return inner.clip.clone();
            }
            if let Some(ticker) = inner.ticker.take() {
                ticker.abort();
            }
            self.elapsed.store(0, Ordering::Relaxed);
            (inner.capture_task.take(), inner.buffer.clone())
        };
        if let Some(task) = capture_task {
            // Dropping the capture handle inside releases the device.
            task.abort();
            let _ = task.await;
        }
        let buffer = std::mem::take(&mut *buffer.lock());
        let clip = VoiceClip::new(buffer.samples, buffer.sample_rate, buffer.channels);
        let mut inner = self.inner.lock();
        if inner.state != RecorderState::Recording {
            // A cancel ran while the capture task was draining; its reset
            // stands.
            return None;
        }
        inner.clip = Some(clip.clone());
        inner.state = RecorderState::Preview;
        tracing::debug!(duration = ?clip.duration(), "Voice recording stopped");
        Some(clip)
    }

    /// Discards any partial capture and releases the device immediately,
    /// from any state.
    pub fn cancel(&self) {
        let mut inner = self.inner.lock();
        if let Some(ticker) = inner.ticker.take() {
            ticker.abort();
        }
        if let Some(task) = inner.capture_task.take() {
            task.abort();
        }
        inner.buffer.lock().samples.clear();
        inner.clip = None;
        inner.state = RecorderState::Idle;
        self.elapsed.store(0, Ordering::Relaxed);
    }

    /// The previewed clip, if any.
    pub fn clip(&self) -> Option<VoiceClip> {
        self.inner.lock().clip.clone()
    }

    /// Preview -> Idle without sending.
    pub fn discard(&self) {
        let mut inner = self.inner.lock();
        if inner.state == RecorderState::Preview {
            inner.clip = None;
            inner.state = RecorderState::Idle;
        }
    }

    /// Preview -> Idle after the transport confirmed the send.
    pub fn mark_sent(&self) {
        let mut inner = self.inner.lock();
        if inner.state == RecorderState::Preview {
            inner.clip = None;
            inner.state = RecorderState::Idle;
        }
    }

    pub fn state(&self) -> RecorderState {
        self.inner.lock().state
    }

    /// Whole seconds since Recording began; 0 outside Recording.
    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed.load(Ordering::Relaxed)
    }
}

impl Drop for VoicePipeline {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        if let Some(ticker) = inner.ticker.take() {
            ticker.abort();
        }
        if let Some(task) = inner.capture_task.take() {
            task.abort();
        }
    }
}
