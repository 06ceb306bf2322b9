use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chyme::voice::{
    AudioFrame, CaptureHandle, CaptureSource, ClipPlayer, RecorderState, VoiceError, VoicePipeline,
};
use tokio::sync::mpsc;
use tokio::time::sleep;

// Scripted stand-in for the microphone: emits preset frames, then keeps the
// session open until the handle is dropped. The released flag flips when the
// stop channel closes, the same signal the real device watches.
struct ScriptedSource {
    frames: Vec<AudioFrame>,
    released: Arc<AtomicBool>,
}

impl ScriptedSource {
    fn new(frames: Vec<AudioFrame>) -> Self {
        Self {
            frames,
            released: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl CaptureSource for ScriptedSource {
    async fn open(&self) -> Result<CaptureHandle, VoiceError> {
        let (frame_tx, frame_rx) = mpsc::channel(16);
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let frames = self.frames.clone();
        let released = self.released.clone();
        tokio::spawn(async move {
            for frame in frames {
                if frame_tx.send(frame).await.is_err() {
                    break;
                }
            }
            drop(frame_tx);
            let _ = stop_rx.recv().await;
            released.store(true, Ordering::SeqCst);
        });
        Ok(CaptureHandle::new(frame_rx, stop_tx))
    }
}

struct FailingSource;

#[async_trait]
impl CaptureSource for FailingSource {
    async fn open(&self) -> Result<CaptureHandle, VoiceError> {
        Err(VoiceError::DeviceUnavailable("no device".into()))
    }
}

fn mono_frame(samples: usize) -> AudioFrame {
    AudioFrame {
        samples: vec![0.1; samples],
        sample_rate: 16_000,
        channels: 1,
    }
}

#[tokio::test]
async fn test_start_stop_produces_clip() {
    // 16000 mono samples at 16 kHz is exactly one second.
    let source = Arc::new(ScriptedSource::new(vec![
        mono_frame(8_000),
        mono_frame(8_000),
    ]));
    let pipeline = VoicePipeline::new(source);
    assert_eq!(pipeline.state(), RecorderState::Idle);

    pipeline.start().await.expect("start failed");
    assert_eq!(pipeline.state(), RecorderState::Recording);
    // Let the collector drain the scripted frames.
    sleep(Duration::from_millis(50)).await;

    let clip = pipeline.stop().await.expect("no clip");
    assert_eq!(pipeline.state(), RecorderState::Preview);
    assert_eq!(clip.samples.len(), 16_000);
    assert_eq!(clip.duration(), Duration::from_secs(1));
    assert!(clip.attachment().as_str().starts_with("voice://"));
    let stored = pipeline.clip().expect("preview clip missing");
    assert_eq!(stored.attachment(), clip.attachment());
}

#[tokio::test]
async fn test_failed_open_stays_idle() {
    let pipeline = VoicePipeline::new(Arc::new(FailingSource));
    let err = pipeline.start().await.expect_err("open should fail");
    assert!(matches!(err, VoiceError::DeviceUnavailable(_)));
    assert_eq!(pipeline.state(), RecorderState::Idle);
    assert_eq!(pipeline.elapsed_secs(), 0);
    assert!(pipeline.clip().is_none());
}

#[tokio::test]
async fn test_start_while_recording_is_noop() {
    let source = Arc::new(ScriptedSource::new(vec![mono_frame(4_000)]));
    let pipeline = VoicePipeline::new(source);
    pipeline.start().await.expect("start failed");
    pipeline.start().await.expect("second start failed");
    assert_eq!(pipeline.state(), RecorderState::Recording);
    sleep(Duration::from_millis(50)).await;
    let clip = pipeline.stop().await.expect("no clip");
    // A restart would have reset the buffer.
    assert_eq!(clip.samples.len(), 4_000);
}

#[tokio::test(start_paused = true)]
async fn test_elapsed_counts_whole_seconds() {
    let source = Arc::new(ScriptedSource::new(vec![]));
    let pipeline = VoicePipeline::new(source);
    pipeline.start().await.expect("start failed");
    assert_eq!(pipeline.elapsed_secs(), 0);
    sleep(Duration::from_millis(3_500)).await;
    assert_eq!(pipeline.elapsed_secs(), 3);
    pipeline.stop().await;
    assert_eq!(pipeline.elapsed_secs(), 0);
    // No further ticks after stop.
    sleep(Duration::from_secs(2)).await;
    assert_eq!(pipeline.elapsed_secs(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_releases_device_and_resets() {
    let source = Arc::new(ScriptedSource::new(vec![mono_frame(4_000)]));
    let released = source.released.clone();
    let pipeline = VoicePipeline::new(source);
    pipeline.start().await.expect("start failed");
    sleep(Duration::from_millis(1_500)).await;
    assert_eq!(pipeline.elapsed_secs(), 1);

    pipeline.cancel();
    assert_eq!(pipeline.state(), RecorderState::Idle);
    assert_eq!(pipeline.elapsed_secs(), 0);
    assert!(pipeline.clip().is_none());
    sleep(Duration::from_secs(2)).await;
    assert_eq!(pipeline.elapsed_secs(), 0);
    assert!(released.load(Ordering::SeqCst), "device not released");
}

// Source whose stream stays open until the handle is dropped, so a stop
// call has to wait for the collector to wind down.
struct OpenEndedSource;

#[async_trait]
impl CaptureSource for OpenEndedSource {
    async fn open(&self) -> Result<CaptureHandle, VoiceError> {
        let (frame_tx, frame_rx) = mpsc::channel(4);
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            let _ = frame_tx.send(mono_frame(1_000)).await;
            let _ = stop_rx.recv().await;
            drop(frame_tx);
        });
        Ok(CaptureHandle::new(frame_rx, stop_tx))
    }
}

#[tokio::test]
async fn test_cancel_during_stop_stays_idle() {
    let pipeline = Arc::new(VoicePipeline::new(Arc::new(OpenEndedSource)));
    pipeline.start().await.expect("start failed");
    sleep(Duration::from_millis(50)).await;

    let stop = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.stop().await }
    });
    // Let stop reach the wait for the capture task, then cancel under it.
    tokio::task::yield_now().await;
    pipeline.cancel();

    let clip = stop.await.expect("task panicked");
    assert!(clip.is_none(), "cancel must not be overwritten by stop");
    assert_eq!(pipeline.state(), RecorderState::Idle);
    assert!(pipeline.clip().is_none());
    assert_eq!(pipeline.elapsed_secs(), 0);
}

#[tokio::test]
async fn test_discard_and_mark_sent_clear_preview() {
    let source = Arc::new(ScriptedSource::new(vec![mono_frame(1_000)]));
    let pipeline = VoicePipeline::new(source.clone());
    pipeline.start().await.expect("start failed");
    sleep(Duration::from_millis(50)).await;
    pipeline.stop().await.expect("no clip");
    pipeline.discard();
    assert_eq!(pipeline.state(), RecorderState::Idle);
    assert!(pipeline.clip().is_none());

    pipeline.start().await.expect("restart failed");
    sleep(Duration::from_millis(50)).await;
    pipeline.stop().await.expect("no clip");
    pipeline.mark_sent();
    assert_eq!(pipeline.state(), RecorderState::Idle);
    assert!(pipeline.clip().is_none());
}

#[tokio::test]
async fn test_stop_outside_recording_is_noop() {
    let pipeline = VoicePipeline::new(Arc::new(ScriptedSource::new(vec![])));
    assert!(pipeline.stop().await.is_none());
    assert_eq!(pipeline.state(), RecorderState::Idle);
    // From Idle, discard and cancel are harmless too.
    pipeline.discard();
    pipeline.cancel();
    assert_eq!(pipeline.state(), RecorderState::Idle);
}

#[tokio::test]
async fn test_clip_player_positions() {
    let source = Arc::new(ScriptedSource::new(vec![mono_frame(16_000)]));
    let pipeline = VoicePipeline::new(source);
    pipeline.start().await.expect("start failed");
    sleep(Duration::from_millis(50)).await;
    let clip = pipeline.stop().await.expect("no clip");

    let mut player = ClipPlayer::new(&clip);
    assert_eq!(player.total(), Duration::from_secs(1));
    assert_eq!(player.position(), Duration::ZERO);
    assert!(!player.is_playing());
    assert!(!player.finished());

    player.play();
    assert!(player.is_playing());
    player.pause();
    assert!(!player.is_playing());
    assert!(player.position() <= player.total());

    player.rewind();
    assert_eq!(player.position(), Duration::ZERO);
}

#[tokio::test]
async fn test_empty_clip_is_finished() {
    let source = Arc::new(ScriptedSource::new(vec![]));
    let pipeline = VoicePipeline::new(source);
    pipeline.start().await.expect("start failed");
    sleep(Duration::from_millis(50)).await;
    let clip = pipeline.stop().await.expect("no clip");
    assert_eq!(clip.duration(), Duration::ZERO);

    let mut player = ClipPlayer::new(&clip);
    assert!(player.finished());
    player.play();
    assert!(!player.is_playing());
}
