use std::time::{Duration, Instant};

use super::VoiceClip;

/// Preview playback position tracking for one clip. Independent of the
/// recording state machine.
pub struct ClipPlayer {
    total: Duration,
    position: Duration,
    started: Option<Instant>,
}

impl ClipPlayer {
    pub fn new(clip: &VoiceClip) -> Self {
        Self {
            total: clip.duration(),
            position: Duration::ZERO,
            started: None,
        }
    }

    pub fn play(&mut self) {
        if self.started.is_none() && !self.finished() {
            self.started = Some(Instant::now());
        }
    }

    pub fn pause(&mut self) {
        if let Some(started) = self.started.take() {
            self.position = (self.position + started.elapsed()).min(self.total);
        }
    }

    pub fn rewind(&mut self) {
        self.started = None;
        self.position = Duration::ZERO;
    }

    pub fn is_playing(&self) -> bool {
        self.started.is_some() && !self.finished()
    }

    pub fn position(&self) -> Duration {
        let running = self
            .started
            .map(|started| started.elapsed())
            .unwrap_or(Duration::ZERO);
        (self.position + running).min(self.total)
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn finished(&self) -> bool {
        self.position() >= self.total
    }
}
