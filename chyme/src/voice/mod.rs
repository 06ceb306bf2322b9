mod capture;
mod pipeline;
mod player;

pub use capture::*;
pub use pipeline::*;
pub use player::*;

#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    // Non-fatal: the pipeline stays in Idle and the caller shows guidance.
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),
}
