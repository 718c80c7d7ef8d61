//! Audio/video recording system
//!
//! This module implements the recording architecture:
//! - MediaRecorder state machine fed by frame and audio delivery callbacks
//! - MediaWriter trait for output backends, with an FFmpeg-based default
//! - Session metadata tracking and the sidecar written at finalize

pub mod recorder;
pub mod session;
pub mod writer;

pub use recorder::{MediaRecorder, RecorderEvent, RecorderState};
pub use session::{SessionInfo, SessionSummary};
pub use writer::{FfmpegWriterFactory, MediaWriter, WriterFactory};

use thiserror::Error;

/// Errors returned by recording control calls.
///
/// Delivery callbacks never return these; mid-session failures surface
/// through the recorder's event channel instead.
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("a recording session is already active")]
    AlreadyRecording,

    #[error("invalid output path: {0}")]
    InvalidOutputPath(String),

    #[error("writer initialization failed: {0}")]
    WriterInit(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for recording control calls
pub type RecordingResult<T> = Result<T, RecordingError>;
