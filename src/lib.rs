//! Nightlens - low-light video enhancement and A/V recording core.
//!
//! This crate implements the real-time media core embedded inside a native
//! media plugin: a low-light enhancement chain applied to outgoing and
//! incoming video streams, and a synchronized audio/video recorder that taps
//! frames from a render callback and PCM buffers from the intercepted audio
//! path, muxing both into a single output file. Plugin registration,
//! signaling, and the communication engine's capture/track model stay with
//! the host; media reaches this crate through its push-style sink surface.

pub mod enhance;
pub mod media;
pub mod pipeline;
pub mod recorder;
pub mod snapshot;
pub mod tap;

pub use enhance::{EnhancementConfig, EnhancementEngine};
pub use media::{AudioBuffer, I420Buffer, PixelFormat, Rotation, VideoFrame};
pub use pipeline::{MediaPipeline, VideoSink};
pub use recorder::{MediaRecorder, RecorderEvent, RecorderState, RecordingError};
pub use tap::AudioTap;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging for hosts that have no subscriber of their
/// own. Safe to call when one is already installed.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nightlens=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
