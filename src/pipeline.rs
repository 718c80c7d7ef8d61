//! Pipeline composition root
//!
//! Wires the delivery paths together: frame source → enhancement engine →
//! {renderer sink, recorder}, and audio source → tap → recorder. The
//! communication engine's track/handle objects stay with the caller; this
//! crate only exposes the push-style sink surface.

use crate::enhance::{EnhancementConfig, EnhancementEngine};
use crate::media::{AudioBuffer, VideoFrame};
use crate::recorder::{
    MediaRecorder, RecorderEvent, RecorderState, RecordingError, WriterFactory,
};
use crate::tap::AudioTap;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Renderer-style frame consumer (push model).
///
/// Implementers provide concrete adapters per platform surface: UI texture
/// bridges, file capture, test probes.
pub trait VideoSink: Send + Sync {
    fn on_frame(&self, frame: &VideoFrame);
}

/// Composition root for the enhancement and recording pipeline
pub struct MediaPipeline {
    engine: Arc<EnhancementEngine>,
    recorder: Arc<MediaRecorder>,
    tap: Arc<AudioTap>,
    renderer: RwLock<Option<Arc<dyn VideoSink>>>,
}

impl MediaPipeline {
    /// Build a pipeline with the default FFmpeg writer backend
    pub fn new() -> Self {
        Self::with_writer_factory(Box::new(crate::recorder::FfmpegWriterFactory::default()))
    }

    /// Build a pipeline with a custom writer backend
    pub fn with_writer_factory(factory: Box<dyn WriterFactory>) -> Self {
        let recorder = Arc::new(MediaRecorder::with_factory(factory));
        let tap = Arc::new(AudioTap::new(&recorder));
        Self {
            engine: Arc::new(EnhancementEngine::new()),
            recorder,
            tap,
            renderer: RwLock::new(None),
        }
    }

    /// Attach or clear the UI renderer sink
    pub fn set_renderer(&self, sink: Option<Arc<dyn VideoSink>>) {
        *self.renderer.write() = sink;
    }

    /// The enhancement engine (shared with platform glue)
    pub fn engine(&self) -> &Arc<EnhancementEngine> {
        &self.engine
    }

    /// The recorder (shared with platform glue)
    pub fn recorder(&self) -> &Arc<MediaRecorder> {
        &self.recorder
    }

    /// The audio tap, for registration with the audio render path
    pub fn tap(&self) -> &Arc<AudioTap> {
        &self.tap
    }

    // Enhancement configuration -------------------------------------------

    pub fn set_enabled(&self, enabled: bool) {
        self.engine.set_enabled(enabled);
    }

    pub fn set_intensity(&self, intensity: f32) {
        self.engine.set_intensity(intensity);
    }

    pub fn set_brightness_threshold(&self, threshold: f32) {
        self.engine.set_brightness_threshold(threshold);
    }

    /// Current enhancement configuration snapshot
    pub fn enhancement_config(&self) -> EnhancementConfig {
        self.engine.config()
    }

    // Delivery paths ------------------------------------------------------

    /// Local (outgoing) frame delivery: enhance, record, render, return.
    ///
    /// Always returns a valid frame; enhancement failures degrade to
    /// pass-through inside the engine.
    pub fn process_local_frame(&self, frame: VideoFrame) -> VideoFrame {
        let frame = self.engine.process_frame(frame);
        self.recorder.on_video_frame(&frame);
        if let Some(renderer) = self.renderer.read().clone() {
            renderer.on_frame(&frame);
        }
        frame
    }

    /// Remote (incoming) frame delivery: enhance, render, return
    pub fn process_remote_frame(&self, frame: VideoFrame) -> VideoFrame {
        let frame = self.engine.process_remote_frame(frame);
        if let Some(renderer) = self.renderer.read().clone() {
            renderer.on_frame(&frame);
        }
        frame
    }

    /// Audio render interception callback
    pub fn on_audio_samples(&self, buffer: &AudioBuffer) {
        self.tap.on_samples(buffer);
    }

    // Recording control ---------------------------------------------------

    pub fn start_recording(
        &self,
        path: impl Into<PathBuf>,
        width: u32,
        height: u32,
    ) -> Result<(), RecordingError> {
        self.recorder.start_recording(path, width, height)
    }

    pub fn stop_recording(&self) {
        self.recorder.stop_recording();
    }

    pub fn recorder_state(&self) -> RecorderState {
        self.recorder.state()
    }

    /// Set the audio gain on the tap and the session metadata together
    pub fn set_audio_gain(&self, gain: f32) {
        self.tap.set_audio_gain(gain);
        self.recorder.set_audio_gain(gain);
    }

    /// Subscribe to recorder status events
    pub fn subscribe_events(&self) -> broadcast::Receiver<RecorderEvent> {
        self.recorder.subscribe()
    }

    /// Stop any active session and release all owned resources.
    /// Safe to call multiple times.
    pub fn dispose(&self) {
        self.recorder.dispose();
        self.engine.dispose();
        *self.renderer.write() = None;
    }
}

impl Default for MediaPipeline {
    fn default() -> Self {
        Self::new()
    }
}
