//! Media recorder
//!
//! Owns one output-file writer session at a time, fed by a renderer-style
//! video callback and the audio tap. All session state is serialized through
//! a single lock; delivery entry points never block the producer beyond the
//! time to hand one frame or buffer to the writer, and never propagate
//! errors back into the engine's render path.

use crate::media::{AudioBuffer, VideoFrame};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::session::{self, SessionInfo, SessionSummary};
use super::writer::{FfmpegWriterFactory, MediaWriter, WriterFactory};
use super::RecordingError;

/// Current state of a recorder instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    /// No recording in progress
    Idle,
    /// Accepting frames and audio buffers
    Recording,
    /// Stop in progress; late deliveries are dropped
    Stopping,
    /// A start or write failure occurred; a fresh start recovers
    Failed,
}

/// Side-channel status events emitted during recording
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    /// A session was opened
    Started { session_id: Uuid },
    /// A session finished and the output file was finalized
    Stopped(SessionSummary),
    /// A non-fatal condition (e.g. resolution mismatch, dropped frames)
    Warning(String),
    /// The session failed; whatever was written so far was salvaged
    Error(String),
}

struct ActiveSession {
    info: SessionInfo,
    writer: Box<dyn MediaWriter>,
    /// Timestamp of the first accepted frame or buffer
    origin_us: Option<u64>,
    /// Largest relative timestamp seen on either stream
    last_pts_us: u64,
    video_frames: u64,
    audio_buffers: u64,
    resolution_warned: bool,
}

struct RecorderInner {
    state: RecorderState,
    session: Option<ActiveSession>,
    /// Persisted across sessions; copied into each new session's metadata
    audio_gain: f32,
}

/// Synchronized audio/video recorder
pub struct MediaRecorder {
    inner: Mutex<RecorderInner>,
    factory: Box<dyn WriterFactory>,
    event_tx: broadcast::Sender<RecorderEvent>,
}

impl MediaRecorder {
    /// Create a recorder with the default FFmpeg writer backend
    pub fn new() -> Self {
        Self::with_factory(Box::new(FfmpegWriterFactory::default()))
    }

    /// Create a recorder with a custom writer backend (platform adapters)
    pub fn with_factory(factory: Box<dyn WriterFactory>) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            inner: Mutex::new(RecorderInner {
                state: RecorderState::Idle,
                session: None,
                audio_gain: 1.0,
            }),
            factory,
            event_tx,
        }
    }

    /// Subscribe to recorder status events
    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.event_tx.subscribe()
    }

    /// Current state
    pub fn state(&self) -> RecorderState {
        self.inner.lock().state
    }

    /// True while a session is accepting media
    pub fn is_recording(&self) -> bool {
        self.state() == RecorderState::Recording
    }

    /// Metadata of the active session, if any
    pub fn current_session(&self) -> Option<SessionInfo> {
        self.inner.lock().session.as_ref().map(|s| s.info.clone())
    }

    /// Open a new recording session writing to `path`.
    ///
    /// Valid from `Idle` (and from `Failed`, which it recovers); returns
    /// `AlreadyRecording` while a session is active. The timeline origin is
    /// established by the first accepted frame or buffer, not by this call.
    pub fn start_recording(
        &self,
        path: impl Into<PathBuf>,
        width: u32,
        height: u32,
    ) -> Result<(), RecordingError> {
        let path = path.into();
        let mut inner = self.inner.lock();
        match inner.state {
            RecorderState::Recording | RecorderState::Stopping => {
                return Err(RecordingError::AlreadyRecording);
            }
            RecorderState::Failed => {
                // Discard the failed session's remnants before retrying.
                inner.session = None;
                inner.state = RecorderState::Idle;
            }
            RecorderState::Idle => {}
        }

        let writer = self.factory.open(&path, width, height)?;
        let mut info = SessionInfo::new(path, width, height);
        info.audio_gain = inner.audio_gain;
        let session_id = info.id;

        tracing::info!(
            "recording started: {} ({}x{}) -> {:?}",
            session_id,
            width,
            height,
            info.file_path
        );

        inner.session = Some(ActiveSession {
            info,
            writer,
            origin_us: None,
            last_pts_us: 0,
            video_frames: 0,
            audio_buffers: 0,
            resolution_warned: false,
        });
        inner.state = RecorderState::Recording;
        drop(inner);

        let _ = self.event_tx.send(RecorderEvent::Started { session_id });
        Ok(())
    }

    /// Video delivery entry point (renderer-style callback).
    ///
    /// Frames arriving outside `Recording` are dropped. A frame whose
    /// resolution differs from the session's is dropped with a one-time
    /// warning rather than failing the session.
    pub fn on_video_frame(&self, frame: &VideoFrame) {
        let mut inner = self.inner.lock();
        if inner.state != RecorderState::Recording {
            return;
        }
        let Some(session) = inner.session.as_mut() else {
            return;
        };

        if frame.width() != session.info.video_width
            || frame.height() != session.info.video_height
        {
            if !session.resolution_warned {
                session.resolution_warned = true;
                let msg = format!(
                    "dropping frames: resolution {}x{} does not match session {}x{}",
                    frame.width(),
                    frame.height(),
                    session.info.video_width,
                    session.info.video_height
                );
                tracing::warn!("{msg}");
                drop(inner);
                let _ = self.event_tx.send(RecorderEvent::Warning(msg));
            }
            return;
        }

        let origin = *session.origin_us.get_or_insert(frame.timestamp_us());
        let pts = frame.timestamp_us().saturating_sub(origin);
        let result = session.writer.write_video(frame, pts);
        match result {
            Ok(()) => {
                session.video_frames += 1;
                session.last_pts_us = session.last_pts_us.max(pts);
            }
            Err(e) => self.fail_session(inner, e),
        }
    }

    /// Audio delivery entry point (fed by the audio tap).
    ///
    /// Shares the video stream's timeline origin; buffers arriving outside
    /// `Recording` are dropped.
    pub fn on_audio_buffer(&self, buffer: &AudioBuffer) {
        let mut inner = self.inner.lock();
        if inner.state != RecorderState::Recording {
            return;
        }
        let Some(session) = inner.session.as_mut() else {
            return;
        };

        let origin = *session.origin_us.get_or_insert(buffer.timestamp_us());
        let pts = buffer.timestamp_us().saturating_sub(origin);
        let result = session.writer.write_audio(buffer, pts);
        match result {
            Ok(()) => {
                session.audio_buffers += 1;
                session.last_pts_us = session.last_pts_us.max(pts);
            }
            Err(e) => self.fail_session(inner, e),
        }
    }

    /// Stop the active session and finalize the output file.
    ///
    /// Idempotent: a no-op from `Idle` or while another stop is in flight;
    /// from `Failed` it just clears the failed session. After this returns
    /// no further writes to the output occur.
    pub fn stop_recording(&self) {
        let session = {
            let mut inner = self.inner.lock();
            match inner.state {
                RecorderState::Idle | RecorderState::Stopping => return,
                RecorderState::Failed => {
                    inner.session = None;
                    inner.state = RecorderState::Idle;
                    return;
                }
                RecorderState::Recording => {
                    inner.state = RecorderState::Stopping;
                    inner.session.take()
                }
            }
        };

        // Finalize outside the lock so producer callbacks are never blocked
        // on container finalization; they observe `Stopping` and drop.
        if let Some(session) = session {
            let ActiveSession {
                info,
                writer,
                last_pts_us,
                video_frames,
                audio_buffers,
                ..
            } = session;

            let summary = SessionSummary {
                id: info.id,
                file_path: info.file_path.clone(),
                duration_ms: last_pts_us as f64 / 1000.0,
                video_frames,
                audio_buffers,
            };

            match writer.finalize() {
                Ok(()) => {
                    tracing::info!(
                        "recording stopped: {} frames, {} audio buffers, {:.0} ms -> {:?}",
                        summary.video_frames,
                        summary.audio_buffers,
                        summary.duration_ms,
                        summary.file_path
                    );
                    if let Err(e) = session::write_sidecar(&summary) {
                        tracing::warn!("failed to write session sidecar: {e}");
                    }
                    let _ = self.event_tx.send(RecorderEvent::Stopped(summary));
                }
                Err(e) => {
                    tracing::error!("failed to finalize recording: {e}");
                    let _ = self
                        .event_tx
                        .send(RecorderEvent::Error(format!("finalize failed: {e}")));
                }
            }
        }

        self.inner.lock().state = RecorderState::Idle;
    }

    /// Set the session audio gain metadata, clamped to [0, 1].
    ///
    /// Valid in any state; the tap applies the gain to samples, this keeps
    /// the session record in step.
    pub fn set_audio_gain(&self, gain: f32) {
        let gain = gain.clamp(0.0, 1.0);
        let mut inner = self.inner.lock();
        inner.audio_gain = gain;
        if let Some(session) = inner.session.as_mut() {
            session.info.audio_gain = gain;
        }
        tracing::debug!("audio gain set to {:.2}", gain);
    }

    /// Current audio gain
    pub fn audio_gain(&self) -> f32 {
        self.inner.lock().audio_gain
    }

    /// Force stop semantics regardless of state and release the session.
    /// Safe to call multiple times.
    pub fn dispose(&self) {
        self.stop_recording();
        tracing::debug!("recorder disposed");
    }

    /// Abandon the session after a write error: salvage what was written,
    /// move to `Failed`, and report through the event channel.
    fn fail_session(
        &self,
        mut inner: parking_lot::MutexGuard<'_, RecorderInner>,
        error: std::io::Error,
    ) {
        let session = inner.session.take();
        inner.state = RecorderState::Failed;
        drop(inner);

        tracing::error!("write failure, abandoning session: {error}");
        if let Some(session) = session {
            // Best-effort: finalize whatever the writer managed to stage.
            if let Err(e) = session.writer.finalize() {
                tracing::warn!("salvage finalize failed: {e}");
            }
        }
        let _ = self
            .event_tx
            .send(RecorderEvent::Error(format!("write failure: {error}")));
    }
}

impl Default for MediaRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{I420Buffer, Rotation};
    use crate::recorder::writer::test_support::MockWriterFactory;

    fn frame(width: u32, height: u32, ts_us: u64) -> VideoFrame {
        VideoFrame::new(I420Buffer::new(width, height), Rotation::Deg0).with_timestamp(ts_us)
    }

    fn audio(ts_us: u64) -> AudioBuffer {
        AudioBuffer::new(vec![1000; 480], 1, 48_000).with_timestamp(ts_us)
    }

    fn recorder_with(factory: MockWriterFactory) -> MediaRecorder {
        MediaRecorder::with_factory(Box::new(factory))
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let recorder = recorder_with(MockWriterFactory::default());
        recorder.stop_recording();
        assert_eq!(recorder.state(), RecorderState::Idle);
    }

    #[test]
    fn test_start_while_recording_fails_and_leaves_session() {
        let factory = MockWriterFactory::default();
        let recorder = recorder_with(factory.clone());
        recorder.start_recording("/tmp/a.mp4", 640, 480).unwrap();
        let first = recorder.current_session().unwrap();

        let err = recorder.start_recording("/tmp/b.mp4", 320, 240).unwrap_err();
        assert!(matches!(err, RecordingError::AlreadyRecording));

        let session = recorder.current_session().unwrap();
        assert_eq!(session.id, first.id);
        assert_eq!(session.file_path, PathBuf::from("/tmp/a.mp4"));
        assert_eq!(factory.log.lock().opened, 1, "second writer never opened");
    }

    #[test]
    fn test_failed_open_leaves_recorder_idle() {
        let factory = MockWriterFactory {
            fail_open: true,
            ..Default::default()
        };
        let recorder = recorder_with(factory);
        assert!(recorder.start_recording("/tmp/a.mp4", 640, 480).is_err());
        assert_eq!(recorder.state(), RecorderState::Idle);
    }

    #[test]
    fn test_timeline_origin_is_first_accepted_frame() {
        let factory = MockWriterFactory::default();
        let recorder = recorder_with(factory.clone());
        recorder.start_recording("/tmp/a.mp4", 640, 480).unwrap();

        // First frame arrives well after start; its timestamp is the origin.
        recorder.on_video_frame(&frame(640, 480, 5_000_000));
        recorder.on_video_frame(&frame(640, 480, 5_033_000));
        recorder.on_audio_buffer(&audio(5_010_000));

        let log = factory.log.lock();
        assert_eq!(log.video[0].0, 0);
        assert_eq!(log.video[1].0, 33_000);
        assert_eq!(log.audio[0].0, 10_000);
    }

    #[test]
    fn test_resolution_mismatch_drops_with_one_warning() {
        let factory = MockWriterFactory::default();
        let recorder = recorder_with(factory.clone());
        let mut events = recorder.subscribe();
        recorder.start_recording("/tmp/a.mp4", 640, 480).unwrap();

        recorder.on_video_frame(&frame(320, 240, 0));
        recorder.on_video_frame(&frame(320, 240, 33_000));
        recorder.on_video_frame(&frame(640, 480, 66_000));

        assert_eq!(factory.log.lock().video.len(), 1, "mismatched frames dropped");

        // Exactly one warning among the emitted events.
        let mut warnings = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, RecorderEvent::Warning(_)) {
                warnings += 1;
            }
        }
        assert_eq!(warnings, 1);
    }

    #[test]
    fn test_scenario_ten_frames_ten_buffers_then_stop() {
        let factory = MockWriterFactory::default();
        let recorder = recorder_with(factory.clone());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.mp4");
        recorder.start_recording(path, 640, 480).unwrap();

        for i in 0..10u64 {
            recorder.on_video_frame(&frame(640, 480, i * 33_333));
            recorder.on_audio_buffer(&audio(i * 33_333));
        }
        recorder.stop_recording();

        // Deliveries after stop never reach the writer.
        recorder.on_video_frame(&frame(640, 480, 400_000));
        recorder.on_audio_buffer(&audio(400_000));

        let log = factory.log.lock();
        assert_eq!(log.video.len(), 10);
        assert_eq!(log.audio.len(), 10);
        assert!(log.finalized);
        let span_us = log.video.last().unwrap().0;
        assert!((290_000..=310_000).contains(&span_us), "span {span_us}");
        assert_eq!(recorder.state(), RecorderState::Idle);
    }

    #[test]
    fn test_stop_emits_summary() {
        let factory = MockWriterFactory::default();
        let recorder = recorder_with(factory);
        let mut events = recorder.subscribe();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");
        recorder.start_recording(&path, 640, 480).unwrap();
        recorder.on_video_frame(&frame(640, 480, 0));
        recorder.on_video_frame(&frame(640, 480, 100_000));
        recorder.stop_recording();

        let mut summary = None;
        while let Ok(event) = events.try_recv() {
            if let RecorderEvent::Stopped(s) = event {
                summary = Some(s);
            }
        }
        let summary = summary.expect("stop event emitted");
        assert_eq!(summary.video_frames, 2);
        assert!((summary.duration_ms - 100.0).abs() < 1e-6);

        // sidecar written next to the output
        assert!(crate::recorder::session::sidecar_path(&path).exists());
    }

    #[test]
    fn test_write_failure_salvages_and_fails() {
        let factory = MockWriterFactory {
            fail_video_after: Some(2),
            ..Default::default()
        };
        let recorder = recorder_with(factory.clone());
        let mut events = recorder.subscribe();
        recorder.start_recording("/tmp/a.mp4", 640, 480).unwrap();

        recorder.on_video_frame(&frame(640, 480, 0));
        recorder.on_video_frame(&frame(640, 480, 33_000));
        recorder.on_video_frame(&frame(640, 480, 66_000)); // fails

        assert_eq!(recorder.state(), RecorderState::Failed);
        let log = factory.log.lock();
        assert_eq!(log.video.len(), 2);
        assert!(log.finalized, "salvage finalize ran");
        drop(log);

        let mut saw_error = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, RecorderEvent::Error(_)) {
                saw_error = true;
            }
        }
        assert!(saw_error);

        // A fresh start recovers from Failed.
        recorder.start_recording("/tmp/b.mp4", 640, 480).unwrap();
        assert_eq!(recorder.state(), RecorderState::Recording);
    }

    #[test]
    fn test_audio_gain_clamped_and_recorded() {
        let recorder = recorder_with(MockWriterFactory::default());
        recorder.set_audio_gain(2.5);
        assert_eq!(recorder.audio_gain(), 1.0);
        recorder.set_audio_gain(-0.5);
        assert_eq!(recorder.audio_gain(), 0.0);

        recorder.set_audio_gain(0.3);
        recorder.start_recording("/tmp/a.mp4", 640, 480).unwrap();
        let session = recorder.current_session().unwrap();
        assert!((session.audio_gain - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let factory = MockWriterFactory::default();
        let recorder = recorder_with(factory.clone());
        let dir = tempfile::tempdir().unwrap();
        recorder
            .start_recording(dir.path().join("a.mp4"), 640, 480)
            .unwrap();
        recorder.on_video_frame(&frame(640, 480, 0));

        recorder.dispose();
        assert_eq!(recorder.state(), RecorderState::Idle);
        assert!(factory.log.lock().finalized);

        recorder.dispose();
        assert_eq!(recorder.state(), RecorderState::Idle);
    }
}
