//! Audio tap
//!
//! Intercepts PCM buffers from the audio render path, applies a linear gain,
//! and forwards them to the recorder. The tap holds only a weak handle to
//! the recorder so the two never form an ownership cycle; buffers arriving
//! while no session is active are dropped silently, with no backlog.

use crate::media::AudioBuffer;
use crate::recorder::MediaRecorder;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

/// Gain-applying interceptor between the audio render path and the recorder
pub struct AudioTap {
    recorder: Weak<MediaRecorder>,
    gain: RwLock<f32>,
}

impl AudioTap {
    /// Create a tap forwarding to the given recorder
    pub fn new(recorder: &Arc<MediaRecorder>) -> Self {
        Self {
            recorder: Arc::downgrade(recorder),
            gain: RwLock::new(1.0),
        }
    }

    /// Create a tap with no recorder attached; every buffer is dropped
    pub fn unbound() -> Self {
        Self {
            recorder: Weak::new(),
            gain: RwLock::new(1.0),
        }
    }

    /// Set the linear gain, clamped to [0, 1]; applies to the next buffer
    pub fn set_audio_gain(&self, gain: f32) {
        let gain = gain.clamp(0.0, 1.0);
        *self.gain.write() = gain;
        tracing::debug!("audio tap gain set to {:.2}", gain);
    }

    /// Current gain
    pub fn audio_gain(&self) -> f32 {
        *self.gain.read()
    }

    /// Audio render interception callback.
    ///
    /// Produces a gain-scaled copy and forwards it while a session is
    /// active; otherwise the buffer is dropped.
    pub fn on_samples(&self, buffer: &AudioBuffer) {
        let Some(recorder) = self.recorder.upgrade() else {
            return;
        };
        if !recorder.is_recording() {
            return;
        }
        let gain = *self.gain.read();
        let scaled = buffer.with_gain(gain);
        recorder.on_audio_buffer(&scaled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::writer::test_support::MockWriterFactory;

    fn buffer(ts_us: u64) -> AudioBuffer {
        AudioBuffer::new(vec![1000, -1000, 500, -500], 2, 48_000).with_timestamp(ts_us)
    }

    #[test]
    fn test_gain_is_clamped() {
        let tap = AudioTap::unbound();
        tap.set_audio_gain(3.0);
        assert_eq!(tap.audio_gain(), 1.0);
        tap.set_audio_gain(-1.0);
        assert_eq!(tap.audio_gain(), 0.0);
    }

    #[test]
    fn test_unbound_tap_drops_buffers() {
        let tap = AudioTap::unbound();
        // must not panic, buffer simply vanishes
        tap.on_samples(&buffer(0));
    }

    #[test]
    fn test_buffers_dropped_while_idle() {
        let factory = MockWriterFactory::default();
        let recorder = Arc::new(MediaRecorder::with_factory(Box::new(factory.clone())));
        let tap = AudioTap::new(&recorder);

        tap.on_samples(&buffer(0));
        assert!(factory.log.lock().audio.is_empty());
    }

    #[test]
    fn test_forwards_scaled_buffers_while_recording() {
        let factory = MockWriterFactory::default();
        let recorder = Arc::new(MediaRecorder::with_factory(Box::new(factory.clone())));
        let tap = AudioTap::new(&recorder);
        recorder.start_recording("/tmp/tap.mp4", 640, 480).unwrap();

        tap.set_audio_gain(0.5);
        tap.on_samples(&buffer(0));

        let log = factory.log.lock();
        assert_eq!(log.audio.len(), 1);
        assert_eq!(log.audio[0].1, vec![500, -500, 250, -250]);
    }

    #[test]
    fn test_zero_gain_silences_recorded_audio() {
        let factory = MockWriterFactory::default();
        let recorder = Arc::new(MediaRecorder::with_factory(Box::new(factory.clone())));
        let tap = AudioTap::new(&recorder);
        recorder.start_recording("/tmp/tap.mp4", 640, 480).unwrap();

        tap.set_audio_gain(0.0);
        tap.on_samples(&buffer(0));
        tap.on_samples(&buffer(10_000));

        let log = factory.log.lock();
        assert_eq!(log.audio.len(), 2);
        assert!(log.audio.iter().all(|(_, s)| s.iter().all(|&v| v == 0)));
    }

    #[test]
    fn test_tap_does_not_keep_recorder_alive() {
        let recorder = Arc::new(MediaRecorder::with_factory(Box::new(
            MockWriterFactory::default(),
        )));
        let tap = AudioTap::new(&recorder);
        drop(recorder);
        // recorder gone; forwarding degrades to a silent drop
        tap.on_samples(&buffer(0));
    }
}
