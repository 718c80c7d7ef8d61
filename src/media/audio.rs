//! Audio buffer type
//!
//! One chunk of raw interleaved 16-bit PCM with format metadata. Buffers are
//! immutable; gain is applied by producing a new buffer.

/// PCM buffer delivered by the audio render path
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    samples: Vec<i16>,
    channels: u16,
    sample_rate: u32,
    timestamp_us: u64,
}

impl AudioBuffer {
    /// Create a buffer stamped with the current monotonic time
    pub fn new(samples: Vec<i16>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels,
            sample_rate,
            timestamp_us: super::monotonic_us(),
        }
    }

    /// Replace the presentation timestamp
    pub fn with_timestamp(mut self, timestamp_us: u64) -> Self {
        self.timestamp_us = timestamp_us;
        self
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn timestamp_us(&self) -> u64 {
        self.timestamp_us
    }

    /// Number of frames (samples per channel)
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Duration of this buffer in milliseconds
    pub fn duration_ms(&self) -> f64 {
        (self.frame_count() as f64 / self.sample_rate as f64) * 1000.0
    }

    /// Produce a new buffer with every sample scaled by `gain`.
    ///
    /// Callers clamp gain to [0, 1], so no clipping guard is needed here.
    pub fn with_gain(&self, gain: f32) -> Self {
        let samples = self
            .samples
            .iter()
            .map(|&s| (s as f32 * gain).round() as i16)
            .collect();
        Self {
            samples,
            channels: self.channels,
            sample_rate: self.sample_rate,
            timestamp_us: self.timestamp_us,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_count_and_duration() {
        let buf = AudioBuffer::new(vec![0; 960], 2, 48_000);
        assert_eq!(buf.frame_count(), 480);
        assert!((buf.duration_ms() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_gain_zero_silences() {
        let buf = AudioBuffer::new(vec![100, -200, 32767, -32768], 1, 48_000);
        let silent = buf.with_gain(0.0);
        assert!(silent.samples().iter().all(|&s| s == 0));
    }

    #[test]
    fn test_gain_unity_is_identity() {
        let buf = AudioBuffer::new(vec![100, -200, 3000], 1, 48_000);
        assert_eq!(buf.with_gain(1.0).samples(), buf.samples());
    }

    #[test]
    fn test_gain_is_linear() {
        // Applying g1 then g2/g1 must match applying g2 directly, within
        // the quantization error of the intermediate i16 rounding.
        let buf = AudioBuffer::new((-500..500).map(|s| s * 30).collect(), 1, 48_000);
        let (g1, g2) = (0.8_f32, 0.2_f32);
        let staged = buf.with_gain(g1).with_gain(g2 / g1);
        let direct = buf.with_gain(g2);
        for (a, b) in staged.samples().iter().zip(direct.samples()) {
            assert!((a - b).abs() <= 2, "staged {} vs direct {}", a, b);
        }
    }

    #[test]
    fn test_gain_preserves_metadata() {
        let buf = AudioBuffer::new(vec![1; 96], 2, 44_100).with_timestamp(555);
        let scaled = buf.with_gain(0.5);
        assert_eq!(scaled.channels(), 2);
        assert_eq!(scaled.sample_rate(), 44_100);
        assert_eq!(scaled.timestamp_us(), 555);
    }
}
