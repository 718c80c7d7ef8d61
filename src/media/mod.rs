//! Shared media data model
//!
//! Frame and audio buffer types exchanged between the communication engine,
//! the enhancement chain, and the recorder.

pub mod audio;
pub mod frame;

pub use audio::AudioBuffer;
pub use frame::{I420Buffer, PixelFormat, Rotation, VideoFrame};

use std::sync::OnceLock;
use std::time::Instant;

static CLOCK_START: OnceLock<Instant> = OnceLock::new();

/// Monotonic timestamp in microseconds since the first call in this process.
///
/// Used to stamp frames and buffers produced without a source timestamp.
pub fn monotonic_us() -> u64 {
    CLOCK_START.get_or_init(Instant::now).elapsed().as_micros() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_advances() {
        let a = monotonic_us();
        let b = monotonic_us();
        assert!(b >= a);
    }
}
