//! Enhancement configuration
//!
//! Tunable parameters for the low-light chain. Out-of-range input is always
//! clamped to the nearest bound, never rejected.

use serde::{Deserialize, Serialize};

/// Lower bound for the gamma exponent
pub const GAMMA_MIN: f32 = 0.1;
/// Upper bound for the gamma exponent
pub const GAMMA_MAX: f32 = 2.0;

/// Configuration snapshot for the enhancement chain
///
/// The struct is `Copy` so a frame in flight always observes one consistent
/// snapshot, never a torn update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementConfig {
    /// Master switch; disabled means frames pass through untouched
    pub enabled: bool,
    /// Enhancement strength, 0.0 (identity) to 1.0 (maximum effect)
    pub intensity: f32,
    /// Gamma exponent applied to luma; values below 1.0 brighten shadows
    pub gamma: f32,
    /// Mean-luma threshold above which frames bypass enhancement entirely
    pub brightness_threshold: f32,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            intensity: 0.6,
            gamma: 0.6,
            brightness_threshold: 0.3,
        }
    }
}

impl EnhancementConfig {
    /// Set the intensity, clamped to [0, 1].
    ///
    /// Gamma adapts with intensity (0.3 at zero up to 0.8 at full strength)
    /// so stronger enhancement also lifts shadows harder.
    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity.clamp(0.0, 1.0);
        self.gamma = 0.3 + self.intensity * 0.5;
    }

    /// Set the gamma exponent, clamped to its valid range
    pub fn set_gamma(&mut self, gamma: f32) {
        self.gamma = gamma.clamp(GAMMA_MIN, GAMMA_MAX);
    }

    /// Set the bypass threshold, clamped to [0, 1]
    pub fn set_brightness_threshold(&mut self, threshold: f32) {
        self.brightness_threshold = threshold.clamp(0.0, 1.0);
    }
}
