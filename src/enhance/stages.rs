//! Enhancement chain stages
//!
//! The low-light chain is an ordered list of stages, each a pure function of
//! (planes, params). Every stage is the identity transform at intensity 0
//! and reaches its maximum configured effect at intensity 1, so the chain's
//! overall effect strength is monotone in intensity.

use crate::media::I420Buffer;
use rayon::prelude::*;

use super::config::EnhancementConfig;

/// Maximum contrast factor at full intensity
const CONTRAST_MAX: f32 = 1.8;
/// Maximum blend toward the 3x3 neighborhood average at full intensity
const NOISE_BLEND_MAX: f32 = 0.35;
/// Maximum chroma pull toward neutral at full intensity
const CHROMA_DESAT_MAX: f32 = 0.2;
/// Maximum luma added to a fully dark pixel at full intensity
const LIFT_MAX: f32 = 60.0;

/// Parameters passed to every stage, derived from one config snapshot
#[derive(Debug, Clone, Copy)]
pub struct StageParams {
    pub intensity: f32,
    pub gamma: f32,
    pub brightness_threshold: f32,
}

impl From<&EnhancementConfig> for StageParams {
    fn from(cfg: &EnhancementConfig) -> Self {
        Self {
            intensity: cfg.intensity,
            gamma: cfg.gamma,
            brightness_threshold: cfg.brightness_threshold,
        }
    }
}

/// One stage of the enhancement chain
pub trait EnhanceStage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Transform the planes in place; must be the identity at intensity 0
    fn apply(&self, frame: &mut I420Buffer, params: &StageParams);
}

/// Build the chain in its fixed order
pub fn standard_chain() -> Vec<Box<dyn EnhanceStage>> {
    vec![
        Box::new(GammaCorrect),
        Box::new(ContrastBoost),
        Box::new(NoiseReduction),
        Box::new(BrightnessLift),
    ]
}

/// Mean luma of the Y plane, 0.0 to 255.0.
///
/// Large frames are subsampled; the gate only needs a coarse estimate.
pub fn mean_luma(buffer: &I420Buffer) -> f32 {
    let width = buffer.width() as usize;
    let height = buffer.height() as usize;
    if width == 0 || height == 0 {
        return 0.0;
    }
    let step = if height >= 64 { 4 } else { 1 };
    let stride = buffer.stride_y();
    let y = buffer.y();

    let mut sum = 0u64;
    let mut count = 0u64;
    for row in (0..height).step_by(step) {
        let base = row * stride;
        for col in (0..width).step_by(step) {
            sum += y[base + col] as u64;
            count += 1;
        }
    }
    sum as f32 / count as f32
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Apply a 256-entry lookup table to the visible part of the Y plane
fn apply_y_lut(frame: &mut I420Buffer, lut: &[u8; 256]) {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let stride = frame.stride_y();
    let plane = &mut frame.y_mut()[..stride * height];
    plane.par_chunks_mut(stride).for_each(|row| {
        for px in &mut row[..width] {
            *px = lut[*px as usize];
        }
    });
}

fn apply_chroma_lut(plane: &mut [u8], width: usize, height: usize, stride: usize, lut: &[u8; 256]) {
    let plane = &mut plane[..stride * height];
    plane.par_chunks_mut(stride).for_each(|row| {
        for px in &mut row[..width] {
            *px = lut[*px as usize];
        }
    });
}

/// Gamma correction scaled by intensity.
///
/// The effective exponent runs from 1.0 (identity) down to the configured
/// gamma; exponents below 1.0 brighten shadows.
pub struct GammaCorrect;

impl EnhanceStage for GammaCorrect {
    fn name(&self) -> &'static str {
        "gamma"
    }

    fn apply(&self, frame: &mut I420Buffer, params: &StageParams) {
        let exponent = lerp(1.0, params.gamma, params.intensity);
        let mut lut = [0u8; 256];
        for (i, out) in lut.iter_mut().enumerate() {
            let normalized = i as f32 / 255.0;
            *out = (normalized.powf(exponent) * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        apply_y_lut(frame, &lut);
    }
}

/// Contrast boost around mid-gray, scaled by intensity
pub struct ContrastBoost;

impl EnhanceStage for ContrastBoost {
    fn name(&self) -> &'static str {
        "contrast"
    }

    fn apply(&self, frame: &mut I420Buffer, params: &StageParams) {
        let factor = lerp(1.0, CONTRAST_MAX, params.intensity);
        let mut lut = [0u8; 256];
        for (i, out) in lut.iter_mut().enumerate() {
            let normalized = i as f32 / 255.0;
            let contrasted = (normalized - 0.5) * factor + 0.5;
            *out = (contrasted * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        apply_y_lut(frame, &lut);
    }
}

/// Noise reduction: luma blends toward its 3x3 neighborhood average, and
/// chroma pulls toward neutral to suppress low-light color noise.
pub struct NoiseReduction;

impl EnhanceStage for NoiseReduction {
    fn name(&self) -> &'static str {
        "noise-reduction"
    }

    fn apply(&self, frame: &mut I420Buffer, params: &StageParams) {
        let width = frame.width() as usize;
        let height = frame.height() as usize;
        let stride = frame.stride_y();
        let blend = params.intensity * NOISE_BLEND_MAX;

        if blend > 0.0 && width > 0 && height > 0 {
            let src = frame.y().to_vec();
            let plane = &mut frame.y_mut()[..stride * height];
            plane.par_chunks_mut(stride).enumerate().for_each(|(row_idx, row)| {
                for x in 0..width {
                    let mut sum = 0u32;
                    for dy in -1i32..=1 {
                        for dx in -1i32..=1 {
                            let ny = (row_idx as i32 + dy).clamp(0, height as i32 - 1) as usize;
                            let nx = (x as i32 + dx).clamp(0, width as i32 - 1) as usize;
                            sum += src[ny * stride + nx] as u32;
                        }
                    }
                    let avg = sum as f32 / 9.0;
                    let original = row[x] as f32;
                    row[x] = (original + blend * (avg - original))
                        .round()
                        .clamp(0.0, 255.0) as u8;
                }
            });
        }

        let desat = params.intensity * CHROMA_DESAT_MAX;
        if desat > 0.0 {
            let mut lut = [0u8; 256];
            for (i, out) in lut.iter_mut().enumerate() {
                let centered = i as f32 - 128.0;
                *out = (128.0 + centered * (1.0 - desat)).round().clamp(0.0, 255.0) as u8;
            }
            let cw = frame.chroma_width() as usize;
            let ch = frame.chroma_height() as usize;
            let su = frame.stride_u();
            apply_chroma_lut(frame.u_mut(), cw, ch, su, &lut);
            let sv = frame.stride_v();
            apply_chroma_lut(frame.v_mut(), cw, ch, sv, &lut);
        }
    }
}

/// Brightness lift weighted toward dark pixels.
///
/// Pixels below the brightness threshold gain up to LIFT_MAX luma, fading
/// to zero at the threshold so the lift never posterizes midtones.
pub struct BrightnessLift;

impl EnhanceStage for BrightnessLift {
    fn name(&self) -> &'static str {
        "brightness-lift"
    }

    fn apply(&self, frame: &mut I420Buffer, params: &StageParams) {
        let threshold = params.brightness_threshold * 255.0;
        if threshold <= 0.0 || params.intensity <= 0.0 {
            return;
        }
        let mut lut = [0u8; 256];
        for (i, out) in lut.iter_mut().enumerate() {
            let value = i as f32;
            let lifted = if value < threshold {
                value + params.intensity * (1.0 - value / threshold) * LIFT_MAX
            } else {
                value
            };
            *out = lifted.round().clamp(0.0, 255.0) as u8;
        }
        apply_y_lut(frame, &lut);
    }
}
