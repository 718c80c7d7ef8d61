//! Single-frame capture
//!
//! Saves one video frame to a PNG file, converting from I420 and applying
//! the frame's rotation so the image is upright. `SnapshotSink` adapts this
//! to the renderer-style callback for one-shot "capture frame" requests.

use crate::media::{I420Buffer, Rotation, VideoFrame};
use crate::pipeline::VideoSink;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Snapshot errors
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PNG encoding error: {0}")]
    Png(#[from] png::EncodingError),
}

/// Save a frame as a PNG file, rotating it upright
pub fn save_frame_png(frame: &VideoFrame, path: &Path) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let rgb = i420_to_rgb(frame.buffer());
    let (rgb, width, height) = rotate_rgb(rgb, frame.width(), frame.height(), frame.rotation());

    let file = fs::File::create(path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&rgb)?;
    writer.finish()?;

    tracing::debug!("saved {}x{} snapshot to {:?}", width, height, path);
    Ok(())
}

/// BT.601 limited-range I420 to packed RGB
fn i420_to_rgb(buf: &I420Buffer) -> Vec<u8> {
    let width = buf.width() as usize;
    let height = buf.height() as usize;
    let mut rgb = Vec::with_capacity(width * height * 3);

    for row in 0..height {
        let y_base = row * buf.stride_y();
        let u_base = (row / 2) * buf.stride_u();
        let v_base = (row / 2) * buf.stride_v();
        for col in 0..width {
            let c = buf.y()[y_base + col] as f32 - 16.0;
            let d = buf.u()[u_base + col / 2] as f32 - 128.0;
            let e = buf.v()[v_base + col / 2] as f32 - 128.0;

            let r = 1.164 * c + 1.596 * e;
            let g = 1.164 * c - 0.392 * d - 0.813 * e;
            let b = 1.164 * c + 2.017 * d;

            rgb.push(r.round().clamp(0.0, 255.0) as u8);
            rgb.push(g.round().clamp(0.0, 255.0) as u8);
            rgb.push(b.round().clamp(0.0, 255.0) as u8);
        }
    }
    rgb
}

/// Rotate packed RGB clockwise by the frame rotation; returns the rotated
/// buffer and its dimensions
fn rotate_rgb(rgb: Vec<u8>, width: u32, height: u32, rotation: Rotation) -> (Vec<u8>, u32, u32) {
    if rotation == Rotation::Deg0 {
        return (rgb, width, height);
    }

    let (w, h) = (width as usize, height as usize);
    let (out_w, out_h) = match rotation {
        Rotation::Deg90 | Rotation::Deg270 => (h, w),
        _ => (w, h),
    };

    let mut out = vec![0u8; out_w * out_h * 3];
    for y_out in 0..out_h {
        for x_out in 0..out_w {
            let (x_src, y_src) = match rotation {
                Rotation::Deg90 => (y_out, h - 1 - x_out),
                Rotation::Deg180 => (w - 1 - x_out, h - 1 - y_out),
                Rotation::Deg270 => (w - 1 - y_out, x_out),
                Rotation::Deg0 => unreachable!(),
            };
            let src = (y_src * w + x_src) * 3;
            let dst = (y_out * out_w + x_out) * 3;
            out[dst..dst + 3].copy_from_slice(&rgb[src..src + 3]);
        }
    }
    (out, out_w as u32, out_h as u32)
}

/// One-shot sink that captures the first frame it sees to a file
pub struct SnapshotSink {
    path: PathBuf,
    done: AtomicBool,
}

impl SnapshotSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            done: AtomicBool::new(false),
        }
    }

    /// True once a frame has been captured (or a capture attempt failed)
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

impl VideoSink for SnapshotSink {
    fn on_frame(&self, frame: &VideoFrame) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = save_frame_png(frame, &self.path) {
            tracing::error!("snapshot capture failed: {e}");
        }
    }
}
