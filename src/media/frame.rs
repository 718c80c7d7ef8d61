//! Video frame types
//!
//! Defines the I420 frame representation that flows through the enhancement
//! and recording pipeline. Frames are immutable once produced; processing
//! stages derive new frames rather than mutating in place.

use serde::{Deserialize, Serialize};

/// Pixel format of a video frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Planar YUV 4:2:0 (the delivery format of the communication engine)
    I420,
}

/// Frame rotation in degrees, clockwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Rotation angle in degrees
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Parse a rotation from degrees; only the four right angles are valid
    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Rotation::Deg0
    }
}

/// Planar I420 pixel buffer with explicit per-plane strides
///
/// Chroma planes are subsampled 2x2. Strides may exceed the visible row
/// width; rows are always read up to the visible width only.
#[derive(Debug, Clone)]
pub struct I420Buffer {
    width: u32,
    height: u32,
    stride_y: usize,
    stride_u: usize,
    stride_v: usize,
    y: Vec<u8>,
    u: Vec<u8>,
    v: Vec<u8>,
}

impl I420Buffer {
    /// Allocate a black frame (Y = 0, neutral chroma) with tight strides
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, 0, 128, 128)
    }

    /// Allocate a buffer with every Y/U/V sample set to the given values
    pub fn filled(width: u32, height: u32, luma: u8, cb: u8, cr: u8) -> Self {
        let stride_y = width as usize;
        let chroma_w = ((width + 1) / 2) as usize;
        let chroma_h = ((height + 1) / 2) as usize;
        Self {
            width,
            height,
            stride_y,
            stride_u: chroma_w,
            stride_v: chroma_w,
            y: vec![luma; stride_y * height as usize],
            u: vec![cb; chroma_w * chroma_h],
            v: vec![cr; chroma_w * chroma_h],
        }
    }

    /// Wrap existing planes, validating that each one covers its rows.
    /// Returns `None` when a plane is smaller than `stride * rows`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_planes(
        width: u32,
        height: u32,
        y: Vec<u8>,
        stride_y: usize,
        u: Vec<u8>,
        stride_u: usize,
        v: Vec<u8>,
        stride_v: usize,
    ) -> Option<Self> {
        let chroma_h = ((height + 1) / 2) as usize;
        if stride_y < width as usize
            || stride_u < ((width + 1) / 2) as usize
            || stride_v < ((width + 1) / 2) as usize
        {
            return None;
        }
        if y.len() < stride_y * height as usize
            || u.len() < stride_u * chroma_h
            || v.len() < stride_v * chroma_h
        {
            return None;
        }
        Some(Self {
            width,
            height,
            stride_y,
            stride_u,
            stride_v,
            y,
            u,
            v,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Chroma plane width (2x2 subsampled)
    pub fn chroma_width(&self) -> u32 {
        (self.width + 1) / 2
    }

    /// Chroma plane height (2x2 subsampled)
    pub fn chroma_height(&self) -> u32 {
        (self.height + 1) / 2
    }

    pub fn stride_y(&self) -> usize {
        self.stride_y
    }

    pub fn stride_u(&self) -> usize {
        self.stride_u
    }

    pub fn stride_v(&self) -> usize {
        self.stride_v
    }

    pub fn y(&self) -> &[u8] {
        &self.y
    }

    pub fn u(&self) -> &[u8] {
        &self.u
    }

    pub fn v(&self) -> &[u8] {
        &self.v
    }

    pub fn y_mut(&mut self) -> &mut [u8] {
        &mut self.y
    }

    pub fn u_mut(&mut self) -> &mut [u8] {
        &mut self.u
    }

    pub fn v_mut(&mut self) -> &mut [u8] {
        &mut self.v
    }
}

/// One decoded video image with format metadata and capture timestamp
///
/// The timestamp is monotonic with microsecond resolution. Ownership moves
/// to whichever stage currently processes the frame.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    buffer: I420Buffer,
    format: PixelFormat,
    rotation: Rotation,
    timestamp_us: u64,
}

impl VideoFrame {
    /// Create a frame stamped with the current monotonic time
    pub fn new(buffer: I420Buffer, rotation: Rotation) -> Self {
        Self {
            buffer,
            format: PixelFormat::I420,
            rotation,
            timestamp_us: super::monotonic_us(),
        }
    }

    /// Replace the capture timestamp (sources that stamp frames themselves)
    pub fn with_timestamp(mut self, timestamp_us: u64) -> Self {
        self.timestamp_us = timestamp_us;
        self
    }

    /// Derive a frame with processed pixels, preserving all metadata
    pub fn with_buffer(&self, buffer: I420Buffer) -> Self {
        Self {
            buffer,
            format: self.format,
            rotation: self.rotation,
            timestamp_us: self.timestamp_us,
        }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn timestamp_us(&self) -> u64 {
        self.timestamp_us
    }

    pub fn buffer(&self) -> &I420Buffer {
        &self.buffer
    }
}
