//! Recording session metadata
//!
//! Tracks the identity and parameters of one start-to-stop recording
//! lifecycle, and the summary sidecar written next to the output file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Parameters of an active recording session
///
/// The output path is fixed for the session's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Unique session id
    pub id: Uuid,

    /// Output container file path
    pub file_path: PathBuf,

    /// Encoded video width in pixels
    pub video_width: u32,

    /// Encoded video height in pixels
    pub video_height: u32,

    /// Linear audio gain, 0.0 to 1.0
    pub audio_gain: f32,

    /// Wall-clock time the session was opened
    pub started_at: DateTime<Utc>,
}

impl SessionInfo {
    /// Create session metadata for a new recording
    pub fn new(file_path: PathBuf, video_width: u32, video_height: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_path,
            video_width,
            video_height,
            audio_gain: 1.0,
            started_at: Utc::now(),
        }
    }
}

/// Summary of a completed recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: Uuid,

    pub file_path: PathBuf,

    /// Media timeline length in milliseconds (largest relative timestamp)
    pub duration_ms: f64,

    /// Video frames written to the container
    pub video_frames: u64,

    /// Audio buffers written to the container
    pub audio_buffers: u64,
}

/// Sidecar path for a given output file (`<output>.session.json`)
pub fn sidecar_path(output: &Path) -> PathBuf {
    let mut name = output.file_name().unwrap_or_default().to_os_string();
    name.push(".session.json");
    output.with_file_name(name)
}

/// Write the session summary sidecar next to the output file
pub fn write_sidecar(summary: &SessionSummary) -> io::Result<()> {
    let content = serde_json::to_string_pretty(summary)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    std::fs::write(sidecar_path(&summary.file_path), content)
}
