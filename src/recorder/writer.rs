//! Output writer backends
//!
//! The recorder talks to its output through the `MediaWriter` trait so
//! platform adapters can plug in native muxers. The default backend stages
//! the session with FFmpeg: raw I420 frames are piped to an encoder child
//! process, PCM audio is staged as WAV, and the two are muxed into the
//! session's output file at finalize.

use crate::media::{AudioBuffer, VideoFrame};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use tempfile::TempDir;

use super::RecordingError;

/// Nominal input cadence declared to the raw video pipe.
///
/// Per-frame timing beyond the shared timeline origin is handled at mux
/// time; drift correction between the streams is out of scope.
pub const NOMINAL_FPS: u32 = 30;

/// Sink for one recording session's media
pub trait MediaWriter: Send {
    /// Append a video frame; `pts_us` is relative to the session origin
    fn write_video(&mut self, frame: &VideoFrame, pts_us: u64) -> io::Result<()>;

    /// Append an audio buffer; `pts_us` is relative to the session origin
    fn write_audio(&mut self, buffer: &AudioBuffer, pts_us: u64) -> io::Result<()>;

    /// Flush everything and produce the final output file
    fn finalize(self: Box<Self>) -> io::Result<()>;
}

/// Opens a `MediaWriter` for a new session
pub trait WriterFactory: Send + Sync {
    fn open(
        &self,
        path: &Path,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn MediaWriter>, RecordingError>;
}

/// Default factory producing FFmpeg-backed writers
pub struct FfmpegWriterFactory {
    /// Cadence declared for the raw video pipe
    pub fps: u32,
}

impl Default for FfmpegWriterFactory {
    fn default() -> Self {
        Self { fps: NOMINAL_FPS }
    }
}

impl WriterFactory for FfmpegWriterFactory {
    fn open(
        &self,
        path: &Path,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn MediaWriter>, RecordingError> {
        if path.as_os_str().is_empty() {
            return Err(RecordingError::InvalidOutputPath(
                "output path is empty".to_string(),
            ));
        }
        if width == 0 || height == 0 {
            return Err(RecordingError::WriterInit(format!(
                "video dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    RecordingError::InvalidOutputPath(format!(
                        "cannot create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }
        let writer = FfmpegWriter::open(path.to_path_buf(), width, height, self.fps)?;
        Ok(Box::new(writer))
    }
}

struct WavTrack {
    writer: hound::WavWriter<io::BufWriter<fs::File>>,
    path: PathBuf,
}

/// FFmpeg-backed session writer
pub struct FfmpegWriter {
    output_path: PathBuf,
    width: u32,
    height: u32,
    staging: TempDir,
    video_path: PathBuf,
    encoder: Child,
    video_stdin: Option<ChildStdin>,
    audio: Option<WavTrack>,
    first_video_pts_us: Option<u64>,
    first_audio_pts_us: Option<u64>,
}

impl FfmpegWriter {
    fn open(
        output_path: PathBuf,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Self, RecordingError> {
        let staging = tempfile::tempdir()
            .map_err(|e| RecordingError::WriterInit(format!("cannot create staging dir: {e}")))?;
        let video_path = staging.path().join("video.mp4");

        let args = build_encode_args(width, height, fps, &video_path);
        tracing::debug!("starting video encoder: ffmpeg {:?}", args);

        let mut encoder = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| RecordingError::WriterInit(format!("failed to start encoder: {e}")))?;

        let video_stdin = encoder
            .stdin
            .take()
            .ok_or_else(|| RecordingError::WriterInit("failed to open encoder stdin".into()))?;

        Ok(Self {
            output_path,
            width,
            height,
            staging,
            video_path,
            encoder,
            video_stdin: Some(video_stdin),
            audio: None,
            first_video_pts_us: None,
            first_audio_pts_us: None,
        })
    }
}

impl MediaWriter for FfmpegWriter {
    fn write_video(&mut self, frame: &VideoFrame, pts_us: u64) -> io::Result<()> {
        debug_assert_eq!(frame.width(), self.width);
        debug_assert_eq!(frame.height(), self.height);

        self.first_video_pts_us.get_or_insert(pts_us);

        let stdin = self
            .video_stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "encoder pipe closed"))?;

        // Raw I420 layout: packed Y rows, then U, then V.
        let buf = frame.buffer();
        let (w, h) = (buf.width() as usize, buf.height() as usize);
        for row in 0..h {
            let base = row * buf.stride_y();
            stdin.write_all(&buf.y()[base..base + w])?;
        }
        let (cw, ch) = (buf.chroma_width() as usize, buf.chroma_height() as usize);
        for row in 0..ch {
            let base = row * buf.stride_u();
            stdin.write_all(&buf.u()[base..base + cw])?;
        }
        for row in 0..ch {
            let base = row * buf.stride_v();
            stdin.write_all(&buf.v()[base..base + cw])?;
        }
        Ok(())
    }

    fn write_audio(&mut self, buffer: &AudioBuffer, pts_us: u64) -> io::Result<()> {
        self.first_audio_pts_us.get_or_insert(pts_us);

        if self.audio.is_none() {
            // WAV format follows the first delivered buffer.
            let path = self.staging.path().join("audio.wav");
            let spec = hound::WavSpec {
                channels: buffer.channels(),
                sample_rate: buffer.sample_rate(),
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            };
            let writer = hound::WavWriter::create(&path, spec).map_err(hound_err)?;
            self.audio = Some(WavTrack { writer, path });
        }

        if let Some(track) = self.audio.as_mut() {
            for &sample in buffer.samples() {
                track.writer.write_sample(sample).map_err(hound_err)?;
            }
        }
        Ok(())
    }

    fn finalize(self: Box<Self>) -> io::Result<()> {
        let FfmpegWriter {
            output_path,
            staging,
            video_path,
            mut encoder,
            video_stdin,
            audio,
            first_video_pts_us,
            first_audio_pts_us,
            ..
        } = *self;

        // Closing stdin signals EOF to the encoder.
        drop(video_stdin);
        let status = encoder.wait()?;
        if !status.success() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("video encoder exited with {status}"),
            ));
        }

        match audio {
            Some(track) => {
                track.writer.finalize().map_err(hound_err)?;
                let args = build_mux_args(
                    &video_path,
                    first_video_pts_us.unwrap_or(0),
                    &track.path,
                    first_audio_pts_us.unwrap_or(0),
                    &output_path,
                );
                tracing::debug!("muxing session output: ffmpeg {:?}", args);
                let output = Command::new("ffmpeg")
                    .args(&args)
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::piped())
                    .output()?;
                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    return Err(io::Error::new(
                        io::ErrorKind::Other,
                        format!(
                            "mux failed: {}",
                            stderr.chars().take(500).collect::<String>()
                        ),
                    ));
                }
            }
            None => {
                // Video-only session: the staging file is already a
                // finalized MP4.
                fs::copy(&video_path, &output_path)?;
            }
        }

        drop(staging);
        Ok(())
    }
}

fn hound_err(e: hound::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

fn offset_secs(us: u64) -> String {
    format!("{:.6}", us as f64 / 1_000_000.0)
}

/// Arguments for the raw-I420 video encoder child process
fn build_encode_args(width: u32, height: u32, fps: u32, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-s".to_string(),
        format!("{}x{}", width, height),
        "-r".to_string(),
        fps.to_string(),
        "-i".to_string(),
        "-".to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "fast".to_string(),
        "-crf".to_string(),
        "23".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// Arguments muxing the staged video and audio into the session output.
///
/// Each input carries an offset so both streams land on the shared timeline
/// origin: whichever stream started later is shifted by its first relative
/// timestamp.
fn build_mux_args(
    video: &Path,
    video_offset_us: u64,
    audio: &Path,
    audio_offset_us: u64,
    output: &Path,
) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-itsoffset".to_string(),
        offset_secs(video_offset_us),
        "-i".to_string(),
        video.to_string_lossy().to_string(),
        "-itsoffset".to_string(),
        offset_secs(audio_offset_us),
        "-i".to_string(),
        audio.to_string_lossy().to_string(),
        "-map".to_string(),
        "0:v".to_string(),
        "-map".to_string(),
        "1:a".to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Mock writer recording every delivery, shared by recorder and
    //! pipeline tests.

    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    pub struct WriterLog {
        /// (pts_us, width, height) per video frame
        pub video: Vec<(u64, u32, u32)>,
        /// (pts_us, samples) per audio buffer
        pub audio: Vec<(u64, Vec<i16>)>,
        pub finalized: bool,
        pub opened: usize,
    }

    #[derive(Clone, Default)]
    pub struct MockWriterFactory {
        pub log: Arc<Mutex<WriterLog>>,
        pub fail_open: bool,
        /// Fail video writes once this many frames were accepted
        pub fail_video_after: Option<usize>,
    }

    impl WriterFactory for MockWriterFactory {
        fn open(
            &self,
            _path: &Path,
            _width: u32,
            _height: u32,
        ) -> Result<Box<dyn MediaWriter>, RecordingError> {
            if self.fail_open {
                return Err(RecordingError::WriterInit("mock writer refused to open".into()));
            }
            self.log.lock().opened += 1;
            Ok(Box::new(MockWriter {
                log: self.log.clone(),
                fail_video_after: self.fail_video_after,
            }))
        }
    }

    struct MockWriter {
        log: Arc<Mutex<WriterLog>>,
        fail_video_after: Option<usize>,
    }

    impl MediaWriter for MockWriter {
        fn write_video(&mut self, frame: &VideoFrame, pts_us: u64) -> io::Result<()> {
            let mut log = self.log.lock();
            if let Some(limit) = self.fail_video_after {
                if log.video.len() >= limit {
                    return Err(io::Error::new(io::ErrorKind::Other, "mock write failure"));
                }
            }
            log.video.push((pts_us, frame.width(), frame.height()));
            Ok(())
        }

        fn write_audio(&mut self, buffer: &AudioBuffer, pts_us: u64) -> io::Result<()> {
            self.log.lock().audio.push((pts_us, buffer.samples().to_vec()));
            Ok(())
        }

        fn finalize(self: Box<Self>) -> io::Result<()> {
            self.log.lock().finalized = true;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_args_shape() {
        let args = build_encode_args(640, 480, 30, Path::new("/tmp/video.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo"));
        assert!(joined.contains("-pix_fmt yuv420p"));
        assert!(joined.contains("-s 640x480"));
        assert!(joined.contains("-r 30"));
        assert!(joined.contains("libx264"));
        assert_eq!(args.last().unwrap(), "/tmp/video.mp4");
    }

    #[test]
    fn test_mux_args_carry_stream_offsets() {
        let args = build_mux_args(
            Path::new("v.mp4"),
            0,
            Path::new("a.wav"),
            250_000,
            Path::new("out.mp4"),
        );
        let joined = args.join(" ");
        assert!(joined.contains("-itsoffset 0.000000 -i v.mp4"));
        assert!(joined.contains("-itsoffset 0.250000 -i a.wav"));
        assert!(joined.contains("-map 0:v -map 1:a"));
        assert!(joined.contains("-c:v copy"));
        assert!(joined.contains("-c:a aac"));
        assert!(joined.contains("+faststart"));
    }

    #[test]
    fn test_factory_rejects_empty_path() {
        let factory = FfmpegWriterFactory::default();
        match factory.open(Path::new(""), 640, 480) {
            Err(RecordingError::InvalidOutputPath(_)) => {}
            other => panic!("expected InvalidOutputPath, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_factory_rejects_zero_dimensions() {
        let factory = FfmpegWriterFactory::default();
        match factory.open(Path::new("/tmp/out.mp4"), 0, 480) {
            Err(RecordingError::WriterInit(_)) => {}
            other => panic!("expected WriterInit, got {:?}", other.map(|_| ())),
        }
    }
}
