//! Enhancement engine
//!
//! Runs the low-light chain over frames from the local and remote delivery
//! paths. Configuration updates are atomic with respect to frame processing,
//! and any internal failure degrades to bypass; video delivery is never
//! interrupted by the enhancement layer.

use crate::media::VideoFrame;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::config::EnhancementConfig;
use super::context::ProcessingContext;
use super::stages::{mean_luma, standard_chain, EnhanceStage, StageParams};

/// How often each path logs its processing statistics
const STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Which delivery path a frame arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramePath {
    Local,
    Remote,
}

impl FramePath {
    fn label(self) -> &'static str {
        match self {
            FramePath::Local => "local",
            FramePath::Remote => "remote",
        }
    }
}

#[derive(Default)]
struct PathStats {
    frames: u64,
    total_us: u64,
    last_log: Option<Instant>,
}

impl PathStats {
    fn record(&mut self, elapsed: Duration, path: FramePath) {
        self.frames += 1;
        self.total_us += elapsed.as_micros() as u64;

        let now = Instant::now();
        let due = self
            .last_log
            .map(|t| now.duration_since(t) >= STATS_INTERVAL)
            .unwrap_or(true);
        if due && self.frames > 0 {
            let avg_ms = self.total_us as f64 / self.frames as f64 / 1000.0;
            tracing::debug!(
                "{} enhancement: {} frames, {:.2} ms avg",
                path.label(),
                self.frames,
                avg_ms
            );
            self.last_log = Some(now);
            self.frames = 0;
            self.total_us = 0;
        }
    }
}

/// Stateful low-light enhancement engine
pub struct EnhancementEngine {
    config: RwLock<EnhancementConfig>,
    stages: Vec<Box<dyn EnhanceStage>>,
    context: RwLock<Option<Arc<ProcessingContext>>>,
    local_stats: Mutex<PathStats>,
    remote_stats: Mutex<PathStats>,
}

impl EnhancementEngine {
    /// Create an engine with the default configuration.
    ///
    /// If the processing context cannot be initialized the engine comes up
    /// in permanent bypass mode: every frame is returned unchanged and the
    /// failure is reported through logging only.
    pub fn new() -> Self {
        Self::with_config(EnhancementConfig::default())
    }

    /// Create an engine with an explicit starting configuration
    pub fn with_config(config: EnhancementConfig) -> Self {
        let context = match ProcessingContext::new() {
            Ok(ctx) => Some(Arc::new(ctx)),
            Err(e) => {
                tracing::warn!("enhancement unavailable, frames pass through unchanged: {e}");
                None
            }
        };
        Self {
            config: RwLock::new(config),
            stages: standard_chain(),
            context: RwLock::new(context),
            local_stats: Mutex::new(PathStats::default()),
            remote_stats: Mutex::new(PathStats::default()),
        }
    }

    /// Enable or disable enhancement; takes effect on the next frame
    pub fn set_enabled(&self, enabled: bool) {
        self.config.write().enabled = enabled;
        tracing::debug!("enhancement {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Set enhancement intensity, clamped to [0, 1]
    pub fn set_intensity(&self, intensity: f32) {
        let mut config = self.config.write();
        config.set_intensity(intensity);
        tracing::debug!(
            "enhancement intensity set to {:.2}, gamma {:.2}",
            config.intensity,
            config.gamma
        );
    }

    /// Set the brightness bypass threshold, clamped to [0, 1]
    pub fn set_brightness_threshold(&self, threshold: f32) {
        let mut config = self.config.write();
        config.set_brightness_threshold(threshold);
        tracing::debug!(
            "enhancement brightness threshold set to {:.2}",
            config.brightness_threshold
        );
    }

    /// Current configuration snapshot
    pub fn config(&self) -> EnhancementConfig {
        *self.config.read()
    }

    /// True when the engine can only pass frames through (context failed to
    /// initialize, or the engine was disposed)
    pub fn is_bypassed(&self) -> bool {
        self.context.read().is_none()
    }

    /// Process a locally captured frame
    pub fn process_frame(&self, frame: VideoFrame) -> VideoFrame {
        self.process_path(frame, FramePath::Local)
    }

    /// Process a remotely received frame.
    ///
    /// Same chain as the local path; kept separate because the two callback
    /// paths may grow independent enable flags later.
    pub fn process_remote_frame(&self, frame: VideoFrame) -> VideoFrame {
        self.process_path(frame, FramePath::Remote)
    }

    fn process_path(&self, frame: VideoFrame, path: FramePath) -> VideoFrame {
        let Some(context) = self.context.read().clone() else {
            return frame;
        };
        let config = *self.config.read();
        if !config.enabled || config.intensity <= 0.0 {
            return frame;
        }
        if frame.width() == 0 || frame.height() == 0 {
            return frame;
        }

        // Bright frames skip the chain entirely.
        let luma = mean_luma(frame.buffer());
        if luma / 255.0 >= config.brightness_threshold {
            return frame;
        }

        let start = Instant::now();
        let params = StageParams::from(&config);
        let mut buffer = frame.buffer().clone();
        context.run(|| {
            for stage in &self.stages {
                stage.apply(&mut buffer, &params);
            }
        });
        let processed = frame.with_buffer(buffer);

        let stats = match path {
            FramePath::Local => &self.local_stats,
            FramePath::Remote => &self.remote_stats,
        };
        stats.lock().record(start.elapsed(), path);

        processed
    }

    /// Release the processing context. Subsequent calls are no-ops and all
    /// later frames pass through unchanged.
    pub fn dispose(&self) {
        if self.context.write().take().is_some() {
            tracing::debug!("enhancement engine disposed");
        }
    }
}

impl Default for EnhancementEngine {
    fn default() -> Self {
        Self::new()
    }
}
