//! Low-light video enhancement
//!
//! This module implements the GPU-style filter chain architecture:
//! - EnhancementConfig with clamped, atomically snapshotted parameters
//! - EnhanceStage trait and the fixed-order chain of pipeline stages
//! - ProcessingContext whose failed initialization means permanent bypass
//! - EnhancementEngine tying the pieces together for both delivery paths

pub mod config;
pub mod context;
pub mod engine;
pub mod stages;

pub use config::EnhancementConfig;
pub use context::{EnhanceError, ProcessingContext};
pub use engine::EnhancementEngine;
pub use stages::{EnhanceStage, StageParams};
