//! Validated run configuration

use std::path::PathBuf;

use crate::camera::{BitDepth, FlipMode};
use crate::capture::RetryPolicy;
use crate::config::ranges::{ExposureRange, GainRange};
use crate::output::{FilenameTemplate, OutputOptions};

/// Frames read and discarded after opening so the stream settles
pub const WARMUP_FRAMES: usize = 5;

/// Everything a capture run needs, already validated
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Camera index, required when several cameras are connected
    pub camera_index: Option<usize>,
    /// Dump camera properties and stop
    pub info_only: bool,
    /// Directory prepended to every rendered filename
    pub directory: PathBuf,
    pub template: FilenameTemplate,
    /// Unset means the run cannot start
    pub bit_depth: Option<BitDepth>,
    pub gain: GainRange,
    /// Exposure sweep in seconds
    pub exposure: ExposureRange,
    pub binning: u32,
    /// Frames averaged per sweep point
    pub stack: u32,
    pub flip: Option<FlipMode>,
    /// Brightness offset
    pub offset: i64,
    pub wb_r: Option<i64>,
    pub wb_b: Option<i64>,
    pub output: OutputOptions,
    pub retry: RetryPolicy,
    pub warmup_frames: usize,
    pub verbose: bool,
}
