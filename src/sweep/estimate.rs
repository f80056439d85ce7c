use std::fmt;

use crate::camera::{BitDepth, CameraInfo};
use crate::sweep::plan::SweepPlan;

/// Duration and storage forecast printed before the sweep starts
#[derive(Debug, Clone, PartialEq)]
pub struct RunEstimate {
    /// Total exposure time in minutes
    pub minutes: f64,
    /// Frames captured, stacking included
    pub exposures: u64,
    pub files: u64,
    /// Raw frame storage in MiB
    pub megabytes: u64,
    pub gains: Vec<i64>,
    pub exposures_s: Vec<f64>,
}

impl RunEstimate {
    pub fn new(plan: &SweepPlan, stack: u32, info: &CameraInfo, bit_depth: BitDepth) -> Self {
        let stack = u64::from(stack);
        let gains = plan.gains().len() as u64;
        let exposure_sum_us: i64 = plan.exposures_us().iter().sum();
        let total_seconds = gains as f64 * exposure_sum_us as f64 * 1e-6 * stack as f64;

        let files = plan.len() as u64;
        let exposures = files * stack;
        let bytes = exposures as f64
            * info.max_width as f64
            * info.max_height as f64
            * f64::from(bit_depth.bits())
            / 8.0;

        Self {
            minutes: total_seconds / 60.0,
            exposures,
            files,
            megabytes: (bytes / (1024.0 * 1024.0)) as u64,
            gains: plan.gains().to_vec(),
            exposures_s: plan.exposures_us().iter().map(|&us| us as f64 / 1e6).collect(),
        }
    }

    /// Gain and exposure lists shown in verbose mode
    pub fn detail_lines(&self) -> [String; 2] {
        let exposures: Vec<String> = self.exposures_s.iter().map(|s| format!("{s:.1}")).collect();
        [
            format!("Scanning gain levels {:?}", self.gains),
            format!("Exposure durations [{}]", exposures.join(", ")),
        ]
    }
}

impl fmt::Display for RunEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "This run will take approximately {:.1}min. Estimated size {} files, {}MB",
            self.minutes, self.files, self.megabytes
        )
    }
}
