use tracing::debug;

use crate::camera::ControlCaps;
use crate::common::error::{DarkFrameError, Result};
use crate::config::{Bound, ExposureRange, GainRange};

/// One (exposure, gain) setting in the sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPoint {
    pub exposure_us: i64,
    pub gain: i64,
}

/// Gain and exposure values with every automatic bound resolved
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPlan {
    gains: Vec<i64>,
    exposures_us: Vec<i64>,
}

/// Inclusive `min..=max` grid, `floor((max - min) / step) + 1` values.
fn grid(min: i64, max: i64, step: i64) -> Vec<i64> {
    if step <= 0 || max < min {
        return Vec::new();
    }
    let count = (max - min) / step + 1;
    (0..count).map(|i| min + i * step).collect()
}

fn seconds_to_us(seconds: f64) -> i64 {
    (seconds * 1e6).round() as i64
}

fn check_within(what: &str, min: i64, max: i64, caps: &ControlCaps) -> Result<()> {
    if max < min {
        return Err(DarkFrameError::InvalidArgument(format!(
            "resolved {what} range {min}..{max} is empty"
        )));
    }
    if min < caps.min_value || max > caps.max_value {
        return Err(DarkFrameError::InvalidArgument(format!(
            "{what} range {min}..{max} outside camera limits {}..{}",
            caps.min_value, caps.max_value
        )));
    }
    Ok(())
}

impl SweepPlan {
    /// Builds the plan, filling automatic bounds from the camera's control limits.
    ///
    /// Automatic gain covers the middle half of the camera range in twentieths
    /// of the range. Automatic exposure bounds are the camera's own limits.
    pub fn resolve(
        gain: &GainRange,
        exposure: &ExposureRange,
        gain_caps: &ControlCaps,
        exposure_caps: &ControlCaps,
    ) -> Result<Self> {
        let span = gain_caps.max_value - gain_caps.min_value;
        let mid = gain_caps.min_value + span / 2;
        let gain_min = gain.min.resolve(|| mid - span / 4);
        let gain_max = gain.max.resolve(|| mid + span / 4);
        let gain_step = gain.step.resolve(|| (span / 20).max(1));
        check_within("gain", gain_min, gain_max, gain_caps)?;

        let exposure_min = match exposure.min {
            Bound::Auto => exposure_caps.min_value,
            Bound::Fixed(seconds) => seconds_to_us(seconds),
        };
        let exposure_max = match exposure.max {
            Bound::Auto => exposure_caps.max_value,
            Bound::Fixed(seconds) => seconds_to_us(seconds),
        };
        let exposure_step = seconds_to_us(exposure.step).max(1);
        check_within("exposure", exposure_min, exposure_max, exposure_caps)?;

        let plan = Self {
            gains: grid(gain_min, gain_max, gain_step),
            exposures_us: grid(exposure_min, exposure_max, exposure_step),
        };
        debug!(gains = ?plan.gains, exposures_us = ?plan.exposures_us, "Sweep plan resolved");
        Ok(plan)
    }

    /// Points in capture order: exposures outer, gains inner.
    pub fn points(&self) -> impl Iterator<Item = SweepPoint> + '_ {
        self.exposures_us.iter().flat_map(move |&exposure_us| {
            self.gains
                .iter()
                .map(move |&gain| SweepPoint { exposure_us, gain })
        })
    }

    pub fn len(&self) -> usize {
        self.gains.len() * self.exposures_us.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn gains(&self) -> &[i64] {
        &self.gains
    }

    pub fn exposures_us(&self) -> &[i64] {
        &self.exposures_us
    }
}
