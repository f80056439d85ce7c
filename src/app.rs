//! Top-level run: camera selection, info dump or the full capture sweep.

use tracing::{info, instrument};

use crate::camera::{CameraProvider, CameraSession};
use crate::capture::Interrupt;
use crate::common::error::{DarkFrameError, Result};
use crate::config::RunConfig;
use crate::sweep::{RunEstimate, SweepDriver, SweepReport};

/// How a run ended without error
#[derive(Debug)]
pub enum RunOutcome {
    NoCamera,
    /// Several cameras are connected and none was chosen
    SelectionRequired(Vec<String>),
    /// Camera properties as JSON
    Info(String),
    MissingBitDepth,
    Completed(SweepReport),
}

fn select_camera(names: &[String], requested: Option<usize>) -> Result<Option<usize>> {
    match requested {
        Some(index) if index < names.len() => Ok(Some(index)),
        Some(index) => Err(DarkFrameError::InvalidArgument(format!(
            "camera index {index} out of range, {} camera(s) connected",
            names.len()
        ))),
        None if names.len() == 1 => Ok(Some(0)),
        None => Ok(None),
    }
}

/// Runs one capture session against `provider`.
///
/// `on_estimate` is called once the sweep is planned and warmed up, before the
/// first point is captured.
#[instrument(skip_all)]
pub fn run<P: CameraProvider>(
    provider: &P,
    config: &RunConfig,
    interrupt: &Interrupt,
    on_estimate: impl FnOnce(&RunEstimate),
) -> Result<RunOutcome> {
    let names = provider.cameras()?;
    if names.is_empty() {
        return Ok(RunOutcome::NoCamera);
    }
    let Some(index) = select_camera(&names, config.camera_index)? else {
        return Ok(RunOutcome::SelectionRequired(names));
    };
    if !config.info_only && config.bit_depth.is_none() {
        return Ok(RunOutcome::MissingBitDepth);
    }

    info!(index, camera = %names[index], "Opening camera");
    let session = CameraSession::open(provider.open(index)?)?;
    if config.info_only {
        return Ok(RunOutcome::Info(session.report()?));
    }

    let mut driver = SweepDriver::new(session, config.clone(), interrupt.clone());
    let plan = driver.prepare()?;
    driver.warm_up()?;
    on_estimate(&driver.estimate(&plan)?);

    let report = driver.run(&plan)?;
    Ok(RunOutcome::Completed(report))
}
