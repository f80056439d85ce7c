use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::camera::{
    BitDepth, CameraDevice, CameraSession, Configuration, ControlCaps, ControlKind, Frame,
};
use crate::capture::{Interrupt, capture_with_retry};
use crate::common::error::{DarkFrameError, Result};
use crate::config::RunConfig;
use crate::output::{FrameLabel, ImageWriter, OutputFormat, StandardImageWriter};
use crate::sweep::estimate::RunEstimate;
use crate::sweep::plan::{SweepPlan, SweepPoint};
use crate::sweep::stack::FrameStack;

/// Files written by a finished sweep
#[derive(Debug)]
pub struct SweepReport {
    pub files: Vec<PathBuf>,
}

/// Drives an open camera through the gain/exposure grid and writes one stacked
/// frame per point.
pub struct SweepDriver<C: CameraDevice, W: ImageWriter> {
    session: CameraSession<C>,
    writer: W,
    config: RunConfig,
    interrupt: Interrupt,
}

impl<C: CameraDevice> SweepDriver<C, StandardImageWriter> {
    pub fn new(session: CameraSession<C>, config: RunConfig, interrupt: Interrupt) -> Self {
        Self {
            session,
            writer: StandardImageWriter,
            config,
            interrupt,
        }
    }
}

impl<C: CameraDevice, W: ImageWriter> SweepDriver<C, W> {
    pub fn with_custom(
        session: CameraSession<C>,
        writer: W,
        config: RunConfig,
        interrupt: Interrupt,
    ) -> Self {
        Self {
            session,
            writer,
            config,
            interrupt,
        }
    }

    fn bit_depth(&self) -> Result<BitDepth> {
        self.config.bit_depth.ok_or_else(|| {
            DarkFrameError::InvalidArgument("Must specify a bit depth of 8, 16, or 24".to_string())
        })
    }

    fn caps(&self, kind: ControlKind) -> Result<ControlCaps> {
        self.session
            .control_caps(kind)
            .cloned()
            .ok_or_else(|| DarkFrameError::camera("control_caps", format!("{} not reported", kind.name())))
    }

    /// Checks the camera-dependent options and resolves the sweep plan.
    #[instrument(skip(self))]
    pub fn prepare(&self) -> Result<SweepPlan> {
        let bit_depth = self.bit_depth()?;
        self.session.validate_binning(self.config.binning)?;
        self.session.validate_format(bit_depth.format())?;

        let sample = FrameLabel {
            temp: 0,
            gain: 0,
            exposure_us: 0,
            model: self.session.name().to_string(),
            stack: self.config.stack,
        };
        OutputFormat::from_path(Path::new(&self.config.template.render(&sample)))?;

        SweepPlan::resolve(
            &self.config.gain,
            &self.config.exposure,
            &self.caps(ControlKind::Gain)?,
            &self.caps(ControlKind::Exposure)?,
        )
    }

    /// Reads and discards frames until the stream has settled.
    #[instrument(skip(self), fields(frames = self.config.warmup_frames))]
    pub fn warm_up(&mut self) -> Result<()> {
        for _ in 0..self.config.warmup_frames {
            capture_with_retry(&mut self.session, &self.config.retry, &self.interrupt)?;
        }
        Ok(())
    }

    pub fn estimate(&self, plan: &SweepPlan) -> Result<RunEstimate> {
        Ok(RunEstimate::new(
            plan,
            self.config.stack,
            self.session.info(),
            self.bit_depth()?,
        ))
    }

    /// Captures every point of `plan`. Stops at the first error, including an interrupt.
    #[instrument(skip(self, plan), fields(points = plan.len()))]
    pub fn run(&mut self, plan: &SweepPlan) -> Result<SweepReport> {
        let bit_depth = self.bit_depth()?;
        let mut files = Vec::with_capacity(plan.len());

        for point in plan.points() {
            files.push(self.capture_point(point, bit_depth)?);
        }

        info!(files = files.len(), "Sweep complete");
        Ok(SweepReport { files })
    }

    #[instrument(skip_all, fields(exposure_us = point.exposure_us, gain = point.gain))]
    fn capture_point(&mut self, point: SweepPoint, bit_depth: BitDepth) -> Result<PathBuf> {
        let offset = self
            .session
            .control_caps(ControlKind::Offset)
            .map(|_| self.config.offset);
        let configuration = Configuration {
            gain: Some(point.gain),
            exposure_us: Some(point.exposure_us),
            wb_b: self.config.wb_b,
            wb_r: self.config.wb_r,
            gamma: None,
            offset,
            flip: self.config.flip,
            binning: Some(self.config.binning),
            roi: None,
            format: Some(bit_depth.format()),
        };
        self.session.configure(&configuration)?;

        let mut stack = FrameStack::new();
        for n in 0..self.config.stack {
            // sensor temperature drifts with exposure time, sample it every frame
            let temperature = self.session.temperature()?;
            info!(
                "n:{n:2} exp:{:.1}s gain:{:3} temp:{temperature:+5.1}'C",
                point.exposure_us as f64 / 1e6,
                point.gain
            );
            let frame = capture_with_retry(&mut self.session, &self.config.retry, &self.interrupt)?;
            stack.push_frame(&frame)?;
            stack.push_temperature(temperature);
        }
        stack.push_temperature(self.session.temperature()?);

        let settings = self.session.settings();
        let label = FrameLabel {
            temp: stack.temperature().unwrap_or_default(),
            gain: settings.gain.unwrap_or(point.gain),
            exposure_us: settings.exposure_us.unwrap_or(point.exposure_us).max(0) as u64,
            model: self.session.name().to_string(),
            stack: self.config.stack,
        };
        let path = self.config.directory.join(self.config.template.render(&label));

        let averaged = {
            let _span = tracing::info_span!("average_frames", frames = stack.frame_count()).entered();
            stack.average()?
        };
        self.write_frame(&averaged, &path)?;
        Ok(path)
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    fn write_frame(&self, frame: &Frame, path: &Path) -> Result<()> {
        let format = OutputFormat::from_path(path)?;

        let mut encoded = Vec::new();
        {
            let _span = tracing::info_span!("encode_image").entered();
            self.writer
                .write_image(frame, format, &mut encoded, &self.config.output)?;
        }

        let write_error =
            |e: std::io::Error| DarkFrameError::OutputWriteError(format!("{}: {}", path.display(), e));
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        if path.exists() {
            fs::remove_file(path).map_err(write_error)?;
        }
        fs::write(path, &encoded).map_err(write_error)?;

        debug!(bytes = encoded.len(), "Dark frame written");
        Ok(())
    }

    pub fn session(&self) -> &CameraSession<C> {
        &self.session
    }
}
