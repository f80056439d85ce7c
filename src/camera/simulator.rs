//! Simulated camera used by tests and `--simulate` dry runs.
//!
//! The simulator keeps its observable state (stream on/off, captured settings)
//! in a shared log so it can still be inspected after the session owning the
//! camera has been dropped.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::trace;

use crate::camera::device::{CameraDevice, CameraProvider};
use crate::camera::types::{CameraInfo, ControlCaps, ControlKind, Frame, ImageFormat, Roi};
use crate::capture::Interrupt;
use crate::common::error::{DarkFrameError, Result};

/// Scripted outcome of one `capture_frame` call
#[derive(Debug, Clone)]
pub enum SimulatedCapture {
    /// Deliver a frame
    Frame,
    /// No frame within the wait
    NotReady,
    /// Never deliver until the stream is stopped
    Stall,
    /// SDK error with the given code
    Fail(String),
    /// Trigger the interrupt, then report no frame
    Interrupt(Interrupt),
}

/// Settings in effect when a frame was delivered
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRecord {
    pub gain: i64,
    pub exposure_us: i64,
    pub format: ImageFormat,
}

#[derive(Debug, Default)]
pub struct SimulatorLog {
    pub streaming: bool,
    pub exposing: bool,
    pub captures: Vec<CaptureRecord>,
    pub stream_stops: usize,
}

#[derive(Debug, Clone)]
pub struct SimulatedCamera {
    info: CameraInfo,
    controls: Vec<ControlCaps>,
    values: HashMap<ControlKind, i64>,
    /// Temperature readings in tenths of a degree, cycled
    temperatures: Vec<i64>,
    temperature_index: usize,
    /// Pixel values of successive frames, cycled
    pixel_values: Vec<u16>,
    pixel_index: usize,
    script: VecDeque<SimulatedCapture>,
    /// A `Stall` is blocking the stream; cleared when the stream stops
    stalled: bool,
    roi: Roi,
    format: ImageFormat,
    log: Arc<Mutex<SimulatorLog>>,
}

fn caps(kind: ControlKind, min: i64, max: i64, default: i64, writable: bool) -> ControlCaps {
    ControlCaps {
        name: kind.name().to_string(),
        description: format!("{} (simulated)", kind.name()),
        min_value: min,
        max_value: max,
        default_value: default,
        is_auto_supported: false,
        is_writable: writable,
        control_type: kind.sdk_id(),
    }
}

impl SimulatedCamera {
    /// Small monochrome sensor with a 0..=400 gain range.
    pub fn mono(name: &str) -> Self {
        let info = CameraInfo {
            name: name.to_string(),
            camera_id: 0,
            max_width: 64,
            max_height: 48,
            is_color: false,
            supported_bins: vec![1, 2],
            supported_formats: vec![ImageFormat::Raw8, ImageFormat::Raw16],
            pixel_size_um: 3.75,
            is_cooler_cam: false,
            is_usb3_camera: true,
            elec_per_adu: 1.0,
            bit_depth: 12,
        };
        let controls = vec![
            caps(ControlKind::Gain, 0, 400, 120, true),
            caps(ControlKind::Exposure, 32, 2_000_000_000, 10_000, true),
            caps(ControlKind::Gamma, 1, 100, 50, true),
            caps(ControlKind::Offset, 0, 100, 8, true),
            caps(ControlKind::BandwidthOverload, 40, 100, 50, true),
            caps(ControlKind::Temperature, -500, 1000, 20, false),
            caps(ControlKind::Flip, 0, 3, 0, true),
        ];
        Self::with_parts(info, controls)
    }

    /// Colour sensor, adds RGB24 and white balance controls.
    pub fn color(name: &str) -> Self {
        let mut camera = Self::mono(name);
        camera.info.is_color = true;
        camera.info.supported_formats = vec![ImageFormat::Raw8, ImageFormat::Rgb24, ImageFormat::Raw16];
        camera.controls.push(caps(ControlKind::WbR, 1, 99, 52, true));
        camera.controls.push(caps(ControlKind::WbB, 1, 99, 95, true));
        camera
    }

    fn with_parts(info: CameraInfo, controls: Vec<ControlCaps>) -> Self {
        let roi = Roi::full_frame(&info, 1);
        Self {
            info,
            controls,
            values: HashMap::new(),
            temperatures: vec![250],
            temperature_index: 0,
            pixel_values: vec![0],
            pixel_index: 0,
            script: VecDeque::new(),
            stalled: false,
            roi,
            format: ImageFormat::Raw8,
            log: Arc::new(Mutex::new(SimulatorLog::default())),
        }
    }

    pub fn with_sensor(mut self, width: usize, height: usize) -> Self {
        self.info.max_width = width;
        self.info.max_height = height;
        self.roi = Roi::full_frame(&self.info, 1);
        self
    }

    pub fn with_gain_range(mut self, min: i64, max: i64) -> Self {
        if let Some(gain) = self
            .controls
            .iter_mut()
            .find(|c| c.kind() == Some(ControlKind::Gain))
        {
            gain.min_value = min;
            gain.max_value = max;
            gain.default_value = min;
        }
        self
    }

    /// Temperature readings in tenths of a degree Celsius.
    pub fn with_temperatures(mut self, readings: Vec<i64>) -> Self {
        self.temperatures = readings;
        self
    }

    pub fn with_pixel_values(mut self, values: Vec<u16>) -> Self {
        self.pixel_values = values;
        self
    }

    pub fn with_script(mut self, script: Vec<SimulatedCapture>) -> Self {
        self.script = script.into();
        self
    }

    pub fn log(&self) -> MutexGuard<'_, SimulatorLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Shared handle on the log, valid after the camera is dropped.
    pub fn shared_log(&self) -> Arc<Mutex<SimulatorLog>> {
        self.log.clone()
    }

    pub fn is_streaming(&self) -> bool {
        self.log().streaming
    }

    pub fn control_value(&self, kind: ControlKind) -> Option<i64> {
        self.values.get(&kind).copied()
    }

    fn caps_for(&self, kind: ControlKind) -> Result<&ControlCaps> {
        self.controls
            .iter()
            .find(|c| c.kind() == Some(kind))
            .ok_or_else(|| DarkFrameError::camera("control", "ASI_ERROR_INVALID_CONTROL_TYPE"))
    }

    fn next_frame(&mut self) -> Frame {
        let index = self.pixel_index % self.pixel_values.len().max(1);
        let value = self.pixel_values.get(index).copied().unwrap_or(0);
        self.pixel_index += 1;
        Frame::filled(self.roi.width, self.roi.height, self.format, value)
    }
}

impl CameraDevice for SimulatedCamera {
    fn info(&self) -> &CameraInfo {
        &self.info
    }

    fn controls(&self) -> &[ControlCaps] {
        &self.controls
    }

    fn get_control(&mut self, kind: ControlKind) -> Result<i64> {
        let default = self.caps_for(kind)?.default_value;
        if kind == ControlKind::Temperature && !self.temperatures.is_empty() {
            let reading = self.temperatures[self.temperature_index % self.temperatures.len()];
            self.temperature_index += 1;
            return Ok(reading);
        }
        Ok(self.values.get(&kind).copied().unwrap_or(default))
    }

    fn set_control(&mut self, kind: ControlKind, value: i64) -> Result<()> {
        let caps = self.caps_for(kind)?;
        if !caps.is_writable || value < caps.min_value || value > caps.max_value {
            return Err(DarkFrameError::camera("set_control", "ASI_ERROR_OUTOF_BOUNDARY"));
        }
        self.values.insert(kind, value);
        Ok(())
    }

    fn set_roi(&mut self, roi: Roi, format: ImageFormat) -> Result<Roi> {
        if !self.info.supported_formats.contains(&format)
            || !self.info.supported_bins.contains(&roi.binning)
        {
            return Err(DarkFrameError::camera("set_roi", "ASI_ERROR_INVALID_SIZE"));
        }
        let roi = roi.aligned();
        self.roi = roi;
        self.format = format;
        Ok(roi)
    }

    fn start_video(&mut self) -> Result<()> {
        self.log().streaming = true;
        Ok(())
    }

    fn stop_video(&mut self) -> Result<()> {
        {
            let mut log = self.log();
            log.streaming = false;
            log.stream_stops += 1;
        }
        if self.stalled {
            self.stalled = false;
            if matches!(self.script.front(), Some(SimulatedCapture::Stall)) {
                self.script.pop_front();
            }
        }
        Ok(())
    }

    fn stop_exposure(&mut self) -> Result<()> {
        self.log().exposing = false;
        Ok(())
    }

    fn capture_frame(&mut self, wait: Duration) -> Result<Option<Frame>> {
        if !self.is_streaming() {
            return Err(DarkFrameError::camera("capture", "ASI_ERROR_INVALID_SEQUENCE"));
        }
        self.log().exposing = true;

        match self.script.pop_front().unwrap_or(SimulatedCapture::Frame) {
            SimulatedCapture::Frame => {
                let frame = self.next_frame();
                let record = CaptureRecord {
                    gain: self.values.get(&ControlKind::Gain).copied().unwrap_or_default(),
                    exposure_us: self
                        .values
                        .get(&ControlKind::Exposure)
                        .copied()
                        .unwrap_or_default(),
                    format: self.format,
                };
                trace!(?record, "Simulated frame delivered");
                let mut log = self.log();
                log.exposing = false;
                log.captures.push(record);
                Ok(Some(frame))
            }
            SimulatedCapture::NotReady => {
                std::thread::sleep(wait);
                Ok(None)
            }
            SimulatedCapture::Stall => {
                self.script.push_front(SimulatedCapture::Stall);
                self.stalled = true;
                std::thread::sleep(wait);
                Ok(None)
            }
            SimulatedCapture::Fail(code) => {
                self.log().exposing = false;
                Err(DarkFrameError::camera("capture", code))
            }
            SimulatedCapture::Interrupt(interrupt) => {
                interrupt.trigger();
                Ok(None)
            }
        }
    }
}

/// Provider over a fixed set of simulated cameras.
#[derive(Debug, Clone, Default)]
pub struct SimulatedSdk {
    cameras: Vec<SimulatedCamera>,
}

impl SimulatedSdk {
    pub fn new(cameras: Vec<SimulatedCamera>) -> Self {
        Self { cameras }
    }

    pub fn single(camera: SimulatedCamera) -> Self {
        Self::new(vec![camera])
    }
}

impl CameraProvider for SimulatedSdk {
    type Camera = SimulatedCamera;

    fn cameras(&self) -> Result<Vec<String>> {
        Ok(self.cameras.iter().map(|c| c.info.name.clone()).collect())
    }

    fn open(&self, index: usize) -> Result<SimulatedCamera> {
        self.cameras
            .get(index)
            .cloned()
            .ok_or_else(|| DarkFrameError::camera("open", "ASI_ERROR_INVALID_INDEX"))
    }
}
