use std::time::Duration;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::camera::device::CameraDevice;
use crate::camera::types::{
    CameraInfo, ControlCaps, ControlKind, FlipMode, ImageFormat, Roi,
};
use crate::common::error::{DarkFrameError, Result};

/// USB bandwidth share requested when the session opens.
pub const DEFAULT_BANDWIDTH: i64 = 80;

/// Requested changes to the camera state. `None` leaves a control untouched.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    pub gain: Option<i64>,
    /// Exposure in microseconds
    pub exposure_us: Option<i64>,
    pub wb_b: Option<i64>,
    pub wb_r: Option<i64>,
    pub gamma: Option<i64>,
    /// Brightness offset
    pub offset: Option<i64>,
    pub flip: Option<FlipMode>,
    /// Binning factor, 1 when unset
    pub binning: Option<u32>,
    /// Region of interest, full frame at the chosen binning when unset
    pub roi: Option<Roi>,
    /// Pixel format, previous format when unset
    pub format: Option<ImageFormat>,
}

/// Values the session last pushed to the camera
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedSettings {
    pub gain: Option<i64>,
    pub exposure_us: Option<i64>,
    pub wb_b: Option<i64>,
    pub wb_r: Option<i64>,
    pub gamma: Option<i64>,
    pub offset: Option<i64>,
    pub flip: FlipMode,
    pub roi: Roi,
    pub format: ImageFormat,
}

#[derive(Serialize)]
struct CameraReport<'a> {
    info: &'a CameraInfo,
    controls: &'a [ControlCaps],
}

/// An open camera plus the configuration applied to it.
pub struct CameraSession<C: CameraDevice> {
    camera: C,
    name: String,
    settings: AppliedSettings,
}

impl<C: CameraDevice> CameraSession<C> {
    /// Stops any stale capture, applies the camera's defaults and starts streaming.
    #[instrument(skip(camera), fields(camera = %camera.info().name))]
    pub fn open(mut camera: C) -> Result<Self> {
        debug!("Creating camera session");
        camera.stop_video()?;
        camera.stop_exposure()?;

        let info = camera.info().clone();
        let name = info.sanitized_name();
        let format = if info.is_color {
            ImageFormat::Rgb24
        } else {
            ImageFormat::Raw8
        };
        let binning = info.supported_bins.first().copied().unwrap_or(1);

        let mut session = Self {
            settings: AppliedSettings {
                gain: None,
                exposure_us: None,
                wb_b: None,
                wb_r: None,
                gamma: None,
                offset: None,
                flip: FlipMode::None,
                roi: Roi::full_frame(&info, binning),
                format,
            },
            camera,
            name,
        };

        if session.control_caps(ControlKind::BandwidthOverload).is_some() {
            session
                .camera
                .set_control(ControlKind::BandwidthOverload, DEFAULT_BANDWIDTH)?;
        }

        let baseline = Configuration {
            gain: session.default_value(ControlKind::Gain),
            exposure_us: session.default_value(ControlKind::Exposure),
            wb_b: session.default_value(ControlKind::WbB),
            wb_r: session.default_value(ControlKind::WbR),
            gamma: session.default_value(ControlKind::Gamma),
            offset: None,
            flip: session
                .default_value(ControlKind::Flip)
                .map(FlipMode::from_sdk_value),
            binning: Some(binning),
            roi: None,
            format: Some(format),
        };
        session.configure(&baseline)?;

        Ok(session)
    }

    /// Applies `config`. The stream is stopped first and restarted afterwards.
    #[instrument(skip(self, config), fields(gain = ?config.gain, exposure_us = ?config.exposure_us))]
    pub fn configure(&mut self, config: &Configuration) -> Result<()> {
        self.camera.stop_video()?;
        self.camera.stop_exposure()?;

        if let Some(exposure) = config.exposure_us {
            self.camera.set_control(ControlKind::Exposure, exposure)?;
            self.settings.exposure_us = Some(exposure);
        }
        if let Some(gain) = config.gain {
            self.camera.set_control(ControlKind::Gain, gain)?;
            self.settings.gain = Some(gain);
        }
        if let Some(wb_b) = config.wb_b {
            self.camera.set_control(ControlKind::WbB, wb_b)?;
            self.settings.wb_b = Some(wb_b);
        }
        if let Some(wb_r) = config.wb_r {
            self.camera.set_control(ControlKind::WbR, wb_r)?;
            self.settings.wb_r = Some(wb_r);
        }
        if let Some(gamma) = config.gamma {
            self.camera.set_control(ControlKind::Gamma, gamma)?;
            self.settings.gamma = Some(gamma);
        }
        if let Some(offset) = config.offset {
            self.camera.set_control(ControlKind::Offset, offset)?;
            self.settings.offset = Some(offset);
        }
        if let Some(flip) = config.flip {
            self.camera.set_control(ControlKind::Flip, flip.sdk_value())?;
            self.settings.flip = flip;
        }

        let binning = config.binning.unwrap_or(1);
        let roi = config
            .roi
            .unwrap_or_else(|| Roi::full_frame(self.camera.info(), binning));
        let format = config.format.unwrap_or(self.settings.format);
        let roi = self.camera.set_roi(roi, format)?;
        self.settings.roi = roi;
        self.settings.format = format;

        self.camera.start_video()?;
        debug!(?roi, ?format, "Camera configured");
        Ok(())
    }

    /// Sensor temperature in degrees Celsius.
    pub fn temperature(&mut self) -> Result<f64> {
        Ok(self.camera.get_control(ControlKind::Temperature)? as f64 / 10.0)
    }

    /// Exposure time currently set on the camera.
    pub fn exposure_time(&mut self) -> Result<Duration> {
        let exposure_us = self.camera.get_control(ControlKind::Exposure)?;
        Ok(Duration::from_micros(exposure_us.max(0) as u64))
    }

    /// Stops and restarts the video stream after an abandoned capture.
    pub fn reset_stream(&mut self) -> Result<()> {
        self.halt()?;
        self.camera.start_video()
    }

    /// Stops any video stream or exposure in flight.
    pub fn halt(&mut self) -> Result<()> {
        self.camera.stop_video()?;
        self.camera.stop_exposure()
    }

    pub fn validate_binning(&self, binning: u32) -> Result<()> {
        let supported = &self.camera.info().supported_bins;
        if supported.contains(&binning) {
            Ok(())
        } else {
            Err(DarkFrameError::UnsupportedBinning {
                requested: binning,
                supported: supported.clone(),
            })
        }
    }

    pub fn validate_format(&self, format: ImageFormat) -> Result<()> {
        let info = self.camera.info();
        if info.supported_formats.contains(&format) {
            Ok(())
        } else {
            Err(DarkFrameError::UnsupportedFormat(format!(
                "{} does not stream {:?}, supported: {:?}",
                info.name, format, info.supported_formats
            )))
        }
    }

    pub fn control_caps(&self, kind: ControlKind) -> Option<&ControlCaps> {
        self.camera
            .controls()
            .iter()
            .find(|caps| caps.kind() == Some(kind))
    }

    pub fn default_value(&self, kind: ControlKind) -> Option<i64> {
        self.control_caps(kind).map(|caps| caps.default_value)
    }

    /// Camera properties and controls as pretty-printed JSON.
    pub fn report(&self) -> Result<String> {
        let report = CameraReport {
            info: self.camera.info(),
            controls: self.camera.controls(),
        };
        serde_json::to_string_pretty(&report).map_err(|e| DarkFrameError::EncodeError(e.to_string()))
    }

    /// Sanitized camera model name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> &CameraInfo {
        self.camera.info()
    }

    pub fn settings(&self) -> &AppliedSettings {
        &self.settings
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut C {
        &mut self.camera
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::simulator::SimulatedCamera;

    #[test]
    fn test_open_applies_defaults_and_streams() {
        let session = CameraSession::open(SimulatedCamera::mono("ZWO ASI120MM Mini")).unwrap();

        assert_eq!(session.name(), "zwo_asi120mm_mini");
        assert!(session.camera().is_streaming());
        assert_eq!(session.settings().format, ImageFormat::Raw8);
        assert_eq!(
            session.camera().control_value(ControlKind::BandwidthOverload),
            Some(DEFAULT_BANDWIDTH)
        );
        assert_eq!(session.settings().gain, session.default_value(ControlKind::Gain));
    }

    #[test]
    fn test_configure_records_applied_values() {
        let mut session = CameraSession::open(SimulatedCamera::mono("sim")).unwrap();
        let config = Configuration {
            gain: Some(120),
            exposure_us: Some(5_000_000),
            flip: Some(FlipMode::Both),
            binning: Some(2),
            format: Some(ImageFormat::Raw16),
            ..Default::default()
        };
        session.configure(&config).unwrap();

        let settings = session.settings();
        assert_eq!(settings.gain, Some(120));
        assert_eq!(settings.exposure_us, Some(5_000_000));
        assert_eq!(settings.flip, FlipMode::Both);
        assert_eq!(settings.roi.binning, 2);
        assert_eq!(settings.format, ImageFormat::Raw16);
        assert_eq!(session.camera().control_value(ControlKind::Flip), Some(3));
        assert_eq!(session.exposure_time().unwrap(), Duration::from_secs(5));
        assert!(session.camera().is_streaming());
    }

    #[test]
    fn test_settings_record_roi_applied_by_camera() {
        let camera = SimulatedCamera::mono("sim").with_sensor(100, 51);
        let mut session = CameraSession::open(camera).unwrap();
        session
            .configure(&Configuration {
                binning: Some(1),
                ..Default::default()
            })
            .unwrap();

        let roi = session.settings().roi;
        assert_eq!((roi.width, roi.height), (96, 50));
    }

    #[test]
    fn test_binning_validation() {
        let session = CameraSession::open(SimulatedCamera::mono("sim")).unwrap();
        assert!(session.validate_binning(2).is_ok());
        let err = session.validate_binning(3).unwrap_err();
        assert!(matches!(err, DarkFrameError::UnsupportedBinning { requested: 3, .. }));
    }

    #[test]
    fn test_mono_camera_rejects_color_format() {
        let session = CameraSession::open(SimulatedCamera::mono("sim")).unwrap();
        assert!(matches!(
            session.validate_format(ImageFormat::Rgb24),
            Err(DarkFrameError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_temperature_is_reported_in_celsius() {
        let camera = SimulatedCamera::mono("sim").with_temperatures(vec![-125]);
        let mut session = CameraSession::open(camera).unwrap();
        assert_eq!(session.temperature().unwrap(), -12.5);
    }

    #[test]
    fn test_report_contains_info_and_controls() {
        let session = CameraSession::open(SimulatedCamera::mono("ZWO ASI120MM Mini")).unwrap();
        let report = session.report().unwrap();
        assert!(report.contains("\"info\""));
        assert!(report.contains("ZWO ASI120MM Mini"));
        assert!(report.contains("\"Gain\""));
        // controls are dumped with the numeric SDK id
        assert!(report.contains("\"control_type\": 0"));
    }
}
