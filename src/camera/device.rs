use std::time::Duration;

use crate::camera::types::{CameraInfo, ControlCaps, ControlKind, Frame, ImageFormat, Roi};
use crate::common::error::Result;

/// Capabilities the capture sweep needs from one open camera.
pub trait CameraDevice {
    fn info(&self) -> &CameraInfo;
    fn controls(&self) -> &[ControlCaps];
    fn get_control(&mut self, kind: ControlKind) -> Result<i64>;
    fn set_control(&mut self, kind: ControlKind, value: i64) -> Result<()>;
    /// Applies `roi` and `format`, returning the ROI the camera actually uses.
    fn set_roi(&mut self, roi: Roi, format: ImageFormat) -> Result<Roi>;
    fn start_video(&mut self) -> Result<()>;
    fn stop_video(&mut self) -> Result<()>;
    fn stop_exposure(&mut self) -> Result<()>;

    /// Blocks for at most `wait` for the next video frame.
    ///
    /// Returns `Ok(None)` when no frame became ready in time; the caller decides
    /// whether to wait again or give up.
    fn capture_frame(&mut self, wait: Duration) -> Result<Option<Frame>>;
}

/// Discovers and opens cameras.
pub trait CameraProvider {
    type Camera: CameraDevice;

    /// Names of the connected cameras, indexed by the value `open` expects.
    fn cameras(&self) -> Result<Vec<String>>;
    fn open(&self, index: usize) -> Result<Self::Camera>;
}
