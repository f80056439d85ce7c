//! Camera data types

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Controls the capture sweep reads or writes. Discriminants follow the SDK's
/// control type numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    Gain,
    Exposure,
    Gamma,
    WbR,
    WbB,
    Offset,
    BandwidthOverload,
    Temperature,
    Flip,
}

impl ControlKind {
    pub const ALL: [ControlKind; 9] = [
        ControlKind::Gain,
        ControlKind::Exposure,
        ControlKind::Gamma,
        ControlKind::WbR,
        ControlKind::WbB,
        ControlKind::Offset,
        ControlKind::BandwidthOverload,
        ControlKind::Temperature,
        ControlKind::Flip,
    ];

    pub fn sdk_id(self) -> i32 {
        match self {
            ControlKind::Gain => 0,
            ControlKind::Exposure => 1,
            ControlKind::Gamma => 2,
            ControlKind::WbR => 3,
            ControlKind::WbB => 4,
            ControlKind::Offset => 5,
            ControlKind::BandwidthOverload => 6,
            ControlKind::Temperature => 8,
            ControlKind::Flip => 9,
        }
    }

    pub fn from_sdk_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.sdk_id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            ControlKind::Gain => "Gain",
            ControlKind::Exposure => "Exposure",
            ControlKind::Gamma => "Gamma",
            ControlKind::WbR => "WB_R",
            ControlKind::WbB => "WB_B",
            ControlKind::Offset => "Offset",
            ControlKind::BandwidthOverload => "BandWidth",
            ControlKind::Temperature => "Temperature",
            ControlKind::Flip => "Flip",
        }
    }
}

/// Pixel formats the camera can stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImageFormat {
    /// 8-bit single channel (mono or raw Bayer)
    Raw8,
    /// 8-bit per channel colour, delivered by the SDK as BGR
    Rgb24,
    /// 16-bit single channel, little-endian
    Raw16,
    /// 8-bit luminance
    Y8,
}

impl ImageFormat {
    pub fn sdk_id(self) -> i32 {
        match self {
            ImageFormat::Raw8 => 0,
            ImageFormat::Rgb24 => 1,
            ImageFormat::Raw16 => 2,
            ImageFormat::Y8 => 3,
        }
    }

    pub fn from_sdk_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(ImageFormat::Raw8),
            1 => Some(ImageFormat::Rgb24),
            2 => Some(ImageFormat::Raw16),
            3 => Some(ImageFormat::Y8),
            _ => None,
        }
    }

    pub fn channels(self) -> usize {
        match self {
            ImageFormat::Rgb24 => 3,
            _ => 1,
        }
    }

    /// Bytes the SDK delivers per pixel
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ImageFormat::Rgb24 => 3,
            ImageFormat::Raw16 => 2,
            _ => 1,
        }
    }
}

/// Output bit depth requested on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    Mono8,
    Mono16,
    Color24,
}

impl BitDepth {
    pub fn bits(self) -> u32 {
        match self {
            BitDepth::Mono8 => 8,
            BitDepth::Mono16 => 16,
            BitDepth::Color24 => 24,
        }
    }

    pub fn format(self) -> ImageFormat {
        match self {
            BitDepth::Mono8 => ImageFormat::Raw8,
            BitDepth::Mono16 => ImageFormat::Raw16,
            BitDepth::Color24 => ImageFormat::Rgb24,
        }
    }
}

impl FromStr for BitDepth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<i64>() {
            Ok(8) => Ok(BitDepth::Mono8),
            Ok(16) => Ok(BitDepth::Mono16),
            Ok(24) => Ok(BitDepth::Color24),
            Ok(_) => Err("Bitdepth must be mono: 8 or 16, color: 24".to_string()),
            Err(e) => Err(format!("Invalid bitdepth '{s}': {e}")),
        }
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// Image flip applied by the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlipMode {
    #[default]
    None,
    Horizontal,
    Vertical,
    Both,
}

impl FlipMode {
    pub fn sdk_value(self) -> i64 {
        match self {
            FlipMode::None => 0,
            FlipMode::Horizontal => 1,
            FlipMode::Vertical => 2,
            FlipMode::Both => 3,
        }
    }

    pub fn from_sdk_value(value: i64) -> Self {
        match value {
            1 => FlipMode::Horizontal,
            2 => FlipMode::Vertical,
            3 => FlipMode::Both,
            _ => FlipMode::None,
        }
    }
}

impl FromStr for FlipMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "n" | "none" => Ok(FlipMode::None),
            "h" | "horizontal" => Ok(FlipMode::Horizontal),
            "v" | "vertical" => Ok(FlipMode::Vertical),
            "hv" | "vh" | "b" | "both" => Ok(FlipMode::Both),
            other => Err(format!(
                "Invalid flip '{other}', expected one of: n, h, v, hv, vh, b"
            )),
        }
    }
}

/// Static properties reported by the camera
#[derive(Debug, Clone, Serialize)]
pub struct CameraInfo {
    pub name: String,
    pub camera_id: i32,
    /// Full sensor width in pixels
    pub max_width: usize,
    /// Full sensor height in pixels
    pub max_height: usize,
    pub is_color: bool,
    /// Binning factors, first entry is the camera default
    pub supported_bins: Vec<u32>,
    pub supported_formats: Vec<ImageFormat>,
    /// Pixel pitch in micrometres
    pub pixel_size_um: f64,
    pub is_cooler_cam: bool,
    pub is_usb3_camera: bool,
    pub elec_per_adu: f32,
    /// ADC bit depth
    pub bit_depth: u32,
}

impl CameraInfo {
    /// Lower-cased name with spaces replaced: 'ZWO ASI120MM Mini' -> 'zwo_asi120mm_mini'
    pub fn sanitized_name(&self) -> String {
        self.name.to_lowercase().replace(' ', "_")
    }
}

/// Range and default of one camera control
#[derive(Debug, Clone, Serialize)]
pub struct ControlCaps {
    pub name: String,
    pub description: String,
    pub min_value: i64,
    pub max_value: i64,
    pub default_value: i64,
    pub is_auto_supported: bool,
    pub is_writable: bool,
    /// SDK control type identifier
    pub control_type: i32,
}

impl ControlCaps {
    pub fn kind(&self) -> Option<ControlKind> {
        ControlKind::from_sdk_id(self.control_type)
    }
}

/// Region of interest in binned pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
    pub start_x: usize,
    pub start_y: usize,
    pub width: usize,
    pub height: usize,
    pub binning: u32,
}

impl Roi {
    /// Whole sensor at the given binning
    pub fn full_frame(info: &CameraInfo, binning: u32) -> Self {
        let binning = binning.max(1);
        Self {
            start_x: 0,
            start_y: 0,
            width: info.max_width / binning as usize,
            height: info.max_height / binning as usize,
            binning,
        }
    }

    /// Shrinks the size to what the SDK accepts: width a multiple of 8, height of 2.
    pub fn aligned(self) -> Self {
        Self {
            width: self.width - self.width % 8,
            height: self.height - self.height % 2,
            ..self
        }
    }
}

/// One captured (or stacked) image
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Width of the image in pixels
    pub width: usize,
    /// Height of the image in pixels
    pub height: usize,
    pub format: ImageFormat,
    /// Samples, interleaved RGB for colour frames
    pub data: Vec<u16>,
}

impl Frame {
    pub fn filled(width: usize, height: usize, format: ImageFormat, value: u16) -> Self {
        Self {
            width,
            height,
            format,
            data: vec![value; width * height * format.channels()],
        }
    }

    pub fn sample_count(&self) -> usize {
        self.width * self.height * self.format.channels()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_depth_parsing() {
        assert_eq!("8".parse::<BitDepth>().unwrap(), BitDepth::Mono8);
        assert_eq!("16".parse::<BitDepth>().unwrap(), BitDepth::Mono16);
        assert_eq!("24".parse::<BitDepth>().unwrap(), BitDepth::Color24);
        assert!("12".parse::<BitDepth>().is_err());
        assert!("eight".parse::<BitDepth>().is_err());
        assert_eq!(BitDepth::Mono16.format(), ImageFormat::Raw16);
    }

    #[test]
    fn test_flip_parsing() {
        assert_eq!("n".parse::<FlipMode>().unwrap(), FlipMode::None);
        assert_eq!("H".parse::<FlipMode>().unwrap(), FlipMode::Horizontal);
        assert_eq!("v".parse::<FlipMode>().unwrap(), FlipMode::Vertical);
        assert_eq!("vh".parse::<FlipMode>().unwrap(), FlipMode::Both);
        assert_eq!("b".parse::<FlipMode>().unwrap(), FlipMode::Both);
        assert!("x".parse::<FlipMode>().is_err());
        assert_eq!(FlipMode::Both.sdk_value(), 3);
    }

    #[test]
    fn test_control_ids_round_trip_through_sdk_numbering() {
        assert_eq!(ControlKind::from_sdk_id(8), Some(ControlKind::Temperature));
        assert_eq!(ControlKind::from_sdk_id(7), None);
    }

    #[test]
    fn test_sanitized_name() {
        let info = CameraInfo {
            name: "ZWO ASI120MM Mini".to_string(),
            camera_id: 0,
            max_width: 1280,
            max_height: 960,
            is_color: false,
            supported_bins: vec![1, 2],
            supported_formats: vec![ImageFormat::Raw8, ImageFormat::Raw16],
            pixel_size_um: 3.75,
            is_cooler_cam: false,
            is_usb3_camera: false,
            elec_per_adu: 1.0,
            bit_depth: 12,
        };
        assert_eq!(info.sanitized_name(), "zwo_asi120mm_mini");
        assert_eq!(
            Roi::full_frame(&info, 2),
            Roi { start_x: 0, start_y: 0, width: 640, height: 480, binning: 2 }
        );
    }

    #[test]
    fn test_roi_alignment() {
        let roi = Roi { start_x: 4, start_y: 2, width: 1303, height: 977, binning: 1 };
        assert_eq!(
            roi.aligned(),
            Roi { start_x: 4, start_y: 2, width: 1296, height: 976, binning: 1 }
        );
        assert_eq!(roi.aligned().aligned(), roi.aligned());
    }
}
