use std::path::PathBuf;

use clap::Parser;

use crate::camera::{BitDepth, FlipMode};
use crate::capture::RetryPolicy;
use crate::config::ranges::{ExposureRange, GainRange};
use crate::config::types::{RunConfig, WARMUP_FRAMES};
use crate::output::{ChromaSubsampling, FilenameTemplate, OutputOptions, TiffCompression};

pub const DEFAULT_FILENAME_FORMAT: &str = "dark_{exps}s_{gain:03d}g_{temp:02d}C.png";

const TEMPLATE_HELP: &str = "\
When constructing the output filename, the following tokens are available:
  {temp}  - sensor temperature in C, rounded half away from zero: -39.99 -> -40
  {gain}  - gain in camera units
  {expms} - exposure time in milliseconds
  {exps}  - exposure time in whole seconds
  {model} - sanitized camera model: 'ZWO ASI120MM Mini' -> 'zwo_asi120mm_mini'
  {stack} - stacking factor
Fields accept format specs such as {gain:03d}.";

/// Command line arguments for dark frame capture
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Capture a library of stacked dark frames across gain and exposure settings",
    after_help = TEMPLATE_HELP
)]
pub struct Args {
    /// Camera index
    #[arg(short, long)]
    pub camera: Option<usize>,

    /// Print info about the selected camera and exit
    #[arg(short = 'I', long)]
    pub info: bool,

    /// Path to the camera SDK library
    #[arg(short, long, value_name = "PATH", default_value = "./libASICamera2.so")]
    pub library: PathBuf,

    /// Directory for the dark frames
    #[arg(short, long, value_name = "PATH")]
    pub directory: Option<PathBuf>,

    /// Filename pattern for darks, see the token list below
    #[arg(short, long, value_name = "STR", default_value = DEFAULT_FILENAME_FORMAT)]
    pub filename_format: FilenameTemplate,

    /// Bit depth: 8 or 16 (mono), 24 (color)
    #[arg(short, long, value_name = "INT")]
    pub bitdepth: Option<BitDepth>,

    /// Gain range to scan (integers, -1 = automatic)
    #[arg(short, long, value_name = "MIN:MAX:STEP", default_value = "-1:-1:-1", allow_hyphen_values = true)]
    pub gain: GainRange,

    /// Exposure range to scan in seconds (-1 = camera limit)
    #[arg(short = 'x', long, value_name = "MIN:MAX:STEP", default_value = "2:20:2", allow_hyphen_values = true)]
    pub exposure: ExposureRange,

    /// Pixel binning factor
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub binning: u32,

    /// Number of exposures to stack to build each dark frame
    #[arg(long, value_name = "INT", default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub stack: u32,

    /// Flip image: n(one), h(orizontal), v(ertical), b(oth)
    #[arg(long)]
    pub flip: Option<FlipMode>,

    /// Image quality (JPEG output)
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: u8,

    /// JPEG chroma subsampling [default: 444 at quality 100, 422 below]
    #[arg(long, value_enum)]
    pub subsampling: Option<ChromaSubsampling>,

    /// Compression for TIFF output
    #[arg(long, value_enum, default_value_t = TiffCompression::None)]
    pub tiff_compression: TiffCompression,

    /// Brightness offset
    #[arg(long, value_name = "INT", default_value_t = 0, value_parser = clap::value_parser!(i64).range(0..))]
    pub offset: i64,

    /// White balance: red
    #[arg(long, value_name = "INT", value_parser = clap::value_parser!(i64).range(1..))]
    pub wbr: Option<i64>,

    /// White balance: blue
    #[arg(long, value_name = "INT", value_parser = clap::value_parser!(i64).range(1..))]
    pub wbb: Option<i64>,

    /// Use a simulated camera instead of the SDK
    #[arg(long)]
    pub simulate: bool,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn run_config(&self) -> RunConfig {
        let mut output = OutputOptions::builder()
            .quality(self.quality)
            .tiff_compression(self.tiff_compression);
        if let Some(subsampling) = self.subsampling {
            output = output.subsampling(subsampling);
        }

        RunConfig {
            camera_index: self.camera,
            info_only: self.info,
            directory: self.directory.clone().unwrap_or_default(),
            template: self.filename_format.clone(),
            bit_depth: self.bitdepth,
            gain: self.gain,
            exposure: self.exposure,
            binning: self.binning,
            stack: self.stack,
            flip: self.flip,
            offset: self.offset,
            wb_r: self.wbr,
            wb_b: self.wbb,
            output: output.build(),
            retry: RetryPolicy::default(),
            warmup_frames: WARMUP_FRAMES,
            verbose: self.verbose > 0,
        }
    }
}
