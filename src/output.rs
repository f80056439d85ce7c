//! Output module
//!
//! This module renders output filenames and encodes stacked frames to PNG, JPEG or TIFF.

mod standard_image_writer;
pub mod template;
pub mod types;
mod writer;

pub use standard_image_writer::StandardImageWriter;
pub use template::{FilenameTemplate, FrameLabel};
pub use types::{ChromaSubsampling, OutputFormat, OutputOptions, OutputOptionsBuilder, TiffCompression};
pub use writer::ImageWriter;
