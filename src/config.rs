//! Configuration module
//!
//! Command-line parsing and validation. Everything here fails before the camera
//! SDK is touched.

mod args;
pub mod ranges;
mod types;

pub use args::{Args, DEFAULT_FILENAME_FORMAT};
pub use ranges::{Bound, ExposureRange, GainRange};
pub use types::RunConfig;
