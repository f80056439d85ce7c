//! Camera control module
//!
//! This module wraps the vendor camera SDK behind the `CameraDevice` trait so the
//! capture sweep can run against real hardware or the simulator.

pub mod asi;
mod device;
mod session;
pub mod simulator;
pub mod types;

pub use asi::AsiSdk;
pub use device::{CameraDevice, CameraProvider};
pub use session::{AppliedSettings, CameraSession, Configuration};
pub use simulator::{SimulatedCamera, SimulatedCapture, SimulatedSdk};
pub use types::{
    BitDepth, CameraInfo, ControlCaps, ControlKind, FlipMode, Frame, ImageFormat, Roi,
};
