//! Sweep module
//!
//! This module walks the gain/exposure grid: it reconfigures the camera for
//! each point, stacks the captured frames and writes the averaged result.

mod driver;
mod estimate;
mod plan;
mod stack;

#[cfg(test)]
mod tests;

pub use driver::{SweepDriver, SweepReport};
pub use estimate::RunEstimate;
pub use plan::{SweepPlan, SweepPoint};
pub use stack::FrameStack;
