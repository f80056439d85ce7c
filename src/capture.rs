//! Frame capture module
//!
//! Guards each blocking camera read with a deadline, bounded retries and a
//! user-interrupt check.

mod interrupt;
mod retry;

pub use interrupt::Interrupt;
pub use retry::{RetryPolicy, capture_with_retry};
