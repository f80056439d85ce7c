use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};

use crate::camera::{CameraDevice, CameraSession, Frame};
use crate::capture::interrupt::Interrupt;
use crate::common::error::{DarkFrameError, Result};

/// How a single frame capture is guarded
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total capture attempts before giving up
    pub attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
    /// Added to the exposure time to form the capture deadline
    pub deadline_margin: Duration,
    /// Longest single blocking wait on the camera, bounds interrupt latency
    pub poll_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(500),
            deadline_margin: Duration::from_secs(1),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Waits for one frame until `deadline` elapses, in slices of `poll_interval`.
fn capture_before<C: CameraDevice>(
    session: &mut CameraSession<C>,
    deadline: Duration,
    poll_interval: Duration,
    interrupt: &Interrupt,
) -> Result<Frame> {
    let started = Instant::now();
    loop {
        if interrupt.is_triggered() {
            return Err(DarkFrameError::Interrupted);
        }
        let remaining = deadline.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Err(DarkFrameError::CaptureTimeout(deadline));
        }
        if let Some(frame) = session.camera_mut().capture_frame(remaining.min(poll_interval))? {
            return Ok(frame);
        }
    }
}

/// Captures one frame, retrying transient failures.
///
/// A timed-out attempt resets the camera stream before the next one. On interrupt
/// the stream and any exposure are stopped and `Interrupted` is returned at once.
#[instrument(skip_all)]
pub fn capture_with_retry<C: CameraDevice>(
    session: &mut CameraSession<C>,
    policy: &RetryPolicy,
    interrupt: &Interrupt,
) -> Result<Frame> {
    let deadline = session.exposure_time()? + policy.deadline_margin;
    let attempts = policy.attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match capture_before(session, deadline, policy.poll_interval, interrupt) {
            Ok(frame) => {
                debug!(attempt, "Frame captured");
                return Ok(frame);
            }
            Err(DarkFrameError::Interrupted) => {
                if let Err(e) = session.halt() {
                    warn!("Failed to stop camera after interrupt: {e}");
                }
                return Err(DarkFrameError::Interrupted);
            }
            Err(e) if e.is_transient() => {
                warn!(attempt, attempts, "Capture attempt failed: {e}");
                if matches!(e, DarkFrameError::CaptureTimeout(_)) {
                    if let Err(reset) = session.reset_stream() {
                        warn!("Failed to reset camera stream: {reset}");
                    }
                }
                last_error = e.to_string();
                if attempt < attempts {
                    std::thread::sleep(policy.delay);
                }
            }
            Err(e) => return Err(e),
        }
    }

    Err(DarkFrameError::CaptureExhausted {
        attempts,
        last: last_error,
    })
}
