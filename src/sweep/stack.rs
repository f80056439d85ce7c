use crate::camera::{Frame, ImageFormat};
use crate::common::error::{DarkFrameError, Result};

/// Running sum of the frames captured for one sweep point.
///
/// Pixels are accumulated in `f64` and truncated when averaged. The temperature
/// samples are averaged and rounded half away from zero.
#[derive(Debug, Default)]
pub struct FrameStack {
    shape: Option<(usize, usize, ImageFormat)>,
    sums: Vec<f64>,
    frames: u32,
    temperatures: Vec<f64>,
}

impl FrameStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_frame(&mut self, frame: &Frame) -> Result<()> {
        let shape = (frame.width, frame.height, frame.format);
        match self.shape {
            None => {
                self.shape = Some(shape);
                self.sums = vec![0.0; frame.sample_count()];
            }
            Some(expected) if expected != shape => {
                return Err(DarkFrameError::InvalidDimensions(frame.width, frame.height));
            }
            Some(_) => {}
        }
        if frame.data.len() != self.sums.len() {
            return Err(DarkFrameError::InvalidDimensions(frame.width, frame.height));
        }

        for (sum, &sample) in self.sums.iter_mut().zip(&frame.data) {
            *sum += f64::from(sample);
        }
        self.frames += 1;
        Ok(())
    }

    /// Sensor temperature in degrees Celsius
    pub fn push_temperature(&mut self, celsius: f64) {
        self.temperatures.push(celsius);
    }

    pub fn frame_count(&self) -> u32 {
        self.frames
    }

    /// Mean of the temperature samples, rounded: -39.99 -> -40, 0.01 -> 0, 2.5 -> 3.
    pub fn temperature(&self) -> Option<i64> {
        if self.temperatures.is_empty() {
            return None;
        }
        let mean = self.temperatures.iter().sum::<f64>() / self.temperatures.len() as f64;
        Some(mean.round() as i64)
    }

    pub fn average(&self) -> Result<Frame> {
        let Some((width, height, format)) = self.shape else {
            return Err(DarkFrameError::InvalidArgument(
                "cannot average an empty stack".to_string(),
            ));
        };
        let count = f64::from(self.frames);
        Ok(Frame {
            width,
            height,
            format,
            data: self.sums.iter().map(|&sum| (sum / count) as u16).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_frames_average_to_themselves() {
        let mut stack = FrameStack::new();
        for _ in 0..4 {
            stack.push_frame(&Frame::filled(8, 4, ImageFormat::Raw16, 1234)).unwrap();
        }
        let average = stack.average().unwrap();

        assert_eq!(stack.frame_count(), 4);
        assert_eq!((average.width, average.height), (8, 4));
        assert!(average.data.iter().all(|&v| v == 1234));
    }

    #[test]
    fn test_average_truncates() {
        let mut stack = FrameStack::new();
        stack.push_frame(&Frame::filled(2, 2, ImageFormat::Raw8, 10)).unwrap();
        stack.push_frame(&Frame::filled(2, 2, ImageFormat::Raw8, 11)).unwrap();
        stack.push_frame(&Frame::filled(2, 2, ImageFormat::Raw8, 11)).unwrap();

        assert!(stack.average().unwrap().data.iter().all(|&v| v == 10));
    }

    #[test]
    fn test_temperature_rounds_half_away_from_zero() {
        let rounded = |samples: &[f64]| {
            let mut stack = FrameStack::new();
            samples.iter().for_each(|&t| stack.push_temperature(t));
            stack.temperature()
        };

        assert_eq!(rounded(&[-39.99]), Some(-40));
        assert_eq!(rounded(&[0.01]), Some(0));
        assert_eq!(rounded(&[2.5]), Some(3));
        assert_eq!(rounded(&[-2.0, -3.0]), Some(-3));
        assert_eq!(rounded(&[]), None);
    }

    #[test]
    fn test_mismatched_frame_is_rejected() {
        let mut stack = FrameStack::new();
        stack.push_frame(&Frame::filled(4, 4, ImageFormat::Raw8, 0)).unwrap();

        let result = stack.push_frame(&Frame::filled(2, 2, ImageFormat::Raw8, 0));
        assert!(matches!(result, Err(DarkFrameError::InvalidDimensions(2, 2))));
        let result = stack.push_frame(&Frame::filled(4, 4, ImageFormat::Raw16, 0));
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_stack_cannot_average() {
        assert!(FrameStack::new().average().is_err());
    }
}
