//! `min:max:step` range arguments for the gain and exposure sweeps.
//!
//! `-1` in a field asks for the value to be derived from the camera once it is
//! open.

use std::fmt;
use std::str::FromStr;

/// Sentinel accepted in any range field for "derive from the camera"
pub const AUTO: i64 = -1;

/// Shortest exposure or exposure step accepted, in seconds
pub const MIN_EXPOSURE_S: f64 = 1e-3;
/// Longest exposure accepted, in seconds
pub const MAX_EXPOSURE_S: f64 = 900.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound<T> {
    Auto,
    Fixed(T),
}

impl<T: Copy> Bound<T> {
    pub fn fixed(self) -> Option<T> {
        match self {
            Bound::Auto => None,
            Bound::Fixed(value) => Some(value),
        }
    }

    pub fn resolve(self, auto: impl FnOnce() -> T) -> T {
        match self {
            Bound::Auto => auto(),
            Bound::Fixed(value) => value,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Bound<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Auto => write!(f, "{AUTO}"),
            Bound::Fixed(value) => write!(f, "{value}"),
        }
    }
}

fn split_fields(s: &str, what: &str) -> Result<[String; 3], String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return Err(format!("Incorrect {what} specification, expected MIN:MAX:STEP"));
    }
    Ok([
        parts[0].trim().to_string(),
        parts[1].trim().to_string(),
        parts[2].trim().to_string(),
    ])
}

/// Gain sweep in camera units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainRange {
    pub min: Bound<i64>,
    pub max: Bound<i64>,
    pub step: Bound<i64>,
}

impl GainRange {
    pub fn auto() -> Self {
        Self {
            min: Bound::Auto,
            max: Bound::Auto,
            step: Bound::Auto,
        }
    }
}

impl FromStr for GainRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [min, max, step] = split_fields(s, "gain")?;
        let parse = |field: &str, label: &str| -> Result<Bound<i64>, String> {
            let value = field
                .parse::<i64>()
                .map_err(|_| format!("Invalid {label} gain '{field}'"))?;
            match value {
                AUTO => Ok(Bound::Auto),
                v if v < 0 => Err(format!("Invalid {label} gain {v}")),
                v => Ok(Bound::Fixed(v)),
            }
        };

        let range = GainRange {
            min: parse(&min, "minimum")?,
            max: parse(&max, "maximum")?,
            step: parse(&step, "step")?,
        };

        if range.step == Bound::Fixed(0) {
            return Err("Invalid gain step 0".to_string());
        }
        if let (Some(min), Some(max)) = (range.min.fixed(), range.max.fixed()) {
            if max < min {
                return Err(format!("Invalid maximum gain {max}, below minimum {min}"));
            }
        }
        Ok(range)
    }
}

impl fmt::Display for GainRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.min, self.max, self.step)
    }
}

/// Exposure sweep in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExposureRange {
    pub min: Bound<f64>,
    pub max: Bound<f64>,
    pub step: f64,
}

impl FromStr for ExposureRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [min, max, step] = split_fields(s, "exposure")?;
        let number = |field: &str, label: &str| -> Result<f64, String> {
            field
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| format!("Invalid {label} exposure '{field}'"))
        };

        let min = match number(&min, "minimum")? {
            v if v == AUTO as f64 => Bound::Auto,
            v if v < MIN_EXPOSURE_S => {
                return Err(format!("Invalid minimum exposure {v}s (min 1ms)"));
            }
            v => Bound::Fixed(v),
        };
        let max = match number(&max, "maximum")? {
            v if v == AUTO as f64 => Bound::Auto,
            v if v > MAX_EXPOSURE_S || v < MIN_EXPOSURE_S => {
                return Err(format!("Invalid maximum exposure {v}s (1ms to 900s)"));
            }
            v => Bound::Fixed(v),
        };
        let step = number(&step, "step")?;
        if step < MIN_EXPOSURE_S {
            return Err(format!("Invalid exposure step {step}s (min 1ms)"));
        }
        if let (Some(min), Some(max)) = (min.fixed(), max.fixed()) {
            if max < min {
                return Err(format!("Invalid maximum exposure {max}s, below minimum {min}s"));
            }
        }

        Ok(ExposureRange { min, max, step })
    }
}

impl fmt::Display for ExposureRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.min, self.max, self.step)
    }
}
