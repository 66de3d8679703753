//! Prior distributions attached to parameter leaves.
//!
//! Only the *description* of a prior lives here: its name, its parameters and
//! its support. Drawing samples is left to the inference engine that consumes
//! a [`Site`](crate::graph::Site).

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DistributionError {
    #[error("{dist}: `{param}` must be {requirement}, got {value}")]
    InvalidParameter { dist: &'static str, param: &'static str, requirement: &'static str, value: f64 },
    #[error("{dist}: lower bound {low} must be below upper bound {high}")]
    EmptyInterval { dist: &'static str, low: f64, high: f64 },
}

/// The set of values a distribution can produce.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Support {
    Real,
    /// `x > 0`
    Positive,
    /// `x >= 0`
    NonNegative,
    /// Closed interval `low <= x <= high`.
    Interval { low: f64, high: f64 },
}

impl Support {
    pub fn contains(&self, x: f64) -> bool {
        if !x.is_finite() {
            return false;
        }
        match *self {
            Support::Real => true,
            Support::Positive => x > 0.0,
            Support::NonNegative => x >= 0.0,
            Support::Interval { low, high } => low <= x && x <= high,
        }
    }
}

impl fmt::Display for Support {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Support::Real => write!(f, "(-inf, inf)"),
            Support::Positive => write!(f, "(0, inf)"),
            Support::NonNegative => write!(f, "[0, inf)"),
            Support::Interval { low, high } => write!(f, "[{}, {}]", low, high),
        }
    }
}

/// A prior distribution as seen by the composition engine.
pub trait Distribution: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn support(&self) -> Support;

    fn in_support(&self, x: f64) -> bool {
        self.support().contains(x)
    }
}

fn require_finite(dist: &'static str, param: &'static str, value: f64) -> Result<(), DistributionError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(DistributionError::InvalidParameter { dist, param, requirement: "finite", value })
    }
}

fn require_positive(dist: &'static str, param: &'static str, value: f64) -> Result<(), DistributionError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(DistributionError::InvalidParameter { dist, param, requirement: "positive and finite", value })
    }
}

fn require_interval(dist: &'static str, low: f64, high: f64) -> Result<(), DistributionError> {
    require_finite(dist, "low", low)?;
    require_finite(dist, "high", high)?;
    if low < high {
        Ok(())
    } else {
        Err(DistributionError::EmptyInterval { dist, low, high })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Uniform {
    pub low: f64,
    pub high: f64,
}

impl Uniform {
    pub fn new(low: f64, high: f64) -> Result<Self, DistributionError> {
        require_interval("Uniform", low, high)?;
        Ok(Self { low, high })
    }
}

impl Distribution for Uniform {
    fn name(&self) -> &str { "Uniform" }
    fn support(&self) -> Support { Support::Interval { low: self.low, high: self.high } }
}

/// Uniform in `ln(x)` between two positive bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogUniform {
    pub low: f64,
    pub high: f64,
}

impl LogUniform {
    pub fn new(low: f64, high: f64) -> Result<Self, DistributionError> {
        require_positive("LogUniform", "low", low)?;
        require_interval("LogUniform", low, high)?;
        Ok(Self { low, high })
    }
}

impl Distribution for LogUniform {
    fn name(&self) -> &str { "LogUniform" }
    fn support(&self) -> Support { Support::Interval { low: self.low, high: self.high } }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normal {
    pub loc: f64,
    pub scale: f64,
}

impl Normal {
    pub fn new(loc: f64, scale: f64) -> Result<Self, DistributionError> {
        require_finite("Normal", "loc", loc)?;
        require_positive("Normal", "scale", scale)?;
        Ok(Self { loc, scale })
    }
}

impl Distribution for Normal {
    fn name(&self) -> &str { "Normal" }
    fn support(&self) -> Support { Support::Real }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogNormal {
    pub loc: f64,
    pub scale: f64,
}

impl LogNormal {
    pub fn new(loc: f64, scale: f64) -> Result<Self, DistributionError> {
        require_finite("LogNormal", "loc", loc)?;
        require_positive("LogNormal", "scale", scale)?;
        Ok(Self { loc, scale })
    }
}

impl Distribution for LogNormal {
    fn name(&self) -> &str { "LogNormal" }
    fn support(&self) -> Support { Support::Positive }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HalfNormal {
    pub scale: f64,
}

impl HalfNormal {
    pub fn new(scale: f64) -> Result<Self, DistributionError> {
        require_positive("HalfNormal", "scale", scale)?;
        Ok(Self { scale })
    }
}

impl Distribution for HalfNormal {
    fn name(&self) -> &str { "HalfNormal" }
    fn support(&self) -> Support { Support::Positive }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Support::Real, -1e300, true)]
    #[case(Support::Real, f64::NAN, false)]
    #[case(Support::Positive, 0.0, false)]
    #[case(Support::Positive, 1e-12, true)]
    #[case(Support::NonNegative, 0.0, true)]
    #[case(Support::NonNegative, -1e-12, false)]
    #[case(Support::Interval { low: 1.0, high: 2.0 }, 1.0, true)]
    #[case(Support::Interval { low: 1.0, high: 2.0 }, 2.0, true)]
    #[case(Support::Interval { low: 1.0, high: 2.0 }, 2.5, false)]
    fn test_support_membership(#[case] support: Support, #[case] x: f64, #[case] expected: bool) {
        assert_eq!(support.contains(x), expected);
    }

    #[test]
    fn test_invalid_parameters_are_rejected() {
        assert!(matches!(Uniform::new(2.0, 1.0), Err(DistributionError::EmptyInterval { .. })));
        assert!(LogUniform::new(0.0, 1.0).is_err());
        assert!(Normal::new(0.0, 0.0).is_err());
        assert!(HalfNormal::new(f64::INFINITY).is_err());
        let half = HalfNormal::new(1.0).unwrap();
        assert!(!half.support().contains(0.0));
        assert!(half.support().contains(1e-9));
    }

    #[test]
    fn test_log_uniform_support_is_its_interval() {
        let d = LogUniform::new(1e-3, 1e3).unwrap();
        assert!(d.in_support(1.0));
        assert!(!d.in_support(1e4));
        assert_eq!(d.support().to_string(), "[0.001, 1000]");
    }
}
