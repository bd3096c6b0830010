//! Parameter metadata for chart pattern detectors
//!
//! This module provides metadata about detector parameters, enabling:
//! - Parameter documentation
//! - Construction of detectors from loosely typed configuration maps, with
//!   every value checked against its accepted range
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//!
//! use chartscan::params::{ParamMeta, ParamType, ParameterizedDetector};
//! use chartscan::prelude::*;
//!
//! // Get parameter metadata for a detector
//! let params = DoubleTopDetector::param_meta();
//! for param in params {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//!
//! // Values outside the declared range are rejected
//! let mut custom = HashMap::new();
//! custom.insert("window", 1000.0);
//! assert!(DoubleTopDetector::with_params(&custom).is_err());
//! ```

use std::collections::HashMap;

use crate::{PatternError, PatternKind, Period, Ratio, Result};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Ratio value (0.0..=1.0)
  Ratio,
  /// Period value (positive integer, in bars)
  Period,
  /// Confidence floor (integer 0..=100)
  Score,
}

/// Metadata for a single detector parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name (e.g., "peak_tolerance")
  pub name: &'static str,
  /// Parameter type
  pub param_type: ParamType,
  /// Default value
  pub default: f64,
  /// Accepted values: (min, max), inclusive
  pub range: (f64, f64),
  /// Human-readable description
  pub description: &'static str,
}

impl ParamMeta {
  /// Create a new ParamMeta for a Ratio parameter
  pub const fn ratio(
    name: &'static str,
    default: f64,
    range: (f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Ratio, default, range, description }
  }

  /// Create a new ParamMeta for a Period parameter
  pub const fn period(
    name: &'static str,
    default: f64,
    range: (f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Period, default, range, description }
  }

  /// Create a new ParamMeta for a confidence floor
  pub const fn score(
    name: &'static str,
    default: f64,
    range: (f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Score, default, range, description }
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    let (min, max) = self.range;
    if value < min || value > max {
      return Err(PatternError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Ratio => Ok(()),
      ParamType::Period => {
        if value < 1.0 || value.fract() != 0.0 {
          return Err(PatternError::InvalidValue("Period must be a positive integer"));
        }
        Ok(())
      },
      ParamType::Score => {
        if value.fract() != 0.0 {
          return Err(PatternError::InvalidValue("Score must be an integer"));
        }
        Ok(())
      },
    }
  }
}

// ============================================================
// PARAMETERIZED DETECTOR TRAIT
// ============================================================

/// Trait for detectors that support parameterization
///
/// Implementing this trait enables:
/// - Discovery of available parameters
/// - Creation of detectors with custom parameter values
pub trait ParameterizedDetector: Sized {
  /// Returns metadata for all configurable parameters
  fn param_meta() -> &'static [ParamMeta];

  /// Creates a detector with parameters from a HashMap
  ///
  /// Missing parameters use their default values. Supplied values must pass
  /// [`check_params`] against [`param_meta`](Self::param_meta).
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;

  /// Pattern this detector recognises
  fn pattern_kind() -> PatternKind;
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Validate every supplied value against its entry in `meta`.
///
/// Names with no entry are rejected.
pub fn check_params(meta: &[ParamMeta], params: &HashMap<&str, f64>) -> Result<()> {
  for (&name, &value) in params {
    let entry = meta
      .iter()
      .find(|m| m.name == name)
      .ok_or_else(|| PatternError::InvalidConfig(format!("unknown parameter {name}")))?;
    entry.validate(value)?;
  }
  Ok(())
}

/// Helper to get a Ratio from params with default fallback
pub fn get_ratio(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Ratio> {
  let value = params.get(key).copied().unwrap_or(default);
  Ratio::new(value)
}

/// Helper to get a Period from params with default fallback
pub fn get_period(params: &HashMap<&str, f64>, key: &str, default: usize) -> Result<Period> {
  let value = params.get(key).copied().unwrap_or(default as f64);
  if value < 0.0 || value.fract() != 0.0 {
    return Err(PatternError::InvalidValue("Period must be a positive integer"));
  }
  Period::new(value as usize)
}

/// Helper to get a confidence floor from params with default fallback
pub fn get_score(params: &HashMap<&str, f64>, key: &'static str, default: u8) -> Result<u8> {
  let value = params.get(key).copied().unwrap_or(f64::from(default));
  if !(0.0..=100.0).contains(&value) {
    return Err(PatternError::OutOfRange { field: key, value, min: 0.0, max: 100.0 });
  }
  if value.fract() != 0.0 {
    return Err(PatternError::InvalidValue("Score must be an integer"));
  }
  Ok(value as u8)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_param_meta_ratio() {
    let meta = ParamMeta::ratio("test_ratio", 0.5, (0.3, 0.7), "Test ratio parameter");

    assert_eq!(meta.name, "test_ratio");
    assert_eq!(meta.param_type, ParamType::Ratio);
    assert_eq!(meta.default, 0.5);
  }

  #[test]
  fn test_param_meta_period() {
    let meta = ParamMeta::period("window", 15.0, (5.0, 25.0), "Test period parameter");

    assert_eq!(meta.name, "window");
    assert_eq!(meta.param_type, ParamType::Period);
    assert_eq!(meta.default, 15.0);
  }

  #[test]
  fn test_validate_ratio() {
    let meta = ParamMeta::ratio("test", 0.5, (0.3, 0.7), "Test");

    assert!(meta.validate(0.5).is_ok());
    assert!(meta.validate(0.3).is_ok());
    assert!(meta.validate(0.7).is_ok());
    assert!(meta.validate(0.2).is_err());
    assert!(meta.validate(0.8).is_err());
  }

  #[test]
  fn test_validate_period() {
    let meta = ParamMeta::period("window", 15.0, (5.0, 25.0), "Test");

    assert!(meta.validate(15.0).is_ok());
    assert!(meta.validate(5.0).is_ok());
    assert!(meta.validate(12.5).is_err());
    assert!(meta.validate(4.0).is_err());
    assert!(meta.validate(30.0).is_err());
  }

  #[test]
  fn test_validate_score() {
    let meta = ParamMeta::score("min_confidence", 30.0, (0.0, 60.0), "Test");

    assert!(meta.validate(35.0).is_ok());
    assert!(meta.validate(35.5).is_err());
    assert!(meta.validate(70.0).is_err());
  }

  #[test]
  fn test_check_params() {
    let meta = [
      ParamMeta::period("window", 15.0, (5.0, 25.0), "Test"),
      ParamMeta::ratio("tolerance", 0.03, (0.01, 0.06), "Test"),
    ];
    let mut params = HashMap::new();
    params.insert("window", 10.0);
    assert!(check_params(&meta, &params).is_ok());

    params.insert("window", 1000.0);
    assert!(matches!(
      check_params(&meta, &params),
      Err(PatternError::OutOfRange { field: "window", .. })
    ));

    params.remove("window");
    params.insert("tolerence", 0.02);
    assert!(matches!(check_params(&meta, &params), Err(PatternError::InvalidConfig(_))));
  }

  #[test]
  fn test_get_ratio_helper() {
    let mut params = HashMap::new();
    params.insert("key1", 0.8);

    assert!((get_ratio(&params, "key1", 0.5).unwrap().get() - 0.8).abs() < f64::EPSILON);
    assert!((get_ratio(&params, "key2", 0.5).unwrap().get() - 0.5).abs() < f64::EPSILON);
  }

  #[test]
  fn test_get_period_helper() {
    let mut params = HashMap::new();
    params.insert("key1", 20.0);
    params.insert("bad", 7.5);

    assert_eq!(get_period(&params, "key1", 14).unwrap().get(), 20);
    assert_eq!(get_period(&params, "key2", 14).unwrap().get(), 14);
    assert!(get_period(&params, "bad", 14).is_err());
  }

  #[test]
  fn test_get_score_helper() {
    let mut params = HashMap::new();
    params.insert("floor", 40.0);
    params.insert("too_high", 140.0);

    assert_eq!(get_score(&params, "floor", 30).unwrap(), 40);
    assert_eq!(get_score(&params, "missing", 30).unwrap(), 30);
    assert!(get_score(&params, "too_high", 30).is_err());
  }
}
