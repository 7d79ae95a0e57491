//! Affine mapping from the dataset's [-500, 500] grid onto map tile bounds

use serde::{Deserialize, Serialize};

use crate::row::Numeric;

pub const SOURCE_MIN: f64 = -500.0;
pub const SOURCE_MAX: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
  pub lat: f64,
  pub lng: f64,
}

/// Southwest / northeast corners of the tiled map
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
  pub sw: LatLng,
  pub ne: LatLng,
}

impl Default for Bounds {
  fn default() -> Self {
    Self {
      sw: LatLng { lat: -0.004491014968947042, lng: 0.004491014973545032 },
      ne: LatLng { lat: 0.004492137863052166, lng: -0.004492137867650181 },
    }
  }
}

/// Interpolate `value` from `[source_min, source_max]` onto `[axis_min, axis_max]`.
///
/// No clamping: values outside the source range extrapolate linearly.
/// `source_min != source_max` is a precondition.
pub fn map_axis(value: f64, axis_min: f64, axis_max: f64, source_min: f64, source_max: f64) -> f64 {
  axis_min + (value - source_min) / (source_max - source_min) * (axis_max - axis_min)
}

impl Bounds {
  /// X grid coordinate to longitude
  pub fn map_x(&self, x: f64) -> f64 {
    map_axis(x, self.sw.lng, self.ne.lng, SOURCE_MIN, SOURCE_MAX)
  }

  /// Y grid coordinate to latitude
  pub fn map_y(&self, y: f64) -> f64 {
    map_axis(y, self.sw.lat, self.ne.lat, SOURCE_MIN, SOURCE_MAX)
  }

  pub fn map_x_numeric(&self, x: Numeric) -> Numeric {
    x.map(|value| self.map_x(value))
  }

  pub fn map_y_numeric(&self, y: Numeric) -> Numeric {
    y.map(|value| self.map_y(value))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const EPSILON: f64 = 1e-15;

  #[test]
  fn test_corners_map_to_bounds() {
    let bounds = Bounds::default();
    assert_eq!(bounds.map_x(-500.0), bounds.sw.lng);
    assert!((bounds.map_x(500.0) - bounds.ne.lng).abs() < EPSILON);
    assert_eq!(bounds.map_y(-500.0), bounds.sw.lat);
    assert!((bounds.map_y(500.0) - bounds.ne.lat).abs() < EPSILON);
  }

  #[test]
  fn test_equal_deltas_give_equal_deltas() {
    let bounds = Bounds::default();
    let step_a = bounds.map_x(-100.0) - bounds.map_x(-200.0);
    let step_b = bounds.map_x(300.0) - bounds.map_x(200.0);
    assert!((step_a - step_b).abs() < EPSILON);
  }

  #[test]
  fn test_mapping_is_monotonic() {
    let bounds = Bounds::default();
    // longitude runs from positive SW to negative NE, so X decreases
    let xs: Vec<f64> = (-5..=5).map(|i| bounds.map_x(i as f64 * 100.0)).collect();
    assert!(xs.windows(2).all(|pair| pair[1] < pair[0]));

    let ys: Vec<f64> = (-5..=5).map(|i| bounds.map_y(i as f64 * 100.0)).collect();
    assert!(ys.windows(2).all(|pair| pair[1] > pair[0]));
  }

  #[test]
  fn test_out_of_range_extrapolates() {
    let bounds = Bounds::default();
    let span = bounds.ne.lat - bounds.sw.lat;
    assert!((bounds.map_y(1500.0) - (bounds.sw.lat + 2.0 * span)).abs() < EPSILON);
  }

  #[test]
  fn test_invalid_stays_invalid() {
    let bounds = Bounds::default();
    assert_eq!(bounds.map_x_numeric(Numeric::Invalid), Numeric::Invalid);
    assert_eq!(bounds.map_y_numeric(Numeric::Valid(-500.0)), Numeric::Valid(bounds.sw.lat));
  }
}
