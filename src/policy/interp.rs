//! Piecewise-linear interpolation over a strictly increasing grid.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{ScalarPolicy, VectorPolicy};
use crate::error::ValidationError;

/// Strictly increasing abscissa shared by every interpolator built on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Grid(Arc<[f64]>);

impl Grid {
    /// Creates a validated grid.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if fewer than 2 points are given, a value is
    /// not finite, or the points are not strictly increasing.
    pub fn new(points: Vec<f64>) -> Result<Self, ValidationError> {
        if points.len() < 2 {
            return Err(ValidationError::GridTooShort { len: points.len() });
        }
        if points.iter().any(|p| !p.is_finite()) {
            return Err(ValidationError::NonFinite {
                field: "grid".to_string(),
            });
        }
        if let Some(index) = points.windows(2).position(|w| w[1] <= w[0]) {
            return Err(ValidationError::GridNotIncreasing { index: index + 1 });
        }
        Ok(Self(points.into()))
    }

    /// Grid points.
    #[must_use]
    pub fn points(&self) -> &[f64] {
        &self.0
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false: a grid has at least two points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Smallest grid point.
    #[must_use]
    pub fn min(&self) -> f64 {
        self.0[0]
    }

    /// Largest grid point.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.0[self.0.len() - 1]
    }

    /// Returns true if `x` lies within `[min, max]`.
    #[must_use]
    pub fn contains(&self, x: f64) -> bool {
        x >= self.min() && x <= self.max()
    }

    /// Segment index and weight of the right endpoint for `x`.
    ///
    /// Outside the grid the weight is clamped, so evaluation returns the
    /// nearest end value.
    fn locate(&self, x: f64) -> (usize, f64) {
        let n = self.0.len();
        let i = self.0.partition_point(|&g| g <= x).clamp(1, n - 1) - 1;
        let (x0, x1) = (self.0[i], self.0[i + 1]);
        let w = ((x - x0) / (x1 - x0)).clamp(0.0, 1.0);
        (i, w)
    }

    fn check_ordinate(&self, field: &str, values: &[f64]) -> Result<(), ValidationError> {
        if values.len() != self.len() {
            return Err(ValidationError::LengthMismatch {
                field: field.to_string(),
                expected: self.len(),
                actual: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ValidationError::NonFinite {
                field: field.to_string(),
            });
        }
        Ok(())
    }
}

impl TryFrom<Vec<f64>> for Grid {
    type Error = ValidationError;

    fn try_from(points: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<Grid> for Vec<f64> {
    fn from(grid: Grid) -> Self {
        grid.0.to_vec()
    }
}

// Exact at both nodes and on flat segments.
fn lerp(values: &[f64], i: usize, w: f64) -> f64 {
    let (v0, v1) = (values[i], values[i + 1]);
    if w >= 1.0 {
        return v1;
    }
    v0 + (v1 - v0) * w
}

/// Scalar interpolator over a grid.
#[derive(Debug, Clone)]
pub struct LinearInterpolator {
    grid: Grid,
    values: Arc<[f64]>,
}

impl LinearInterpolator {
    /// Creates an interpolator from raw grid points and values.
    pub fn new(grid: Vec<f64>, values: Vec<f64>) -> Result<Self, ValidationError> {
        Self::on_grid(&Grid::new(grid)?, values)
    }

    /// Creates an interpolator sharing an existing grid.
    pub fn on_grid(grid: &Grid, values: Vec<f64>) -> Result<Self, ValidationError> {
        grid.check_ordinate("values", &values)?;
        Ok(Self {
            grid: grid.clone(),
            values: values.into(),
        })
    }

    /// Underlying grid.
    #[must_use]
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }
}

impl ScalarPolicy for LinearInterpolator {
    fn evaluate(&self, x: f64) -> f64 {
        let (i, w) = self.grid.locate(x);
        lerp(&self.values, i, w)
    }

    fn domain(&self) -> Option<(f64, f64)> {
        Some((self.grid.min(), self.grid.max()))
    }
}

/// Vector-valued interpolator: one ordinate row per output component.
#[derive(Debug, Clone)]
pub struct VectorInterpolator {
    grid: Grid,
    rows: Arc<[Vec<f64>]>,
}

impl VectorInterpolator {
    /// Creates an interpolator sharing an existing grid; every row must have
    /// one value per grid point.
    pub fn on_grid(grid: &Grid, rows: Vec<Vec<f64>>) -> Result<Self, ValidationError> {
        if rows.is_empty() {
            return Err(ValidationError::InvalidConfig {
                reason: "vector interpolator needs at least one row".to_string(),
            });
        }
        for (k, row) in rows.iter().enumerate() {
            grid.check_ordinate(&format!("rows[{k}]"), row)?;
        }
        Ok(Self {
            grid: grid.clone(),
            rows: rows.into(),
        })
    }

    /// Number of output components.
    #[must_use]
    pub fn width(&self) -> usize {
        self.rows.len()
    }
}

impl VectorPolicy for VectorInterpolator {
    fn evaluate(&self, x: f64) -> Vec<f64> {
        let (i, w) = self.grid.locate(x);
        self.rows.iter().map(|row| lerp(row, i, w)).collect()
    }

    fn domain(&self) -> Option<(f64, f64)> {
        Some((self.grid.min(), self.grid.max()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_rejects_invalid_points() {
        assert!(matches!(
            Grid::new(vec![1.0]),
            Err(ValidationError::GridTooShort { len: 1 })
        ));
        assert!(matches!(
            Grid::new(vec![1.0, 2.0, 2.0]),
            Err(ValidationError::GridNotIncreasing { index: 2 })
        ));
        assert!(Grid::new(vec![0.0, f64::INFINITY]).is_err());
    }

    #[test]
    fn interpolates_inside_and_hits_nodes_exactly() {
        let f = LinearInterpolator::new(vec![1.0, 1.5, 2.0], vec![0.5, 0.4, 0.3]).unwrap();
        assert_eq!(f.evaluate(1.0), 0.5);
        assert_eq!(f.evaluate(1.5), 0.4);
        assert_eq!(f.evaluate(2.0), 0.3);
        assert!((f.evaluate(1.25) - 0.45).abs() < 1e-12);
    }

    #[test]
    fn clamps_outside_the_grid() {
        let f = LinearInterpolator::new(vec![0.0, 1.0], vec![3.0, 5.0]).unwrap();
        assert_eq!(f.evaluate(-1.0), 3.0);
        assert_eq!(f.evaluate(7.0), 5.0);
        assert_eq!(f.domain(), Some((0.0, 1.0)));
    }

    #[test]
    fn rejects_length_mismatch() {
        let err = LinearInterpolator::new(vec![0.0, 1.0, 2.0], vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::LengthMismatch { expected: 3, actual: 2, .. }
        ));
    }

    #[test]
    fn vector_interpolator_evaluates_each_row() {
        let grid = Grid::new(vec![0.0, 2.0]).unwrap();
        let f = VectorInterpolator::on_grid(&grid, vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        assert_eq!(f.width(), 2);
        let v = f.evaluate(0.5);
        assert!((v[0] - 0.75).abs() < 1e-12);
        assert!((v[1] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn grid_deserializes_with_validation() {
        let ok: Grid = serde_json::from_str("[0.0, 0.5, 1.0]").unwrap();
        assert_eq!(ok.len(), 3);
        assert!(serde_json::from_str::<Grid>("[1.0, 0.5]").is_err());
    }
}
