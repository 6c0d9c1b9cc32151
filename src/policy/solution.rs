//! Solved policy functions handed over by the boundary-value solver.
//!
//! The solver's output is a grid of temperature-anomaly levels plus aligned
//! arrays: the emission rate `e_tilde`, the drift distortion `h`, one row of
//! distorted probabilities per climate model (`pi_c`) and per damage model
//! (`pi_d`), and the scalar model parameters.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::interp::{Grid, LinearInterpolator, VectorInterpolator};
use crate::error::{JumpResult, LoadError, ValidationError};

/// Scalar parameters the policy was solved under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArgs {
    /// Lower damage threshold.
    pub y_underline: f64,
    /// Upper threshold.
    #[serde(alias = "y_bar")]
    pub y_overline: f64,
    /// Candidate climate-sensitivity coefficients.
    #[serde(alias = "θ_list")]
    pub theta_list: Vec<f64>,
}

#[derive(Deserialize)]
struct RawPolicySolution {
    y: Vec<f64>,
    e_tilde: Vec<f64>,
    h: Vec<f64>,
    #[serde(alias = "πc")]
    pi_c: Vec<Vec<f64>>,
    #[serde(alias = "πd")]
    pi_d: Vec<Vec<f64>>,
    model_args: ModelArgs,
}

/// Validated policy solution.
#[derive(Debug, Clone, Serialize)]
pub struct PolicySolution {
    y: Grid,
    e_tilde: Vec<f64>,
    h: Vec<f64>,
    pi_c: Vec<Vec<f64>>,
    pi_d: Vec<Vec<f64>>,
    model_args: ModelArgs,
}

impl PolicySolution {
    /// Creates a validated solution.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the grid is invalid, any array is not
    /// aligned with the grid, or the θ list is empty.
    pub fn new(
        y: Vec<f64>,
        e_tilde: Vec<f64>,
        h: Vec<f64>,
        pi_c: Vec<Vec<f64>>,
        pi_d: Vec<Vec<f64>>,
        model_args: ModelArgs,
    ) -> Result<Self, ValidationError> {
        let grid = Grid::new(y)?;
        let n = grid.len();
        check_len("e_tilde", n, &e_tilde)?;
        check_len("h", n, &h)?;
        for (k, row) in pi_c.iter().enumerate() {
            check_len(&format!("pi_c[{k}]"), n, row)?;
        }
        for (k, row) in pi_d.iter().enumerate() {
            check_len(&format!("pi_d[{k}]"), n, row)?;
        }
        if pi_c.is_empty() || pi_d.is_empty() {
            return Err(ValidationError::InvalidConfig {
                reason: "pi_c and pi_d need at least one row".to_string(),
            });
        }
        if model_args.theta_list.is_empty() {
            return Err(ValidationError::EmptyThetaList);
        }
        Ok(Self {
            y: grid,
            e_tilde,
            h,
            pi_c,
            pi_d,
            model_args,
        })
    }

    /// Parse and validate a solution from JSON.
    pub fn from_json_str(json: &str) -> JumpResult<Self> {
        let raw: RawPolicySolution = serde_json::from_str(json).map_err(|e| LoadError::Parse {
            message: e.to_string(),
        })?;
        let solution = Self::new(raw.y, raw.e_tilde, raw.h, raw.pi_c, raw.pi_d, raw.model_args)?;
        Ok(solution)
    }

    /// Read, parse and validate a solution from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> JumpResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&json)
    }

    /// Temperature-anomaly grid.
    #[must_use]
    pub const fn grid(&self) -> &Grid {
        &self.y
    }

    /// Model parameters.
    #[must_use]
    pub const fn model_args(&self) -> &ModelArgs {
        &self.model_args
    }

    /// Number of climate models.
    #[must_use]
    pub fn climate_model_count(&self) -> usize {
        self.pi_c.len()
    }

    /// Number of damage models.
    #[must_use]
    pub fn damage_model_count(&self) -> usize {
        self.pi_d.len()
    }

    /// Emission-rate interpolator.
    pub fn emission(&self) -> Result<LinearInterpolator, ValidationError> {
        LinearInterpolator::on_grid(&self.y, self.e_tilde.clone())
    }

    /// Drift-distortion interpolator.
    pub fn drift_distortion(&self) -> Result<LinearInterpolator, ValidationError> {
        LinearInterpolator::on_grid(&self.y, self.h.clone())
    }

    /// Interpolator for the distorted climate-model probabilities.
    pub fn climate_probabilities(&self) -> Result<VectorInterpolator, ValidationError> {
        VectorInterpolator::on_grid(&self.y, self.pi_c.clone())
    }

    /// Interpolator for the distorted damage-model probabilities.
    pub fn damage_probabilities(&self) -> Result<VectorInterpolator, ValidationError> {
        VectorInterpolator::on_grid(&self.y, self.pi_d.clone())
    }

    /// Interpolator for an auxiliary array aligned with the grid, such as
    /// the marginal value of emission.
    pub fn aligned(&self, field: &str, values: &[f64]) -> Result<LinearInterpolator, ValidationError> {
        check_len(field, self.y.len(), values)?;
        LinearInterpolator::on_grid(&self.y, values.to_vec())
    }
}

fn check_len(field: &str, expected: usize, values: &[f64]) -> Result<(), ValidationError> {
    if values.len() != expected {
        return Err(ValidationError::LengthMismatch {
            field: field.to_string(),
            expected,
            actual: values.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{ScalarPolicy, VectorPolicy};

    const JSON: &str = r#"{
        "y": [1.0, 1.5, 2.0],
        "e_tilde": [0.5, 0.4, 0.3],
        "h": [0.1, 0.2, 0.3],
        "πc": [[0.5, 0.5, 0.5], [0.5, 0.5, 0.5]],
        "pi_d": [[1.0, 1.0, 1.0]],
        "model_args": { "y_underline": 1.5, "y_bar": 2.0, "theta_list": [2.0] }
    }"#;

    #[test]
    fn parses_solver_output_with_aliases() {
        let s = PolicySolution::from_json_str(JSON).unwrap();
        assert_eq!(s.grid().len(), 3);
        assert_eq!(s.climate_model_count(), 2);
        assert_eq!(s.damage_model_count(), 1);
        assert_eq!(s.model_args().y_overline, 2.0);
        assert_eq!(s.emission().unwrap().evaluate(1.5), 0.4);
        assert_eq!(s.climate_probabilities().unwrap().evaluate(1.5), vec![0.5, 0.5]);
    }

    #[test]
    fn rejects_misaligned_arrays() {
        let bad = JSON.replace("\"h\": [0.1, 0.2, 0.3]", "\"h\": [0.1, 0.2]");
        let err = PolicySolution::from_json_str(&bad).unwrap_err();
        assert!(err.is_validation());
        assert!(format!("{err}").contains("'h'"));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = PolicySolution::from_json_str("{\"y\": [1.0, 2.0]").unwrap_err();
        assert!(err.is_load());
    }

    #[test]
    fn serialized_solution_loads_back() {
        let s = PolicySolution::from_json_str(JSON).unwrap();
        let json = serde_json::to_string(&s).unwrap();
        let back = PolicySolution::from_json_str(&json).unwrap();
        assert_eq!(back.grid(), s.grid());
        assert_eq!(back.model_args(), s.model_args());
    }

    #[test]
    fn rejects_empty_theta_list() {
        let err = PolicySolution::new(
            vec![0.0, 1.0],
            vec![1.0, 1.0],
            vec![0.0, 0.0],
            vec![vec![1.0, 1.0]],
            vec![vec![1.0, 1.0]],
            ModelArgs {
                y_underline: 1.5,
                y_overline: 2.0,
                theta_list: vec![],
            },
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::EmptyThetaList));
    }

    #[test]
    fn aligned_checks_length() {
        let s = PolicySolution::from_json_str(JSON).unwrap();
        assert!(s.aligned("me", &[1.0, 2.0]).is_err());
        assert_eq!(s.aligned("me", &[1.0, 2.0, 3.0]).unwrap().evaluate(1.75), 2.5);
    }
}
