//! Policy functions consumed by the simulators.
//!
//! A policy is anything that can be evaluated at a temperature-anomaly level.
//! Interpolated grids report their domain so simulators can stop before
//! evaluating outside it; plain closures are unbounded.

pub mod interp;
pub mod solution;

pub use interp::{Grid, LinearInterpolator, VectorInterpolator};
pub use solution::{ModelArgs, PolicySolution};

use crate::error::ExecutionError;

/// Scalar-valued policy function (emission rate, drift distortion, ...).
pub trait ScalarPolicy: Send + Sync {
    /// Evaluate the policy at `x`.
    fn evaluate(&self, x: f64) -> f64;

    /// Closed interval on which `evaluate` is meaningful, if bounded.
    fn domain(&self) -> Option<(f64, f64)> {
        None
    }
}

/// Vector-valued policy function (model-probability distortions).
pub trait VectorPolicy: Send + Sync {
    /// Evaluate the policy at `x`.
    fn evaluate(&self, x: f64) -> Vec<f64>;

    /// Closed interval on which `evaluate` is meaningful, if bounded.
    fn domain(&self) -> Option<(f64, f64)> {
        None
    }
}

impl<F> ScalarPolicy for F
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    fn evaluate(&self, x: f64) -> f64 {
        self(x)
    }
}

impl<F> VectorPolicy for F
where
    F: Fn(f64) -> Vec<f64> + Send + Sync,
{
    fn evaluate(&self, x: f64) -> Vec<f64> {
        self(x)
    }
}

/// Returns true if `x` lies inside `domain` (or the domain is unbounded).
#[must_use]
pub fn in_domain(domain: Option<(f64, f64)>, x: f64) -> bool {
    match domain {
        Some((lo, hi)) => x >= lo && x <= hi,
        None => x.is_finite(),
    }
}

/// Evaluate a scalar policy, failing outside its domain.
pub fn evaluate_checked(
    policy: &dyn ScalarPolicy,
    name: &str,
    x: f64,
) -> Result<f64, ExecutionError> {
    check_domain(policy.domain(), name, x)?;
    Ok(policy.evaluate(x))
}

/// Evaluate a vector policy, failing outside its domain.
pub fn evaluate_vector_checked(
    policy: &dyn VectorPolicy,
    name: &str,
    x: f64,
) -> Result<Vec<f64>, ExecutionError> {
    check_domain(policy.domain(), name, x)?;
    Ok(policy.evaluate(x))
}

fn check_domain(domain: Option<(f64, f64)>, name: &str, x: f64) -> Result<(), ExecutionError> {
    if in_domain(domain, x) {
        return Ok(());
    }
    let (lo, hi) = domain.unwrap_or((f64::NEG_INFINITY, f64::INFINITY));
    Err(ExecutionError::OutOfDomain {
        policy: name.to_string(),
        x,
        lo,
        hi,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_unbounded_policies() {
        let e = |y: f64| 2.0 * y;
        assert_eq!(ScalarPolicy::evaluate(&e, 3.0), 6.0);
        assert!(ScalarPolicy::domain(&e).is_none());

        let pi = |_y: f64| vec![0.25, 0.75];
        assert_eq!(VectorPolicy::evaluate(&pi, 1.0), vec![0.25, 0.75]);
    }

    #[test]
    fn checked_evaluation_rejects_out_of_domain() {
        let interp = LinearInterpolator::new(vec![0.0, 1.0], vec![1.0, 2.0]).unwrap();
        assert_eq!(evaluate_checked(&interp, "e", 0.5).unwrap(), 1.5);

        let err = evaluate_checked(&interp, "e", 1.5).unwrap_err();
        assert!(matches!(err, ExecutionError::OutOfDomain { .. }));
    }

    #[test]
    fn unbounded_domain_rejects_nan() {
        assert!(!in_domain(None, f64::NAN));
        assert!(in_domain(None, 1e9));
        assert!(in_domain(Some((0.0, 1.0)), 1.0));
        assert!(!in_domain(Some((0.0, 1.0)), 1.000_001));
    }
}
