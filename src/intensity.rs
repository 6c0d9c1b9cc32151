//! Damage-jump intensity.
//!
//! The hazard rate is zero below the damage threshold and grows as
//! `r1 * (exp(r2 / 2 * (y - y_underline)^2) - 1)` above it.

use serde::{Deserialize, Serialize};

/// Coefficients of the jump intensity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntensityParams {
    /// Scale of the hazard rate.
    pub r1: f64,
    /// Curvature of the hazard rate.
    pub r2: f64,
}

impl IntensityParams {
    /// Default scale.
    pub const R1: f64 = 1.5;

    /// Default curvature.
    pub const R2: f64 = 2.5;

    /// Hazard rate at temperature anomaly `y` given the threshold `y_underline`.
    #[must_use]
    pub fn intensity(&self, y: f64, y_underline: f64) -> f64 {
        if y < y_underline {
            return 0.0;
        }
        let gap = y - y_underline;
        self.r1 * ((self.r2 / 2.0 * gap * gap).exp() - 1.0)
    }

    /// Per-step jump probability, clamped to `[0, 1]`.
    #[must_use]
    pub fn jump_probability(&self, y: f64, y_underline: f64, dt: f64) -> f64 {
        (self.intensity(y, y_underline) * dt).clamp(0.0, 1.0)
    }
}

impl Default for IntensityParams {
    fn default() -> Self {
        Self {
            r1: Self::R1,
            r2: Self::R2,
        }
    }
}

/// Hazard rate with the default coefficients.
#[must_use]
pub fn damage_intensity(y: f64, y_underline: f64) -> f64 {
    IntensityParams::default().intensity(y, y_underline)
}

/// Per-step jump probability with the default coefficients.
#[must_use]
pub fn jump_probability(y: f64, y_underline: f64, dt: f64) -> f64 {
    IntensityParams::default().jump_probability(y, y_underline, dt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_below_and_at_threshold() {
        assert_eq!(damage_intensity(1.4, 1.5), 0.0);
        assert_eq!(damage_intensity(1.5, 1.5), 0.0);
        assert_eq!(damage_intensity(-10.0, 1.5), 0.0);
    }

    #[test]
    fn matches_closed_form_above_threshold() {
        let expected = 1.5 * ((2.5 / 2.0 * 0.25_f64).exp() - 1.0);
        assert!((damage_intensity(2.0, 1.5) - expected).abs() < 1e-15);
    }

    #[test]
    fn non_decreasing_above_threshold() {
        let mut prev = 0.0;
        for i in 0..200u8 {
            let y = 1.5 + f64::from(i) * 0.01;
            let rate = damage_intensity(y, 1.5);
            assert!(rate >= prev);
            prev = rate;
        }
    }

    #[test]
    fn probability_is_clamped() {
        assert_eq!(jump_probability(10.0, 1.5, 1.0), 1.0);
        assert_eq!(jump_probability(1.0, 1.5, 1.0), 0.0);
        let p = jump_probability(1.6, 1.5, 0.25);
        assert!(p > 0.0 && p < 1.0);
    }
}
