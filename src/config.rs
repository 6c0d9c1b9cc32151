//! Simulation settings.
//!
//! Every simulator takes its parameters as an explicit value; nothing is
//! shared between independently configured runs.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::intensity::IntensityParams;

/// Start level, horizon and step of a single path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathSettings {
    /// Initial temperature anomaly.
    pub y_start: f64,
    /// Time span of the simulation.
    pub horizon: f64,
    /// Time step.
    pub dt: f64,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            y_start: 1.0,
            horizon: 100.0,
            dt: 1.0,
        }
    }
}

impl PathSettings {
    /// Largest number of periods a single path may span.
    pub const MAX_PERIODS: u32 = 10_000_000;

    /// Creates settings from start level, horizon and step.
    #[must_use]
    pub const fn new(y_start: f64, horizon: f64, dt: f64) -> Self {
        Self {
            y_start,
            horizon,
            dt,
        }
    }

    /// Number of simulated periods, `floor(horizon / dt)`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn periods(&self) -> usize {
        (self.horizon / self.dt).floor() as usize
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_time_step(self.dt)?;
        if !self.horizon.is_finite() || self.horizon <= 0.0 {
            return Err(ValidationError::InvalidHorizon {
                horizon: self.horizon,
            });
        }
        if (self.horizon / self.dt).floor() > f64::from(Self::MAX_PERIODS) {
            return Err(ValidationError::InvalidConfig {
                reason: format!(
                    "horizon {} with step {} exceeds {} periods",
                    self.horizon,
                    self.dt,
                    Self::MAX_PERIODS
                ),
            });
        }
        if !self.y_start.is_finite() {
            return Err(ValidationError::NonFinite {
                field: "y_start".to_string(),
            });
        }
        Ok(())
    }
}

/// Thresholds and landing level of the damage jump.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JumpSettings {
    /// Level below which no jump can occur.
    pub y_underline: f64,
    /// Level at which the extended Monte Carlo variant forces the jump.
    pub y_overline: f64,
    /// Level the temperature anomaly is reset to when a jump is realized.
    pub landing_level: f64,
    /// Intensity coefficients.
    pub intensity: IntensityParams,
}

impl Default for JumpSettings {
    fn default() -> Self {
        Self {
            y_underline: 1.5,
            y_overline: 2.0,
            landing_level: 2.0,
            intensity: IntensityParams::default(),
        }
    }
}

impl JumpSettings {
    /// Validate thresholds.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let values = [self.y_underline, self.y_overline, self.landing_level];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ValidationError::NonFinite {
                field: "jump_settings".to_string(),
            });
        }
        if self.y_overline < self.y_underline {
            return Err(ValidationError::InvalidConfig {
                reason: format!(
                    "y_overline ({}) must be >= y_underline ({})",
                    self.y_overline, self.y_underline
                ),
            });
        }
        if self.intensity.r1 < 0.0 || self.intensity.r2 < 0.0 {
            return Err(ValidationError::InvalidConfig {
                reason: "intensity coefficients must be >= 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration of the exact branching evolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchingConfig {
    /// Number of damage models a jump can select.
    pub damage_model_num: usize,
    /// Undistorted probability of each damage model.
    pub damage_prob: Vec<f64>,
    /// Time step of one evolution.
    pub dt: f64,
    /// Jump thresholds.
    pub jump: JumpSettings,
}

impl BranchingConfig {
    /// Default number of damage models.
    pub const DAMAGE_MODEL_NUM: usize = 20;

    /// Default time step.
    pub const DT: f64 = 0.25;

    /// Replace the damage-model count and their probabilities.
    #[must_use]
    pub fn with_damage(mut self, damage_model_num: usize, damage_prob: Vec<f64>) -> Self {
        self.damage_model_num = damage_model_num;
        self.damage_prob = damage_prob;
        self
    }

    /// Replace the time step.
    #[must_use]
    pub const fn with_time_step(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_time_step(self.dt)?;
        self.jump.validate()?;
        if self.damage_model_num == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "damage_model_num must be > 0".to_string(),
            });
        }
        if self.damage_prob.len() != self.damage_model_num {
            return Err(ValidationError::DamageModelCount {
                expected: self.damage_model_num,
                actual: self.damage_prob.len(),
            });
        }
        validate_distribution("damage_prob", &self.damage_prob)
    }
}

impl Default for BranchingConfig {
    #[allow(clippy::cast_precision_loss)]
    fn default() -> Self {
        let n = Self::DAMAGE_MODEL_NUM;
        Self {
            damage_model_num: n,
            damage_prob: vec![1.0 / n as f64; n],
            dt: Self::DT,
            jump: JumpSettings::default(),
        }
    }
}

/// Worker pool and seeding for multi-path Monte Carlo runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Maximum queued path jobs.
    pub queue_capacity: usize,
    /// Seed every per-path stream is derived from.
    pub base_seed: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 1024,
            base_seed: 0,
        }
    }
}

impl BatchConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.workers == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "workers must be > 0".to_string(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "queue_capacity must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

pub(crate) fn validate_time_step(dt: f64) -> Result<(), ValidationError> {
    if !dt.is_finite() || dt <= 0.0 {
        return Err(ValidationError::InvalidTimeStep { dt });
    }
    Ok(())
}

/// Checks that `probs` is a non-negative vector summing to one.
pub(crate) fn validate_distribution(field: &str, probs: &[f64]) -> Result<(), ValidationError> {
    if probs.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return Err(ValidationError::InvalidProbabilities {
            field: field.to_string(),
            reason: "entries must be finite and >= 0".to_string(),
        });
    }
    let total: f64 = probs.iter().sum();
    if (total - 1.0).abs() > 1e-9 {
        return Err(ValidationError::InvalidProbabilities {
            field: field.to_string(),
            reason: format!("entries sum to {total}, expected 1"),
        });
    }
    Ok(())
}
