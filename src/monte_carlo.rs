//! Monte Carlo realization of the damage-jump process.
//!
//! Each call produces one path from a caller-supplied random generator. While
//! no jump has occurred, every period above the lower threshold draws a
//! Bernoulli jump with the intensity-implied probability. A jump selects a
//! damage model from the distorted damage distribution, resets the level to
//! the landing level, and from then on the realized regime drives every
//! period with no further randomness.
//!
//! Two variants exist:
//! - `Base`: a climate model is drawn once at time 0 and its coefficient is
//!   used throughout.
//! - `Extended`: before the jump the drift uses the probability-weighted mean
//!   coefficient; at the jump a climate model is drawn from the realized
//!   damage model's post-jump climate distribution. The jump is also forced
//!   once the level reaches the upper threshold.

use std::fmt;
use std::sync::Arc;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::{JumpSettings, PathSettings};
use crate::error::{ExecutionError, JumpResult, ValidationError};
use crate::policy::{in_domain, ScalarPolicy, VectorPolicy};
use crate::trajectory::McPath;

/// Monte Carlo variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McVariant {
    /// Climate coefficient drawn once at time 0.
    Base,
    /// Climate coefficient re-drawn at the jump; jump forced at the upper threshold.
    Extended,
}

impl fmt::Display for McVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => write!(f, "base"),
            Self::Extended => write!(f, "extended"),
        }
    }
}

/// Policy functions driving a Monte Carlo path.
#[derive(Clone)]
pub struct JumpPolicies {
    emission_pre: Arc<dyn ScalarPolicy>,
    emission_post: Vec<Arc<dyn ScalarPolicy>>,
    climate_pre: Arc<dyn VectorPolicy>,
    climate_post: Vec<Arc<dyn VectorPolicy>>,
    damage_distortion: Arc<dyn VectorPolicy>,
    theta: Vec<f64>,
}

impl fmt::Debug for JumpPolicies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JumpPolicies")
            .field("damage_models", &self.emission_post.len())
            .field("climate_post", &self.climate_post.len())
            .field("theta", &self.theta)
            .finish_non_exhaustive()
    }
}

impl JumpPolicies {
    /// Creates the policies shared by both variants.
    ///
    /// `emission_post[i]` is the emission policy after damage model `i` is
    /// realized; `climate_pre` and `damage_distortion` are the pre-jump
    /// distorted probabilities over `theta` and over damage models.
    #[must_use]
    pub fn new(
        emission_pre: Arc<dyn ScalarPolicy>,
        emission_post: Vec<Arc<dyn ScalarPolicy>>,
        climate_pre: Arc<dyn VectorPolicy>,
        damage_distortion: Arc<dyn VectorPolicy>,
        theta: Vec<f64>,
    ) -> Self {
        Self {
            emission_pre,
            emission_post,
            climate_pre,
            climate_post: Vec::new(),
            damage_distortion,
            theta,
        }
    }

    /// Post-jump climate distributions, one per damage model (extended variant).
    #[must_use]
    pub fn with_climate_post(mut self, climate_post: Vec<Arc<dyn VectorPolicy>>) -> Self {
        self.climate_post = climate_post;
        self
    }

    /// Number of damage models.
    #[must_use]
    pub fn damage_model_count(&self) -> usize {
        self.emission_post.len()
    }

    /// Validate the policies for a variant.
    pub fn validate(&self, variant: McVariant) -> Result<(), ValidationError> {
        if self.theta.is_empty() {
            return Err(ValidationError::EmptyThetaList);
        }
        if self.theta.iter().any(|t| !t.is_finite()) {
            return Err(ValidationError::NonFinite {
                field: "theta".to_string(),
            });
        }
        if self.emission_post.is_empty() {
            return Err(ValidationError::InvalidConfig {
                reason: "at least one post-jump emission policy is required".to_string(),
            });
        }
        if variant == McVariant::Extended && self.climate_post.len() != self.emission_post.len() {
            return Err(ValidationError::DamageModelCount {
                expected: self.emission_post.len(),
                actual: self.climate_post.len(),
            });
        }
        Ok(())
    }

    fn theta_at(&self, idx: usize) -> JumpResult<f64> {
        self.theta.get(idx).copied().ok_or_else(|| {
            ValidationError::LengthMismatch {
                field: "climate probabilities".to_string(),
                expected: self.theta.len(),
                actual: idx + 1,
            }
            .into()
        })
    }

    fn weighted_theta(&self, weights: &[f64]) -> JumpResult<f64> {
        if weights.len() != self.theta.len() {
            return Err(ValidationError::LengthMismatch {
                field: "climate probabilities".to_string(),
                expected: self.theta.len(),
                actual: weights.len(),
            }
            .into());
        }
        let total: f64 = weights.iter().sum();
        if !total.is_finite() || total <= 0.0 {
            return Err(ExecutionError::Sampling {
                distribution: "climate_pre".to_string(),
                reason: format!("weights sum to {total}"),
            }
            .into());
        }
        let acc: f64 = self.theta.iter().zip(weights).map(|(t, w)| t * w).sum();
        Ok(acc / total)
    }
}

/// Regime fixed by a realized jump.
#[derive(Debug, Clone, Copy)]
struct Realized {
    damage: usize,
    climate: Option<usize>,
    theta: f64,
}

/// How the drift coefficient is chosen before a jump.
#[derive(Debug, Clone, Copy)]
enum Drift {
    Fixed(f64),
    Weighted,
}

/// Outcome of one period.
struct Step {
    emission: f64,
    theta: f64,
    next_y: f64,
    realized: Option<Realized>,
}

fn eval(policy: &dyn ScalarPolicy, x: f64) -> Option<f64> {
    in_domain(policy.domain(), x).then(|| policy.evaluate(x))
}

fn eval_vec(policy: &dyn VectorPolicy, x: f64) -> Option<Vec<f64>> {
    in_domain(policy.domain(), x).then(|| policy.evaluate(x))
}

fn sample_index<R: Rng>(weights: &[f64], distribution: &str, rng: &mut R) -> JumpResult<usize> {
    let dist = WeightedIndex::new(weights).map_err(|e| ExecutionError::Sampling {
        distribution: distribution.to_string(),
        reason: e.to_string(),
    })?;
    Ok(dist.sample(rng))
}

/// Simulates single Monte Carlo paths.
#[derive(Debug, Clone)]
pub struct MonteCarloSimulator {
    settings: PathSettings,
    jump: JumpSettings,
    policies: JumpPolicies,
}

impl MonteCarloSimulator {
    /// Creates a simulator.
    pub fn new(
        settings: PathSettings,
        jump: JumpSettings,
        policies: JumpPolicies,
    ) -> Result<Self, ValidationError> {
        settings.validate()?;
        jump.validate()?;
        Ok(Self {
            settings,
            jump,
            policies,
        })
    }

    /// Path settings.
    #[must_use]
    pub const fn settings(&self) -> &PathSettings {
        &self.settings
    }

    /// Simulate one path.
    ///
    /// A policy queried outside its domain ends the path early; the result
    /// then holds only the fully computed periods and records `truncated_at`.
    ///
    /// # Errors
    ///
    /// Fails if the policies are invalid for `variant` or a probability
    /// vector cannot be sampled from.
    #[instrument(skip_all, fields(variant = %variant))]
    pub fn simulate<R: Rng>(&self, variant: McVariant, rng: &mut R) -> JumpResult<McPath> {
        self.policies.validate(variant)?;

        let periods = self.settings.periods();
        let dt = self.settings.dt;
        let y0 = self.settings.y_start;
        let mut path = McPath {
            temperature: vec![0.0; periods + 1],
            accumulated: vec![0.0; periods + 1],
            emission: vec![0.0; periods + 1],
            damage_loc: vec![None; periods + 1],
            climate_loc: vec![None; periods + 1],
            initial_climate: None,
            truncated_at: None,
        };
        path.temperature[0] = y0;

        let drift = match variant {
            McVariant::Base => {
                let Some(pi_c) = eval_vec(self.policies.climate_pre.as_ref(), y0) else {
                    path.truncate(0);
                    return Ok(path);
                };
                let idx = sample_index(&pi_c, "climate_pre", rng)?;
                path.initial_climate = Some(idx);
                Drift::Fixed(self.policies.theta_at(idx)?)
            }
            McVariant::Extended => {
                path.accumulated[0] = y0;
                Drift::Weighted
            }
        };

        let mut realized: Option<Realized> = None;
        for t in 0..periods {
            let y = path.temperature[t];
            let Some(step) = self.advance(variant, drift, y, realized, dt, rng)? else {
                debug!(period = t, y, "policy queried outside its domain, truncating");
                path.truncate(t);
                return Ok(path);
            };
            if realized.is_none() {
                if let Some(r) = step.realized {
                    debug!(period = t, y, damage = r.damage, climate = ?r.climate, "jump realized");
                }
            }
            realized = step.realized;
            path.emission[t] = step.emission;
            path.temperature[t + 1] = step.next_y;
            path.accumulated[t + 1] = path.accumulated[t] + step.theta * step.emission * dt;
            if let Some(r) = realized {
                path.damage_loc[t] = Some(r.damage);
                path.climate_loc[t] = r.climate;
            }
        }

        // The last slot only needs the emission of the active regime.
        let y_last = path.temperature[periods];
        let last = match realized {
            Some(r) => eval(self.policies.emission_post[r.damage].as_ref(), y_last),
            None => eval(self.policies.emission_pre.as_ref(), y_last),
        };
        let Some(e_last) = last else {
            path.truncate(periods);
            return Ok(path);
        };
        path.emission[periods] = e_last;
        if let Some(r) = realized {
            path.damage_loc[periods] = Some(r.damage);
            path.climate_loc[periods] = r.climate;
        }
        Ok(path)
    }

    fn advance<R: Rng>(
        &self,
        variant: McVariant,
        drift: Drift,
        y: f64,
        realized: Option<Realized>,
        dt: f64,
        rng: &mut R,
    ) -> JumpResult<Option<Step>> {
        let policies = &self.policies;

        if let Some(r) = realized {
            let Some(e) = eval(policies.emission_post[r.damage].as_ref(), y) else {
                return Ok(None);
            };
            return Ok(Some(Step {
                emission: e,
                theta: r.theta,
                next_y: y + r.theta * e * dt,
                realized,
            }));
        }

        if y > self.jump.y_underline {
            let mut p = self
                .jump
                .intensity
                .jump_probability(y, self.jump.y_underline, dt);
            if variant == McVariant::Extended && y >= self.jump.y_overline {
                p = 1.0;
            }
            if !p.is_finite() {
                return Err(ExecutionError::Sampling {
                    distribution: "jump".to_string(),
                    reason: format!("jump probability is {p} at y = {y}"),
                }
                .into());
            }
            if rng.gen_bool(p) {
                return self.jump_to(variant, drift, y, rng);
            }
        }

        let Some(e) = eval(policies.emission_pre.as_ref(), y) else {
            return Ok(None);
        };
        let theta = match drift {
            Drift::Fixed(theta) => theta,
            Drift::Weighted => {
                let Some(pi_c) = eval_vec(policies.climate_pre.as_ref(), y) else {
                    return Ok(None);
                };
                policies.weighted_theta(&pi_c)?
            }
        };
        Ok(Some(Step {
            emission: e,
            theta,
            next_y: y + theta * e * dt,
            realized: None,
        }))
    }

    fn jump_to<R: Rng>(
        &self,
        variant: McVariant,
        drift: Drift,
        y: f64,
        rng: &mut R,
    ) -> JumpResult<Option<Step>> {
        let policies = &self.policies;
        let landing = self.jump.landing_level;

        let Some(pi_d) = eval_vec(policies.damage_distortion.as_ref(), y) else {
            return Ok(None);
        };
        let damage = sample_index(&pi_d, "damage_distortion", rng)?;
        let Some(emission_post) = policies.emission_post.get(damage) else {
            return Err(ValidationError::DamageModelCount {
                expected: policies.emission_post.len(),
                actual: pi_d.len(),
            }
            .into());
        };
        let Some(e) = eval(emission_post.as_ref(), landing) else {
            return Ok(None);
        };

        // Base paths keep the coefficient drawn at time 0.
        let (climate, theta) = match (variant, drift) {
            (McVariant::Base, Drift::Fixed(theta)) => (None, theta),
            _ => {
                let Some(pi_c) = eval_vec(policies.climate_post[damage].as_ref(), landing) else {
                    return Ok(None);
                };
                let c = sample_index(&pi_c, "climate_post", rng)?;
                (Some(c), policies.theta_at(c)?)
            }
        };
        Ok(Some(Step {
            emission: e,
            theta,
            next_y: landing,
            realized: Some(Realized {
                damage,
                climate,
                theta,
            }),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use crate::policy::LinearInterpolator;

    fn policies() -> JumpPolicies {
        let post: Vec<Arc<dyn ScalarPolicy>> = (0..3u8)
            .map(|i| {
                let level = 0.05 * f64::from(i + 1);
                Arc::new(move |_y: f64| level) as Arc<dyn ScalarPolicy>
            })
            .collect();
        let climate_post: Vec<Arc<dyn VectorPolicy>> = (0..3)
            .map(|_| Arc::new(|_y: f64| vec![0.5, 0.5]) as Arc<dyn VectorPolicy>)
            .collect();
        JumpPolicies::new(
            Arc::new(|_y: f64| 0.1),
            post,
            Arc::new(|_y: f64| vec![0.25, 0.75]),
            Arc::new(|_y: f64| vec![1.0 / 3.0; 3]),
            vec![1.0, 2.0],
        )
        .with_climate_post(climate_post)
    }

    fn simulator(y0: f64, horizon: f64) -> MonteCarloSimulator {
        MonteCarloSimulator::new(
            PathSettings::new(y0, horizon, 1.0),
            JumpSettings::default(),
            policies(),
        )
        .unwrap()
    }

    #[test]
    fn regime_is_permanent_after_jump() {
        let sim = simulator(1.1, 60.0);
        for seed in 0..50 {
            for variant in [McVariant::Base, McVariant::Extended] {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let path = sim.simulate(variant, &mut rng).unwrap();
                assert_eq!(path.len(), 61);
                if let Some(t) = path.jump_period() {
                    let d = path.damage_loc[t];
                    assert!(path.damage_loc[t..].iter().all(|loc| *loc == d));
                    let c = path.climate_loc[t];
                    assert!(path.climate_loc[t..].iter().all(|loc| *loc == c));
                    assert!(path.damage_loc[..t].iter().all(Option::is_none));
                }
            }
        }
    }

    #[test]
    fn extended_jump_lands_exactly_and_is_forced_at_upper_threshold() {
        let sim = simulator(2.5, 10.0);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let path = sim.simulate(McVariant::Extended, &mut rng).unwrap();
        assert_eq!(path.jump_period(), Some(0));
        assert_eq!(path.temperature[1], 2.0);
        assert!(path.climate_loc[0].is_some());
        assert!(path.initial_climate.is_none());
    }

    #[test]
    fn only_extended_forces_the_jump_at_upper_threshold() {
        // At y = 2.0 with dt = 1 the clamped intensity gives p ~ 0.55.
        let sim = simulator(2.0, 1.0);
        let mut base_jumps = 0;
        for seed in 0..200 {
            let base = sim
                .simulate(McVariant::Base, &mut ChaCha8Rng::seed_from_u64(seed))
                .unwrap();
            if base.jump_period().is_some() {
                base_jumps += 1;
            }
            let extended = sim
                .simulate(McVariant::Extended, &mut ChaCha8Rng::seed_from_u64(seed))
                .unwrap();
            assert_eq!(extended.jump_period(), Some(0));
        }
        assert!(base_jumps > 0);
        assert!(base_jumps < 200);
    }

    #[test]
    fn no_jump_below_threshold() {
        let mut p = policies();
        p.emission_pre = Arc::new(|_y: f64| 0.0);
        let sim = MonteCarloSimulator::new(
            PathSettings::new(1.0, 20.0, 1.0),
            JumpSettings::default(),
            p,
        )
        .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let path = sim.simulate(McVariant::Base, &mut rng).unwrap();
        assert!(path.damage_loc.iter().all(Option::is_none));
        assert!(path.temperature.iter().all(|y| *y == 1.0));
        assert_eq!(path.emission.len(), 21);
    }

    #[test]
    fn base_uses_the_initial_climate_draw() {
        let sim = simulator(1.1, 3.0);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let path = sim.simulate(McVariant::Base, &mut rng).unwrap();
        let theta = [1.0, 2.0][path.initial_climate.unwrap()];
        assert!((path.accumulated[1] - theta * 0.1).abs() < 1e-12);
        assert!((path.temperature[1] - (1.1 + theta * 0.1)).abs() < 1e-12);
        assert!(path.climate_loc.iter().all(Option::is_none));
    }

    #[test]
    fn extended_drift_uses_weighted_mean_before_jump() {
        let sim = simulator(1.1, 3.0);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let path = sim.simulate(McVariant::Extended, &mut rng).unwrap();
        assert_eq!(path.accumulated[0], 1.1);
        assert!((path.temperature[1] - (1.1 + 1.75 * 0.1)).abs() < 1e-12);
    }

    #[test]
    fn same_seed_same_path() {
        let sim = simulator(1.4, 40.0);
        let a = sim.simulate(McVariant::Extended, &mut ChaCha8Rng::seed_from_u64(11)).unwrap();
        let b = sim.simulate(McVariant::Extended, &mut ChaCha8Rng::seed_from_u64(11)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn leaving_the_grid_truncates() {
        let mut p = policies();
        p.emission_pre = Arc::new(LinearInterpolator::new(vec![0.0, 1.35], vec![0.1, 0.1]).unwrap());
        p.climate_pre = Arc::new(|_y: f64| vec![1.0, 0.0]);
        let sim = MonteCarloSimulator::new(
            PathSettings::new(1.1, 10.0, 1.0),
            JumpSettings::default(),
            p,
        )
        .unwrap();
        let path = sim.simulate(McVariant::Base, &mut ChaCha8Rng::seed_from_u64(0)).unwrap();
        // 1.1, 1.2, 1.3, then 1.4 is off the grid
        assert_eq!(path.truncated_at, Some(3));
        assert_eq!(path.len(), 3);
        assert_eq!(path.emission.len(), 3);
    }

    #[test]
    fn zero_damage_weights_fail_to_sample() {
        let mut p = policies();
        p.damage_distortion = Arc::new(|_y: f64| vec![0.0; 3]);
        let sim = MonteCarloSimulator::new(
            PathSettings::new(2.5, 5.0, 1.0),
            JumpSettings::default(),
            p,
        )
        .unwrap();
        let err = sim
            .simulate(McVariant::Extended, &mut ChaCha8Rng::seed_from_u64(0))
            .unwrap_err();
        assert!(err.is_execution());
    }

    #[test]
    fn extended_requires_post_jump_climate() {
        let p = policies().with_climate_post(Vec::new());
        assert!(p.validate(McVariant::Base).is_ok());
        assert!(matches!(
            p.validate(McVariant::Extended),
            Err(ValidationError::DamageModelCount { expected: 3, actual: 0 })
        ));
    }
}
