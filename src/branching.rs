//! Exact probability-weighted branching of the damage-jump process.
//!
//! A `BranchState` is an immutable snapshot of one branch of the probability
//! tree. `evolve` returns brand-new children and never touches the parent, so
//! branches can be expanded in any order, including in parallel.
//!
//! From a pre-jump branch with non-zero jump probability `p`, one child per
//! damage model lands at the fixed landing level with mass
//! `π_d[i] * p * mass`, and one child stays pre-jump with mass
//! `(1 - p) * mass`. Every other branch continues one-to-one with its mass
//! unchanged; a realized jump is permanent.

use std::fmt;
use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::BranchingConfig;
use crate::error::{ExecutionError, JumpResult, ValidationError};
use crate::policy::{evaluate_checked, ScalarPolicy};

/// Regime of a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "regime", rename_all = "snake_case")]
pub enum Regime {
    /// No jump has been realized yet.
    PreJump,
    /// A jump selected damage model `damage_index`.
    PostJump {
        /// Realized damage model.
        damage_index: usize,
    },
}

impl Regime {
    /// Returns true once a jump has been realized.
    #[must_use]
    pub const fn is_post_jump(&self) -> bool {
        matches!(self, Self::PostJump { .. })
    }

    /// Realized damage model, if any.
    #[must_use]
    pub const fn damage_index(&self) -> Option<usize> {
        match self {
            Self::PreJump => None,
            Self::PostJump { damage_index } => Some(*damage_index),
        }
    }
}

/// State vector carried by a branch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BranchVariables {
    /// Emission applied in the step that produced this state.
    pub emission: f64,
    /// Temperature-anomaly level.
    pub y: f64,
    /// Accumulated temperature anomaly.
    pub accumulated: f64,
}

/// How damage-model probabilities are chosen at a jump.
#[derive(Clone, Default)]
pub enum DamageDistortion {
    /// Use the configured `damage_prob`.
    #[default]
    Fixed,
    /// Evaluate one distortion function per damage model at the accumulated
    /// temperature.
    Distorted(Vec<Arc<dyn ScalarPolicy>>),
}

impl fmt::Debug for DamageDistortion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => write!(f, "Fixed"),
            Self::Distorted(funcs) => write!(f, "Distorted({} functions)", funcs.len()),
        }
    }
}

impl DamageDistortion {
    fn probabilities(&self, config: &BranchingConfig, accumulated: f64) -> JumpResult<Vec<f64>> {
        match self {
            Self::Fixed => Ok(config.damage_prob.clone()),
            Self::Distorted(funcs) => {
                if funcs.len() != config.damage_model_num {
                    return Err(ValidationError::DamageModelCount {
                        expected: config.damage_model_num,
                        actual: funcs.len(),
                    }
                    .into());
                }
                funcs
                    .iter()
                    .enumerate()
                    .map(|(i, f)| {
                        evaluate_checked(f.as_ref(), &format!("damage_distortion[{i}]"), accumulated)
                            .map_err(Into::into)
                    })
                    .collect()
            }
        }
    }
}

/// Configuration plus per-regime emission policies.
#[derive(Clone)]
pub struct BranchingModel {
    config: BranchingConfig,
    emission_pre: Arc<dyn ScalarPolicy>,
    emission_post: Vec<Arc<dyn ScalarPolicy>>,
}

impl fmt::Debug for BranchingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BranchingModel")
            .field("config", &self.config)
            .field("emission_post", &self.emission_post.len())
            .finish_non_exhaustive()
    }
}

impl BranchingModel {
    /// Creates a model; one post-jump emission policy per damage model.
    pub fn new(
        config: BranchingConfig,
        emission_pre: Arc<dyn ScalarPolicy>,
        emission_post: Vec<Arc<dyn ScalarPolicy>>,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        if emission_post.len() != config.damage_model_num {
            return Err(ValidationError::DamageModelCount {
                expected: config.damage_model_num,
                actual: emission_post.len(),
            });
        }
        Ok(Self {
            config,
            emission_pre,
            emission_post,
        })
    }

    /// Model configuration.
    #[must_use]
    pub const fn config(&self) -> &BranchingConfig {
        &self.config
    }

    fn emission(&self, regime: Regime, y: f64) -> JumpResult<f64> {
        match regime {
            Regime::PreJump => Ok(evaluate_checked(self.emission_pre.as_ref(), "emission_pre", y)?),
            Regime::PostJump { damage_index } => {
                let policy = self.emission_post.get(damage_index).ok_or_else(|| {
                    ValidationError::InvalidConfig {
                        reason: format!(
                            "damage index {damage_index} out of range for {} models",
                            self.emission_post.len()
                        ),
                    }
                })?;
                Ok(evaluate_checked(
                    policy.as_ref(),
                    &format!("emission_post[{damage_index}]"),
                    y,
                )?)
            }
        }
    }
}

/// One branch of the probability tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BranchState {
    step: usize,
    time: f64,
    mass: f64,
    regime: Regime,
    variables: BranchVariables,
}

impl BranchState {
    /// Root of a tree: pre-jump, mass 1, time 0.
    #[must_use]
    pub const fn initial(variables: BranchVariables) -> Self {
        Self {
            step: 0,
            time: 0.0,
            mass: 1.0,
            regime: Regime::PreJump,
            variables,
        }
    }

    /// Number of evolutions since the root.
    #[must_use]
    pub const fn step(&self) -> usize {
        self.step
    }

    /// Elapsed time.
    #[must_use]
    pub const fn time(&self) -> f64 {
        self.time
    }

    /// Probability mass of this branch.
    #[must_use]
    pub const fn mass(&self) -> f64 {
        self.mass
    }

    /// Regime of this branch.
    #[must_use]
    pub const fn regime(&self) -> Regime {
        self.regime
    }

    /// State vector.
    #[must_use]
    pub const fn variables(&self) -> BranchVariables {
        self.variables
    }

    fn child(&self, dt: f64, mass: f64, regime: Regime, variables: BranchVariables) -> Self {
        Self {
            step: self.step + 1,
            time: self.time + dt,
            mass,
            regime,
            variables,
        }
    }

    /// Successor branches after one time step.
    ///
    /// # Errors
    ///
    /// Fails if an emission or distortion policy would be evaluated outside
    /// its domain, or a distortion does not cover every damage model.
    pub fn evolve(
        &self,
        model: &BranchingModel,
        theta_mean: f64,
        distortion: &DamageDistortion,
    ) -> JumpResult<Vec<Self>> {
        let config = &model.config;
        let dt = config.dt;
        let BranchVariables { y, accumulated, .. } = self.variables;
        let p = config
            .jump
            .intensity
            .jump_probability(y, config.jump.y_underline, dt);

        let advance = |e: f64| BranchVariables {
            emission: e,
            y: y + e * theta_mean * dt,
            accumulated: accumulated + e * theta_mean * dt,
        };

        if self.regime == Regime::PreJump && p != 0.0 {
            let damage_prob = distortion.probabilities(config, accumulated)?;
            let landing = config.jump.landing_level;
            let mut children = Vec::with_capacity(config.damage_model_num + 1);
            for (damage_index, prob) in damage_prob.iter().enumerate() {
                let e = model.emission(Regime::PostJump { damage_index }, landing)?;
                children.push(self.child(
                    dt,
                    prob * p * self.mass,
                    Regime::PostJump { damage_index },
                    BranchVariables {
                        emission: e,
                        y: landing,
                        accumulated: accumulated + e * theta_mean * dt,
                    },
                ));
            }
            let e = model.emission(Regime::PreJump, y)?;
            children.push(self.child(dt, (1.0 - p) * self.mass, Regime::PreJump, advance(e)));
            trace!(step = self.step, y, p, children = children.len(), "branch split");
            return Ok(children);
        }

        let e = model.emission(self.regime, y)?;
        Ok(vec![self.child(dt, self.mass, self.regime, advance(e))])
    }
}

fn evolve_all(
    states: &[BranchState],
    model: &BranchingModel,
    theta_mean: f64,
    distortion: &DamageDistortion,
) -> JumpResult<Vec<BranchState>> {
    let mut next = Vec::with_capacity(states.len());
    for state in states {
        next.extend(state.evolve(model, theta_mean, distortion)?);
    }
    Ok(next)
}

/// All branches at one time index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchFrontier {
    states: Vec<BranchState>,
}

impl BranchFrontier {
    /// Frontier holding a single root branch.
    #[must_use]
    pub fn new(root: BranchState) -> Self {
        Self { states: vec![root] }
    }

    /// Branches in the frontier.
    #[must_use]
    pub fn states(&self) -> &[BranchState] {
        &self.states
    }

    /// Consumes the frontier, returning its branches.
    #[must_use]
    pub fn into_states(self) -> Vec<BranchState> {
        self.states
    }

    /// Number of branches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns true if every branch was pruned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Sum of branch masses.
    #[must_use]
    pub fn total_mass(&self) -> f64 {
        self.states.iter().map(BranchState::mass).sum()
    }

    /// Mass still in the pre-jump regime.
    #[must_use]
    pub fn pre_jump_mass(&self) -> f64 {
        self.states
            .iter()
            .filter(|s| s.regime == Regime::PreJump)
            .map(BranchState::mass)
            .sum()
    }

    /// Mass per realized damage model.
    #[must_use]
    pub fn post_jump_mass(&self, damage_model_num: usize) -> Vec<f64> {
        let mut out = vec![0.0; damage_model_num];
        for s in &self.states {
            if let Some(slot) = s.regime.damage_index().and_then(|i| out.get_mut(i)) {
                *slot += s.mass;
            }
        }
        out
    }

    /// Evolve every branch one step.
    pub fn step(
        &mut self,
        model: &BranchingModel,
        theta_mean: f64,
        distortion: &DamageDistortion,
    ) -> JumpResult<()> {
        self.states = evolve_all(&self.states, model, theta_mean, distortion)?;
        trace!(branches = self.states.len(), "frontier stepped");
        Ok(())
    }

    /// Evolve every branch one step, splitting the frontier across `workers`
    /// threads. Branch order matches `step`.
    pub fn step_parallel(
        &mut self,
        model: &BranchingModel,
        theta_mean: f64,
        distortion: &DamageDistortion,
        workers: usize,
    ) -> JumpResult<()> {
        if workers <= 1 || self.states.len() < 2 {
            return self.step(model, theta_mean, distortion);
        }
        let chunk = self.states.len().div_ceil(workers);
        let next = thread::scope(|scope| -> JumpResult<Vec<BranchState>> {
            let handles: Vec<_> = self
                .states
                .chunks(chunk)
                .map(|part| scope.spawn(move || evolve_all(part, model, theta_mean, distortion)))
                .collect();
            let mut next = Vec::new();
            for (idx, handle) in handles.into_iter().enumerate() {
                let part = handle.join().map_err(|_| ExecutionError::WorkerPanicked {
                    worker: format!("branch-{idx}"),
                })??;
                next.extend(part);
            }
            Ok(next)
        })?;
        self.states = next;
        Ok(())
    }

    /// Drop branches with mass below `min_mass`; returns the dropped mass.
    pub fn prune(&mut self, min_mass: f64) -> f64 {
        let before = self.states.len();
        let mut dropped = 0.0;
        self.states.retain(|s| {
            let keep = s.mass >= min_mass;
            if !keep {
                dropped += s.mass;
            }
            keep
        });
        debug!(
            removed = before - self.states.len(),
            dropped_mass = dropped,
            "frontier pruned"
        );
        dropped
    }
}
