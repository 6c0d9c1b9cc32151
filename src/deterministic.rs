//! Deterministic expected-path integrators.
//!
//! Each integrator advances a single level with
//! `y_{t+1} = y_t + e(y_t) * mean(θ) * dt`, recording the interpolated policy
//! values at every period. A path stops as soon as the level rises above the
//! top of the active policy grid; the output is then shorter than the
//! horizon. Below the grid the policies hold their lowest-node values, so a
//! path with a non-positive mean coefficient runs to the full horizon.

use tracing::{debug, instrument, trace};

use crate::config::PathSettings;
use crate::error::{JumpResult, ValidationError};
use crate::intensity::IntensityParams;
use crate::policy::{
    Grid, LinearInterpolator, PolicySolution, ScalarPolicy, VectorInterpolator, VectorPolicy,
};
use crate::trajectory::{DecompositionPath, Trajectory};

/// Interpolators for one solved regime.
struct RegimePolicy {
    grid: Grid,
    emission: LinearInterpolator,
    drift: LinearInterpolator,
    climate: VectorInterpolator,
    damage: VectorInterpolator,
    marginal: Option<LinearInterpolator>,
}

impl RegimePolicy {
    fn new(solution: &PolicySolution, marginal: Option<&[f64]>) -> Result<Self, ValidationError> {
        Ok(Self {
            grid: solution.grid().clone(),
            emission: solution.emission()?,
            drift: solution.drift_distortion()?,
            climate: solution.climate_probabilities()?,
            damage: solution.damage_probabilities()?,
            marginal: marginal
                .map(|me| solution.aligned("marginal_value", me))
                .transpose()?,
        })
    }

    /// Records every policy value at `y` and returns the emission.
    fn record(&self, traj: &mut Trajectory, y: f64, with_damage: bool) -> f64 {
        let e = self.emission.evaluate(y);
        traj.temperature.push(y);
        traj.emission.push(e);
        traj.drift_distortion.push(self.drift.evaluate(y));
        traj.climate_probabilities.push(self.climate.evaluate(y));
        if with_damage {
            traj.damage_probabilities.push(self.damage.evaluate(y));
        }
        if let (Some(me), Some(out)) = (&self.marginal, traj.marginal_value.as_mut()) {
            out.push(me.evaluate(y));
        }
        e
    }
}

/// Arithmetic mean of the climate-sensitivity candidates.
pub fn theta_mean(theta_list: &[f64]) -> Result<f64, ValidationError> {
    if theta_list.is_empty() {
        return Err(ValidationError::EmptyThetaList);
    }
    #[allow(clippy::cast_precision_loss)]
    let n = theta_list.len() as f64;
    Ok(theta_list.iter().sum::<f64>() / n)
}

/// Expected path under a single solved regime.
///
/// `marginal_value`, when given, must be aligned with the solution grid and
/// is interpolated alongside the policy.
#[instrument(skip_all, fields(y_start = settings.y_start, periods = settings.periods()))]
pub fn simulate_jump(
    solution: &PolicySolution,
    theta_list: &[f64],
    marginal_value: Option<&[f64]>,
    settings: &PathSettings,
) -> JumpResult<Trajectory> {
    settings.validate()?;
    let theta = theta_mean(theta_list)?;
    let policy = RegimePolicy::new(solution, marginal_value)?;

    let periods = settings.periods();
    let mut traj = Trajectory::with_capacity(periods, marginal_value.is_some());
    let mut y = settings.y_start;
    for t in 0..periods {
        if y > policy.grid.max() {
            debug!(period = t, y, "level rose above the policy grid, truncating");
            break;
        }
        let e = policy.record(&mut traj, y, true);
        trace!(period = t, y, e, "step");
        y += e * theta * settings.dt;
    }
    Ok(traj)
}

/// Expected path that switches from the `pre` to the `post` solution the
/// first time the level exceeds `y_upper`.
///
/// After the switch the emission, drift distortion and climate probabilities
/// come from `post`; damage probabilities and the marginal value (aligned
/// with the `pre` grid) are recorded for pre-switch periods only. The
/// trajectory records both the last period integrated with `pre`
/// (`threshold`) and the first integrated with `post` (`switch_period`).
#[instrument(skip_all, fields(y_start = settings.y_start, y_upper, periods = settings.periods()))]
pub fn simulate_two_regime(
    pre: &PolicySolution,
    post: &PolicySolution,
    y_upper: f64,
    theta_list: &[f64],
    marginal_value: Option<&[f64]>,
    settings: &PathSettings,
) -> JumpResult<Trajectory> {
    settings.validate()?;
    if !y_upper.is_finite() {
        return Err(ValidationError::NonFinite {
            field: "y_upper".to_string(),
        }
        .into());
    }
    let theta = theta_mean(theta_list)?;
    let pre = RegimePolicy::new(pre, marginal_value)?;
    let post = RegimePolicy::new(post, None)?;

    let periods = settings.periods();
    let mut traj = Trajectory::with_capacity(periods, marginal_value.is_some());
    let mut active = &pre;
    let mut y = settings.y_start;
    for t in 0..periods {
        if traj.switch_period.is_none() && y > y_upper {
            debug!(period = t, y, "upper threshold crossed, switching policy");
            traj.switch_period = Some(t);
            traj.threshold = t.checked_sub(1);
            active = &post;
        }
        if y > active.grid.max() {
            debug!(period = t, y, "level rose above the policy grid, truncating");
            break;
        }
        let pre_switch = traj.switch_period.is_none();
        let e = active.record(&mut traj, y, pre_switch);
        y += e * theta * settings.dt;
    }
    Ok(traj)
}

/// Expected path confined to the region where no jump has happened yet.
///
/// The path runs while `y <= y_overline` and additionally records the
/// per-step jump probability.
#[instrument(skip_all, fields(y_start = settings.y_start, periods = settings.periods()))]
pub fn simulate_no_jump(solution: &PolicySolution, settings: &PathSettings) -> JumpResult<Trajectory> {
    settings.validate()?;
    let args = solution.model_args();
    let theta = theta_mean(&args.theta_list)?;
    let policy = RegimePolicy::new(solution, None)?;
    let intensity = IntensityParams::default();

    let periods = settings.periods();
    let mut traj = Trajectory::with_capacity(periods, false);
    let mut probs = Vec::with_capacity(periods);
    let mut y = settings.y_start;
    for t in 0..periods {
        if y > args.y_overline || y > policy.grid.max() {
            debug!(period = t, y, "left the pre-jump region");
            break;
        }
        probs.push(intensity.jump_probability(y, args.y_underline, settings.dt));
        let e = policy.record(&mut traj, y, true);
        y += e * theta * settings.dt;
    }
    traj.jump_probability = Some(probs);
    Ok(traj)
}

/// Uncertainty-decomposition path with a single coefficient `theta`.
///
/// Produces `periods + 1` entries unless the level rises above the grid.
/// Each step is scaled by `settings.dt`, so the default `dt = 1` gives the
/// plain per-period update `y + e * theta`.
#[instrument(skip_all, fields(y_start = settings.y_start, periods = settings.periods()))]
pub fn simulate_me(
    grid: &[f64],
    e_grid: &[f64],
    ratio_grid: &[f64],
    theta: f64,
    settings: &PathSettings,
) -> JumpResult<DecompositionPath> {
    settings.validate()?;
    let grid = Grid::new(grid.to_vec())?;
    let emission = LinearInterpolator::on_grid(&grid, e_grid.to_vec())?;
    let ratio = LinearInterpolator::on_grid(&grid, ratio_grid.to_vec())?;

    let len = settings.periods() + 1;
    let mut path = DecompositionPath {
        emission: Vec::with_capacity(len),
        temperature: Vec::with_capacity(len),
        ratio: Vec::with_capacity(len),
    };
    let mut y = settings.y_start;
    for t in 0..len {
        if y > grid.max() {
            debug!(period = t, y, "level rose above the policy grid, truncating");
            break;
        }
        let e = emission.evaluate(y);
        path.emission.push(e);
        path.ratio.push(ratio.evaluate(y));
        path.temperature.push(y);
        y += e * theta * settings.dt;
    }
    Ok(path)
}
