//! # climjump - trajectories of a climate-economy state under damage jumps
//!
//! Given policy functions solved elsewhere (emission rate, drift distortion
//! and distorted model probabilities over a temperature-anomaly grid),
//! climjump simulates forward paths of the temperature anomaly and emissions
//! while a damage jump may strike with a state-dependent intensity.
//!
//! ## Simulators
//!
//! - **Deterministic**: a single expected path under one solved regime, or two
//!   regimes switched at an upper threshold (`deterministic`).
//! - **Branching**: the exact probability tree of jump outcomes, one immutable
//!   `BranchState` per branch (`branching`).
//! - **Monte Carlo**: sampled paths that realize one damage (and climate)
//!   regime at a random jump time (`monte_carlo`, `batch`).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use climjump::{simulate_jump, PathSettings, PolicySolution};
//!
//! let solution = PolicySolution::from_path("model_res.json")?;
//! let theta = solution.model_args().theta_list.clone();
//! let traj = simulate_jump(&solution, &theta, None, &PathSettings::new(1.1, 100.0, 1.0))?;
//! println!("{} periods simulated", traj.len());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod branching;
pub mod config;
pub mod deterministic;
pub mod error;
pub mod intensity;
pub mod monte_carlo;
pub mod policy;
pub mod trajectory;

// Re-export primary types at crate root for convenience
pub use batch::{path_rng, path_seed, PathRuntime};
pub use branching::{BranchFrontier, BranchState, BranchVariables, BranchingModel, DamageDistortion, Regime};
pub use config::{BatchConfig, BranchingConfig, JumpSettings, PathSettings};
pub use deterministic::{simulate_jump, simulate_me, simulate_no_jump, simulate_two_regime, theta_mean};
pub use error::{ExecutionError, JumpError, JumpResult, LoadError, ValidationError};
pub use intensity::{damage_intensity, jump_probability, IntensityParams};
pub use monte_carlo::{JumpPolicies, McVariant, MonteCarloSimulator};
pub use policy::{
    Grid, LinearInterpolator, ModelArgs, PolicySolution, ScalarPolicy, VectorInterpolator, VectorPolicy,
};
pub use trajectory::{DecompositionPath, McPath, Trajectory};
