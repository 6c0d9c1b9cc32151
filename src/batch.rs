//! Multi-path Monte Carlo runtime.
//!
//! Paths are independent: path `i` draws from its own `ChaCha8Rng` seeded
//! from `blake3(base_seed, i)`, so a batch is reproducible and does not
//! depend on how many workers run it or in which order they finish. Jobs are
//! fed to a small pool of named threads over a bounded channel.

use std::thread;

use crossbeam_channel::bounded;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, instrument};

use crate::config::BatchConfig;
use crate::error::{ExecutionError, JumpError, JumpResult, ValidationError};
use crate::monte_carlo::{McVariant, MonteCarloSimulator};
use crate::trajectory::McPath;

const SEED_DOMAIN: &[u8] = b"climjump/path-seed/v1";

/// Stable 256-bit seed for path `index` of a batch.
#[must_use]
pub fn path_seed(base_seed: u64, index: u64) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(SEED_DOMAIN);
    hasher.update(&base_seed.to_le_bytes());
    hasher.update(&index.to_le_bytes());
    *hasher.finalize().as_bytes()
}

/// Random stream for path `index` of a batch.
#[must_use]
pub fn path_rng(base_seed: u64, index: u64) -> ChaCha8Rng {
    ChaCha8Rng::from_seed(path_seed(base_seed, index))
}

/// Runs batches of Monte Carlo paths on a worker pool.
#[derive(Debug, Clone)]
pub struct PathRuntime {
    simulator: MonteCarloSimulator,
    config: BatchConfig,
}

impl PathRuntime {
    /// Creates a runtime.
    pub fn new(simulator: MonteCarloSimulator, config: BatchConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self { simulator, config })
    }

    /// Runtime configuration.
    #[must_use]
    pub const fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Simulate path `index` of the batch on the calling thread.
    pub fn simulate_path(&self, variant: McVariant, index: usize) -> JumpResult<McPath> {
        let mut rng = path_rng(self.config.base_seed, index as u64);
        self.simulator.simulate(variant, &mut rng)
    }

    /// Simulate `n_paths` paths; results are returned in path order.
    ///
    /// # Errors
    ///
    /// Returns the first path error encountered, or an execution error if a
    /// worker could not be started or panicked.
    #[instrument(skip(self), fields(workers = self.config.workers, base_seed = self.config.base_seed))]
    pub fn simulate_batch(&self, variant: McVariant, n_paths: usize) -> JumpResult<Vec<McPath>> {
        if n_paths == 0 {
            return Ok(Vec::new());
        }
        let workers = self.config.workers.min(n_paths);
        info!(n_paths, workers, "batch starting");

        let (job_tx, job_rx) = bounded::<usize>(self.config.queue_capacity);
        // Room for every result so workers never block on a slow collector.
        let (res_tx, res_rx) = bounded::<(usize, JumpResult<McPath>)>(n_paths);

        let paths = thread::scope(|scope| -> JumpResult<Vec<McPath>> {
            let mut handles = Vec::with_capacity(workers);
            for idx in 0..workers {
                let rx = job_rx.clone();
                let tx = res_tx.clone();
                let handle = thread::Builder::new()
                    .name(format!("climjump-path-{idx}"))
                    .spawn_scoped(scope, move || {
                        for index in rx.iter() {
                            let result = self.simulate_path(variant, index);
                            if tx.send((index, result)).is_err() {
                                break;
                            }
                        }
                    })
                    .map_err(|e| JumpError::internal(format!("failed to spawn path worker: {e}")))?;
                handles.push(handle);
            }
            drop(job_rx);
            drop(res_tx);

            for index in 0..n_paths {
                job_tx.send(index).map_err(|_| ExecutionError::Disconnected {
                    pool: "paths".to_string(),
                })?;
            }
            // Close the queue: workers drain remaining jobs then exit.
            drop(job_tx);

            let mut slots: Vec<Option<McPath>> = vec![None; n_paths];
            for (index, result) in res_rx.iter() {
                slots[index] = Some(result?);
            }
            for (idx, handle) in handles.into_iter().enumerate() {
                handle.join().map_err(|_| ExecutionError::WorkerPanicked {
                    worker: format!("climjump-path-{idx}"),
                })?;
            }

            slots
                .into_iter()
                .enumerate()
                .map(|(i, slot)| slot.ok_or_else(|| JumpError::internal(format!("path {i} was not simulated"))))
                .collect()
        })?;

        let jumped = paths.iter().filter(|p| p.jump_period().is_some()).count();
        let truncated = paths.iter().filter(|p| p.truncated_at.is_some()).count();
        debug!(jumped, truncated, "batch paths summarized");
        info!(n_paths, "batch complete");
        Ok(paths)
    }
}
