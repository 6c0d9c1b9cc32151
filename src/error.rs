//! Error types for climjump.
//!
//! All errors are strongly typed using thiserror so callers can match on
//! specific conditions. Degenerate jump probabilities are clamped and grid
//! overruns during a path truncate the output; neither is reported here.

use thiserror::Error;

/// Validation errors raised before any simulation step runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Grid must have at least 2 points, got {len}")]
    GridTooShort {
        len: usize,
    },

    #[error("Grid is not strictly increasing at index {index}")]
    GridNotIncreasing {
        index: usize,
    },

    #[error("Field '{field}' has length {actual}, expected {expected}")]
    LengthMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("Field '{field}' contains a non-finite value")]
    NonFinite {
        field: String,
    },

    #[error("Time step {dt} must be positive and finite")]
    InvalidTimeStep {
        dt: f64,
    },

    #[error("Horizon {horizon} must be positive and finite")]
    InvalidHorizon {
        horizon: f64,
    },

    #[error("Climate sensitivity list cannot be empty")]
    EmptyThetaList,

    #[error("Invalid probability vector '{field}': {reason}")]
    InvalidProbabilities {
        field: String,
        reason: String,
    },

    #[error("Expected {expected} damage models, got {actual}")]
    DamageModelCount {
        expected: usize,
        actual: usize,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Errors raised while a simulation is running.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Policy '{policy}' evaluated at {x} outside its domain [{lo}, {hi}]")]
    OutOfDomain {
        policy: String,
        x: f64,
        lo: f64,
        hi: f64,
    },

    #[error("Sampling from '{distribution}' failed: {reason}")]
    Sampling {
        distribution: String,
        reason: String,
    },

    #[error("Worker pool '{pool}' disconnected")]
    Disconnected {
        pool: String,
    },

    #[error("Worker '{worker}' panicked")]
    WorkerPanicked {
        worker: String,
    },
}

/// Errors raised while loading a policy solution.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read '{path}': {message}")]
    Io {
        path: String,
        message: String,
    },

    #[error("Failed to parse policy solution: {message}")]
    Parse {
        message: String,
    },
}

/// Top-level error type for climjump.
#[derive(Debug, Error)]
pub enum JumpError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl JumpError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is a load error.
    #[must_use]
    pub const fn is_load(&self) -> bool {
        matches!(self, Self::Load(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for climjump operations.
pub type JumpResult<T> = Result<T, JumpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_grid() {
        let err = ValidationError::GridNotIncreasing { index: 3 };
        let msg = format!("{err}");
        assert!(msg.contains("index 3"));
        assert!(msg.contains("strictly increasing"));
    }

    #[test]
    fn test_validation_error_length_mismatch() {
        let err = ValidationError::LengthMismatch {
            field: "e_tilde".to_string(),
            expected: 10,
            actual: 9,
        };
        let msg = format!("{err}");
        assert!(msg.contains("e_tilde"));
        assert!(msg.contains("10"));
        assert!(msg.contains('9'));
    }

    #[test]
    fn test_execution_error_out_of_domain() {
        let err = ExecutionError::OutOfDomain {
            policy: "emission_post[3]".to_string(),
            x: 4.5,
            lo: 0.0,
            hi: 4.0,
        };
        let msg = format!("{err}");
        assert!(msg.contains("emission_post[3]"));
        assert!(msg.contains("4.5"));
    }

    #[test]
    fn test_jump_error_from_validation() {
        let err: JumpError = ValidationError::EmptyThetaList.into();
        assert!(err.is_validation());
        assert!(!err.is_execution());
    }

    #[test]
    fn test_jump_error_from_execution() {
        let err: JumpError = ExecutionError::Disconnected {
            pool: "paths".to_string(),
        }
        .into();
        assert!(err.is_execution());
    }

    #[test]
    fn test_jump_error_from_load() {
        let err: JumpError = LoadError::Parse {
            message: "eof".to_string(),
        }
        .into();
        assert!(err.is_load());
        assert!(format!("{err}").contains("eof"));
    }

    #[test]
    fn test_jump_error_internal() {
        let err = JumpError::internal("unexpected state");
        assert!(err.is_internal());
        assert!(format!("{err}").contains("unexpected state"));
    }
}
