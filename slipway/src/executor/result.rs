//! Execution outcomes for a lifecycle stage.
//!
//! Outcomes are a closed sum so callers branch exhaustively: full success
//! carries the complete output environment; everything else is an
//! [`ExecutionError`] that still exposes whatever prefix of the stage
//! managed to run.

use crate::environment::EnvMap;
use crate::errors::LifecycleError;

/// The outcome of executing one lifecycle stage.
///
/// `Ok` carries the union of every step's output variables.
pub type ExecutionResult = Result<EnvMap, ExecutionError>;

/// Why a stage stopped before a step could run.
#[derive(Debug)]
pub enum StopReason {
    /// The step's driver reported a failure of its own.
    DriverError {
        /// The step that failed.
        failed_driver: String,
        /// The wrapped failure.
        error: LifecycleError,
    },
    /// The step referenced placeholders with no binding.
    UnresolvedPlaceholders {
        /// The step that could not run.
        failed_driver: String,
        /// The placeholder names with no binding.
        unresolved: Vec<String>,
    },
}

impl StopReason {
    /// Returns the step that stopped the stage.
    #[must_use]
    pub fn failed_driver(&self) -> &str {
        match self {
            Self::DriverError { failed_driver, .. }
            | Self::UnresolvedPlaceholders { failed_driver, .. } => failed_driver,
        }
    }
}

/// A stage execution that did not fully succeed.
#[derive(Debug)]
pub enum ExecutionError {
    /// A hard error before any step produced output.
    Failure {
        /// The originating error.
        error: LifecycleError,
    },
    /// A strict prefix of steps completed before a stopping condition.
    ///
    /// `env` is exactly the union of outputs of the completed steps and
    /// must still be persisted so a re-run resumes instead of repeating
    /// them.
    PartialSuccess {
        /// Outputs of the completed prefix.
        env: EnvMap,
        /// What stopped the stage.
        reason: StopReason,
    },
}

impl ExecutionError {
    /// Returns the output environment accumulated before the stop.
    #[must_use]
    pub fn env(&self) -> EnvMap {
        match self {
            Self::Failure { .. } => EnvMap::new(),
            Self::PartialSuccess { env, .. } => env.clone(),
        }
    }

    /// Converts this outcome into the accumulated environment and the
    /// caller-facing error, naming the stage for placeholder failures.
    #[must_use]
    pub fn into_parts(self, stage: &str) -> (EnvMap, LifecycleError) {
        match self {
            Self::Failure { error } => (EnvMap::new(), error),
            Self::PartialSuccess { env, reason } => {
                let error = match reason {
                    StopReason::DriverError { error, .. } => error,
                    StopReason::UnresolvedPlaceholders {
                        failed_driver,
                        unresolved,
                    } => LifecycleError::UnresolvedPlaceholders {
                        stage: stage.to_string(),
                        failed_driver,
                        placeholders: unresolved,
                    },
                };
                (env, error)
            }
        }
    }
}
