//! Error types for the slipway lifecycle engine.
//!
//! Every error a stage invocation can surface is a variant of
//! [`LifecycleError`], a closed taxonomy with a stable [`LifecycleError::name`]
//! per variant so callers can branch programmatically (exit codes,
//! notifications) without string-matching messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The workflow document could not be parsed.
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// The requested stage is absent from the workflow document.
    ///
    /// Not fatal to the process: the document is valid, there is simply
    /// nothing to execute for this stage.
    #[error("lifecycle '{stage}' is not defined in the workflow file")]
    LifecycleUndefined {
        /// The requested stage key.
        stage: String,
    },

    /// A step's `uses` identifier matched no registered driver.
    #[error("no driver registered for '{uses}'")]
    DriverResolution {
        /// The unknown `uses` identifier.
        uses: String,
    },

    /// One or more required environment variables never got a value.
    #[error(
        "missing environment variables {placeholders:?} for step '{failed_driver}' in lifecycle '{stage}'"
    )]
    UnresolvedPlaceholders {
        /// The stage being executed.
        stage: String,
        /// The step that could not run.
        failed_driver: String,
        /// The placeholder names with no binding.
        placeholders: Vec<String>,
    },

    /// A driver reported a failure of its own.
    #[error("driver '{driver}' failed: {cause:#}")]
    DriverExecution {
        /// The step that failed.
        driver: String,
        /// The driver's own error.
        cause: anyhow::Error,
    },

    /// A pre-stage check, consent prompt, or selection was rejected.
    #[error("{0}")]
    Precondition(#[from] PreconditionError),

    /// A required input was not supplied and could not be derived.
    #[error("missing required input '{name}'")]
    MissingInput {
        /// The input name.
        name: String,
    },

    /// The environment store failed to read or write state.
    #[error("{0}")]
    Environment(#[from] EnvError),
}

impl LifecycleError {
    /// Returns the stable name of this error kind.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Parse(_) => "ParseError",
            Self::LifecycleUndefined { .. } => "LifecycleUndefinedError",
            Self::DriverResolution { .. } => "DriverResolutionError",
            Self::UnresolvedPlaceholders { .. } => "UnresolvedPlaceholdersError",
            Self::DriverExecution { .. } => "DriverExecutionError",
            Self::Precondition(_) => "PreconditionError",
            Self::MissingInput { .. } => "MissingInputError",
            Self::Environment(_) => "EnvironmentError",
        }
    }
}

/// Error raised when the workflow document is malformed.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The workflow file could not be read.
    #[error("cannot read workflow file '{}': {cause}", path.display())]
    Io {
        /// The file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        cause: std::io::Error,
    },

    /// The document is not valid YAML or does not match the expected shape.
    #[error("invalid workflow document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The document is structurally valid YAML but violates the format.
    #[error("invalid workflow document: {message}")]
    Invalid {
        /// What is wrong.
        message: String,
    },
}

impl ParseError {
    /// Creates an invalid-document error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// Errors raised before execution starts: checks, consent, selection.
#[derive(Debug, Clone, Error)]
pub enum PreconditionError {
    /// The user declined to proceed with the stage.
    #[error("consent declined for stage '{stage}'")]
    ConsentDeclined {
        /// The stage that was declined.
        stage: String,
    },

    /// The user cancelled an interactive step.
    #[error("operation cancelled by user")]
    Cancelled,

    /// The signed-in tenant does not match the tenant recorded for this
    /// environment.
    #[error("tenant mismatch: environment was provisioned for '{expected}' but the current account belongs to '{actual}'")]
    TenantMismatch {
        /// The tenant the environment was provisioned against.
        expected: String,
        /// The tenant of the current account.
        actual: String,
    },

    /// An interactive selection (environment, subscription, resource group)
    /// produced no usable value.
    #[error("failed to select {what}: {message}")]
    SelectionFailed {
        /// What was being selected.
        what: String,
        /// Why the selection failed.
        message: String,
    },

    /// A delegated pre-stage check reported a failure.
    #[error("precondition check failed: {message}")]
    CheckFailed {
        /// The check's own message.
        message: String,
    },
}

impl PreconditionError {
    /// Creates a consent-declined error.
    #[must_use]
    pub fn consent_declined(stage: impl Into<String>) -> Self {
        Self::ConsentDeclined {
            stage: stage.into(),
        }
    }

    /// Creates a selection-failed error.
    #[must_use]
    pub fn selection_failed(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SelectionFailed {
            what: what.into(),
            message: message.into(),
        }
    }

    /// Creates a check-failed error.
    #[must_use]
    pub fn check_failed(message: impl Into<String>) -> Self {
        Self::CheckFailed {
            message: message.into(),
        }
    }
}

/// Errors raised by the environment store.
#[derive(Debug, Error)]
pub enum EnvError {
    /// An environment file could not be read or written.
    #[error("environment file '{}': {cause}", path.display())]
    Io {
        /// The file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        cause: std::io::Error,
    },

    /// An environment file contains lines the dotenv parser rejects.
    #[error("environment file '{}' is malformed: {message}", path.display())]
    Malformed {
        /// The file path.
        path: PathBuf,
        /// The parser's message.
        message: String,
    },

    /// A secret value could not be encrypted or decrypted.
    #[error("{0}")]
    Crypto(#[from] CryptoError),
}

/// Errors raised while encrypting or decrypting secret values.
#[derive(Debug, Clone, Error)]
pub enum CryptoError {
    /// Encryption failed.
    #[error("encryption failed: {message}")]
    Encrypt {
        /// The cipher's message.
        message: String,
    },

    /// Decryption failed (wrong key or tampered data).
    #[error("decryption failed: {message}")]
    Decrypt {
        /// The cipher's message.
        message: String,
    },

    /// The stored payload is not a valid encrypted value.
    #[error("invalid encrypted payload: {message}")]
    Payload {
        /// What is wrong with the payload.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names_are_stable() {
        let err = LifecycleError::LifecycleUndefined {
            stage: "deploy".to_string(),
        };
        assert_eq!(err.name(), "LifecycleUndefinedError");

        let err = LifecycleError::DriverResolution {
            uses: "arm/deploy".to_string(),
        };
        assert_eq!(err.name(), "DriverResolutionError");

        let err = LifecycleError::MissingInput {
            name: "env".to_string(),
        };
        assert_eq!(err.name(), "MissingInputError");
    }

    #[test]
    fn test_parse_error_wraps_into_lifecycle_error() {
        let err: LifecycleError = ParseError::invalid("version is missing").into();
        assert_eq!(err.name(), "ParseError");
        assert!(err.to_string().contains("version is missing"));
    }

    #[test]
    fn test_unresolved_placeholders_message_lists_names() {
        let err = LifecycleError::UnresolvedPlaceholders {
            stage: "provision".to_string(),
            failed_driver: "arm/deploy".to_string(),
            placeholders: vec!["AZURE_SUBSCRIPTION_ID".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("AZURE_SUBSCRIPTION_ID"));
        assert!(message.contains("arm/deploy"));
    }

    #[test]
    fn test_driver_execution_error_includes_cause_chain() {
        let cause = anyhow::anyhow!("deployment quota exceeded");
        let err = LifecycleError::DriverExecution {
            driver: "arm/deploy".to_string(),
            cause,
        };
        assert!(err.to_string().contains("deployment quota exceeded"));
        assert_eq!(err.name(), "DriverExecutionError");
    }

    #[test]
    fn test_precondition_constructors() {
        let err = PreconditionError::consent_declined("provision");
        assert!(err.to_string().contains("provision"));

        let err = PreconditionError::selection_failed("subscription", "no subscriptions found");
        assert!(err.to_string().contains("subscription"));
    }
}
