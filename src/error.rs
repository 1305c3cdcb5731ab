//! Error types for mixgrad operations.
//!
//! Every failure is surfaced synchronously to the immediate caller; nothing
//! is retried or recovered internally.

use std::fmt;

/// Main error type for mixgrad operations.
///
/// # Examples
///
/// ```
/// use mixgrad::error::MixgradError;
///
/// let err = MixgradError::DimensionMismatch {
///     expected: "feature_dim=3".to_string(),
///     actual: "2".to_string(),
/// };
/// assert!(err.to_string().contains("dimension mismatch"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum MixgradError {
    /// A model or input shape is not usable (zero components, zero features,
    /// or an empty batch of observations).
    InvalidShape {
        /// Name of the offending quantity
        param: String,
        /// Description of the problem
        reason: String,
    },

    /// Input dimensionality does not match the model.
    DimensionMismatch {
        /// Expected dimensions description
        expected: String,
        /// Actual dimensions found
        actual: String,
    },

    /// A computation produced (or would produce) a non-finite or undefined value.
    NumericalDegeneracy {
        /// Where the degeneracy was detected
        context: String,
        /// What went wrong
        reason: String,
    },

    /// Invalid hyperparameter value provided.
    InvalidHyperparameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },
}

impl fmt::Display for MixgradError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MixgradError::InvalidShape { param, reason } => {
                write!(f, "Invalid shape: {param} {reason}")
            }
            MixgradError::DimensionMismatch { expected, actual } => {
                write!(f, "Input dimension mismatch: expected {expected}, got {actual}")
            }
            MixgradError::NumericalDegeneracy { context, reason } => {
                write!(f, "Numerical degeneracy in {context}: {reason}")
            }
            MixgradError::InvalidHyperparameter {
                param,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "Invalid hyperparameter: {param} = {value}, expected {constraint}"
                )
            }
        }
    }
}

impl std::error::Error for MixgradError {}

impl MixgradError {
    /// Create a dimension mismatch error with descriptive context
    #[must_use]
    pub fn dimension_mismatch(context: &str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            expected: format!("{context}={expected}"),
            actual: format!("{actual}"),
        }
    }

    /// Create an invalid shape error for a count that must be positive
    #[must_use]
    pub fn non_positive(param: &str, value: usize) -> Self {
        Self::InvalidShape {
            param: param.to_string(),
            reason: format!("must be > 0, got {value}"),
        }
    }

    /// Create an invalid hyperparameter error
    #[must_use]
    pub fn hyperparameter(param: &str, value: impl std::fmt::Display, constraint: &str) -> Self {
        Self::InvalidHyperparameter {
            param: param.to_string(),
            value: value.to_string(),
            constraint: constraint.to_string(),
        }
    }

    /// Create a numerical degeneracy error
    #[must_use]
    pub fn degenerate(context: &str, reason: impl Into<String>) -> Self {
        Self::NumericalDegeneracy {
            context: context.to_string(),
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, MixgradError>;
