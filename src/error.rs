//! Crate-wide error type.
//!
//! Every failure is surfaced to the caller as a distinct, typed variant;
//! nothing is silently swallowed or retried internally. Recovery (restarts,
//! parameter backtracking, user interaction) belongs to the optimizer/host
//! layer, not here.

/// Errors raised by model construction, model updates, and report generation.
#[derive(Debug, Clone, PartialEq)]
pub enum VarProError {
    /// A covariate vector does not match the measured vector's length.
    ///
    /// Raised at construction time; no partial model is usable afterwards.
    SizeMismatch { expected: usize, actual: usize },

    /// The SVD of the model matrix failed to converge during `update_model`.
    ///
    /// Fatal for that call. State from the previous successful update is left
    /// untouched, except the nonlinear parameter vector which was already
    /// overwritten.
    DecompositionFailure,

    /// The triangular solve during statistics computation failed because the
    /// augmented design matrix is rank deficient to working precision.
    SingularDesign,

    /// Non-positive residual degrees of freedom: the fit has no room left to
    /// estimate an error variance.
    DegenerateFit { samples: usize, model_dof: usize },

    /// Confidence level outside `(0, 100]`.
    InvalidConfidence(f64),
}

impl std::fmt::Display for VarProError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VarProError::SizeMismatch { expected, actual } => write!(
                f,
                "covariate length {actual} does not match measured vector length {expected}"
            ),
            VarProError::DecompositionFailure => {
                write!(f, "SVD of the model matrix failed to converge")
            }
            VarProError::SingularDesign => {
                write!(f, "augmented design matrix is singular to working precision")
            }
            VarProError::DegenerateFit { samples, model_dof } => write!(
                f,
                "non-positive residual degrees of freedom ({samples} samples, {model_dof} model dof)"
            ),
            VarProError::InvalidConfidence(level) => {
                write!(f, "confidence level {level} is outside (0, 100]")
            }
        }
    }
}

impl std::error::Error for VarProError {}
