//! Errors raised by the critical-point machinery.

use thiserror::Error;

/// Result type for critical-point operations.
pub type CriticalResult<T> = Result<T, CriticalError>;

/// Errors that can occur while locating or tracing critical points.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CriticalError {
    /// Structurally unsupported input (composition pattern, singular system, bad option).
    #[error("Invalid input: {what}")]
    InvalidInput { what: String },

    /// A computed coordinate was NaN or infinite.
    #[error("Non-finite result: {what}")]
    NonFinite { what: String },

    /// Internal numerical failure of the ODE stepper.
    #[error("Integrator failure: {what}")]
    IntegratorFailure { what: String },

    /// The root finder ran out of iterations.
    #[error("Convergence failed: {what}")]
    Convergence { what: String },

    /// A state with a negative concentration was requested.
    #[error("Out of domain: {what}")]
    OutOfDomain { what: String },
}

impl CriticalError {
    pub fn invalid_input(what: impl Into<String>) -> Self {
        Self::InvalidInput { what: what.into() }
    }

    pub fn non_finite(what: impl Into<String>) -> Self {
        Self::NonFinite { what: what.into() }
    }

    pub fn integrator(what: impl Into<String>) -> Self {
        Self::IntegratorFailure { what: what.into() }
    }

    pub fn convergence(what: impl Into<String>) -> Self {
        Self::Convergence { what: what.into() }
    }

    pub fn out_of_domain(what: impl Into<String>) -> Self {
        Self::OutOfDomain { what: what.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CriticalError::invalid_input("more than one zero concentration");
        assert!(err.to_string().contains("zero concentration"));

        let err = CriticalError::non_finite("polished temperature");
        assert!(err.to_string().starts_with("Non-finite result"));
    }

    #[test]
    fn constructors_pick_matching_variant() {
        assert!(matches!(
            CriticalError::integrator("step underflow"),
            CriticalError::IntegratorFailure { .. }
        ));
        assert!(matches!(
            CriticalError::convergence("newton"),
            CriticalError::Convergence { .. }
        ));
        assert!(matches!(
            CriticalError::out_of_domain("rho0 = -1"),
            CriticalError::OutOfDomain { .. }
        ));
    }
}
