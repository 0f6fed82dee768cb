//! Core types for critical-locus tracing.

use crate::error::{CriticalError, CriticalResult};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Settings controlling the arclength tracer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuationOptions {
    pub abs_err: f64,
    pub rel_err: f64,
    /// Initial pseudo-time step.
    pub init_dt: f64,
    pub max_dt: f64,
    /// Hard floor on the adaptive step; going below it ends the trace with an error.
    pub min_dt: f64,
    /// Temperature change below which a step counts as "small".
    #[serde(rename = "T_tol")]
    pub t_tol: f64,
    /// Initial search direction, +1 or -1.
    pub init_c: f64,
    /// Number of consecutive small temperature steps that signal convergence.
    #[serde(rename = "small_T_count")]
    pub small_t_count: usize,
    /// 1 for explicit Euler, 5 for adaptive Cash-Karp.
    pub integration_order: u32,
    pub max_step_count: usize,
    /// Steps exempted from the direction-continuity check.
    pub skip_dircheck_count: usize,
    /// Re-converge every accepted point at fixed mole fraction.
    pub polish: bool,
}

impl Default for ContinuationOptions {
    fn default() -> Self {
        Self {
            abs_err: 1e-6,
            rel_err: 1e-6,
            init_dt: 10.0,
            max_dt: 1e10,
            min_dt: 1e-12,
            t_tol: 1e-6,
            init_c: 1.0,
            small_t_count: 5,
            integration_order: 5,
            max_step_count: 1000,
            skip_dircheck_count: 1,
            polish: false,
        }
    }
}

impl ContinuationOptions {
    pub fn validate(&self) -> CriticalResult<()> {
        if self.integration_order != 1 && self.integration_order != 5 {
            return Err(CriticalError::invalid_input(format!(
                "integration order is invalid: {}",
                self.integration_order
            )));
        }
        if !(self.abs_err > 0.0 && self.rel_err > 0.0) {
            return Err(CriticalError::invalid_input(
                "abs_err and rel_err must be positive",
            ));
        }
        if !(self.init_dt > 0.0 && self.max_dt > 0.0) {
            return Err(CriticalError::invalid_input(
                "init_dt and max_dt must be positive",
            ));
        }
        if !(self.min_dt >= 0.0) || self.min_dt > self.init_dt {
            return Err(CriticalError::invalid_input(format!(
                "min_dt must lie in [0, init_dt], got {}",
                self.min_dt
            )));
        }
        if !(self.t_tol >= 0.0) {
            return Err(CriticalError::invalid_input("T_tol must be non-negative"));
        }
        if self.init_c == 0.0 || !self.init_c.is_finite() {
            return Err(CriticalError::invalid_input(
                "init_c must be a non-zero direction sign",
            ));
        }
        Ok(())
    }
}

/// Temperature and molar concentrations of one point in the state space.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceState {
    pub temperature: f64,
    pub rhovec: DVector<f64>,
}

impl TraceState {
    pub fn new(temperature: f64, rhovec: DVector<f64>) -> Self {
        Self {
            temperature,
            rhovec,
        }
    }

    /// Splits a joint vector `[T, rho_0, rho_1, ...]`.
    pub fn from_joint(x: &[f64]) -> Self {
        Self {
            temperature: x[0],
            rhovec: DVector::from_column_slice(&x[1..]),
        }
    }

    pub fn to_joint(&self) -> Vec<f64> {
        std::iter::once(self.temperature)
            .chain(self.rhovec.iter().copied())
            .collect()
    }

    pub fn total_density(&self) -> f64 {
        self.rhovec.sum()
    }

    /// Mole fraction of component 0.
    pub fn z0(&self) -> f64 {
        self.rhovec[0] / self.total_density()
    }
}

/// One recorded sample of the critical locus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    /// Pseudo-time.
    pub t: f64,
    #[serde(rename = "T / K")]
    pub temperature: f64,
    #[serde(rename = "rho0 / mol/m^3")]
    pub rho0: f64,
    #[serde(rename = "rho1 / mol/m^3")]
    pub rho1: f64,
    pub c: f64,
    #[serde(rename = "s^+")]
    pub splus: f64,
    #[serde(rename = "p / Pa")]
    pub pressure: f64,
    #[serde(rename = "dT/dt")]
    pub dtdt: f64,
    #[serde(rename = "drho0/dt")]
    pub drho0dt: f64,
    #[serde(rename = "drho1/dt")]
    pub drho1dt: f64,
    /// Second directional derivative of Psi along v0 (first criticality condition).
    #[serde(rename = "lambda1")]
    pub lambda1: f64,
    /// Third directional derivative of Psi along v0 (second criticality condition).
    #[serde(rename = "dirderiv(lambda1)/dalpha")]
    pub dirderiv_lambda1: f64,
}

impl TracePoint {
    pub fn z0(&self) -> f64 {
        self.rho0 / (self.rho0 + self.rho1)
    }
}

/// Why a trace stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    /// The temperature stopped changing for more than `small_T_count` steps.
    Converged,
    /// `max_step_count` steps were taken.
    Exhausted,
    /// The mole fraction left [0, 1], or no step short enough stayed inside it.
    OutOfDomain,
    /// Stepping failed; the points recorded before the failure are kept.
    IntegrationError(CriticalError),
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Converged => write!(f, "converged"),
            Termination::Exhausted => write!(f, "step budget exhausted"),
            Termination::OutOfDomain => write!(f, "mole fraction left [0, 1]"),
            Termination::IntegrationError(err) => write!(f, "integration error: {err}"),
        }
    }
}

/// All points of a finished trace.
#[derive(Debug, Clone, PartialEq)]
pub struct CriticalTrace {
    pub points: Vec<TracePoint>,
    pub termination: Termination,
}
