use crate::error::{CriticalError, CriticalResult};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Relative step size below which Newton updates are rounding noise.
const NOISE_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NewtonSettings {
    pub max_steps: usize,
    pub damping: f64,
    /// Absolute tolerance on the max-norm of the update step.
    pub tolerance: f64,
}

impl Default for NewtonSettings {
    fn default() -> Self {
        Self {
            max_steps: 25,
            damping: 1.0,
            tolerance: 1e-10,
        }
    }
}

impl NewtonSettings {
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self {
            tolerance,
            ..Self::default()
        }
    }
}

/// Newton-Raphson iteration on `residual(x) = 0` starting from `x0`.
///
/// The Jacobian is built column by column from central differences. The
/// iteration stops once every component of the update step is below
/// `settings.tolerance` in magnitude, or once it has shrunk to the rounding
/// noise of the iterate.
pub fn newton_raphson<F>(
    residual: F,
    x0: &DVector<f64>,
    settings: NewtonSettings,
) -> CriticalResult<DVector<f64>>
where
    F: Fn(&DVector<f64>) -> CriticalResult<DVector<f64>>,
{
    if settings.max_steps == 0 {
        return Err(CriticalError::invalid_input("max_steps must be greater than zero"));
    }
    if settings.damping <= 0.0 || settings.tolerance <= 0.0 {
        return Err(CriticalError::invalid_input(
            "damping and tolerance must be positive",
        ));
    }

    let mut x = x0.clone();
    for iteration in 0..settings.max_steps {
        let r = residual(&x)?;
        if r.len() != x.len() {
            return Err(CriticalError::invalid_input(format!(
                "residual has {} entries but the unknown vector has {}",
                r.len(),
                x.len()
            )));
        }
        let jacobian = compute_jacobian(&residual, &x)?;
        let delta = jacobian
            .lu()
            .solve(&r)
            .ok_or_else(|| CriticalError::invalid_input("Jacobian is singular"))?;

        x -= &delta * settings.damping;
        if x.iter().any(|v| !v.is_finite()) {
            return Err(CriticalError::non_finite(format!(
                "Newton iterate after {} steps",
                iteration + 1
            )));
        }

        let step = delta.amax();
        debug!(iteration, step, residual = r.amax(), "Newton iteration");
        if step < settings.tolerance || step <= NOISE_FLOOR * x.amax() {
            return Ok(x);
        }
    }

    Err(CriticalError::convergence(format!(
        "Newton solver failed to converge in {} steps",
        settings.max_steps
    )))
}

fn compute_jacobian<F>(residual: &F, x: &DVector<f64>) -> CriticalResult<DMatrix<f64>>
where
    F: Fn(&DVector<f64>) -> CriticalResult<DVector<f64>>,
{
    let n = x.len();
    let mut jacobian = DMatrix::zeros(n, n);
    let mut probe = x.clone();
    for j in 0..n {
        let h = 1e-6 * x[j].abs().max(1e-3);
        probe[j] = x[j] + h;
        let plus = residual(&probe)?;
        probe[j] = x[j] - h;
        let minus = residual(&probe)?;
        probe[j] = x[j];
        jacobian.set_column(j, &((plus - minus) / (2.0 * h)));
    }
    Ok(jacobian)
}
