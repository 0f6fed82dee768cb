//! Tangent of the critical locus from the implicit function theorem.

use super::derivs::get_derivs;
use crate::error::{CriticalError, CriticalResult};
use crate::traits::ResidualModel;
use nalgebra::{DVector, Matrix2, Vector2};
use tracing::debug;

const TEMPERATURE_STEP: f64 = 1e-7;
const SIGMA2_FRACTION: f64 = 2e-5;

fn non_negative(rhovec: &DVector<f64>) -> bool {
    rhovec.iter().all(|&r| r >= 0.0)
}

/// Derivative of the concentrations with respect to temperature along the
/// critical locus of a binary mixture.
///
/// The temperature derivatives of the criticality conditions come from a
/// centered difference; the derivatives along the secondary eigenvector v1
/// use a centered difference when both perturbed states keep every
/// concentration non-negative, and a one-sided second-order formula otherwise.
pub fn get_drhovec_dt_crit<M: ResidualModel>(
    model: &M,
    t: f64,
    rhovec: &DVector<f64>,
) -> CriticalResult<DVector<f64>> {
    if rhovec.len() != 2 {
        return Err(CriticalError::invalid_input(format!(
            "the critical slope is only defined for binary mixtures, got {} components",
            rhovec.len()
        )));
    }

    let all_derivs = get_derivs(model, t, rhovec, None)?;
    let derivs = all_derivs.tot;
    let ei = &all_derivs.eigen;

    let plus_t = get_derivs(model, t + TEMPERATURE_STEP, rhovec, Some(&ei.v0))?.tot;
    let minus_t = get_derivs(model, t - TEMPERATURE_STEP, rhovec, Some(&ei.v0))?.tot;
    let deriv_t = (plus_t - minus_t) / (2.0 * TEMPERATURE_STEP);

    let sigma2 = SIGMA2_FRACTION * rhovec.sum();
    let rho_plus = rhovec + &ei.v1 * sigma2;
    let rho_minus = rhovec - &ei.v1 * sigma2;

    let (deriv_sigma2, stepping) = if non_negative(&rho_plus) && non_negative(&rho_minus) {
        let plus = get_derivs(model, t, &rho_plus, Some(&ei.v0))?.tot;
        let minus = get_derivs(model, t, &rho_minus, Some(&ei.v0))?.tot;
        ((plus - minus) / (2.0 * sigma2), "centered")
    } else if non_negative(&rho_plus) {
        let plus = get_derivs(model, t, &rho_plus, Some(&ei.v0))?.tot;
        let rho_2plus = rhovec + &ei.v1 * (2.0 * sigma2);
        let plus2 = get_derivs(model, t, &rho_2plus, Some(&ei.v0))?.tot;
        ((-3.0 * derivs + 4.0 * plus - plus2) / (2.0 * sigma2), "forward")
    } else if non_negative(&rho_minus) {
        let minus = get_derivs(model, t, &rho_minus, Some(&ei.v0))?.tot;
        let rho_2minus = rhovec - &ei.v1 * (2.0 * sigma2);
        let minus2 = get_derivs(model, t, &rho_2minus, Some(&ei.v0))?.tot;
        ((-3.0 * derivs + 4.0 * minus - minus2) / (-2.0 * sigma2), "backward")
    } else {
        return Err(CriticalError::invalid_input(format!(
            "no perturbation along v1 keeps the concentrations non-negative at rho = {:?}",
            rhovec.as_slice()
        )));
    };
    debug!(stepping, sigma2, "secondary-direction derivative");

    // Rows: d3 and d4 along v0, then their derivatives along v1
    let b = Matrix2::new(derivs[3], derivs[4], deriv_sigma2[2], deriv_sigma2[3]);
    let basis = Matrix2::new(
        ei.eigenvectors[(0, 0)],
        ei.eigenvectors[(0, 1)],
        ei.eigenvectors[(1, 0)],
        ei.eigenvectors[(1, 1)],
    );
    let lhs = (basis * b).transpose();
    let rhs = Vector2::new(-deriv_t[2], -deriv_t[3]);

    let solution = solve_tangent(&lhs, &rhs).map_err(|err| match err {
        CriticalError::InvalidInput { what } => CriticalError::invalid_input(format!(
            "{what} at T = {t}, rho = {:?}",
            rhovec.as_slice()
        )),
        other => other,
    })?;
    Ok(DVector::from_column_slice(solution.as_slice()))
}

fn solve_tangent(lhs: &Matrix2<f64>, rhs: &Vector2<f64>) -> CriticalResult<Vector2<f64>> {
    let scale = lhs.row(0).norm() * lhs.row(1).norm();
    if !(scale > 0.0) || !(lhs.determinant().abs() / scale >= 1e-14) {
        return Err(CriticalError::invalid_input("tangent system is singular"));
    }
    let solution = lhs
        .lu()
        .solve(rhs)
        .ok_or_else(|| CriticalError::invalid_input("tangent system is singular"))?;
    if solution.iter().any(|v| !v.is_finite()) {
        return Err(CriticalError::invalid_input(
            "tangent system produced a non-finite direction",
        ));
    }
    Ok(solution)
}
