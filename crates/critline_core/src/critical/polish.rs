//! Re-convergence of critical points onto the locus.
//!
//! Each variant solves the two criticality conditions for two unknowns
//! while holding one degree of freedom fixed.

use super::derivs::get_derivs;
use crate::error::{CriticalError, CriticalResult};
use crate::rootfinding::{newton_raphson, NewtonSettings};
use crate::traits::ResidualModel;
use nalgebra::DVector;

const POLISH_TOLERANCE: f64 = 1e-10;

fn conditions<M: ResidualModel>(model: &M, t: f64, rhovec: &DVector<f64>) -> CriticalResult<[f64; 2]> {
    let derivs = get_derivs(model, t, rhovec, None)?;
    Ok([derivs.tot[2], derivs.tot[3]])
}

fn ensure_finite(values: &DVector<f64>) -> CriticalResult<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(CriticalError::non_finite(format!(
            "polished coordinates {:?}",
            values.as_slice()
        )))
    }
}

/// Polishes at fixed overall composition `z0`, iterating on temperature and
/// total density. Returns the new temperature and concentrations.
pub fn critical_polish_molefrac<M: ResidualModel>(
    model: &M,
    t: f64,
    rhovec: &DVector<f64>,
    z0: f64,
) -> CriticalResult<(f64, DVector<f64>)> {
    let split = |rhotot: f64| DVector::from_vec(vec![z0 * rhotot, (1.0 - z0) * rhotot]);
    let residual = |x: &DVector<f64>| -> CriticalResult<DVector<f64>> {
        let [c1, c2] = conditions(model, x[0], &split(x[1]))?;
        Ok(DVector::from_vec(vec![c1, c2]))
    };
    let x0 = DVector::from_vec(vec![t, rhovec.sum()]);
    let x = newton_raphson(residual, &x0, NewtonSettings::with_tolerance(POLISH_TOLERANCE))?;
    ensure_finite(&x)?;
    Ok((x[0], split(x[1])))
}

/// Polishes while holding the concentration of component `i` fixed,
/// iterating on temperature and both concentrations.
pub fn critical_polish_fixedrho<M: ResidualModel>(
    model: &M,
    t: f64,
    rhovec: &DVector<f64>,
    i: usize,
) -> CriticalResult<(f64, DVector<f64>)> {
    if rhovec.len() != 2 || i >= 2 {
        return Err(CriticalError::invalid_input(format!(
            "fixed-concentration polishing needs a binary mixture and i in {{0, 1}}, got {} components and i = {i}",
            rhovec.len()
        )));
    }
    let rhoval = rhovec[i];
    let residual = |x: &DVector<f64>| -> CriticalResult<DVector<f64>> {
        let rho = DVector::from_vec(vec![x[1], x[2]]);
        let [c1, c2] = conditions(model, x[0], &rho)?;
        Ok(DVector::from_vec(vec![c1, c2, rho[i] - rhoval]))
    };
    let x0 = DVector::from_vec(vec![t, rhovec[0], rhovec[1]]);
    let x = newton_raphson(residual, &x0, NewtonSettings::with_tolerance(POLISH_TOLERANCE))?;
    ensure_finite(&x)?;
    Ok((x[0], x.rows(1, 2).into_owned()))
}

/// Polishes at fixed temperature, iterating on the concentrations.
pub fn critical_polish_fixed_t<M: ResidualModel>(
    model: &M,
    t: f64,
    rhovec: &DVector<f64>,
) -> CriticalResult<DVector<f64>> {
    let residual = |x: &DVector<f64>| -> CriticalResult<DVector<f64>> {
        let [c1, c2] = conditions(model, t, x)?;
        Ok(DVector::from_vec(vec![c1, c2]))
    };
    let x = newton_raphson(residual, rhovec, NewtonSettings::with_tolerance(POLISH_TOLERANCE))?;
    ensure_finite(&x)?;
    Ok(x)
}
