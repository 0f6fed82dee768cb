//! Derivatives of the residual Helmholtz energy density Psi^r with respect
//! to the molar concentrations.
//!
//! Psi^r(T, rho) = alphar(T, sum(rho), rho / sum(rho)) * R * T * sum(rho)

use crate::autodiff::Jet;
use crate::traits::{ResidualModel, Scalar};
use nalgebra::DMatrix;

/// Residual Helmholtz energy density in J/m^3.
pub fn psir<M: ResidualModel, S: Scalar>(model: &M, t: S, rhovec: &[S]) -> S {
    let rhotot = rhovec.iter().fold(S::zero(), |acc, &r| acc + r);
    let molefrac: Vec<S> = rhovec.iter().map(|&r| r / rhotot).collect();
    model.alphar(t, rhotot, &molefrac) * model.gas_constant(&molefrac) * t * rhotot
}

/// Second derivative of Psi^r along `direction`, i.e. direction^T H direction.
fn second_directional<M: ResidualModel>(model: &M, t: f64, rhovec: &[f64], direction: &[f64]) -> f64 {
    let sigma = Jet::<3>::variable(0.0);
    let shifted: Vec<Jet<3>> = rhovec
        .iter()
        .zip(direction)
        .map(|(&r, &d)| Jet::constant(r) + sigma * Jet::constant(d))
        .collect();
    psir(model, Jet::constant(t), &shifted).derivative(2)
}

/// Hessian of Psi^r with respect to the molar concentrations.
///
/// Each entry comes from exact second directional derivatives; the
/// off-diagonal terms use the polarization identity
/// `H_ij = (D2(e_i + e_j) - D2(e_i) - D2(e_j)) / 2`.
pub fn psir_hessian<M: ResidualModel>(model: &M, t: f64, rhovec: &[f64]) -> DMatrix<f64> {
    let n = rhovec.len();
    let unit = |i: usize| -> Vec<f64> { (0..n).map(|k| if k == i { 1.0 } else { 0.0 }).collect() };
    let diagonal: Vec<f64> = (0..n)
        .map(|i| second_directional(model, t, rhovec, &unit(i)))
        .collect();

    let mut hessian = DMatrix::zeros(n, n);
    for i in 0..n {
        hessian[(i, i)] = diagonal[i];
        for j in (i + 1)..n {
            let pair: Vec<f64> = (0..n)
                .map(|k| if k == i || k == j { 1.0 } else { 0.0 })
                .collect();
            let value = 0.5 * (second_directional(model, t, rhovec, &pair) - diagonal[i] - diagonal[j]);
            hessian[(i, j)] = value;
            hessian[(j, i)] = value;
        }
    }
    hessian
}

/// Residual pressure `rho R T rho (d alphar / d rho)_x` in Pa.
pub fn residual_pressure<M: ResidualModel>(model: &M, t: f64, rhovec: &[f64]) -> f64 {
    let rhotot: f64 = rhovec.iter().sum();
    let molefrac: Vec<Jet<2>> = rhovec.iter().map(|&r| Jet::constant(r / rhotot)).collect();
    let alphar = model.alphar(Jet::constant(t), Jet::variable(rhotot), &molefrac);
    let gas_constant: f64 = model.gas_constant(&rhovec.iter().map(|&r| r / rhotot).collect::<Vec<_>>());
    rhotot * gas_constant * t * rhotot * alphar.derivative(1)
}

/// Total pressure, ideal-gas part plus [`residual_pressure`].
pub fn pressure<M: ResidualModel>(model: &M, t: f64, rhovec: &[f64]) -> f64 {
    let rhotot: f64 = rhovec.iter().sum();
    let molefrac: Vec<f64> = rhovec.iter().map(|&r| r / rhotot).collect();
    rhotot * model.gas_constant(&molefrac) * t + residual_pressure(model, t, rhovec)
}

/// Residual entropy in the form s^+ = -s^r / R = alphar - T (d alphar / dT).
pub fn splus<M: ResidualModel>(model: &M, t: f64, rhovec: &[f64]) -> f64 {
    let rhotot: f64 = rhovec.iter().sum();
    let molefrac: Vec<Jet<2>> = rhovec.iter().map(|&r| Jet::constant(r / rhotot)).collect();
    let alphar = model.alphar(Jet::variable(t), Jet::constant(rhotot), &molefrac);
    alphar.value() - t * alphar.derivative(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{VdW, R_GAS};

    fn model() -> VdW {
        VdW::new(&[190.564, 305.32], &[4.5992e6, 4.872e6])
    }

    #[test]
    fn hessian_matches_central_differences() {
        let model = model();
        let t = 250.0;
        let rho = [3000.0, 2000.0];
        let hessian = psir_hessian(&model, t, &rho);
        assert!((hessian[(0, 1)] - hessian[(1, 0)]).abs() < 1e-12);

        let h = 1e-2;
        let f = |r0: f64, r1: f64| psir(&model, t, &[r0, r1]);
        let d00 = (f(rho[0] + h, rho[1]) - 2.0 * f(rho[0], rho[1]) + f(rho[0] - h, rho[1])) / (h * h);
        let d01 = (f(rho[0] + h, rho[1] + h) - f(rho[0] + h, rho[1] - h) - f(rho[0] - h, rho[1] + h)
            + f(rho[0] - h, rho[1] - h))
            / (4.0 * h * h);
        assert!((hessian[(0, 0)] - d00).abs() < 1e-4 * d00.abs().max(1.0));
        assert!((hessian[(0, 1)] - d01).abs() < 1e-4 * d01.abs().max(1.0));
    }

    #[test]
    fn pressure_matches_vdw_closed_form() {
        let model = model();
        let t = 250.0;
        let rho = [3000.0, 0.0];
        let a0 = 27.0 / 64.0 * (R_GAS * 190.564f64).powi(2) / 4.5992e6;
        let b0 = R_GAS * 190.564 / (8.0 * 4.5992e6);
        let rhotot = 3000.0;
        let expected = rhotot * R_GAS * t / (1.0 - b0 * rhotot) - a0 * rhotot * rhotot;
        let p = pressure(&model, t, &rho);
        assert!((p - expected).abs() < 1e-8 * expected.abs());
    }

    #[test]
    fn splus_of_vdw_is_temperature_independent_part() {
        // alphar = -ln(1 - b rho) - a rho / (R T), so alphar - T dalphar/dT = -ln(1 - b rho) - 2 a rho / (R T)
        let model = model();
        let t = 250.0;
        let rho = [1000.0, 0.0];
        let a0 = 27.0 / 64.0 * (R_GAS * 190.564f64).powi(2) / 4.5992e6;
        let b0 = R_GAS * 190.564 / (8.0 * 4.5992e6);
        let expected = -(1.0 - b0 * 1000.0f64).ln() - 2.0 * a0 * 1000.0 / (R_GAS * t);
        assert!((splus(&model, t, &rho) - expected).abs() < 1e-12);
    }
}
