//! Derivatives of Psi = Psi^0 + Psi^r along the v0 eigen-direction.

use super::eigen::{eigen_problem, EigenData};
use crate::autodiff::{derivatives, Jet};
use crate::error::{CriticalError, CriticalResult};
use crate::isochoric::psir;
use crate::traits::ResidualModel;
use nalgebra::{DVector, Vector5};

/// Orders 0 through 4 of the derivatives of Psi with respect to the
/// displacement sigma in rho(sigma) = rho + sigma v0, at fixed T.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalDerivatives {
    pub psir: Vector5<f64>,
    /// Ideal-gas part; orders 0 and 1 are placeholders (-1).
    pub psi0: Vector5<f64>,
    pub tot: Vector5<f64>,
    pub eigen: EigenData,
}

pub fn get_derivs<M: ResidualModel>(
    model: &M,
    t: f64,
    rhovec: &DVector<f64>,
    alignment_v0: Option<&DVector<f64>>,
) -> CriticalResult<DirectionalDerivatives> {
    let eigen = eigen_problem(model, t, rhovec, alignment_v0)?;
    let rhotot = rhovec.sum();
    let molefrac: Vec<f64> = rhovec.iter().map(|&r| r / rhotot).collect();
    let rt = model.gas_constant(&molefrac) * t;

    let mut psi0 = Vector5::new(-1.0, -1.0, 0.0, 0.0, 0.0);
    for (&rho, &v) in rhovec.iter().zip(eigen.v0.iter()) {
        if rho != 0.0 {
            psi0[2] += rt * v.powi(2) / rho;
            psi0[3] += -rt * v.powi(3) / rho.powi(2);
            psi0[4] += 2.0 * rt * v.powi(4) / rho.powi(3);
        }
    }

    let along_v0 = |sigma: Jet<5>| {
        let shifted: Vec<Jet<5>> = rhovec
            .iter()
            .zip(eigen.v0.iter())
            .map(|(&r, &v)| Jet::constant(r) + sigma * Jet::constant(v))
            .collect();
        psir(model, Jet::constant(t), &shifted)
    };
    let psir = Vector5::from(derivatives::<5, _>(along_v0, 0.0));
    if psir.iter().any(|v| !v.is_finite()) {
        return Err(CriticalError::non_finite(format!(
            "directional derivatives of Psi^r at T = {t}, rho = {:?}",
            rhovec.as_slice()
        )));
    }

    Ok(DirectionalDerivatives {
        tot: psi0 + psir,
        psir,
        psi0,
        eigen,
    })
}

/// The two criticality conditions, the second and third derivatives of Psi
/// along v0. Both vanish on the critical locus.
pub fn criticality_conditions<M: ResidualModel>(
    model: &M,
    t: f64,
    rhovec: &DVector<f64>,
) -> CriticalResult<[f64; 2]> {
    let derivs = get_derivs(model, t, rhovec, None)?;
    Ok([derivs.tot[2], derivs.tot[3]])
}

pub fn minimum_eigenvalue_psi_hessian<M: ResidualModel>(
    model: &M,
    t: f64,
    rhovec: &DVector<f64>,
) -> CriticalResult<f64> {
    Ok(eigen_problem(model, t, rhovec, None)?.eigenvalues[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GenericCubic, VdW, R_GAS};

    const TC: [f64; 2] = [190.564, 305.32];
    const PC: [f64; 2] = [4.5992e6, 4.872e6];

    fn assert_second_derivative_is_min_eigenvalue<M: ResidualModel>(model: &M, t: f64, rho: &[f64]) {
        let rho = DVector::from_column_slice(rho);
        let derivs = get_derivs(model, t, &rho, None).expect("derivatives");
        let lambda0 = minimum_eigenvalue_psi_hessian(model, t, &rho).expect("eigenvalue");
        let tol = 1e-3 * lambda0.abs().max(1e-12);
        assert!(
            (derivs.tot[2] - lambda0).abs() < tol,
            "tot[2] = {}, lambda0 = {}",
            derivs.tot[2],
            lambda0
        );
    }

    #[test]
    fn second_derivative_matches_minimum_eigenvalue() {
        let vdw = VdW::new(&TC, &PC);
        assert_second_derivative_is_min_eigenvalue(&vdw, 220.0, &[6000.0, 2000.0]);
        assert_second_derivative_is_min_eigenvalue(&vdw, 300.0, &[100.0, 7000.0]);
        assert_second_derivative_is_min_eigenvalue(&vdw, 190.0, &[7700.0, 0.0]);

        let pr = GenericCubic::peng_robinson(&TC, &PC, &[0.011, 0.099], None, None).expect("model");
        assert_second_derivative_is_min_eigenvalue(&pr, 250.0, &[5000.0, 3000.0]);
        assert_second_derivative_is_min_eigenvalue(&pr, 250.0, &[0.0, 3000.0]);
    }

    #[test]
    fn ideal_orders_zero_and_one_are_placeholders() {
        let vdw = VdW::new(&TC, &PC);
        let rho = DVector::from_vec(vec![6000.0, 2000.0]);
        let derivs = get_derivs(&vdw, 220.0, &rho, None).expect("derivatives");
        assert_eq!(derivs.psi0[0], -1.0);
        assert_eq!(derivs.psi0[1], -1.0);
        assert_eq!(derivs.tot, derivs.psi0 + derivs.psir);
    }

    #[test]
    fn pure_vdw_critical_point_satisfies_conditions() {
        let vdw = VdW::new(&TC, &PC);
        let tc = TC[0];
        let rhoc = vdw.critical_density(0);
        let rho = DVector::from_vec(vec![rhoc, 0.0]);
        let [c1, c2] = criticality_conditions(&vdw, tc, &rho).expect("conditions");
        let scale = R_GAS * tc / rhoc;
        assert!(c1.abs() < 1e-9 * scale, "condition 1 = {c1}");
        assert!(c2.abs() < 1e-9 * scale / rhoc, "condition 2 = {c2}");
    }

    #[test]
    fn stable_state_has_positive_curvature() {
        let vdw = VdW::new(&TC, &PC);
        let rho = DVector::from_vec(vec![100.0, 100.0]);
        let lambda0 = minimum_eigenvalue_psi_hessian(&vdw, 400.0, &rho).expect("eigenvalue");
        assert!(lambda0 > 0.0);
    }
}
