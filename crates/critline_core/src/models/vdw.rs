//! van der Waals models.

use super::R_GAS;
use crate::traits::{ResidualModel, Scalar};

/// Binary one-fluid van der Waals model with composition-independent `a` and `b`.
///
/// Both "components" share the same parameters, so a mixture behaves like
/// the pure fluid: Tc = 8a / (27 b R), rho_c = 1 / (3b).
#[derive(Debug, Clone, PartialEq)]
pub struct VdW1 {
    a: f64,
    b: f64,
}

impl VdW1 {
    pub fn new(a: f64, b: f64) -> Self {
        Self { a, b }
    }

    pub fn critical_temperature(&self) -> f64 {
        8.0 * self.a / (27.0 * self.b * R_GAS)
    }

    pub fn critical_density(&self) -> f64 {
        1.0 / (3.0 * self.b)
    }
}

impl ResidualModel for VdW1 {
    fn component_count(&self) -> usize {
        2
    }

    fn alphar<S: Scalar>(&self, t: S, rho: S, _molefrac: &[S]) -> S {
        let one = S::one();
        -(one - S::lit(self.b) * rho).ln() - S::lit(self.a) * rho / (S::lit(R_GAS) * t)
    }

    fn gas_constant<S: Scalar>(&self, _molefrac: &[S]) -> S {
        S::lit(R_GAS)
    }
}

/// van der Waals mixture built from pure-component critical constants with
/// the quadratic one-fluid mixing rules.
#[derive(Debug, Clone, PartialEq)]
pub struct VdW {
    ai: Vec<f64>,
    bi: Vec<f64>,
}

impl VdW {
    /// tc_k: critical temperatures in K
    /// pc_pa: critical pressures in Pa
    pub fn new(tc_k: &[f64], pc_pa: &[f64]) -> Self {
        let ai = tc_k
            .iter()
            .zip(pc_pa)
            .map(|(&tc, &pc)| 27.0 / 64.0 * (R_GAS * tc).powi(2) / pc)
            .collect();
        let bi = tc_k
            .iter()
            .zip(pc_pa)
            .map(|(&tc, &pc)| R_GAS * tc / (8.0 * pc))
            .collect();
        Self { ai, bi }
    }

    /// Pure-fluid critical density of component `i`, 1 / (3 b_i).
    pub fn critical_density(&self, i: usize) -> f64 {
        1.0 / (3.0 * self.bi[i])
    }

    fn mixture_a<S: Scalar>(&self, molefrac: &[S]) -> S {
        let mut a = S::zero();
        for (i, &xi) in molefrac.iter().enumerate() {
            for (j, &xj) in molefrac.iter().enumerate() {
                a = a + xi * xj * S::lit((self.ai[i] * self.ai[j]).sqrt());
            }
        }
        a
    }

    fn mixture_b<S: Scalar>(&self, molefrac: &[S]) -> S {
        molefrac
            .iter()
            .zip(&self.bi)
            .fold(S::zero(), |acc, (&x, &b)| acc + x * S::lit(b))
    }
}

impl ResidualModel for VdW {
    fn component_count(&self) -> usize {
        self.ai.len()
    }

    fn alphar<S: Scalar>(&self, t: S, rho: S, molefrac: &[S]) -> S {
        let a = self.mixture_a(molefrac);
        let b = self.mixture_b(molefrac);
        -(S::one() - b * rho).ln() - a * rho / (S::lit(R_GAS) * t)
    }

    fn gas_constant<S: Scalar>(&self, _molefrac: &[S]) -> S {
        S::lit(R_GAS)
    }
}
