//! Generic two-parameter cubic equations of state (Peng-Robinson, SRK).
//!
//! ```text
//! alphar = -ln(1 - b rho) - a(T, x) / (R T) * ln((D1 b rho + 1) / (D2 b rho + 1)) / (b (D1 - D2))
//! ```

use super::R_GAS;
use crate::error::{CriticalError, CriticalResult};
use crate::traits::{ResidualModel, Scalar};
use nalgebra::DMatrix;

/// Temperature-dependent multiplier on the attractive parameter of one component.
#[derive(Debug, Clone, PartialEq)]
pub enum AlphaFunction {
    /// (1 + m (1 - sqrt(T / Tc)))^2
    Basic { tc: f64, m: f64 },
    /// (T/Tc)^(c2 (c1 - 1)) exp(c0 (1 - (T/Tc)^(c1 c2)))
    Twu { tc: f64, c: [f64; 3] },
}

impl AlphaFunction {
    fn eval<S: Scalar>(&self, t: S) -> S {
        match *self {
            AlphaFunction::Basic { tc, m } => {
                let inner = S::one() + S::lit(m) * (S::one() - (t / S::lit(tc)).sqrt());
                inner * inner
            }
            AlphaFunction::Twu { tc, c } => {
                let tr = t / S::lit(tc);
                tr.powf(S::lit(c[2] * (c[1] - 1.0)))
                    * (S::lit(c[0]) * (S::one() - tr.powf(S::lit(c[1] * c[2])))).exp()
            }
        }
    }
}

/// Which canonical cubic family the parameters came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CubicKind {
    PengRobinson,
    SoaveRedlichKwong,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenericCubic {
    kind: CubicKind,
    delta1: f64,
    delta2: f64,
    ai: Vec<f64>,
    bi: Vec<f64>,
    alphas: Vec<AlphaFunction>,
    kmat: DMatrix<f64>,
}

impl GenericCubic {
    fn new(
        kind: CubicKind,
        (delta1, delta2): (f64, f64),
        (omega_a, omega_b): (f64, f64),
        tc_k: &[f64],
        pc_pa: &[f64],
        alphas: Vec<AlphaFunction>,
        kmat: Option<DMatrix<f64>>,
    ) -> CriticalResult<Self> {
        let n = tc_k.len();
        if pc_pa.len() != n || alphas.len() != n {
            return Err(CriticalError::invalid_input(format!(
                "cubic parameters have mismatched lengths (Tc: {}, pc: {}, alpha: {})",
                n,
                pc_pa.len(),
                alphas.len()
            )));
        }
        let kmat = match kmat {
            None => DMatrix::zeros(n, n),
            Some(k) if k.nrows() == 0 && k.ncols() == 0 => DMatrix::zeros(n, n),
            Some(k) if k.nrows() != k.ncols() => {
                return Err(CriticalError::invalid_input(format!(
                    "kmat rows [{}] and columns [{}] are not identical",
                    k.nrows(),
                    k.ncols()
                )))
            }
            Some(k) if k.nrows() != n => {
                return Err(CriticalError::invalid_input(format!(
                    "kmat needs to be a square matrix the same size as the number of components [{}]",
                    n
                )))
            }
            Some(k) => k,
        };
        let ai = tc_k
            .iter()
            .zip(pc_pa)
            .map(|(&tc, &pc)| omega_a * (R_GAS * tc).powi(2) / pc)
            .collect();
        let bi = tc_k
            .iter()
            .zip(pc_pa)
            .map(|(&tc, &pc)| omega_b * R_GAS * tc / pc)
            .collect();
        Ok(Self {
            kind,
            delta1,
            delta2,
            ai,
            bi,
            alphas,
            kmat,
        })
    }

    /// Canonical Peng-Robinson; `alphas` overrides the default alpha functions.
    pub fn peng_robinson(
        tc_k: &[f64],
        pc_pa: &[f64],
        acentric: &[f64],
        alphas: Option<Vec<AlphaFunction>>,
        kmat: Option<DMatrix<f64>>,
    ) -> CriticalResult<Self> {
        let alphas = alphas.unwrap_or_else(|| {
            tc_k.iter()
                .zip(acentric)
                .map(|(&tc, &w)| {
                    let m = if w < 0.491 {
                        0.37464 + 1.54226 * w - 0.26992 * w * w
                    } else {
                        0.379642 + 1.48503 * w - 0.164423 * w * w + 0.016666 * w.powi(3)
                    };
                    AlphaFunction::Basic { tc, m }
                })
                .collect()
        });
        let sqrt2 = 2.0f64.sqrt();
        Self::new(
            CubicKind::PengRobinson,
            (1.0 + sqrt2, 1.0 - sqrt2),
            (0.45723552892138218938, 0.077796073903888455972),
            tc_k,
            pc_pa,
            alphas,
            kmat,
        )
    }

    /// Canonical Soave-Redlich-Kwong; `alphas` overrides the default alpha functions.
    pub fn soave_redlich_kwong(
        tc_k: &[f64],
        pc_pa: &[f64],
        acentric: &[f64],
        alphas: Option<Vec<AlphaFunction>>,
        kmat: Option<DMatrix<f64>>,
    ) -> CriticalResult<Self> {
        let alphas = alphas.unwrap_or_else(|| {
            tc_k.iter()
                .zip(acentric)
                .map(|(&tc, &w)| AlphaFunction::Basic {
                    tc,
                    m: 0.48 + 1.574 * w - 0.176 * w * w,
                })
                .collect()
        });
        let cbrt2 = 2.0f64.cbrt();
        Self::new(
            CubicKind::SoaveRedlichKwong,
            (1.0, 0.0),
            (1.0 / (9.0 * (cbrt2 - 1.0)), (cbrt2 - 1.0) / 3.0),
            tc_k,
            pc_pa,
            alphas,
            kmat,
        )
    }

    pub fn kind(&self) -> CubicKind {
        self.kind
    }

    pub fn kmat(&self) -> &DMatrix<f64> {
        &self.kmat
    }

    fn mixture_a<S: Scalar>(&self, t: S, molefrac: &[S]) -> S {
        let scaled: Vec<S> = self
            .ai
            .iter()
            .zip(&self.alphas)
            .map(|(&a, alpha)| S::lit(a) * alpha.eval(t))
            .collect();
        let mut a = S::zero();
        for i in 0..molefrac.len() {
            for j in 0..molefrac.len() {
                let aij = S::lit(1.0 - self.kmat[(i, j)]) * (scaled[i] * scaled[j]).sqrt();
                a = a + molefrac[i] * molefrac[j] * aij;
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

impl ResidualModel for GenericCubic {
    fn component_count(&self) -> usize {
        self.ai.len()
    }

    fn alphar<S: Scalar>(&self, t: S, rho: S, molefrac: &[S]) -> S {
        let b = self.mixture_b(molefrac);
        let brho = b * rho;
        let psi_minus = -(S::one() - brho).ln();
        let psi_plus = ((S::lit(self.delta1) * brho + S::one())
            / (S::lit(self.delta2) * brho + S::one()))
        .ln()
            / (b * S::lit(self.delta1 - self.delta2));
        psi_minus - self.mixture_a(t, molefrac) / (S::lit(R_GAS) * t) * psi_plus
    }

    fn gas_constant<S: Scalar>(&self, _molefrac: &[S]) -> S {
        S::lit(R_GAS)
    }
}
