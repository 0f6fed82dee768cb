//! Residual Helmholtz energy models and the description they are built from.
//!
//! The critical-point machinery only sees [`ResidualModel`]; the concrete
//! equations of state live here, and [`ModelSpec`] turns a serde description
//! (`{"kind": ..., "model": {...}}`) into one of them.

mod cubic;
mod vdw;

pub use cubic::{AlphaFunction, CubicKind, GenericCubic};
pub use vdw::{VdW, VdW1};

use crate::traits::{ResidualModel, Scalar};
use anyhow::{bail, Context, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Molar gas constant in J/(mol K), exact by the 2019 SI definition.
pub const R_GAS: f64 = 8.31446261815324;

/// Parameters shared by the canonical cubic models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubicSpec {
    #[serde(rename = "Tcrit / K")]
    pub tc_k: Vec<f64>,
    #[serde(rename = "pcrit / Pa")]
    pub pc_pa: Vec<f64>,
    pub acentric: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kmat: Option<Vec<Vec<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<Vec<AlphaSpec>>,
}

/// Alternative alpha function for one component of a cubic model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AlphaSpec {
    Twu { c: [f64; 3] },
}

/// Serializable description of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model")]
pub enum ModelSpec {
    #[serde(rename = "vdW1")]
    VdW1 { a: f64, b: f64 },
    #[serde(rename = "vdW")]
    VdW {
        #[serde(rename = "Tcrit / K")]
        tc_k: Vec<f64>,
        #[serde(rename = "pcrit / Pa")]
        pc_pa: Vec<f64>,
    },
    PR(CubicSpec),
    SRK(CubicSpec),
}

impl ModelSpec {
    pub fn build(&self) -> Result<AnyModel> {
        match self {
            ModelSpec::VdW1 { a, b } => {
                if *a <= 0.0 || *b <= 0.0 {
                    bail!("vdW1 parameters must be positive (a = {}, b = {}).", a, b);
                }
                Ok(AnyModel::VdW1(VdW1::new(*a, *b)))
            }
            ModelSpec::VdW { tc_k, pc_pa } => {
                if tc_k.len() != pc_pa.len() || tc_k.is_empty() {
                    bail!(
                        "vdW needs one critical pressure per critical temperature (got {} and {}).",
                        tc_k.len(),
                        pc_pa.len()
                    );
                }
                Ok(AnyModel::VdW(VdW::new(tc_k, pc_pa)))
            }
            ModelSpec::PR(spec) => {
                let (alphas, kmat) = cubic_extras(spec)?;
                let model =
                    GenericCubic::peng_robinson(&spec.tc_k, &spec.pc_pa, &spec.acentric, alphas, kmat)
                        .context("Failed to build Peng-Robinson model.")?;
                Ok(AnyModel::Cubic(model))
            }
            ModelSpec::SRK(spec) => {
                let (alphas, kmat) = cubic_extras(spec)?;
                let model = GenericCubic::soave_redlich_kwong(
                    &spec.tc_k,
                    &spec.pc_pa,
                    &spec.acentric,
                    alphas,
                    kmat,
                )
                .context("Failed to build Soave-Redlich-Kwong model.")?;
                Ok(AnyModel::Cubic(model))
            }
        }
    }
}

fn cubic_extras(spec: &CubicSpec) -> Result<(Option<Vec<AlphaFunction>>, Option<DMatrix<f64>>)> {
    let kmat = spec
        .kmat
        .as_deref()
        .map(build_square_matrix)
        .transpose()
        .context("Invalid kmat.")?;
    let alphas = match &spec.alpha {
        None => None,
        Some(alphas) => {
            if alphas.len() != spec.tc_k.len() {
                bail!("alpha must be the same length as components.");
            }
            Some(
                alphas
                    .iter()
                    .zip(&spec.tc_k)
                    .map(|(alpha, &tc)| match *alpha {
                        AlphaSpec::Twu { c } => AlphaFunction::Twu { tc, c },
                    })
                    .collect(),
            )
        }
    };
    Ok((alphas, kmat))
}

/// Builds a dense matrix from nested rows, insisting that it is square.
pub fn build_square_matrix(rows: &[Vec<f64>]) -> Result<DMatrix<f64>> {
    let n = rows.len();
    for (i, row) in rows.iter().enumerate() {
        if row.len() != n {
            bail!("provided matrix is not square (row {} has {} entries, expected {}).", i, row.len(), n);
        }
    }
    Ok(DMatrix::from_fn(n, n, |i, j| rows[i][j]))
}

/// Any model that can be described by a [`ModelSpec`].
#[derive(Debug, Clone, PartialEq)]
pub enum AnyModel {
    VdW1(VdW1),
    VdW(VdW),
    Cubic(GenericCubic),
}

impl ResidualModel for AnyModel {
    fn component_count(&self) -> usize {
        match self {
            AnyModel::VdW1(m) => m.component_count(),
            AnyModel::VdW(m) => m.component_count(),
            AnyModel::Cubic(m) => m.component_count(),
        }
    }

    fn alphar<S: Scalar>(&self, t: S, rho: S, molefrac: &[S]) -> S {
        match self {
            AnyModel::VdW1(m) => m.alphar(t, rho, molefrac),
            AnyModel::VdW(m) => m.alphar(t, rho, molefrac),
            AnyModel::Cubic(m) => m.alphar(t, rho, molefrac),
        }
    }

    fn gas_constant<S: Scalar>(&self, molefrac: &[S]) -> S {
        match self {
            AnyModel::VdW1(m) => m.gas_constant(molefrac),
            AnyModel::VdW(m) => m.gas_constant(molefrac),
            AnyModel::Cubic(m) => m.gas_constant(molefrac),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_vdw_from_json() {
        let spec: ModelSpec = serde_json::from_str(
            r#"{"kind": "vdW", "model": {"Tcrit / K": [190.564, 305.32], "pcrit / Pa": [4.5992e6, 4.872e6]}}"#,
        )
        .expect("spec should parse");
        let model = spec.build().expect("model should build");
        assert_eq!(model.component_count(), 2);
        assert!(matches!(model, AnyModel::VdW(_)));
    }

    #[test]
    fn builds_pr_with_kmat_and_twu() {
        let spec: ModelSpec = serde_json::from_str(
            r#"{
                "kind": "PR",
                "model": {
                    "Tcrit / K": [190.564, 305.32],
                    "pcrit / Pa": [4.5992e6, 4.872e6],
                    "acentric": [0.011, 0.099],
                    "kmat": [[0.0, 0.01], [0.01, 0.0]],
                    "alpha": [{"type": "Twu", "c": [0.1, 0.9, 2.0]}, {"type": "Twu", "c": [0.2, 0.8, 2.0]}]
                }
            }"#,
        )
        .expect("spec should parse");
        let model = spec.build().expect("model should build");
        match model {
            AnyModel::Cubic(cubic) => {
                assert_eq!(cubic.kind(), CubicKind::PengRobinson);
                assert!((cubic.kmat()[(0, 1)] - 0.01).abs() < 1e-15);
            }
            other => panic!("unexpected model {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_kind() {
        let parsed: Result<ModelSpec, _> =
            serde_json::from_str(r#"{"kind": "PCSAFT", "model": {}}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn rejects_non_square_kmat() {
        let err = build_square_matrix(&[vec![0.0, 1.0], vec![1.0]]).expect_err("expected error");
        assert!(err.to_string().contains("not square"));
    }

    #[test]
    fn rejects_mismatched_vdw_lengths() {
        let spec = ModelSpec::VdW {
            tc_k: vec![300.0],
            pc_pa: vec![4e6, 5e6],
        };
        assert!(spec.build().is_err());
    }
}
