//! The `critline_core` crate traces critical loci of binary fluid mixtures.
//! Thermodynamic models are generic over their scalar type so that exact
//! higher-order derivatives can be taken with truncated Taylor jets.
//!
//! Key components:
//! - **Traits**: `Scalar` (numeric type abstraction), `ResidualModel` (residual Helmholtz energy), `DynamicalSystem` (ODE right-hand sides).
//! - **Autodiff**: `Jet<N>` truncated Taylor series and the `derivatives` helper.
//! - **Models**: van der Waals and generic cubic equations of state, plus the serde `ModelSpec` factory.
//! - **Isochoric**: Helmholtz energy density, its Hessian in the molar concentrations, pressure and residual entropy.
//! - **Solvers**: Euler and controlled Cash-Karp steppers; `rootfinding` holds the Newton solver.
//! - **Critical**: eigen-analysis, directional derivatives, locus tangent, polishing and tracing.

pub mod autodiff;
pub mod critical;
pub mod error;
pub mod isochoric;
pub mod models;
pub mod rootfinding;
pub mod solvers;
pub mod traits;

pub use critical::{trace_critical_arclength_binary, ContinuationOptions, CriticalTrace, CriticalTracer, Termination, TracePoint};
pub use error::{CriticalError, CriticalResult};
pub use models::{AnyModel, ModelSpec};
pub use traits::ResidualModel;
