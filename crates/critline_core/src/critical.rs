//! Critical points of binary mixtures and the continuation of the critical locus.
//!
//! The pipeline is layered: [`eigen`] decomposes the curvature matrix of
//! the Helmholtz energy density, [`derivs`] differentiates along its softest
//! direction, [`slope`] turns those derivatives into the tangent of the
//! locus, and [`trace`] integrates that tangent. [`polish`] pulls points
//! back onto the locus with Newton iterations.

pub mod derivs;
pub mod eigen;
pub mod polish;
pub mod slope;
pub mod trace;
pub mod types;

pub use derivs::{criticality_conditions, get_derivs, minimum_eigenvalue_psi_hessian, DirectionalDerivatives};
pub use eigen::{eigen_problem, sorted_eigen, EigenData};
pub use polish::{critical_polish_fixed_t, critical_polish_fixedrho, critical_polish_molefrac};
pub use slope::get_drhovec_dt_crit;
pub use trace::{trace_critical_arclength_binary, CriticalTracer};
pub use types::{ContinuationOptions, CriticalTrace, Termination, TracePoint, TraceState};
