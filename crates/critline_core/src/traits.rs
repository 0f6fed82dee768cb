use crate::error::CriticalResult;
use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars in thermodynamic models.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + From<f64> + 'static {
    /// Lifts an `f64` constant into the scalar type.
    fn lit(value: f64) -> Self {
        <Self as From<f64>>::from(value)
    }
}

impl<T: Float + FromPrimitive + Debug + From<f64> + 'static> Scalar for T {}

/// A residual Helmholtz energy model for a mixture.
///
/// Implementations must be generic over the scalar type so that the
/// critical-point machinery can evaluate them at jet arguments and recover
/// exact higher-order derivatives.
pub trait ResidualModel {
    /// Number of components the model was built for.
    fn component_count(&self) -> usize;

    /// Reduced residual Helmholtz energy `alpha^r(T, rho, x)`.
    /// t: temperature in K
    /// rho: total molar density in mol/m^3
    /// molefrac: mole fractions, same length as `component_count()`
    fn alphar<S: Scalar>(&self, t: S, rho: S, molefrac: &[S]) -> S;

    /// Molar gas constant of the mixture in J/(mol K).
    fn gas_constant<S: Scalar>(&self, molefrac: &[S]) -> S;
}

impl<M: ResidualModel> ResidualModel for &M {
    fn component_count(&self) -> usize {
        (**self).component_count()
    }

    fn alphar<S: Scalar>(&self, t: S, rho: S, molefrac: &[S]) -> S {
        (**self).alphar(t, rho, molefrac)
    }

    fn gas_constant<S: Scalar>(&self, molefrac: &[S]) -> S {
        (**self).gas_constant(molefrac)
    }
}

/// Represents an autonomous first-order system x' = f(x).
pub trait DynamicalSystem {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field.
    /// t: current pseudo-time
    /// x: current state
    /// out: buffer to write dx/dt into
    fn apply(&self, t: f64, x: &[f64], out: &mut [f64]) -> CriticalResult<()>;
}
