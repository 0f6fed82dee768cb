use crate::error::{CriticalError, CriticalResult};
use crate::traits::DynamicalSystem;

/// Explicit Euler stepper.
pub struct Euler {
    derivative: Vec<f64>,
}

impl Euler {
    pub fn new(dim: usize) -> Self {
        Self {
            derivative: vec![0.0; dim],
        }
    }

    pub fn step(
        &mut self,
        system: &impl DynamicalSystem,
        t: &mut f64,
        state: &mut [f64],
        dt: f64,
    ) -> CriticalResult<()> {
        system.apply(*t, state, &mut self.derivative)?;
        for i in 0..state.len() {
            state[i] += dt * self.derivative[i];
        }
        *t += dt;
        Ok(())
    }
}

/// Scaled error measure of an embedded step.
///
/// err = max_i |x_err_i| / (abs_err + rel_err (a_x |x_i| + a_dxdt |dt| |dxdt_i|))
#[derive(Debug, Clone, Copy)]
pub struct ErrorChecker {
    pub abs_err: f64,
    pub rel_err: f64,
    pub a_x: f64,
    pub a_dxdt: f64,
}

impl ErrorChecker {
    pub fn new(abs_err: f64, rel_err: f64) -> Self {
        Self {
            abs_err,
            rel_err,
            a_x: 1.0,
            a_dxdt: 1.0,
        }
    }

    pub fn error(&self, x_old: &[f64], dxdt_old: &[f64], x_err: &[f64], dt: f64) -> f64 {
        x_old
            .iter()
            .zip(dxdt_old)
            .zip(x_err)
            .map(|((&x, &dxdt), &err)| {
                err.abs()
                    / (self.abs_err
                        + self.rel_err * (self.a_x * x.abs() + self.a_dxdt * dt.abs() * dxdt.abs()))
            })
            .fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Accepted,
    /// The step was discarded; `dt` now holds the reduced step size.
    Rejected,
}

const STEPPER_ORDER: i32 = 5;
const ERROR_ORDER: i32 = 4;

/// Cash-Karp 5(4) embedded Runge-Kutta pair with step-size control.
pub struct CashKarp54 {
    k1: Vec<f64>,
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    k5: Vec<f64>,
    k6: Vec<f64>,
    tmp: Vec<f64>,
    x_new: Vec<f64>,
    x_err: Vec<f64>,
    checker: ErrorChecker,
}

impl CashKarp54 {
    pub fn new(dim: usize, checker: ErrorChecker) -> Self {
        Self {
            k1: vec![0.0; dim],
            k2: vec![0.0; dim],
            k3: vec![0.0; dim],
            k4: vec![0.0; dim],
            k5: vec![0.0; dim],
            k6: vec![0.0; dim],
            tmp: vec![0.0; dim],
            x_new: vec![0.0; dim],
            x_err: vec![0.0; dim],
            checker,
        }
    }

    /// Attempts one step of size `dt`.
    ///
    /// On acceptance `t` and `state` advance and `dt` may grow; on rejection
    /// only `dt` shrinks.
    pub fn try_step(
        &mut self,
        system: &impl DynamicalSystem,
        t: &mut f64,
        state: &mut [f64],
        dt: &mut f64,
    ) -> CriticalResult<StepOutcome> {
        self.embedded_step(system, *t, state, *dt)?;

        let err = self.checker.error(state, &self.k1, &self.x_err, *dt);
        if !err.is_finite() {
            return Err(CriticalError::integrator(format!(
                "non-finite error estimate at t = {}",
                t
            )));
        }

        if err > 1.0 {
            let factor = (0.9 * err.powf(-1.0 / (ERROR_ORDER - 1) as f64)).max(0.2);
            *dt *= factor;
            return Ok(StepOutcome::Rejected);
        }

        *t += *dt;
        if err < 0.5 {
            let err = err.max(5f64.powi(-STEPPER_ORDER));
            *dt *= 0.9 * err.powf(-1.0 / STEPPER_ORDER as f64);
        }
        state.copy_from_slice(&self.x_new);
        Ok(StepOutcome::Accepted)
    }

    fn embedded_step(
        &mut self,
        system: &impl DynamicalSystem,
        t0: f64,
        state: &[f64],
        dt: f64,
    ) -> CriticalResult<()> {
        let n = state.len();

        system.apply(t0, state, &mut self.k1)?;

        for i in 0..n {
            self.tmp[i] = state[i] + dt * (1.0 / 5.0) * self.k1[i];
        }
        system.apply(t0 + dt / 5.0, &self.tmp, &mut self.k2)?;

        for i in 0..n {
            self.tmp[i] = state[i] + dt * (3.0 / 40.0 * self.k1[i] + 9.0 / 40.0 * self.k2[i]);
        }
        system.apply(t0 + 3.0 / 10.0 * dt, &self.tmp, &mut self.k3)?;

        for i in 0..n {
            self.tmp[i] = state[i]
                + dt * (3.0 / 10.0 * self.k1[i] - 9.0 / 10.0 * self.k2[i] + 6.0 / 5.0 * self.k3[i]);
        }
        system.apply(t0 + 3.0 / 5.0 * dt, &self.tmp, &mut self.k4)?;

        for i in 0..n {
            self.tmp[i] = state[i]
                + dt * (-11.0 / 54.0 * self.k1[i] + 5.0 / 2.0 * self.k2[i]
                    - 70.0 / 27.0 * self.k3[i]
                    + 35.0 / 27.0 * self.k4[i]);
        }
        system.apply(t0 + dt, &self.tmp, &mut self.k5)?;

        for i in 0..n {
            self.tmp[i] = state[i]
                + dt * (1631.0 / 55296.0 * self.k1[i]
                    + 175.0 / 512.0 * self.k2[i]
                    + 575.0 / 13824.0 * self.k3[i]
                    + 44275.0 / 110592.0 * self.k4[i]
                    + 253.0 / 4096.0 * self.k5[i]);
        }
        system.apply(t0 + 7.0 / 8.0 * dt, &self.tmp, &mut self.k6)?;

        // Fifth-order solution and the difference to the embedded fourth-order one
        let b = [37.0 / 378.0, 0.0, 250.0 / 621.0, 125.0 / 594.0, 0.0, 512.0 / 1771.0];
        let b_star = [
            2825.0 / 27648.0,
            0.0,
            18575.0 / 48384.0,
            13525.0 / 55296.0,
            277.0 / 14336.0,
            1.0 / 4.0,
        ];
        for i in 0..n {
            let k = [
                self.k1[i], self.k2[i], self.k3[i], self.k4[i], self.k5[i], self.k6[i],
            ];
            let mut high = 0.0;
            let mut diff = 0.0;
            for s in 0..6 {
                high += b[s] * k[s];
                diff += (b[s] - b_star[s]) * k[s];
            }
            self.x_new[i] = state[i] + dt * high;
            self.x_err[i] = dt * diff;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Decay;

    impl DynamicalSystem for Decay {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) -> CriticalResult<()> {
            out[0] = -x[0];
            Ok(())
        }
    }

    struct Failing;

    impl DynamicalSystem for Failing {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, _t: f64, _x: &[f64], _out: &mut [f64]) -> CriticalResult<()> {
            Err(CriticalError::invalid_input("no derivative here"))
        }
    }

    #[test]
    fn euler_converges_with_small_steps() {
        let mut stepper = Euler::new(1);
        let mut t = 0.0;
        let mut state = [1.0];
        for _ in 0..10_000 {
            stepper.step(&Decay, &mut t, &mut state, 1e-4).unwrap();
        }
        assert!((t - 1.0).abs() < 1e-9);
        assert!((state[0] - (-1.0f64).exp()).abs() < 1e-4);
    }

    #[test]
    fn cash_karp_tracks_exponential_decay() {
        let mut stepper = CashKarp54::new(1, ErrorChecker::new(1e-10, 1e-10));
        let mut t = 0.0_f64;
        let mut dt = 0.1_f64;
        let mut state = [1.0];
        let mut rejected = 0;
        while t < 5.0 {
            dt = dt.min(5.0 - t);
            match stepper.try_step(&Decay, &mut t, &mut state, &mut dt).unwrap() {
                StepOutcome::Accepted => {}
                StepOutcome::Rejected => rejected += 1,
            }
        }
        assert!((state[0] - (-5.0f64).exp()).abs() < 1e-8);
        assert!(rejected < 20);
    }

    #[test]
    fn oversized_step_is_rejected_and_shrunk() {
        let mut stepper = CashKarp54::new(1, ErrorChecker::new(1e-12, 1e-12));
        let mut t = 0.0;
        let mut dt = 10.0;
        let mut state = [1.0];
        let outcome = stepper.try_step(&Decay, &mut t, &mut state, &mut dt).unwrap();
        assert_eq!(outcome, StepOutcome::Rejected);
        assert_eq!(t, 0.0);
        assert_eq!(state[0], 1.0);
        assert!(dt < 10.0 && dt >= 2.0);
    }

    #[test]
    fn system_errors_propagate() {
        let mut stepper = CashKarp54::new(1, ErrorChecker::new(1e-6, 1e-6));
        let mut t = 0.0;
        let mut dt = 1.0;
        let mut state = [1.0];
        assert!(stepper.try_step(&Failing, &mut t, &mut state, &mut dt).is_err());
        assert!(Euler::new(1).step(&Failing, &mut t, &mut state, 1.0).is_err());
    }

    #[test]
    fn error_checker_scales_by_state_and_slope() {
        let checker = ErrorChecker::new(1e-6, 1e-6);
        let err = checker.error(&[1.0], &[2.0], &[1e-6], 0.5);
        assert!((err - 1e-6 / (1e-6 + 1e-6 * (1.0 + 1.0))).abs() < 1e-12);
    }
}
