//! Arclength tracing of the critical locus of a binary mixture.

use super::derivs::criticality_conditions;
use super::polish::critical_polish_molefrac;
use super::slope::get_drhovec_dt_crit;
use super::types::{ContinuationOptions, CriticalTrace, Termination, TracePoint, TraceState};
use crate::error::{CriticalError, CriticalResult};
use crate::isochoric::{pressure, splus};
use crate::solvers::{CashKarp54, ErrorChecker, Euler, StepOutcome};
use crate::traits::{DynamicalSystem, ResidualModel};
use nalgebra::DVector;
use std::io::Write;
use tracing::{debug, info, warn};

const PROGRESS_HEADER: &str = "z0,rho0,rho1,T,p,c,dt,condition(1),condition(2)";

/// Step-size factor applied when a stage lands outside the physical domain.
const DOMAIN_SHRINK: f64 = 0.5;

/// Right-hand side of the tracing ODE in the joint state `[T, rho_0, rho_1]`.
///
/// The pseudo-time is scaled so that `|drho/dt| = 1`. The stored direction
/// from an earlier step flips the derivative when the locus turns around.
struct CriticalRhs<'a, M> {
    model: &'a M,
    c: f64,
    last_drhodt: Option<DVector<f64>>,
}

impl<M: ResidualModel> CriticalRhs<'_, M> {
    fn derivative(&self, x: &[f64]) -> CriticalResult<DVector<f64>> {
        let state = TraceState::from_joint(x);
        if state.rhovec.iter().any(|&r| r < 0.0) {
            return Err(CriticalError::out_of_domain(format!(
                "negative concentration in rho = {:?}",
                state.rhovec.as_slice()
            )));
        }
        let drhodtemp = get_drhovec_dt_crit(self.model, state.temperature, &state.rhovec)?;
        let dtempdt = 1.0 / drhodtemp.norm();
        let drhodt = &drhodtemp * (self.c * dtempdt);

        let mut dxdt = DVector::zeros(x.len());
        dxdt[0] = self.c * dtempdt;
        dxdt.rows_mut(1, drhodt.len()).copy_from(&drhodt);

        if let Some(last) = &self.last_drhodt {
            if drhodt.dot(last) < 0.0 {
                dxdt.neg_mut();
            }
        }
        if dxdt.iter().any(|v| !v.is_finite()) {
            return Err(CriticalError::non_finite(format!(
                "tracing derivative at T = {}, rho = {:?}",
                state.temperature,
                state.rhovec.as_slice()
            )));
        }
        Ok(dxdt)
    }
}

impl<M: ResidualModel> DynamicalSystem for CriticalRhs<'_, M> {
    fn dimension(&self) -> usize {
        self.model.component_count() + 1
    }

    fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) -> CriticalResult<()> {
        let dxdt = self.derivative(x)?;
        out.copy_from_slice(dxdt.as_slice());
        Ok(())
    }
}

enum Stepper {
    Euler(Euler),
    CashKarp(CashKarp54),
}

/// Lazily traces the critical locus, yielding one [`TracePoint`] for the
/// starting state and one per accepted step.
///
/// Once the iterator is exhausted, [`CriticalTracer::termination`] reports
/// why tracing stopped.
pub struct CriticalTracer<'a, M> {
    rhs: CriticalRhs<'a, M>,
    options: ContinuationOptions,
    stepper: Stepper,
    x: Vec<f64>,
    t: f64,
    dt: f64,
    iteration: usize,
    small_t_steps: usize,
    emitted: usize,
    pending: Option<TracePoint>,
    termination: Option<Termination>,
    progress: Option<Box<dyn Write + 'a>>,
}

impl<'a, M: ResidualModel> CriticalTracer<'a, M> {
    /// Prepares a trace from `(t0, rhovec0)`, which should lie on the locus.
    ///
    /// The direction sign starts at `options.init_c` and is flipped if a
    /// trial step of `options.init_dt` would produce a negative concentration.
    pub fn new(
        model: &'a M,
        t0: f64,
        rhovec0: &DVector<f64>,
        options: ContinuationOptions,
    ) -> CriticalResult<Self> {
        options.validate()?;
        if rhovec0.len() != 2 || model.component_count() != 2 {
            return Err(CriticalError::invalid_input(format!(
                "critical tracing is only defined for binary mixtures (model has {} components, rhovec0 has {})",
                model.component_count(),
                rhovec0.len()
            )));
        }
        if !(t0 > 0.0) || !t0.is_finite() {
            return Err(CriticalError::invalid_input(format!(
                "initial temperature must be positive, got {t0}"
            )));
        }
        if rhovec0.iter().any(|&r| !(r >= 0.0) || !r.is_finite()) || !(rhovec0.sum() > 0.0) {
            return Err(CriticalError::invalid_input(format!(
                "initial concentrations must be non-negative with a positive sum, got {:?}",
                rhovec0.as_slice()
            )));
        }

        let dim = rhovec0.len() + 1;
        let stepper = match options.integration_order {
            1 => Stepper::Euler(Euler::new(dim)),
            _ => Stepper::CashKarp(CashKarp54::new(
                dim,
                ErrorChecker::new(options.abs_err, options.rel_err),
            )),
        };
        debug!(order = options.integration_order, "stepping scheme selected");

        let mut rhs = CriticalRhs {
            model,
            c: options.init_c,
            last_drhodt: None,
        };
        let x = TraceState::new(t0, rhovec0.clone()).to_joint();

        // Flip the direction if the first step would give a negative concentration
        let dxdt = rhs.derivative(&x)?;
        let trial = rhovec0 + dxdt.rows(1, rhovec0.len()) * options.init_dt;
        if trial.iter().any(|&r| r < 0.0) {
            rhs.c = -rhs.c;
        }

        info!(
            T0 = t0,
            z0 = rhovec0[0] / rhovec0.sum(),
            c = rhs.c,
            max_steps = options.max_step_count,
            "starting critical trace"
        );

        let mut tracer = Self {
            rhs,
            options,
            stepper,
            x,
            t: 0.0,
            dt: options.init_dt,
            iteration: 0,
            small_t_steps: 0,
            emitted: 0,
            pending: None,
            termination: None,
            progress: None,
        };
        tracer.pending = Some(tracer.record_point()?);
        Ok(tracer)
    }

    /// Mirrors every recorded point as a comma-separated line into `writer`.
    pub fn with_progress<W: Write + 'a>(mut self, writer: W) -> Self {
        let mut writer: Box<dyn Write + 'a> = Box::new(writer);
        match writeln!(writer, "{PROGRESS_HEADER}") {
            Ok(()) => self.progress = Some(writer),
            Err(err) => warn!(error = %err, "could not write progress header; progress output disabled"),
        }
        self
    }

    /// Why tracing stopped, once the iterator has returned `None`.
    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    /// Current direction sign.
    pub fn direction(&self) -> f64 {
        self.rhs.c
    }

    fn state(&self) -> TraceState {
        TraceState::from_joint(&self.x)
    }

    fn record_point(&self) -> CriticalResult<TracePoint> {
        let state = self.state();
        let model = self.rhs.model;
        let rho = state.rhovec.as_slice();
        let [lambda1, dirderiv_lambda1] =
            criticality_conditions(model, state.temperature, &state.rhovec)?;
        let dxdt = self.rhs.derivative(&self.x)?;
        Ok(TracePoint {
            t: self.t,
            temperature: state.temperature,
            rho0: rho[0],
            rho1: rho[1],
            c: self.rhs.c,
            splus: splus(model, state.temperature, rho),
            pressure: pressure(model, state.temperature, rho),
            dtdt: dxdt[0],
            drho0dt: dxdt[1],
            drho1dt: dxdt[2],
            lambda1,
            dirderiv_lambda1,
        })
    }

    fn write_progress(&mut self, point: &TracePoint) {
        let Some(writer) = self.progress.as_mut() else {
            return;
        };
        let result = writeln!(
            writer,
            "{},{},{},{},{},{},{},{},{}",
            point.z0(),
            point.rho0,
            point.rho1,
            point.temperature,
            point.pressure,
            point.c,
            self.dt,
            point.lambda1,
            point.dirderiv_lambda1
        );
        if let Err(err) = result {
            warn!(error = %err, "could not write progress line; progress output disabled");
            self.progress = None;
        }
    }

    fn finish(&mut self, termination: Termination) {
        match &termination {
            Termination::IntegrationError(err) => {
                warn!(error = %err, points = self.emitted, "critical trace stopped early")
            }
            other => info!(termination = %other, points = self.emitted, "critical trace finished"),
        }
        if let Some(writer) = self.progress.as_mut() {
            if let Err(err) = writer.flush() {
                warn!(error = %err, "could not flush progress output");
            }
        }
        self.termination = Some(termination);
    }

    /// Takes steps until one is accepted, returning the recorded point, or
    /// `None` once a terminal condition is reached.
    fn advance(&mut self) -> CriticalResult<Option<TracePoint>> {
        loop {
            if self.iteration >= self.options.max_step_count {
                self.finish(Termination::Exhausted);
                return Ok(None);
            }

            let x_start = self.x.clone();
            let dxdt_start = self.rhs.derivative(&x_start)?;

            let stepped = match &mut self.stepper {
                Stepper::CashKarp(stepper) => {
                    stepper.try_step(&self.rhs, &mut self.t, &mut self.x, &mut self.dt)
                }
                Stepper::Euler(stepper) => stepper
                    .step(&self.rhs, &mut self.t, &mut self.x, self.dt)
                    .map(|()| StepOutcome::Accepted),
            };
            match stepped {
                Ok(StepOutcome::Accepted) => {
                    if matches!(self.stepper, Stepper::CashKarp(_)) {
                        self.dt = self.dt.min(self.options.max_dt);
                    }
                }
                Ok(StepOutcome::Rejected) => {
                    debug!(dt = self.dt, "step rejected");
                    if self.dt < self.options.min_dt {
                        return Err(CriticalError::integrator(format!(
                            "step size {} fell below min_dt = {}",
                            self.dt, self.options.min_dt
                        )));
                    }
                    continue;
                }
                Err(CriticalError::OutOfDomain { what }) => {
                    // A stage crossed a pure-component boundary; retry shorter
                    self.dt *= DOMAIN_SHRINK;
                    debug!(dt = self.dt, what = %what, "stage left the domain");
                    if self.dt < self.options.min_dt {
                        self.finish(Termination::OutOfDomain);
                        return Ok(None);
                    }
                    continue;
                }
                Err(err) => return Err(err),
            }
            let iter = self.iteration;
            self.iteration += 1;

            let z0 = self.state().z0();
            if !(0.0..=1.0).contains(&z0) {
                self.finish(Termination::OutOfDomain);
                return Ok(None);
            }

            if self.options.polish {
                let state = self.state();
                match critical_polish_molefrac(self.rhs.model, state.temperature, &state.rhovec, z0) {
                    Ok((t_new, rho_new)) => {
                        self.x = TraceState::new(t_new, rho_new).to_joint();
                    }
                    Err(err) => warn!(error = %err, z0, "polishing failed; keeping the unpolished point"),
                }
            }

            // The derivative from the start of the step becomes the direction reference
            if iter >= self.options.skip_dircheck_count {
                self.rhs.last_drhodt = Some(dxdt_start.rows(1, dxdt_start.len() - 1).into_owned());
            }

            if (self.x[0] - x_start[0]).abs() < self.options.t_tol {
                self.small_t_steps += 1;
            } else {
                self.small_t_steps = 0;
            }

            let z0 = self.state().z0();
            if !(0.0..=1.0).contains(&z0) {
                self.finish(Termination::OutOfDomain);
                return Ok(None);
            }

            let point = self.record_point()?;
            debug!(
                iteration = self.iteration,
                T = point.temperature,
                z0,
                dt = self.dt,
                "accepted step"
            );
            if self.small_t_steps > self.options.small_t_count {
                self.finish(Termination::Converged);
            }
            return Ok(Some(point));
        }
    }
}

impl<M: ResidualModel> Iterator for CriticalTracer<'_, M> {
    type Item = TracePoint;

    fn next(&mut self) -> Option<TracePoint> {
        if let Some(point) = self.pending.take() {
            self.emitted += 1;
            self.write_progress(&point);
            return Some(point);
        }
        if self.termination.is_some() {
            return None;
        }
        match self.advance() {
            Ok(Some(point)) => {
                self.emitted += 1;
                self.write_progress(&point);
                Some(point)
            }
            Ok(None) => None,
            Err(err) => {
                self.finish(Termination::IntegrationError(err));
                None
            }
        }
    }
}

/// Traces the critical locus of a binary mixture from `(t0, rhovec0)` to
/// completion.
///
/// Failures while setting up the trace are returned as errors; failures
/// while stepping end the trace with [`Termination::IntegrationError`] and
/// keep the points recorded so far.
pub fn trace_critical_arclength_binary<M: ResidualModel>(
    model: &M,
    t0: f64,
    rhovec0: &DVector<f64>,
    options: ContinuationOptions,
    progress: Option<&mut dyn Write>,
) -> CriticalResult<CriticalTrace> {
    let mut tracer = CriticalTracer::new(model, t0, rhovec0, options)?;
    if let Some(writer) = progress {
        tracer = tracer.with_progress(writer);
    }
    let points: Vec<TracePoint> = tracer.by_ref().collect();
    let termination = tracer
        .termination()
        .cloned()
        .unwrap_or(Termination::Exhausted);
    Ok(CriticalTrace {
        points,
        termination,
    })
}
