//! Initial value problems and the stepwise driver around `ode_solvers`.
//!
//! `ode_solvers` integrates a [`System`] between two times but knows nothing about discrete
//! events or forbidden regions of the state space. [`StepwiseSolver`] adds both. Every step
//! accepted by the underlying method is checked against a [`DomainCheck`] (a rejected step is
//! retried over a halved span) and passed through every [`EventCallback`]. States are saved
//! every `dt` and whenever a callback fired.

use crate::FloatValue;
use nalgebra::DVector;
use ode_solvers::dop_shared::OutputType;
use ode_solvers::{Dop853, Dopri5, Rk4, System};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

pub type Time = FloatValue;
pub type State = DVector<FloatValue>;

/// Step budget of the adaptive methods over one span.
const MAX_STEPS: u32 = 100_000;
/// Stiffness is tested every this many steps.
const STIFFNESS_CHECK: u32 = 1000;

/// A derivative function `dy/dt = f(t, y)`.
pub trait IVP {
    /// Size of the state vector.
    fn n_states(&self) -> usize;

    fn calculate_dy_dt(&self, t: Time, y: &State, dy_dt: &mut State);

    /// Convenience wrapper allocating the derivative.
    fn dy_dt(&self, t: Time, y: &State) -> State {
        let mut dy_dt = State::zeros(y.len());
        self.calculate_dy_dt(t, y, &mut dy_dt);
        dy_dt
    }
}

/// Whether `t` is `target` up to rounding.
fn reached(t: Time, target: Time) -> bool {
    target - t <= 1e-10 * target.abs().max(1.0)
}

/// Adapter exposing an [`IVP`] as an `ode_solvers` system.
///
/// Records every accepted step and stops at `t_end`, or at the first step for which `stop`
/// holds.
struct OdeSystem<'a> {
    ivp: &'a dyn IVP,
    t_end: Time,
    stop: &'a dyn Fn(Time, &State) -> bool,
    accepted: &'a mut Vec<(Time, State)>,
}

impl System<Time, State> for OdeSystem<'_> {
    fn system(&self, t: Time, y: &State, dy: &mut State) {
        self.ivp.calculate_dy_dt(t, y, dy)
    }

    fn solout(&mut self, t: Time, y: &State, _dy: &State) -> bool {
        let at_end = reached(t, self.t_end);
        let t = if at_end { self.t_end } else { t };
        self.accepted.push((t, y.clone()));
        at_end || (self.stop)(t, y)
    }
}

/// Integration scheme used between saved states.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum Algorithm {
    /// Dormand-Prince 5(4), adaptive.
    Dopri5 { rtol: FloatValue, atol: FloatValue },
    /// Dormand-Prince 8(5,3), adaptive.
    Dop853 { rtol: FloatValue, atol: FloatValue },
    /// Classic Runge-Kutta with a fixed number of steps per save interval.
    Rk4 { substeps: usize },
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::Dopri5 {
            rtol: 1e-8,
            atol: 1e-10,
        }
    }
}

/// How an integration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetCode {
    /// Reached the final time.
    Success,
    /// Stopped early by a callback, e.g. on reaching a steady state.
    Terminated,
    /// Rejected states could not be avoided even with the smallest allowed step.
    DtLessThanMin,
    /// The underlying solver failed.
    Failure,
}

impl RetCode {
    pub fn is_successful(&self) -> bool {
        matches!(self, RetCode::Success | RetCode::Terminated)
    }
}

impl fmt::Display for RetCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RetCode::Success => "Success",
            RetCode::Terminated => "Terminated",
            RetCode::DtLessThanMin => "DtLessThanMin",
            RetCode::Failure => "Failure",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Continue,
    Terminate,
}

/// A discrete event checked on every accepted step, including the initial state.
pub trait EventCallback {
    fn condition(&self, t: Time, u: &State, ivp: &dyn IVP) -> bool;

    /// Only called when [`EventCallback::condition`] holds. May modify the state.
    fn affect(&mut self, t: Time, u: &mut State) -> EventOutcome;
}

/// Region of the state space the integration must not enter.
pub trait DomainCheck {
    fn is_out_of_domain(&self, t: Time, u: &State) -> bool;
}

/// Accepts every state.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyDomain;

impl DomainCheck for AnyDomain {
    fn is_out_of_domain(&self, _t: Time, _u: &State) -> bool {
        false
    }
}

fn is_rejected(domain: &dyn DomainCheck, t: Time, u: &State) -> bool {
    u.iter().any(|x| !x.is_finite()) || domain.is_out_of_domain(t, u)
}

/// Saved states of an integration. Owned by the caller.
#[derive(Debug, Clone)]
pub struct Trajectory {
    pub t: Vec<Time>,
    pub u: Vec<State>,
    pub retcode: RetCode,
    /// Reason of a failure, if any.
    pub message: Option<String>,
}

impl Trajectory {
    fn save(&mut self, t: Time, u: &State) {
        self.t.push(t);
        self.u.push(u.clone());
    }

    fn fail(mut self, retcode: RetCode, message: String) -> Self {
        self.retcode = retcode;
        self.message = Some(message);
        self
    }
}

/// The integration contract used by the simulation driver.
pub trait Solver {
    fn solve(
        &self,
        ivp: &dyn IVP,
        u0: State,
        tspan: (Time, Time),
        callbacks: &mut [&mut dyn EventCallback],
        domain: &dyn DomainCheck,
    ) -> Trajectory;
}

/// Integrate `ivp` over `(t, t_end)` starting at `y0`.
///
/// Returns every step accepted after `t`, in order. The last one is at `t_end` unless `stop`
/// held earlier. `dt` is the save interval that `Algorithm::Rk4` spreads its steps over.
pub fn integrate_span(
    algorithm: &Algorithm,
    ivp: &dyn IVP,
    (t, t_end): (Time, Time),
    y0: &State,
    dt: Time,
    stop: &dyn Fn(Time, &State) -> bool,
) -> Result<Vec<(Time, State)>, String> {
    let mut accepted = Vec::new();
    let system = OdeSystem {
        ivp,
        t_end,
        stop,
        accepted: &mut accepted,
    };
    let span = t_end - t;
    match *algorithm {
        Algorithm::Dopri5 { rtol, atol } => {
            let mut stepper = Dopri5::from_param(
                system,
                t,
                t_end,
                span,
                y0.clone(),
                rtol,
                atol,
                0.9,
                0.04,
                0.2,
                10.0,
                span,
                0.0,
                MAX_STEPS,
                STIFFNESS_CHECK,
                OutputType::Sparse,
            );
            stepper.integrate().map_err(|e| e.to_string())?;
        }
        Algorithm::Dop853 { rtol, atol } => {
            let mut stepper = Dop853::from_param(
                system,
                t,
                t_end,
                span,
                y0.clone(),
                rtol,
                atol,
                0.9,
                0.0,
                0.333,
                6.0,
                span,
                0.0,
                MAX_STEPS,
                STIFFNESS_CHECK,
                OutputType::Sparse,
            );
            stepper.integrate().map_err(|e| e.to_string())?;
        }
        Algorithm::Rk4 { substeps } => {
            // `solout` stops the stepper once `t_end` is reached, so exactly `n` steps are taken.
            let n = (substeps.max(1) as FloatValue * span / dt - 1e-9)
                .ceil()
                .max(1.0);
            let mut stepper = Rk4::new(system, t, y0.clone(), t_end, span / n);
            stepper.integrate().map_err(|e| e.to_string())?;
        }
    }
    Ok(accepted)
}

/// Driver saving every `dt`, see the module documentation.
#[derive(Debug, Clone)]
pub struct StepwiseSolver {
    pub algorithm: Algorithm,
    /// Interval between saved states, also the longest span handed to the method at once.
    pub dt: Time,
    /// Smallest span allowed when retrying rejected steps.
    pub min_dt: Time,
}

impl StepwiseSolver {
    pub fn new(algorithm: Algorithm, dt: Time, min_dt: Time) -> Self {
        Self {
            algorithm,
            dt,
            min_dt,
        }
    }

    /// Apply every callback whose condition holds. Returns whether any did.
    fn run_callbacks(
        ivp: &dyn IVP,
        t: Time,
        u: &mut State,
        callbacks: &mut [&mut dyn EventCallback],
    ) -> (bool, EventOutcome) {
        let mut fired = false;
        let mut outcome = EventOutcome::Continue;
        for callback in callbacks.iter_mut() {
            if callback.condition(t, u, ivp) {
                fired = true;
                if callback.affect(t, u) == EventOutcome::Terminate {
                    outcome = EventOutcome::Terminate;
                }
            }
        }
        (fired, outcome)
    }
}

impl Solver for StepwiseSolver {
    fn solve(
        &self,
        ivp: &dyn IVP,
        u0: State,
        (t0, tmax): (Time, Time),
        callbacks: &mut [&mut dyn EventCallback],
        domain: &dyn DomainCheck,
    ) -> Trajectory {
        let mut t = t0;
        let mut u = u0;
        let mut trajectory = Trajectory {
            t: vec![],
            u: vec![],
            retcode: RetCode::Success,
            message: None,
        };

        let (_, outcome) = Self::run_callbacks(ivp, t, &mut u, callbacks);
        trajectory.save(t, &u);
        if outcome == EventOutcome::Terminate {
            trajectory.retcode = RetCode::Terminated;
            return trajectory;
        }

        let mut saved = 1usize;
        let mut span = self.dt;
        while !reached(t, tmax) {
            let target = (t0 + saved as Time * self.dt).min(tmax);
            let t_end = if target - t <= span { target } else { t + span };

            let steps = {
                let watched: &[&mut dyn EventCallback] = callbacks;
                let stop = |t: Time, y: &State| {
                    is_rejected(domain, t, y) || watched.iter().any(|c| c.condition(t, y, ivp))
                };
                integrate_span(&self.algorithm, ivp, (t, t_end), &u, self.dt, &stop)
            };
            let mut steps = match steps {
                Ok(steps) => steps,
                Err(message) => {
                    warn!(t = t, error = %message, "Integration failed");
                    return trajectory.fail(RetCode::Failure, message);
                }
            };
            // Every step but the last passed the domain and triggered no callback.
            let Some((t_next, proposed)) = steps.pop() else {
                return trajectory.fail(
                    RetCode::Failure,
                    format!("the solver made no progress at t = {}", t),
                );
            };

            if is_rejected(domain, t_next, &proposed) {
                if let Some((t_ok, u_ok)) = steps.pop() {
                    t = t_ok;
                    u = u_ok;
                }
                span = (t_next - t) / 2.0;
                if span < self.min_dt {
                    warn!(t = t, dt = span, "State rejected even with the smallest step");
                    return trajectory.fail(
                        RetCode::DtLessThanMin,
                        format!(
                            "step {} below the minimum {} at t = {}",
                            span, self.min_dt, t
                        ),
                    );
                }
                debug!(t = t, dt = span, "Rejected proposed state, halving step");
                continue;
            }

            t = t_next;
            u = proposed;
            span = (2.0 * span).min(self.dt);

            let (fired, outcome) = Self::run_callbacks(ivp, t, &mut u, callbacks);
            let on_grid = reached(t, target);
            if on_grid {
                t = target;
                saved += 1;
            }
            if on_grid || fired {
                trajectory.save(t, &u);
            }
            if outcome == EventOutcome::Terminate {
                trajectory.retcode = RetCode::Terminated;
                return trajectory;
            }
        }
        trajectory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// dy/dt = -k y
    struct Decay {
        k: FloatValue,
    }

    impl IVP for Decay {
        fn n_states(&self) -> usize {
            1
        }

        fn calculate_dy_dt(&self, _t: Time, y: &State, dy_dt: &mut State) {
            dy_dt[0] = -self.k * y[0];
        }
    }

    /// dy/dt = -1, crosses zero at t = y0.
    struct Drain;

    impl IVP for Drain {
        fn n_states(&self) -> usize {
            1
        }

        fn calculate_dy_dt(&self, _t: Time, _y: &State, dy_dt: &mut State) {
            dy_dt[0] = -1.0;
        }
    }

    struct Positive;

    impl DomainCheck for Positive {
        fn is_out_of_domain(&self, _t: Time, u: &State) -> bool {
            u.iter().any(|x| *x < 0.0)
        }
    }

    struct StopBelow(FloatValue);

    impl EventCallback for StopBelow {
        fn condition(&self, _t: Time, u: &State, _ivp: &dyn IVP) -> bool {
            u[0] < self.0
        }

        fn affect(&mut self, _t: Time, _u: &mut State) -> EventOutcome {
            EventOutcome::Terminate
        }
    }

    #[test]
    fn exponential_decay() {
        for algorithm in [
            Algorithm::default(),
            Algorithm::Dop853 {
                rtol: 1e-10,
                atol: 1e-12,
            },
            Algorithm::Rk4 { substeps: 64 },
        ] {
            let solver = StepwiseSolver::new(algorithm, 0.5, 1e-6);
            let trajectory = solver.solve(
                &Decay { k: 0.3 },
                State::from_element(1, 2.0),
                (0.0, 10.0),
                &mut [],
                &AnyDomain,
            );
            assert_eq!(trajectory.retcode, RetCode::Success);
            assert_eq!(trajectory.t.len(), 21);
            assert_eq!(*trajectory.t.last().unwrap(), 10.0);
            assert_relative_eq!(
                trajectory.u.last().unwrap()[0],
                2.0 * (-3.0f64).exp(),
                max_relative = 1e-6
            );
        }
    }

    #[test]
    fn partial_last_step() {
        let solver = StepwiseSolver::new(Algorithm::default(), 0.3, 1e-6);
        let trajectory = solver.solve(
            &Decay { k: 1.0 },
            State::from_element(1, 1.0),
            (0.0, 1.0),
            &mut [],
            &AnyDomain,
        );
        assert_eq!(trajectory.t.len(), 5);
        assert_eq!(*trajectory.t.last().unwrap(), 1.0);
    }

    #[test]
    fn domain_rejection_gives_up_below_min_dt() {
        // The state reaches zero at t = 1 and cannot avoid going negative after that.
        let solver = StepwiseSolver::new(Algorithm::Rk4 { substeps: 4 }, 0.25, 1e-3);
        let trajectory = solver.solve(
            &Drain,
            State::from_element(1, 1.0),
            (0.0, 2.0),
            &mut [],
            &Positive,
        );
        assert_eq!(trajectory.retcode, RetCode::DtLessThanMin);
        assert!(trajectory.u.iter().all(|u| u[0] >= 0.0));
        assert!(trajectory.message.is_some());
    }

    #[test]
    fn callback_terminates() {
        let solver = StepwiseSolver::new(Algorithm::default(), 0.1, 1e-6);
        let mut stop = StopBelow(0.45);
        let trajectory = solver.solve(
            &Drain,
            State::from_element(1, 1.0),
            (0.0, 2.0),
            &mut [&mut stop],
            &AnyDomain,
        );
        assert_eq!(trajectory.retcode, RetCode::Terminated);
        let t_end = *trajectory.t.last().unwrap();
        assert!(t_end > 0.5 && t_end < 0.65, "stopped at {}", t_end);
    }

    #[test]
    fn rk4_takes_exactly_its_substeps() {
        let never = |_t: Time, _y: &State| false;
        let y0 = State::from_element(1, 1.0);
        let algorithm = Algorithm::Rk4 { substeps: 10 };

        let steps =
            integrate_span(&algorithm, &Decay { k: 1.0 }, (0.0, 0.7), &y0, 0.7, &never).unwrap();
        assert_eq!(steps.len(), 10);
        assert_eq!(steps.last().unwrap().0, 0.7);
        assert_relative_eq!(steps.last().unwrap().1[0], (-0.7f64).exp(), max_relative = 1e-6);

        // A span half as long as the save interval gets half the steps.
        let steps =
            integrate_span(&algorithm, &Decay { k: 1.0 }, (0.0, 0.35), &y0, 0.7, &never).unwrap();
        assert_eq!(steps.len(), 5);
        assert_eq!(steps.last().unwrap().0, 0.35);
    }

    #[test]
    fn span_stops_at_the_first_matching_step() {
        let below_half = |_t: Time, y: &State| y[0] < 0.5;
        let y0 = State::from_element(1, 1.0);

        let steps = integrate_span(
            &Algorithm::Rk4 { substeps: 4 },
            &Drain,
            (0.0, 1.0),
            &y0,
            1.0,
            &below_half,
        )
        .unwrap();
        let times: Vec<Time> = steps.iter().map(|(t, _)| *t).collect();
        assert_eq!(times, vec![0.25, 0.5, 0.75]);

        let steps =
            integrate_span(&Algorithm::default(), &Drain, (0.0, 1.0), &y0, 1.0, &below_half)
                .unwrap();
        let (t_stop, y_stop) = steps.last().unwrap();
        assert!(y_stop[0] < 0.5);
        assert!(*t_stop <= 1.0);
        assert!(steps[..steps.len() - 1].iter().all(|(_, y)| y[0] >= 0.5));
    }

    #[test]
    fn events_between_saved_states_are_saved() {
        let solver = StepwiseSolver::new(Algorithm::Rk4 { substeps: 10 }, 1.0, 1e-6);
        let mut stop = StopBelow(0.45);
        let trajectory = solver.solve(
            &Drain,
            State::from_element(1, 1.0),
            (0.0, 2.0),
            &mut [&mut stop],
            &AnyDomain,
        );
        assert_eq!(trajectory.retcode, RetCode::Terminated);
        // Steps are 0.1 long: the state first drops below 0.45 at t = 0.6.
        assert_eq!(trajectory.t.len(), 2);
        assert_relative_eq!(trajectory.t[1], 0.6, max_relative = 1e-9);
    }
}
