//! The simulation driver.
//!
//! A simulation goes through [`SimulationPhase::Configuring`] (consistency checks of the
//! initial state and the configuration), [`SimulationPhase::Integrating`] (delegated to a
//! [`Solver`]) and ends either [`SimulationPhase::Terminated`] or [`SimulationPhase::Failed`].
//!
//! Species whose biomass falls at or below the extinction threshold are set to exactly zero
//! by [`ExtinctionCallback`] and stay there: every term of their derivative is proportional
//! to their own biomass.

use crate::dynamics::{build_dynamics, DynamicsKind};
use crate::errors::{EndynError, EndynResult};
use crate::ivp::{
    Algorithm, DomainCheck, EventCallback, EventOutcome, RetCode, Solver, State, StepwiseSolver,
    Time, IVP,
};
use crate::params::ModelParameters;
use crate::FloatValue;
use ndarray::{s, Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Biomass at or below which a species is considered extinct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Threshold {
    Uniform(FloatValue),
    PerSpecies(Vec<FloatValue>),
}

impl Default for Threshold {
    fn default() -> Self {
        Threshold::Uniform(1e-5)
    }
}

/// Tolerances of the steady-state termination: the integration stops once every
/// derivative satisfies `|du_i| <= max(abstol, reltol |u_i|)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SteadyState {
    pub abstol: FloatValue,
    pub reltol: FloatValue,
}

impl Default for SteadyState {
    fn default() -> Self {
        Self {
            abstol: 1e-8,
            reltol: 1e-6,
        }
    }
}

/// Every knob of a simulation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// default: 0.0
    pub t0: Time,
    /// default: 500.0
    pub tmax: Time,
    /// Interval between saved states
    /// default: 1.0
    pub dt: Time,
    /// Smallest step tried before giving up on negative states
    /// default: 1e-8
    pub min_dt: Time,
    pub algorithm: Algorithm,
    /// default: 1e-5
    pub extinction_threshold: Threshold,
    /// Report extinctions at the info level
    /// default: false
    pub verbose: bool,
    /// Stop early once a steady state is reached
    pub steady_state: Option<SteadyState>,
    /// Keep a copy of the model in the solution
    /// default: true
    pub retain_model: bool,
    pub dynamics: DynamicsKind,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            t0: 0.0,
            tmax: 500.0,
            dt: 1.0,
            min_dt: 1e-8,
            algorithm: Algorithm::default(),
            extinction_threshold: Threshold::default(),
            verbose: false,
            steady_state: None,
            retain_model: true,
            dynamics: DynamicsKind::default(),
        }
    }
}

impl SimulationConfig {
    pub fn new(tmax: Time) -> Self {
        Self {
            tmax,
            ..Self::default()
        }
    }

    /// Read a configuration from a TOML document. Missing keys take their default value.
    pub fn from_toml_str(document: &str) -> EndynResult<Self> {
        toml::from_str(document).map_err(|e| EndynError::Argument {
            context: "simulation configuration".to_string(),
            message: e.to_string(),
        })
    }

    pub fn with_t0(mut self, t0: Time) -> Self {
        self.t0 = t0;
        self
    }

    pub fn with_tmax(mut self, tmax: Time) -> Self {
        self.tmax = tmax;
        self
    }

    pub fn with_dt(mut self, dt: Time) -> Self {
        self.dt = dt;
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_extinction_threshold(mut self, threshold: Threshold) -> Self {
        self.extinction_threshold = threshold;
        self
    }

    pub fn with_steady_state(mut self, steady_state: SteadyState) -> Self {
        self.steady_state = Some(steady_state);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_retain_model(mut self, retain_model: bool) -> Self {
        self.retain_model = retain_model;
        self
    }

    pub fn with_dynamics(mut self, dynamics: DynamicsKind) -> Self {
        self.dynamics = dynamics;
        self
    }
}

/// Initial biomass of every species, or a single value for all of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Biomass {
    Uniform(FloatValue),
    PerSpecies(Vec<FloatValue>),
}

impl From<FloatValue> for Biomass {
    fn from(value: FloatValue) -> Self {
        Biomass::Uniform(value)
    }
}

impl From<Vec<FloatValue>> for Biomass {
    fn from(value: Vec<FloatValue>) -> Self {
        Biomass::PerSpecies(value)
    }
}

impl Biomass {
    fn expand(&self, field: &str, n: usize) -> EndynResult<Vec<FloatValue>> {
        let values = match self {
            Biomass::Uniform(v) => vec![*v; n],
            Biomass::PerSpecies(v) => {
                if v.len() != n {
                    return Err(EndynError::InvalidInitialState {
                        field: field.to_string(),
                        message: format!("expected {} values, received {}", n, v.len()),
                    });
                }
                v.clone()
            }
        };
        if let Some((i, v)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(EndynError::InvalidInitialState {
                field: field.to_string(),
                message: format!("value {} at index {} must be finite and non-negative", v, i),
            });
        }
        Ok(values)
    }
}

/// Initial biomass of species and, for nutrient-dependent growth, initial nutrient
/// concentrations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialState {
    pub biomass: Biomass,
    pub nutrients: Option<Biomass>,
}

impl InitialState {
    pub fn new(biomass: impl Into<Biomass>) -> Self {
        Self {
            biomass: biomass.into(),
            nutrients: None,
        }
    }

    pub fn with_nutrients(mut self, nutrients: impl Into<Biomass>) -> Self {
        self.nutrients = Some(nutrients.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationPhase {
    Configuring,
    Integrating,
    Terminated,
    Failed,
}

/// Zeroes species as soon as they fall at or below their threshold and records when.
///
/// Species already recorded are never touched again, so the set of extinct species only
/// grows during a simulation.
#[derive(Debug, Clone)]
pub struct ExtinctionCallback {
    threshold: Vec<FloatValue>,
    extinct: BTreeMap<usize, Time>,
    verbose: bool,
}

impl ExtinctionCallback {
    pub fn new(threshold: Vec<FloatValue>, verbose: bool) -> Self {
        Self {
            threshold,
            extinct: BTreeMap::new(),
            verbose,
        }
    }

    fn newly_extinct<'a>(&'a self, u: &'a State) -> impl Iterator<Item = usize> + 'a {
        self.threshold
            .iter()
            .enumerate()
            .filter(move |(i, threshold)| !self.extinct.contains_key(i) && u[*i] <= **threshold)
            .map(|(i, _)| i)
    }

    /// Species index -> extinction time.
    pub fn extinct_species(&self) -> &BTreeMap<usize, Time> {
        &self.extinct
    }

    pub fn into_extinct_species(self) -> BTreeMap<usize, Time> {
        self.extinct
    }
}

impl EventCallback for ExtinctionCallback {
    fn condition(&self, _t: Time, u: &State, _ivp: &dyn IVP) -> bool {
        self.newly_extinct(u).next().is_some()
    }

    fn affect(&mut self, t: Time, u: &mut State) -> EventOutcome {
        let crossed: Vec<usize> = self.newly_extinct(u).collect();
        for i in crossed {
            if self.verbose {
                info!(species = i, t = t, biomass = u[i], "Species went extinct");
            } else {
                debug!(species = i, t = t, biomass = u[i], "Species went extinct");
            }
            u[i] = 0.0;
            self.extinct.insert(i, t);
        }
        EventOutcome::Continue
    }
}

/// Stops the integration once the state no longer changes.
#[derive(Debug, Clone)]
pub struct SteadyStateCallback {
    tolerances: SteadyState,
    /// The check is skipped until strictly after this time.
    after: Time,
}

impl SteadyStateCallback {
    pub fn new(tolerances: SteadyState, after: Time) -> Self {
        Self { tolerances, after }
    }
}

impl EventCallback for SteadyStateCallback {
    fn condition(&self, t: Time, u: &State, ivp: &dyn IVP) -> bool {
        if t <= self.after {
            return false;
        }
        let du = ivp.dy_dt(t, u);
        du.iter().zip(u.iter()).all(|(d, x)| {
            d.abs() <= self.tolerances.abstol.max(self.tolerances.reltol * x.abs())
        })
    }

    fn affect(&mut self, t: Time, _u: &mut State) -> EventOutcome {
        debug!(t = t, "Steady state reached");
        EventOutcome::Terminate
    }
}

/// Rejects any state with a negative component.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonNegativeDomain;

impl DomainCheck for NonNegativeDomain {
    fn is_out_of_domain(&self, _t: Time, u: &State) -> bool {
        u.iter().any(|x| *x < 0.0)
    }
}

/// Result of a simulation. Immutable; accessors returning owned arrays hand out copies.
#[derive(Debug, Clone)]
pub struct Solution {
    t: Vec<Time>,
    /// States × time.
    u: Array2<FloatValue>,
    n_species: usize,
    retcode: RetCode,
    phase: SimulationPhase,
    message: Option<String>,
    extinct_species: BTreeMap<usize, Time>,
    model: Option<ModelParameters>,
}

impl Solution {
    pub fn t(&self) -> &[Time] {
        &self.t
    }

    /// Every state variable (species then nutrients) over time, one column per saved time.
    pub fn u(&self) -> ArrayView2<'_, FloatValue> {
        self.u.view()
    }

    /// Species biomass over time (species × time).
    pub fn biomass(&self) -> Array2<FloatValue> {
        self.u.slice(s![..self.n_species, ..]).to_owned()
    }

    /// Nutrient concentrations over time (nutrients × time), empty without nutrients.
    pub fn nutrients(&self) -> Array2<FloatValue> {
        self.u.slice(s![self.n_species.., ..]).to_owned()
    }

    /// Species biomass at the `k`-th saved time.
    pub fn biomass_at(&self, k: usize) -> Option<Array1<FloatValue>> {
        (k < self.t.len()).then(|| self.u.slice(s![..self.n_species, k]).to_owned())
    }

    pub fn final_biomass(&self) -> Array1<FloatValue> {
        self.t
            .len()
            .checked_sub(1)
            .and_then(|k| self.biomass_at(k))
            .unwrap_or_else(|| Array1::zeros(self.n_species))
    }

    pub fn n_species(&self) -> usize {
        self.n_species
    }

    pub fn n_timesteps(&self) -> usize {
        self.t.len()
    }

    pub fn retcode(&self) -> RetCode {
        self.retcode
    }

    pub fn phase(&self) -> SimulationPhase {
        self.phase
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn is_successful(&self) -> bool {
        self.retcode.is_successful()
    }

    /// The solution itself if the integration succeeded, an integration error otherwise.
    pub fn ensure_success(&self) -> EndynResult<&Self> {
        if self.is_successful() {
            return Ok(self);
        }
        Err(EndynError::Integration {
            t: self.t.last().copied().unwrap_or(FloatValue::NAN),
            message: self
                .message
                .clone()
                .unwrap_or_else(|| self.retcode.to_string()),
        })
    }

    /// Species index -> time at which it went extinct.
    pub fn extinct_species(&self) -> &BTreeMap<usize, Time> {
        &self.extinct_species
    }

    /// Copy of the model the solution was computed from, if it was retained.
    pub fn get_model(&self) -> Option<&ModelParameters> {
        self.model.as_ref()
    }
}

/// Integrate the biomass dynamics of a model.
///
/// Configuration errors (inconsistent initial state, missing model quantities, empty time
/// span) are returned as errors before anything is integrated. Integration problems are not
/// errors: they are reported by the [`RetCode`] of the returned solution.
pub fn simulate(
    params: &ModelParameters,
    initial: &InitialState,
    config: &SimulationConfig,
) -> EndynResult<Solution> {
    let mut phase = SimulationPhase::Configuring;
    debug!(phase = ?phase, tmax = config.tmax, "Starting simulation");

    if !(config.t0 < config.tmax) {
        return Err(EndynError::Argument {
            context: "simulate".to_string(),
            message: format!("t0 ({}) must be lower than tmax ({})", config.t0, config.tmax),
        });
    }
    if !(config.dt > 0.0 && config.min_dt > 0.0) {
        return Err(EndynError::Argument {
            context: "simulate".to_string(),
            message: format!(
                "dt ({}) and min_dt ({}) must be positive",
                config.dt, config.min_dt
            ),
        });
    }

    let dynamics = build_dynamics(params, config.dynamics)?;
    let n = dynamics.n_species();
    let l = dynamics.n_nutrients();

    let mut u0 = initial.biomass.expand("biomass", n)?;
    match (&initial.nutrients, l) {
        (None, 0) => {}
        (Some(nutrients), l) if l > 0 => u0.extend(nutrients.expand("nutrients", l)?),
        (None, _) => {
            return Err(EndynError::InvalidInitialState {
                field: "nutrients".to_string(),
                message: format!("the model has {} nutrients, initial values are needed", l),
            })
        }
        (Some(_), _) => {
            return Err(EndynError::InvalidInitialState {
                field: "nutrients".to_string(),
                message: "the model has no nutrients".to_string(),
            })
        }
    }

    let threshold = match &config.extinction_threshold {
        Threshold::Uniform(v) => vec![*v; n],
        Threshold::PerSpecies(v) => v.clone(),
    };
    if threshold.len() != n || threshold.iter().any(|v| !(*v >= 0.0)) {
        return Err(EndynError::Argument {
            context: "extinction_threshold".to_string(),
            message: format!("expected {} non-negative values, received {:?}", n, threshold),
        });
    }

    phase = SimulationPhase::Integrating;
    debug!(phase = ?phase, species = n, nutrients = l, "Integrating");
    let mut extinction = ExtinctionCallback::new(threshold, config.verbose);
    let mut steady_state = config
        .steady_state
        .map(|tolerances| SteadyStateCallback::new(tolerances, config.t0));
    let solver = StepwiseSolver::new(config.algorithm, config.dt, config.min_dt);

    let trajectory = {
        let mut callbacks: Vec<&mut dyn EventCallback> = vec![&mut extinction];
        if let Some(callback) = steady_state.as_mut() {
            callbacks.push(callback);
        }
        solver.solve(
            dynamics.as_ref(),
            State::from_vec(u0),
            (config.t0, config.tmax),
            &mut callbacks,
            &NonNegativeDomain,
        )
    };

    phase = if trajectory.retcode.is_successful() {
        SimulationPhase::Terminated
    } else {
        warn!(
            retcode = %trajectory.retcode,
            message = trajectory.message.as_deref().unwrap_or_default(),
            "Simulation failed"
        );
        SimulationPhase::Failed
    };

    let n_states = n + l;
    let mut u = Array2::zeros((n_states, trajectory.t.len()));
    for (k, state) in trajectory.u.iter().enumerate() {
        for (i, x) in state.iter().enumerate() {
            u[[i, k]] = *x;
        }
    }

    Ok(Solution {
        t: trajectory.t,
        u,
        n_species: n,
        retcode: trajectory.retcode,
        phase,
        message: trajectory.message,
        extinct_species: extinction.into_extinct_species(),
        model: config.retain_model.then(|| params.clone()),
    })
}
