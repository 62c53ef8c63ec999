use super::functional_response::{FunctionalResponse, ResponseContext};
use super::nontrophic::ActiveLayer;
use super::producer_growth::ProducerGrowth;
use super::{Coefficients, Dynamics, DynamicsKind};
use crate::ivp::{State, Time, IVP};
use crate::FloatValue;
use ndarray::{Array1, Array2};

/// Derivative evaluated term by term through the functional response and producer growth
/// traits, scanning every pair of species.
#[derive(Debug)]
pub struct GenericDynamics {
    n_species: usize,
    n_nutrients: usize,
    trophic: Array2<bool>,
    producers: Array1<bool>,
    metabolism: Array1<FloatValue>,
    mortality: Array1<FloatValue>,
    response: Box<dyn FunctionalResponse>,
    growth: Box<dyn ProducerGrowth>,
    competition: Option<ActiveLayer>,
    facilitation: Option<ActiveLayer>,
    interference: Option<ActiveLayer>,
    refuge: Option<ActiveLayer>,
}

impl GenericDynamics {
    pub(crate) fn new(coefficients: Coefficients) -> Self {
        Self {
            n_species: coefficients.n_species,
            n_nutrients: coefficients.n_nutrients,
            trophic: coefficients.trophic,
            producers: coefficients.producers,
            metabolism: coefficients.metabolism,
            mortality: coefficients.mortality,
            response: coefficients.response.into_dyn(),
            growth: coefficients.growth.into_dyn(),
            competition: coefficients.competition,
            facilitation: coefficients.facilitation,
            interference: coefficients.interference,
            refuge: coefficients.refuge,
        }
    }
}

impl IVP for GenericDynamics {
    fn n_states(&self) -> usize {
        self.n_species + self.n_nutrients
    }

    fn calculate_dy_dt(&self, _t: Time, y: &State, dy_dt: &mut State) {
        let n = self.n_species;
        let (b, nutrients) = y.as_slice().split_at(n);

        let interference: Vec<FloatValue> = (0..n)
            .map(|i| {
                let base = self.response.interference(i) * b[i];
                match &self.interference {
                    Some(layer) => layer.form.apply(base, layer.pressure_dense(i, b)),
                    None => base,
                }
            })
            .collect();
        let refuge_pressure: Option<Vec<FloatValue>> = self
            .refuge
            .as_ref()
            .map(|layer| (0..n).map(|j| layer.pressure_dense(j, b)).collect());
        let ctx = ResponseContext {
            trophic: &self.trophic,
            interference: &interference,
            refuge: self.refuge.as_ref().zip(refuge_pressure.as_deref()),
        };

        let mut gain = vec![0.0; n];
        let mut loss = vec![0.0; n];
        for i in 0..n {
            if self.producers[i] {
                continue;
            }
            let denominator = self.response.denominator(i, b, &ctx);
            for j in 0..n {
                if self.trophic[[i, j]] {
                    let flow = self.response.flow(i, j, b, denominator, &ctx);
                    gain[i] += self.response.efficiency(i, j) * flow;
                    loss[j] += flow;
                }
            }
        }

        let mut growth = vec![0.0; n];
        for i in 0..n {
            if !self.producers[i] {
                continue;
            }
            let mut r = self.growth.growth_rate(i);
            if let Some(layer) = &self.facilitation {
                r = layer.form.apply(r, layer.pressure_dense(i, b));
            }
            let mut g = self.growth.growth(i, r, b, nutrients);
            if let Some(layer) = &self.competition {
                if g > 0.0 {
                    g = layer.form.apply(g, layer.pressure_dense(i, b));
                }
            }
            growth[i] = g;
        }

        for i in 0..n {
            dy_dt[i] = growth[i] + gain[i] - loss[i]
                - self.metabolism[i] * b[i]
                - self.mortality[i] * b[i];
        }
        self.growth
            .nutrients(&growth, nutrients, &mut dy_dt.as_mut_slice()[n..]);
    }
}

impl Dynamics for GenericDynamics {
    fn kind(&self) -> DynamicsKind {
        DynamicsKind::Generic
    }

    fn n_species(&self) -> usize {
        self.n_species
    }

    fn n_nutrients(&self) -> usize {
        self.n_nutrients
    }
}
