//! Assembly of the biomass derivative function.
//!
//! For species `i` the derivative is
//!
//! `dB_i = G_i + Σ_j e_ij flow_ij - Σ_k flow_ki - x_i B_i - d_i B_i`
//!
//! where `G_i` is the producer growth, `flow_ij` the biomass consumer `i` takes from
//! resource `j` per unit time (set by the functional response), `e_ij` the assimilation
//! efficiency, `x_i` the metabolic rate and `d_i` the natural death rate.
//! Nutrients, when present, follow the biomass in the state vector.
//!
//! Two evaluators implement this equation:
//! [`DynamicsKind::Generic`] dispatches every term through the functional response and
//! producer growth traits over dense matrices, while [`DynamicsKind::Specialized`] works on
//! link lists computed once from the sparsity of the model. Both perform the same floating
//! point operations in the same order and therefore give identical derivatives.

mod functional_response;
mod generic;
mod nontrophic;
mod producer_growth;
mod specialized;

pub use generic::GenericDynamics;
pub use specialized::SpecializedDynamics;

use crate::errors::{EndynError, EndynResult};
use crate::ivp::IVP;
use crate::params::{GrowthKind, InteractionKind, ModelParameters, ResponseKind};
use crate::FloatValue;
use functional_response::{Bioenergetic, Classic, Linear, Response};
use ndarray::{Array1, Array2};
use nontrophic::ActiveLayer;
use producer_growth::{Growth, Logistic, NutrientIntake};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Which evaluator computes the derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DynamicsKind {
    Generic,
    #[default]
    Specialized,
}

/// A derivative function built from a model.
pub trait Dynamics: IVP + Debug + Send + Sync {
    fn kind(&self) -> DynamicsKind;
    fn n_species(&self) -> usize;
    fn n_nutrients(&self) -> usize;
}

/// Build the derivative function of a model.
///
/// Fails if a quantity needed by the model's functional response or producer growth is
/// missing or has the wrong shape.
pub fn build_dynamics(
    params: &ModelParameters,
    kind: DynamicsKind,
) -> EndynResult<Box<dyn Dynamics>> {
    let coefficients = Coefficients::from_params(params)?;
    Ok(match kind {
        DynamicsKind::Generic => Box::new(GenericDynamics::new(coefficients)),
        DynamicsKind::Specialized => Box::new(SpecializedDynamics::new(coefficients)),
    })
}

/// Every coefficient of the dynamics, validated and with the temperature response applied.
#[derive(Debug, Clone)]
pub(crate) struct Coefficients {
    pub n_species: usize,
    pub n_nutrients: usize,
    pub trophic: Array2<bool>,
    pub producers: Array1<bool>,
    pub metabolism: Array1<FloatValue>,
    pub mortality: Array1<FloatValue>,
    pub response: Response,
    pub growth: Growth,
    pub competition: Option<ActiveLayer>,
    pub facilitation: Option<ActiveLayer>,
    pub interference: Option<ActiveLayer>,
    pub refuge: Option<ActiveLayer>,
}

fn require<'a, T>(value: &'a Option<T>, property: &str, component: &str) -> EndynResult<&'a T> {
    value.as_ref().ok_or_else(|| EndynError::MissingComponent {
        property: property.to_string(),
        component: component.to_string(),
    })
}

fn check_len(name: &str, value: &Array1<FloatValue>, n: usize) -> EndynResult<()> {
    if value.len() != n {
        return Err(EndynError::Error(format!(
            "{} has {} entries, expected {}",
            name,
            value.len(),
            n
        )));
    }
    Ok(())
}

fn check_dim(name: &str, value: &Array2<FloatValue>, dim: (usize, usize)) -> EndynResult<()> {
    if value.dim() != dim {
        return Err(EndynError::Error(format!(
            "{} has shape {:?}, expected {:?}",
            name,
            value.dim(),
            dim
        )));
    }
    Ok(())
}

impl Coefficients {
    pub fn from_params(params: &ModelParameters) -> EndynResult<Self> {
        let network = require(&params.network, "network", "Foodweb")?;
        let trophic = network.trophic().clone();
        let n = params.richness();
        if trophic.dim() != (n, n) {
            return Err(EndynError::Error(format!(
                "trophic network has shape {:?}, expected {:?}",
                trophic.dim(),
                (n, n)
            )));
        }
        let producers = crate::params::producers(&trophic);
        let (growth_factor, metabolism_factor, mortality_factor) = params.temperature_factors();

        let metabolism = require(&params.metabolism, "metabolism", "Metabolism")?;
        check_len("metabolism", metabolism, n)?;
        let metabolism = metabolism * metabolism_factor;
        let mortality = require(&params.mortality, "mortality", "Mortality")?;
        check_len("mortality", mortality, n)?;
        let mortality = mortality * mortality_factor;

        let response = Self::response(params, &trophic, &metabolism, n)?;
        let (growth, n_nutrients) = Self::growth(params, growth_factor, n)?;

        let layer = |kind: InteractionKind| network.active_layer(kind).map(ActiveLayer::new);
        let refuge = layer(InteractionKind::Refuge);
        if refuge.is_some() && !matches!(response, Response::Classic(_)) {
            return Err(EndynError::Error(
                "refuges act on attack rates and need the classic functional response".to_string(),
            ));
        }

        Ok(Self {
            n_species: n,
            n_nutrients,
            trophic,
            producers,
            metabolism,
            mortality,
            response,
            growth,
            competition: layer(InteractionKind::Competition),
            facilitation: layer(InteractionKind::Facilitation),
            interference: layer(InteractionKind::Interference),
            refuge,
        })
    }

    fn response(
        params: &ModelParameters,
        trophic: &Array2<bool>,
        metabolism: &Array1<FloatValue>,
        n: usize,
    ) -> EndynResult<Response> {
        let kind = require(
            &params.functional_response,
            "functional_response",
            "FunctionalResponse",
        )?;
        let preferences = require(
            &params.consumers_preferences,
            "consumers_preferences",
            "ConsumersPreferences",
        )?;
        check_dim("consumers_preferences", preferences, (n, n))?;
        let efficiency = require(&params.efficiency, "efficiency", "Efficiency")?;
        check_dim("efficiency", efficiency, (n, n))?;

        let interference = || -> EndynResult<Array1<FloatValue>> {
            let c = require(
                &params.intraspecific_interference,
                "intraspecific_interference",
                "IntraspecificInterference",
            )?;
            check_len("intraspecific_interference", c, n)?;
            Ok(c.clone())
        };
        let hill = || require(&params.hill_exponent, "hill_exponent", "HillExponent").copied();

        Ok(match kind {
            ResponseKind::Bioenergetic => {
                // Losses are divided by the efficiency.
                if let Some(((i, j), _)) = trophic
                    .indexed_iter()
                    .find(|((i, j), link)| **link && efficiency[[*i, *j]] <= 0.0)
                {
                    return Err(EndynError::Error(format!(
                        "efficiency of trophic link ({}, {}) must be positive",
                        i, j
                    )));
                }
                let max_consumption =
                    require(&params.max_consumption, "max_consumption", "MaxConsumption")?;
                check_len("max_consumption", max_consumption, n)?;
                let half_saturation = require(
                    &params.half_saturation_density,
                    "half_saturation_density",
                    "HalfSaturationDensity",
                )?;
                check_len("half_saturation_density", half_saturation, n)?;
                Response::Bioenergetic(Bioenergetic {
                    metabolism: metabolism.clone(),
                    max_consumption: max_consumption.clone(),
                    half_saturation: half_saturation.clone(),
                    interference: interference()?,
                    hill: hill()?,
                    preferences: preferences.clone(),
                    efficiency: efficiency.clone(),
                })
            }
            ResponseKind::Classic => {
                let attack_rate = require(&params.attack_rate, "attack_rate", "AttackRate")?;
                check_dim("attack_rate", attack_rate, (n, n))?;
                let handling_time =
                    require(&params.handling_time, "handling_time", "HandlingTime")?;
                check_dim("handling_time", handling_time, (n, n))?;
                let body_mass = require(&params.body_mass, "body_mass", "BodyMass")?;
                check_len("body_mass", body_mass, n)?;
                Response::Classic(Classic {
                    attack_rate: attack_rate.clone(),
                    handling_time: handling_time.clone(),
                    body_mass: body_mass.clone(),
                    interference: interference()?,
                    hill: hill()?,
                    preferences: preferences.clone(),
                    efficiency: efficiency.clone(),
                })
            }
            ResponseKind::Linear => {
                let consumption_rate =
                    require(&params.consumption_rate, "consumption_rate", "ConsumptionRate")?;
                check_len("consumption_rate", consumption_rate, n)?;
                Response::Linear(Linear {
                    consumption_rate: consumption_rate.clone(),
                    preferences: preferences.clone(),
                    efficiency: efficiency.clone(),
                })
            }
        })
    }

    fn growth(
        params: &ModelParameters,
        growth_factor: FloatValue,
        n: usize,
    ) -> EndynResult<(Growth, usize)> {
        let kind = require(&params.producer_growth, "producer_growth", "ProducerGrowth")?;
        let growth_rate = require(&params.growth_rate, "growth_rate", "GrowthRate")?;
        check_len("growth_rate", growth_rate, n)?;
        let growth_rate = growth_rate * growth_factor;

        Ok(match kind {
            GrowthKind::Logistic => {
                let carrying_capacity = require(
                    &params.carrying_capacity,
                    "carrying_capacity",
                    "CarryingCapacity",
                )?;
                check_len("carrying_capacity", carrying_capacity, n)?;
                let competition = require(
                    &params.producers_competition,
                    "producers_competition",
                    "ProducersCompetition",
                )?;
                check_dim("producers_competition", competition, (n, n))?;
                (
                    Growth::Logistic(Logistic {
                        growth_rate,
                        carrying_capacity: carrying_capacity.clone(),
                        competition: competition.clone(),
                    }),
                    0,
                )
            }
            GrowthKind::NutrientIntake => {
                let nutrients = require(&params.nutrients, "nutrients", "Nutrients")?;
                let l = nutrients.len();
                if l == 0 {
                    return Err(EndynError::Error(
                        "nutrient intake needs at least one nutrient".to_string(),
                    ));
                }
                let turnover =
                    require(&nutrients.turnover, "nutrients_turnover", "NutrientsTurnover")?;
                check_len("nutrients_turnover", turnover, l)?;
                let supply = require(&nutrients.supply, "nutrients_supply", "NutrientsSupply")?;
                check_len("nutrients_supply", supply, l)?;
                let concentration = require(
                    &nutrients.concentration,
                    "nutrients_concentration",
                    "NutrientsConcentration",
                )?;
                check_dim("nutrients_concentration", concentration, (n, l))?;
                let half_saturation = require(
                    &nutrients.half_saturation,
                    "nutrients_half_saturation",
                    "NutrientsHalfSaturation",
                )?;
                check_dim("nutrients_half_saturation", half_saturation, (n, l))?;
                (
                    Growth::NutrientIntake(NutrientIntake {
                        growth_rate,
                        turnover: turnover.clone(),
                        supply: supply.clone(),
                        concentration: concentration.clone(),
                        half_saturation: half_saturation.clone(),
                    }),
                    l,
                )
            }
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::ivp::State;
    use crate::params::{FunctionalForm, Network, Nutrients};
    use approx::assert_relative_eq;
    use is_close::is_close;
    use ndarray::array;

    fn both(params: &ModelParameters) -> (Box<dyn Dynamics>, Box<dyn Dynamics>) {
        (
            build_dynamics(params, DynamicsKind::Generic).unwrap(),
            build_dynamics(params, DynamicsKind::Specialized).unwrap(),
        )
    }

    fn assert_equivalent(params: &ModelParameters, states: &[Vec<f64>]) {
        let (generic, specialized) = both(params);
        assert_eq!(generic.kind(), DynamicsKind::Generic);
        assert_eq!(specialized.kind(), DynamicsKind::Specialized);
        for state in states {
            let y = State::from_vec(state.clone());
            let a = generic.dy_dt(0.0, &y);
            let b = specialized.dy_dt(0.0, &y);
            for (x, y) in a.iter().zip(b.iter()) {
                assert!((x - y).abs() <= 1e-12, "{} != {}", x, y);
            }
        }
    }

    #[test]
    fn classic_pair_formula() {
        let params = classic_pair();
        let dynamics = build_dynamics(&params, DynamicsKind::Generic).unwrap();
        assert_eq!(dynamics.n_species(), 2);
        assert_eq!(dynamics.n_nutrients(), 0);
        let (b1, b2) = (0.5, 0.5);
        let dy = dynamics.dy_dt(0.0, &State::from_vec(vec![b1, b2]));
        let r = 0.2268;
        let x = 0.314 * r;
        let eaten = b2 * b1 / (1.0 + b1);
        assert!(is_close!(dy[0], r * b1 * (1.0 - b1) - eaten));
        assert!(is_close!(dy[1], 0.45 * eaten - x * b2));
    }

    #[test]
    fn classic_pair_equilibrium_is_stationary() {
        let params = classic_pair();
        let dynamics = build_dynamics(&params, DynamicsKind::Specialized).unwrap();
        let r = 0.2268;
        let x = 0.314 * r;
        let b1 = x / (0.45 - x);
        let b2 = r * (1.0 - b1) * (1.0 + b1);
        let dy = dynamics.dy_dt(0.0, &State::from_vec(vec![b1, b2]));
        assert!(dy[0].abs() < 1e-12);
        assert!(dy[1].abs() < 1e-12);
    }

    #[test]
    fn bioenergetic_formula() {
        let params = bioenergetic_web();
        let dynamics = build_dynamics(&params, DynamicsKind::Generic).unwrap();
        let b = [0.4, 0.6, 0.3, 0.2];
        let dy = dynamics.dy_dt(0.0, &State::from_vec(b.to_vec()));

        let h: f64 = 1.2;
        let b0h = 0.5f64.powf(h);
        // Species 3 eats 1 and 2 with equal preferences.
        let d3 = b0h + 0.2 * b[2] * b0h + 0.5 * b[0].powf(h) + 0.5 * b[1].powf(h);
        let f31 = 0.5 * b[0].powf(h) / d3;
        let f32 = 0.5 * b[1].powf(h) / d3;
        // Species 4 eats 2 and 3.
        let d4 = b0h + 0.5 * b[1].powf(h) + 0.5 * b[2].powf(h);
        let f42 = 0.5 * b[1].powf(h) / d4;
        let f43 = 0.5 * b[2].powf(h) / d4;
        let (x3, y3, x4, y4) = (0.31, 8.0, 0.18, 4.0);

        let g1 = 1.0 * b[0] * (1.0 - (b[0] + 0.3 * b[1]));
        let g2 = 0.8 * b[1] * (1.0 - b[1]);
        let expected = [
            g1 - x3 * y3 * b[2] * f31 / 0.45,
            g2 - x3 * y3 * b[2] * f32 / 0.45 - x4 * y4 * b[3] * f42 / 0.45,
            x3 * y3 * b[2] * (f31 + f32) - x4 * y4 * b[3] * f43 / 0.85 - x3 * b[2],
            x4 * y4 * b[3] * (f42 + f43) - x4 * b[3] - 0.01 * b[3],
        ];
        for (got, want) in dy.iter().zip(expected) {
            assert_relative_eq!(*got, want, epsilon = 1e-14, max_relative = 1e-10);
        }
    }

    #[test]
    fn equivalence_bioenergetic() {
        assert_equivalent(
            &bioenergetic_web(),
            &[
                vec![0.4, 0.6, 0.3, 0.2],
                vec![1.0, 0.0, 0.5, 0.0],
                vec![0.0, 0.0, 0.0, 0.0],
                vec![2.0, 3.0, 1e-6, 5.0],
            ],
        );
    }

    #[test]
    fn equivalence_with_every_layer() {
        // A consumer eating two producers, the second one facilitating and competing with the first.
        let a = array![[false, false, false], [true, false, true], [false, false, false]];
        let mut p = with_species(3, a);
        p.growth_rate = Some(array![0.3, 0.0, 0.5]);
        p.metabolism = Some(array![0.0, 0.1, 0.0]);
        p.mortality = Some(array![0.01, 0.02, 0.0]);
        p.carrying_capacity = Some(array![1.0, 0.0, 2.0]);
        p.producers_competition = Some(Array2::eye(3));
        p.efficiency = Some(array![[0.0, 0.0, 0.0], [0.45, 0.0, 0.45], [0.0, 0.0, 0.0]]);
        p.consumers_preferences = Some(array![[0.0, 0.0, 0.0], [0.5, 0.0, 0.5], [0.0, 0.0, 0.0]]);
        p.attack_rate = Some(array![[0.0, 0.0, 0.0], [1.5, 0.0, 0.8], [0.0, 0.0, 0.0]]);
        p.handling_time = Some(array![[0.0, 0.0, 0.0], [0.7, 0.0, 1.1], [0.0, 0.0, 0.0]]);
        p.body_mass = Some(array![1.0, 10.0, 1.0]);
        p.intraspecific_interference = Some(array![0.0, 0.5, 0.0]);
        p.hill_exponent = Some(2.0);
        p.functional_response = Some(ResponseKind::Classic);
        p.producer_growth = Some(GrowthKind::Logistic);
        let mut params = p;

        let network = params.multiplex_mut().unwrap();
        network.layer_mut(InteractionKind::Competition, 3).links[[0, 2]] = true;
        network.layer_mut(InteractionKind::Facilitation, 3).links[[2, 0]] = true;
        network.layer_mut(InteractionKind::Refuge, 3).links[[0, 2]] = true;
        let interference = network.layer_mut(InteractionKind::Interference, 3);
        interference.links[[1, 1]] = true;
        interference.intensity = 0.3;

        assert_equivalent(
            &params,
            &[
                vec![0.4, 0.6, 0.3],
                vec![1.0, 0.0, 0.5],
                vec![0.0, 0.2, 3.0],
                vec![2.0, 3.0, 1e-6],
            ],
        );
    }

    #[test]
    fn competition_only_reduces_positive_growth() {
        let mut params = bioenergetic_web();
        let network = params.multiplex_mut().unwrap();
        network.layer_mut(InteractionKind::Competition, 4).links[[0, 1]] = true;
        let (generic, specialized) = both(&params);
        let plain = build_dynamics(&bioenergetic_web(), DynamicsKind::Generic).unwrap();

        // Producer 1 above its carrying capacity: negative growth passes through.
        let over = State::from_vec(vec![1.5, 0.5, 0.0, 0.0]);
        assert_eq!(generic.dy_dt(0.0, &over)[0], plain.dy_dt(0.0, &over)[0]);
        // Below: growth is reduced by the competitor.
        let under = State::from_vec(vec![0.2, 0.5, 0.0, 0.0]);
        let g = 0.2 * (1.0 - (0.2 + 0.3 * 0.5));
        assert!(is_close!(generic.dy_dt(0.0, &under)[0], g * (1.0 - 0.5)));
        assert_eq!(generic.dy_dt(0.0, &under), specialized.dy_dt(0.0, &under));
    }

    #[test]
    fn facilitation_boosts_intrinsic_growth() {
        let mut params = bioenergetic_web();
        let form = FunctionalForm::new("double", |x, dx| x * (1.0 + 2.0 * dx)).unwrap();
        let layer = params
            .multiplex_mut()
            .unwrap()
            .layer_mut(InteractionKind::Facilitation, 4);
        layer.links[[1, 0]] = true;
        layer.functional_form = form;
        let dynamics = build_dynamics(&params, DynamicsKind::Specialized).unwrap();
        let y = State::from_vec(vec![0.25, 0.5, 0.0, 0.0]);
        let r = 0.8 * (1.0 + 2.0 * 0.25);
        assert!(is_close!(dynamics.dy_dt(0.0, &y)[1], r * 0.5 * (1.0 - 0.5)));
    }

    #[test]
    fn refuge_needs_classic_response() {
        let mut params = bioenergetic_web();
        params
            .multiplex_mut()
            .unwrap()
            .layer_mut(InteractionKind::Refuge, 4)
            .links[[0, 1]] = true;
        assert!(build_dynamics(&params, DynamicsKind::Generic).is_err());
    }

    #[test]
    fn nutrient_intake() {
        let mut params = classic_pair();
        params.producer_growth = Some(GrowthKind::NutrientIntake);
        params.nutrients = Some(Nutrients {
            names: vec!["n1".to_string(), "n2".to_string()],
            turnover: Some(array![0.25, 0.25]),
            supply: Some(array![4.0, 2.0]),
            concentration: Some(array![[1.0, 0.5], [0.0, 0.0]]),
            half_saturation: Some(array![[0.5, 1.0], [0.0, 0.0]]),
        });
        let (generic, specialized) = both(&params);
        assert_eq!(generic.n_nutrients(), 2);
        assert_eq!(generic.n_states(), 4);

        let y = State::from_vec(vec![0.5, 0.0, 1.0, 1.0]);
        let dy = generic.dy_dt(0.0, &y);
        assert_eq!(dy, specialized.dy_dt(0.0, &y));
        // Limited by the second nutrient: min(1 / 1.5, 1 / 2).
        let g = 0.2268 * 0.5 * 0.5;
        assert!(is_close!(dy[0], g));
        assert!(is_close!(dy[2], 0.25 * (4.0 - 1.0) - 1.0 * g));
        assert!(is_close!(dy[3], 0.25 * (2.0 - 1.0) - 0.5 * g));
    }

    #[test]
    fn temperature_scales_rates() {
        let mut params = classic_pair();
        params.temperature = Some(303.15);
        params.temperature_response = Some(crate::params::TemperatureResponse::boltzmann_arrhenius());
        let (fg, fm, _) = params.temperature_factors();
        let dynamics = build_dynamics(&params, DynamicsKind::Generic).unwrap();
        // Alone, each species only grows or respires.
        let dy = dynamics.dy_dt(0.0, &State::from_vec(vec![0.5, 0.0]));
        assert!(is_close!(dy[0], fg * 0.2268 * 0.5 * 0.5));
        let dy = dynamics.dy_dt(0.0, &State::from_vec(vec![0.0, 0.5]));
        assert!(is_close!(dy[1], -fm * 0.314 * 0.2268 * 0.5));
    }

    #[test]
    fn missing_quantities() {
        let mut params = classic_pair();
        params.attack_rate = None;
        let err = build_dynamics(&params, DynamicsKind::Generic).unwrap_err();
        assert_eq!(
            err,
            EndynError::MissingComponent {
                property: "attack_rate".to_string(),
                component: "AttackRate".to_string(),
            }
        );

        let mut params = classic_pair();
        params.metabolism = Some(array![0.0]);
        assert!(matches!(
            build_dynamics(&params, DynamicsKind::Specialized),
            Err(EndynError::Error(_))
        ));

        let params = with_species(1, array![[false]]);
        assert!(matches!(
            build_dynamics(&params, DynamicsKind::Specialized),
            Err(EndynError::MissingComponent { .. })
        ));
        let mut params = with_species(1, array![[false]]);
        params.network = Some(Network::foodweb(array![[false, false], [false, false]]));
        assert!(build_dynamics(&params, DynamicsKind::Specialized).is_err());
    }
}
