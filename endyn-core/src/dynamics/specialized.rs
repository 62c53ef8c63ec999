use super::functional_response::Response;
use super::nontrophic::ActiveLayer;
use super::producer_growth::{Growth, NutrientIntake};
use super::{Coefficients, Dynamics, DynamicsKind};
use crate::ivp::{State, Time, IVP};
use crate::FloatValue;

/// A trophic link of a consumer, with every coefficient it needs.
#[derive(Debug, Clone)]
struct Link {
    prey: usize,
    preference: FloatValue,
    efficiency: FloatValue,
    attack_rate: FloatValue,
    handling_time: FloatValue,
}

#[derive(Debug, Clone)]
struct Consumer {
    index: usize,
    links: Vec<Link>,
    interference: FloatValue,
    /// Bioenergetic `x_i y_i`, classic `1 / M_i` denominator, linear `α_i`.
    scale: FloatValue,
    /// Bioenergetic `B0_i^h`.
    half_saturation: FloatValue,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Flavour {
    Bioenergetic,
    Classic,
    Linear,
}

#[derive(Debug, Clone)]
struct Producer {
    index: usize,
    growth_rate: FloatValue,
    /// Logistic growth only: carrying capacity and non-zero competition coefficients.
    carrying_capacity: FloatValue,
    competitors: Vec<(usize, FloatValue)>,
}

/// Derivative evaluated over link lists precomputed from the model structure:
/// absent links, consumers without prey, zero competition coefficients and zero loss rates
/// are skipped entirely.
#[derive(Debug)]
pub struct SpecializedDynamics {
    n_species: usize,
    n_nutrients: usize,
    flavour: Flavour,
    hill: FloatValue,
    consumers: Vec<Consumer>,
    producers: Vec<Producer>,
    /// Species with a non-zero metabolic or natural death rate.
    metabolic_loss: Vec<(usize, FloatValue)>,
    natural_death: Vec<(usize, FloatValue)>,
    nutrient_intake: Option<NutrientIntake>,
    /// Producers with a non-zero content of each nutrient.
    nutrient_users: Vec<Vec<(usize, FloatValue)>>,
    competition: Option<ActiveLayer>,
    facilitation: Option<ActiveLayer>,
    interference: Option<ActiveLayer>,
    refuge: Option<ActiveLayer>,
}

fn non_zero(values: &ndarray::Array1<FloatValue>) -> Vec<(usize, FloatValue)> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v != 0.0)
        .map(|(i, v)| (i, *v))
        .collect()
}

impl SpecializedDynamics {
    pub(crate) fn new(c: Coefficients) -> Self {
        let n = c.n_species;
        let consumer_indices: Vec<usize> = (0..n).filter(|i| !c.producers[*i]).collect();
        let trophic = &c.trophic;
        let prey = |i: usize| (0..n).filter(move |j| trophic[[i, *j]]);

        let (flavour, hill, consumers) = match &c.response {
            Response::Bioenergetic(r) => {
                let consumers = consumer_indices
                    .iter()
                    .map(|&i| Consumer {
                        index: i,
                        links: prey(i)
                            .map(|j| Link {
                                prey: j,
                                preference: r.preferences[[i, j]],
                                efficiency: r.efficiency[[i, j]],
                                attack_rate: 0.0,
                                handling_time: 0.0,
                            })
                            .collect(),
                        interference: r.interference[i],
                        scale: r.metabolism[i] * r.max_consumption[i],
                        half_saturation: r.half_saturation[i].powf(r.hill),
                    })
                    .collect();
                (Flavour::Bioenergetic, r.hill, consumers)
            }
            Response::Classic(r) => {
                let consumers = consumer_indices
                    .iter()
                    .map(|&i| Consumer {
                        index: i,
                        links: prey(i)
                            .map(|j| Link {
                                prey: j,
                                preference: r.preferences[[i, j]],
                                efficiency: r.efficiency[[i, j]],
                                attack_rate: r.attack_rate[[i, j]],
                                handling_time: r.handling_time[[i, j]],
                            })
                            .collect(),
                        interference: r.interference[i],
                        scale: r.body_mass[i],
                        half_saturation: 0.0,
                    })
                    .collect();
                (Flavour::Classic, r.hill, consumers)
            }
            Response::Linear(r) => {
                let consumers = consumer_indices
                    .iter()
                    .map(|&i| Consumer {
                        index: i,
                        links: prey(i)
                            .map(|j| Link {
                                prey: j,
                                preference: r.preferences[[i, j]],
                                efficiency: r.efficiency[[i, j]],
                                attack_rate: 0.0,
                                handling_time: 0.0,
                            })
                            .collect(),
                        interference: 0.0,
                        scale: r.consumption_rate[i],
                        half_saturation: 0.0,
                    })
                    .collect();
                (Flavour::Linear, 1.0, consumers)
            }
        };

        let producer_indices = (0..n).filter(|i| c.producers[*i]);
        let (producers, nutrient_intake) = match &c.growth {
            Growth::Logistic(g) => (
                producer_indices
                    .map(|i| Producer {
                        index: i,
                        growth_rate: g.growth_rate[i],
                        carrying_capacity: g.carrying_capacity[i],
                        competitors: non_zero(&g.competition.row(i).to_owned()),
                    })
                    .collect(),
                None,
            ),
            Growth::NutrientIntake(g) => (
                producer_indices
                    .map(|i| Producer {
                        index: i,
                        growth_rate: g.growth_rate[i],
                        carrying_capacity: 0.0,
                        competitors: vec![],
                    })
                    .collect::<Vec<_>>(),
                Some(g.clone()),
            ),
        };
        let nutrient_users = match &nutrient_intake {
            Some(g) => (0..c.n_nutrients)
                .map(|l| {
                    producers
                        .iter()
                        .map(|p| (p.index, g.concentration[[p.index, l]]))
                        .filter(|(_, v)| *v != 0.0)
                        .collect()
                })
                .collect(),
            None => vec![],
        };

        Self {
            n_species: n,
            n_nutrients: c.n_nutrients,
            flavour,
            hill,
            consumers,
            producers,
            metabolic_loss: non_zero(&c.metabolism),
            natural_death: non_zero(&c.mortality),
            nutrient_intake,
            nutrient_users,
            competition: c.competition,
            facilitation: c.facilitation,
            interference: c.interference,
            refuge: c.refuge,
        }
    }

    /// Biomass flows of every link, accumulated into gains and losses.
    fn consumption(&self, b: &[FloatValue], gain: &mut [FloatValue], loss: &mut [FloatValue]) {
        let n = self.n_species;
        let powered: Vec<FloatValue> = if self.hill == 1.0 || self.flavour == Flavour::Linear {
            b.to_vec()
        } else {
            b.iter().map(|x| x.powf(self.hill)).collect()
        };
        let refuge_pressure: Option<Vec<FloatValue>> = self
            .refuge
            .as_ref()
            .map(|layer| (0..n).map(|j| layer.pressure_sparse(j, b)).collect());
        let attack = |link: &Link| match (&self.refuge, &refuge_pressure) {
            (Some(layer), Some(pressure)) => layer.form.apply(link.attack_rate, pressure[link.prey]),
            _ => link.attack_rate,
        };

        for consumer in &self.consumers {
            let i = consumer.index;
            let base = consumer.interference * b[i];
            let interference = match &self.interference {
                Some(layer) => layer.form.apply(base, layer.pressure_sparse(i, b)),
                None => base,
            };

            match self.flavour {
                Flavour::Bioenergetic => {
                    let mut sum = 0.0;
                    for link in &consumer.links {
                        sum += link.preference * powered[link.prey];
                    }
                    let b0h = consumer.half_saturation;
                    let denominator = b0h + interference * b0h + sum;
                    for link in &consumer.links {
                        let f = link.preference * powered[link.prey] / denominator;
                        let flow = consumer.scale * b[i] * f / link.efficiency;
                        gain[i] += link.efficiency * flow;
                        loss[link.prey] += flow;
                    }
                }
                Flavour::Classic => {
                    let mut sum = 0.0;
                    for link in &consumer.links {
                        sum += link.preference * attack(link) * link.handling_time
                            * powered[link.prey];
                    }
                    let denominator = 1.0 + interference + sum;
                    for link in &consumer.links {
                        let f = link.preference * attack(link) * powered[link.prey]
                            / denominator
                            / consumer.scale;
                        let flow = b[i] * f;
                        gain[i] += link.efficiency * flow;
                        loss[link.prey] += flow;
                    }
                }
                Flavour::Linear => {
                    for link in &consumer.links {
                        let f = consumer.scale * link.preference * b[link.prey];
                        let flow = b[i] * f;
                        gain[i] += link.efficiency * flow;
                        loss[link.prey] += flow;
                    }
                }
            }
        }
    }

    fn producer_growth(&self, b: &[FloatValue], nutrients: &[FloatValue], growth: &mut [FloatValue]) {
        for producer in &self.producers {
            let i = producer.index;
            let mut r = producer.growth_rate;
            if let Some(layer) = &self.facilitation {
                r = layer.form.apply(r, layer.pressure_sparse(i, b));
            }
            let mut g = match &self.nutrient_intake {
                Some(intake) => r * b[i] * intake.limitation(i, nutrients),
                None => {
                    let mut sum = 0.0;
                    for &(j, s) in &producer.competitors {
                        sum += s * b[j];
                    }
                    r * b[i] * (1.0 - sum / producer.carrying_capacity)
                }
            };
            if let Some(layer) = &self.competition {
                if g > 0.0 {
                    g = layer.form.apply(g, layer.pressure_sparse(i, b));
                }
            }
            growth[i] = g;
        }
    }
}

impl IVP for SpecializedDynamics {
    fn n_states(&self) -> usize {
        self.n_species + self.n_nutrients
    }

    fn calculate_dy_dt(&self, _t: Time, y: &State, dy_dt: &mut State) {
        let n = self.n_species;
        let (b, nutrients) = y.as_slice().split_at(n);

        let mut gain = vec![0.0; n];
        let mut loss = vec![0.0; n];
        self.consumption(b, &mut gain, &mut loss);
        let mut growth = vec![0.0; n];
        self.producer_growth(b, nutrients, &mut growth);

        let dy = dy_dt.as_mut_slice();
        for i in 0..n {
            dy[i] = growth[i] + gain[i] - loss[i];
        }
        for &(i, x) in &self.metabolic_loss {
            dy[i] -= x * b[i];
        }
        for &(i, d) in &self.natural_death {
            dy[i] -= d * b[i];
        }

        if let Some(intake) = &self.nutrient_intake {
            for (l, users) in self.nutrient_users.iter().enumerate() {
                let mut uptake = 0.0;
                for &(i, c) in users {
                    uptake += c * growth[i];
                }
                dy[n + l] = intake.turnover[l] * (intake.supply[l] - nutrients[l]) - uptake;
            }
        }
    }
}

impl Dynamics for SpecializedDynamics {
    fn kind(&self) -> DynamicsKind {
        DynamicsKind::Specialized
    }

    fn n_species(&self) -> usize {
        self.n_species
    }

    fn n_nutrients(&self) -> usize {
        self.n_nutrients
    }
}
