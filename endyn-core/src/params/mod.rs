//! The model parameters aggregate.
//!
//! [`ModelParameters`] is the value assembled by the component framework and read by the
//! dynamics assembler. Every quantity is optional: a field is `None` until the component
//! providing it has been expanded into the model.

mod network;
mod trophic;

pub use network::{
    multiplex_defaults, FunctionalForm, InteractionKind, Layer, LayerDefaults, MultiplexDefaults,
    Network,
};
pub use trophic::{producers, trophic_levels};

use crate::aliasing::AliasingSystem;
use crate::errors::{EndynError, EndynResult};
use crate::topology::Topology;
use crate::FloatValue;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Name of the species compartment of the topology.
pub const SPECIES: &str = "species";
/// Name of the nutrients compartment of the topology.
pub const NUTRIENTS: &str = "nutrients";
/// Name of the trophic edge type of the topology.
pub const TROPHIC: &str = "trophic";

/// Boltzmann constant
/// unit: eV / K
pub const BOLTZMANN: FloatValue = 8.617e-5;

/// Metabolic class of a species, driving its allometric rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetabolicClass {
    Producer,
    Invertebrate,
    Ectotherm,
}

impl MetabolicClass {
    pub fn all() -> [MetabolicClass; 3] {
        [
            MetabolicClass::Producer,
            MetabolicClass::Invertebrate,
            MetabolicClass::Ectotherm,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            MetabolicClass::Producer => "producer",
            MetabolicClass::Invertebrate => "invertebrate",
            MetabolicClass::Ectotherm => "ectotherm",
        }
    }

    fn aliases() -> &'static AliasingSystem {
        static ALIASES: OnceLock<AliasingSystem> = OnceLock::new();
        ALIASES.get_or_init(|| {
            AliasingSystem::new(
                "metabolic classes",
                [
                    ("producer", vec!["p", "prod"]),
                    ("invertebrate", vec!["i", "inv"]),
                    ("ectotherm", vec!["e", "ecto", "ectotherm vertebrate"]),
                ],
            )
            .expect("metabolic class aliases are unambiguous")
        })
    }

    /// Parse a class from any of its names, e.g. `"inv"` or `"invertebrate"`.
    pub fn parse(reference: &str) -> EndynResult<Self> {
        match Self::aliases().standardize(reference)? {
            "producer" => Ok(MetabolicClass::Producer),
            "invertebrate" => Ok(MetabolicClass::Invertebrate),
            _ => Ok(MetabolicClass::Ectotherm),
        }
    }
}

impl fmt::Display for MetabolicClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Flavour of the consumer functional response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseKind {
    /// Yodzis & Innes type, parametrised by half-saturation densities and maximum consumption.
    Bioenergetic,
    /// Holling type, parametrised by attack rates and handling times.
    Classic,
    /// Consumption proportional to prey biomass.
    Linear,
}

/// Flavour of the producer growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrowthKind {
    Logistic,
    NutrientIntake,
}

/// Nutrient pool fed to producers under [`GrowthKind::NutrientIntake`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutrients {
    pub names: Vec<String>,
    /// Turnover rate of each nutrient
    /// unit: 1 / time
    pub turnover: Option<Array1<FloatValue>>,
    /// Supply concentration of each nutrient
    pub supply: Option<Array1<FloatValue>>,
    /// Nutrient content of each producer (species × nutrients).
    /// Rows of consumers are zero.
    pub concentration: Option<Array2<FloatValue>>,
    /// Half-saturation density of each producer for each nutrient (species × nutrients).
    pub half_saturation: Option<Array2<FloatValue>>,
}

impl Nutrients {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Activation energies of the Boltzmann-Arrhenius response, one per affected rate.
/// unit: eV
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivationEnergies {
    /// default: 0.84
    pub growth: FloatValue,
    /// default: 0.69
    pub metabolism: FloatValue,
    /// default: 0.69
    pub mortality: FloatValue,
}

impl Default for ActivationEnergies {
    fn default() -> Self {
        Self {
            growth: 0.84,
            metabolism: 0.69,
            mortality: 0.69,
        }
    }
}

/// How biological rates respond to temperature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TemperatureResponse {
    /// Rates are exactly the ones given, whatever the temperature.
    Flat,
    /// Rates are scaled by `exp(E (T - T0) / (k_B T T0))`.
    BoltzmannArrhenius {
        activation: ActivationEnergies,
        /// Reference temperature at which rates are unscaled
        /// unit: K
        /// default: 293.15
        reference: FloatValue,
    },
}

impl TemperatureResponse {
    pub fn boltzmann_arrhenius() -> Self {
        TemperatureResponse::BoltzmannArrhenius {
            activation: ActivationEnergies::default(),
            reference: 293.15,
        }
    }

    /// Multiplicative factors applied to growth, metabolism and mortality rates.
    pub fn factors(&self, temperature: FloatValue) -> (FloatValue, FloatValue, FloatValue) {
        match self {
            TemperatureResponse::Flat => (1.0, 1.0, 1.0),
            TemperatureResponse::BoltzmannArrhenius {
                activation,
                reference,
            } => {
                let scale = |e: FloatValue| {
                    (e * (temperature - reference) / (BOLTZMANN * temperature * reference)).exp()
                };
                (
                    scale(activation.growth),
                    scale(activation.metabolism),
                    scale(activation.mortality),
                )
            }
        }
    }
}

/// Every parameter of a community model.
///
/// Species-level rates are vectors indexed like the `"species"` compartment of the topology.
/// Link-level rates are `species × species` matrices where entry `(i, j)` describes
/// consumer `i` eating resource `j`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelParameters {
    pub topology: Topology,
    pub network: Option<Network>,

    pub body_mass: Option<Array1<FloatValue>>,
    pub metabolic_class: Option<Vec<MetabolicClass>>,

    /// Intrinsic growth rate of producers
    pub growth_rate: Option<Array1<FloatValue>>,
    /// Metabolic loss rate
    pub metabolism: Option<Array1<FloatValue>>,
    /// Natural death rate
    pub mortality: Option<Array1<FloatValue>>,
    /// Carrying capacity of producers under logistic growth
    pub carrying_capacity: Option<Array1<FloatValue>>,
    /// Maximum consumption rate (bioenergetic response)
    pub max_consumption: Option<Array1<FloatValue>>,
    /// Half-saturation density (bioenergetic response)
    pub half_saturation_density: Option<Array1<FloatValue>>,
    /// Intraspecific interference between predators
    pub intraspecific_interference: Option<Array1<FloatValue>>,
    /// Consumption rate of the linear response
    pub consumption_rate: Option<Array1<FloatValue>>,
    pub hill_exponent: Option<FloatValue>,

    /// Assimilation efficiency of each trophic link
    pub efficiency: Option<Array2<FloatValue>>,
    /// Relative preference of each consumer for its resources (rows sum to 1)
    pub consumers_preferences: Option<Array2<FloatValue>>,
    /// Attack rate (classic response)
    pub attack_rate: Option<Array2<FloatValue>>,
    /// Handling time (classic response)
    pub handling_time: Option<Array2<FloatValue>>,
    /// Competition coefficients between producers under logistic growth
    pub producers_competition: Option<Array2<FloatValue>>,

    pub functional_response: Option<ResponseKind>,
    pub producer_growth: Option<GrowthKind>,
    pub nutrients: Option<Nutrients>,

    /// unit: K
    pub temperature: Option<FloatValue>,
    pub temperature_response: Option<TemperatureResponse>,
}

impl ModelParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of species, zero until the species compartment exists.
    pub fn richness(&self) -> usize {
        self.topology.n_nodes(SPECIES).unwrap_or(0)
    }

    pub fn n_nutrients(&self) -> usize {
        self.nutrients.as_ref().map_or(0, Nutrients::len)
    }

    pub fn species_names(&self) -> &[String] {
        self.topology.labels(SPECIES).unwrap_or(&[])
    }

    /// Trophic adjacency matrix, `A[i, j]` if `i` eats `j`.
    pub fn trophic(&self) -> Option<&Array2<bool>> {
        self.network.as_ref().map(Network::trophic)
    }

    /// Mask of the species without any prey.
    pub fn producers_mask(&self) -> Option<Array1<bool>> {
        self.trophic().map(producers)
    }

    /// Mask of the species with at least one prey.
    pub fn consumers_mask(&self) -> Option<Array1<bool>> {
        self.producers_mask().map(|m| m.mapv(|p| !p))
    }

    /// Growth, metabolism and mortality scaling factors at the current temperature.
    pub fn temperature_factors(&self) -> (FloatValue, FloatValue, FloatValue) {
        match (self.temperature, &self.temperature_response) {
            (Some(t), Some(response)) => response.factors(t),
            _ => (1.0, 1.0, 1.0),
        }
    }

    /// The network, upgraded to a multiplex network if needed.
    ///
    /// Fails if no network has been set yet.
    pub fn multiplex_mut(&mut self) -> EndynResult<&mut Network> {
        let n = self.richness();
        let network = self
            .network
            .as_mut()
            .ok_or_else(|| EndynError::Error("No network to upgrade".to_string()))?;
        network.upgrade(n);
        Ok(network)
    }
}
