//! Per-species rates.
//!
//! All per-species rates share one blueprint, [`Rates`], keyed by [`RateKind`]. Each kind
//! declares the species it applies to ([`Support`]): values outside of it must be zero.

use super::{check_finite_non_negative, check_len, check_unique, species_index};
use crate::ids;
use endyn_core::framework::{Blueprint, CheckFailure, CheckResult, ComponentId};
use endyn_core::params::{MetabolicClass, ModelParameters};
use endyn_core::FloatValue;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Species a rate applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Support {
    AllSpecies,
    Producers,
    Consumers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateKind {
    GrowthRate,
    Metabolism,
    Mortality,
    CarryingCapacity,
    MaxConsumption,
    HalfSaturationDensity,
    IntraspecificInterference,
    ConsumptionRate,
}

impl RateKind {
    pub fn all() -> [RateKind; 8] {
        [
            RateKind::GrowthRate,
            RateKind::Metabolism,
            RateKind::Mortality,
            RateKind::CarryingCapacity,
            RateKind::MaxConsumption,
            RateKind::HalfSaturationDensity,
            RateKind::IntraspecificInterference,
            RateKind::ConsumptionRate,
        ]
    }

    pub fn component(self) -> ComponentId {
        match self {
            RateKind::GrowthRate => ids::GROWTH_RATE,
            RateKind::Metabolism => ids::METABOLISM,
            RateKind::Mortality => ids::MORTALITY,
            RateKind::CarryingCapacity => ids::CARRYING_CAPACITY,
            RateKind::MaxConsumption => ids::MAX_CONSUMPTION,
            RateKind::HalfSaturationDensity => ids::HALF_SATURATION_DENSITY,
            RateKind::IntraspecificInterference => ids::INTRASPECIFIC_INTERFERENCE,
            RateKind::ConsumptionRate => ids::CONSUMPTION_RATE,
        }
    }

    /// Name of the property exposing the rate.
    pub fn property(self) -> &'static str {
        match self {
            RateKind::GrowthRate => "growth_rate",
            RateKind::Metabolism => "metabolism",
            RateKind::Mortality => "mortality",
            RateKind::CarryingCapacity => "carrying_capacity",
            RateKind::MaxConsumption => "max_consumption",
            RateKind::HalfSaturationDensity => "half_saturation_density",
            RateKind::IntraspecificInterference => "intraspecific_interference",
            RateKind::ConsumptionRate => "consumption_rate",
        }
    }

    pub fn support(self) -> Support {
        match self {
            RateKind::Metabolism | RateKind::Mortality => Support::AllSpecies,
            RateKind::GrowthRate | RateKind::CarryingCapacity => Support::Producers,
            RateKind::MaxConsumption
            | RateKind::HalfSaturationDensity
            | RateKind::IntraspecificInterference
            | RateKind::ConsumptionRate => Support::Consumers,
        }
    }

    /// Whether the rate divides something and must be positive over its support.
    fn positive(self) -> bool {
        matches!(
            self,
            RateKind::CarryingCapacity | RateKind::HalfSaturationDensity
        )
    }

    pub fn value(self, model: &ModelParameters) -> Option<&Array1<FloatValue>> {
        match self {
            RateKind::GrowthRate => model.growth_rate.as_ref(),
            RateKind::Metabolism => model.metabolism.as_ref(),
            RateKind::Mortality => model.mortality.as_ref(),
            RateKind::CarryingCapacity => model.carrying_capacity.as_ref(),
            RateKind::MaxConsumption => model.max_consumption.as_ref(),
            RateKind::HalfSaturationDensity => model.half_saturation_density.as_ref(),
            RateKind::IntraspecificInterference => model.intraspecific_interference.as_ref(),
            RateKind::ConsumptionRate => model.consumption_rate.as_ref(),
        }
    }

    pub(crate) fn slot(self, model: &mut ModelParameters) -> &mut Option<Array1<FloatValue>> {
        match self {
            RateKind::GrowthRate => &mut model.growth_rate,
            RateKind::Metabolism => &mut model.metabolism,
            RateKind::Mortality => &mut model.mortality,
            RateKind::CarryingCapacity => &mut model.carrying_capacity,
            RateKind::MaxConsumption => &mut model.max_consumption,
            RateKind::HalfSaturationDensity => &mut model.half_saturation_density,
            RateKind::IntraspecificInterference => &mut model.intraspecific_interference,
            RateKind::ConsumptionRate => &mut model.consumption_rate,
        }
    }
}

/// Mask of the species a support covers, `None` if the food web is needed but missing.
pub(crate) fn support_mask(support: Support, model: &ModelParameters) -> Option<Array1<bool>> {
    match support {
        Support::AllSpecies => Some(Array1::from_elem(model.richness(), true)),
        Support::Producers => model.producers_mask(),
        Support::Consumers => model.consumers_mask(),
    }
}

/// Validate the values of a rate against the model: one finite non-negative value per
/// species, zero outside of the rate's support.
pub(crate) fn check_rates(
    kind: RateKind,
    model: &ModelParameters,
    values: &Array1<FloatValue>,
) -> CheckResult {
    let field = kind.property();
    check_len(field, values.len(), model.richness())?;
    check_finite_non_negative(field, values)?;
    let mask = support_mask(kind.support(), model)
        .ok_or_else(|| CheckFailure::new(field, "no food web in the model"))?;
    let names = model.species_names();
    for (i, (v, inside)) in values.iter().zip(mask.iter()).enumerate() {
        let label = names.get(i).map(String::as_str).unwrap_or_default();
        if !inside && *v != 0.0 {
            return Err(CheckFailure::new(
                field,
                format!(
                    "value {} for species {:?} outside of the {:?} support must be zero",
                    v,
                    label,
                    kind.support()
                ),
            ));
        }
        if *inside && kind.positive() && *v == 0.0 {
            return Err(CheckFailure::new(
                field,
                format!("value for species {:?} must be positive", label),
            ));
        }
    }
    Ok(())
}

/// Coefficients of the allometric formula `a M^b`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllometricParams {
    pub a: FloatValue,
    pub b: FloatValue,
}

impl AllometricParams {
    pub const fn new(a: FloatValue, b: FloatValue) -> Self {
        Self { a, b }
    }
}

/// Allometric coefficients for each metabolic class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Allometry {
    pub producer: AllometricParams,
    pub invertebrate: AllometricParams,
    pub ectotherm: AllometricParams,
}

impl Allometry {
    /// Intrinsic growth rate of producers.
    pub const GROWTH_RATE: Allometry = Allometry {
        producer: AllometricParams::new(1.0, -0.25),
        invertebrate: AllometricParams::new(0.0, 0.0),
        ectotherm: AllometricParams::new(0.0, 0.0),
    };

    /// Metabolic rate of consumers.
    pub const METABOLISM: Allometry = Allometry {
        producer: AllometricParams::new(0.0, 0.0),
        invertebrate: AllometricParams::new(0.314, -0.25),
        ectotherm: AllometricParams::new(0.88, -0.25),
    };

    /// Maximum consumption rate of consumers, relative to their metabolic rate.
    pub const MAX_CONSUMPTION: Allometry = Allometry {
        producer: AllometricParams::new(0.0, 0.0),
        invertebrate: AllometricParams::new(8.0, 0.0),
        ectotherm: AllometricParams::new(4.0, 0.0),
    };

    pub fn params(&self, class: MetabolicClass) -> AllometricParams {
        match class {
            MetabolicClass::Producer => self.producer,
            MetabolicClass::Invertebrate => self.invertebrate,
            MetabolicClass::Ectotherm => self.ectotherm,
        }
    }

    pub fn rate(&self, class: MetabolicClass, mass: FloatValue) -> FloatValue {
        let AllometricParams { a, b } = self.params(class);
        if b == 0.0 {
            a
        } else {
            a * mass.powf(b)
        }
    }

    fn needs_mass(&self) -> bool {
        MetabolicClass::all()
            .into_iter()
            .any(|c| self.params(c).b != 0.0)
    }
}

/// Where the values of a rate come from.
#[derive(Debug, Clone, PartialEq)]
pub enum RateSource {
    /// Same value for every species of the support, zero elsewhere.
    Flat(FloatValue),
    Raw(Array1<FloatValue>),
    /// Values for some species given by label, zero elsewhere.
    Map(Vec<(String, FloatValue)>),
    /// Computed from the metabolic class and the body mass of each species.
    Allometric(Allometry),
}

impl RateSource {
    fn label(&self) -> &'static str {
        match self {
            RateSource::Flat(_) => "Flat",
            RateSource::Raw(_) => "Raw",
            RateSource::Map(_) => "Map",
            RateSource::Allometric(_) => "Allometric",
        }
    }
}

/// A per-species rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Rates {
    pub kind: RateKind,
    pub source: RateSource,
}

impl Rates {
    pub fn new(kind: RateKind, source: RateSource) -> Self {
        Self { kind, source }
    }

    pub fn flat(kind: RateKind, value: FloatValue) -> Self {
        Self::new(kind, RateSource::Flat(value))
    }

    pub fn raw(kind: RateKind, values: impl Into<Array1<FloatValue>>) -> Self {
        Self::new(kind, RateSource::Raw(values.into()))
    }

    pub fn map<I, S>(kind: RateKind, values: I) -> Self
    where
        I: IntoIterator<Item = (S, FloatValue)>,
        S: Into<String>,
    {
        Self::new(
            kind,
            RateSource::Map(values.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        )
    }

    pub fn allometric(kind: RateKind, allometry: Allometry) -> Self {
        Self::new(kind, RateSource::Allometric(allometry))
    }

    fn compute(&self, model: &ModelParameters) -> Result<Array1<FloatValue>, CheckFailure> {
        let field = self.kind.property();
        let n = model.richness();
        let mask = || {
            support_mask(self.kind.support(), model)
                .ok_or_else(|| CheckFailure::new(field, "no food web in the model"))
        };
        match &self.source {
            RateSource::Flat(value) => Ok(mask()?.mapv(|inside| if inside { *value } else { 0.0 })),
            RateSource::Raw(values) => Ok(values.clone()),
            RateSource::Map(values) => {
                let mut rates = Array1::zeros(n);
                for (label, value) in values {
                    rates[species_index(model, field, label)?] = *value;
                }
                Ok(rates)
            }
            RateSource::Allometric(allometry) => {
                let classes = model
                    .metabolic_class
                    .as_ref()
                    .ok_or_else(|| CheckFailure::new(field, "no metabolic classes in the model"))?;
                let masses = match &model.body_mass {
                    Some(m) => m.clone(),
                    None if !allometry.needs_mass() => Array1::ones(n),
                    None => return Err(CheckFailure::new(field, "no body masses in the model")),
                };
                let mask = mask()?;
                Ok(Array1::from_shape_fn(n, |i| {
                    if mask[i] {
                        allometry.rate(classes[i], masses[i])
                    } else {
                        0.0
                    }
                }))
            }
        }
    }
}

impl Blueprint<ModelParameters> for Rates {
    fn component(&self) -> ComponentId {
        self.kind.component()
    }

    fn name(&self) -> &'static str {
        match self.source {
            RateSource::Flat(_) => "Rates::Flat",
            RateSource::Raw(_) => "Rates::Raw",
            RateSource::Map(_) => "Rates::Map",
            RateSource::Allometric(_) => "Rates::Allometric",
        }
    }

    fn requires(&self) -> Vec<ComponentId> {
        match &self.source {
            RateSource::Map(_) => vec![ids::SPECIES],
            RateSource::Allometric(allometry) if allometry.needs_mass() => {
                vec![ids::METABOLIC_CLASS, ids::BODY_MASS]
            }
            RateSource::Allometric(_) => vec![ids::METABOLIC_CLASS],
            RateSource::Flat(_) | RateSource::Raw(_) => vec![],
        }
    }

    fn early_check(&self) -> CheckResult {
        let field = self.kind.property();
        match &self.source {
            RateSource::Flat(value) => check_finite_non_negative(field, [value]),
            RateSource::Raw(values) => check_finite_non_negative(field, values),
            RateSource::Map(values) => {
                check_unique(field, values.iter().map(|(k, _)| k.as_str()))?;
                check_finite_non_negative(field, values.iter().map(|(_, v)| v))
            }
            RateSource::Allometric(allometry) => {
                for class in MetabolicClass::all() {
                    let AllometricParams { a, b } = allometry.params(class);
                    if !(a.is_finite() && a >= 0.0 && b.is_finite()) {
                        return Err(CheckFailure::new(
                            field,
                            format!(
                                "invalid {} allometry for {} (a = {}, b = {})",
                                self.source.label(),
                                class,
                                a,
                                b
                            ),
                        ));
                    }
                }
                Ok(())
            }
        }
    }

    fn late_check(&self, model: &ModelParameters) -> CheckResult {
        check_rates(self.kind, model, &self.compute(model)?)
    }

    fn expand(&self, model: &mut ModelParameters) {
        let values = self.compute(model).expect("late_check accepted this model");
        *self.kind.slot(model) = Some(values);
    }
}
