//! The blueprint catalogue.
//!
//! Every blueprint provides the data of one component of [`ModelParameters`]. Blueprints of
//! the same component are alternative ways of computing that data (raw values, a flat value,
//! an allometric formula...).

mod body_mass;
mod growth;
mod links;
mod nontrophic;
mod rates;
mod responses;
mod species;
mod temperature;

pub use body_mass::{BodyMass, MetabolicClasses};
pub use growth::{LogisticGrowth, NutrientIntake, NutrientNodes, NutrientQuantity, NutrientRates, NutrientSource};
pub use links::{CompetitionSource, HillExponent, LinkKind, LinkRates, LinkSource, ProducersCompetition};
pub use nontrophic::{LayerLinks, NontrophicLayer};
pub use rates::{AllometricParams, Allometry, RateKind, RateSource, Rates, Support};
pub use responses::{BioenergeticResponse, ClassicResponse, LinearResponse};
pub use species::{Foodweb, Species};
pub use temperature::{Temperature, TemperatureDependence};

pub(crate) use body_mass::{check_body_mass, check_classes, classes_value, parse_classes};
pub(crate) use growth::check_nutrient_values;
pub(crate) use links::{check_competition, check_hill_exponent, check_links};
pub(crate) use nontrophic::{check_intensity, check_layer_links};
pub(crate) use rates::check_rates;
pub(crate) use temperature::check_temperature;

use endyn_core::framework::{Blueprint, CheckFailure, CheckResult};
use endyn_core::params::{MetabolicClass, ModelParameters, SPECIES};
use endyn_core::FloatValue;

/// A boxed blueprint of the model.
pub type BoxedBlueprint = Box<dyn Blueprint<ModelParameters>>;

/// A complete bioenergetic model over a food web.
///
/// Body masses are all one and consumers are invertebrates; growth and metabolic rates follow
/// their allometric defaults and natural death is switched off.
pub fn default_model(foodweb: Foodweb) -> Vec<BoxedBlueprint> {
    vec![
        Box::new(foodweb),
        Box::new(BodyMass::flat(1.0)),
        Box::new(MetabolicClasses::favor(MetabolicClass::Invertebrate)),
        Box::new(Rates::allometric(RateKind::GrowthRate, Allometry::GROWTH_RATE)),
        Box::new(Rates::allometric(RateKind::Metabolism, Allometry::METABOLISM)),
        Box::new(Rates::flat(RateKind::Mortality, 0.0)),
        Box::new(BioenergeticResponse::default()),
        Box::new(LogisticGrowth::default()),
    ]
}

pub(crate) fn check_finite_non_negative<'a>(
    field: &str,
    values: impl IntoIterator<Item = &'a FloatValue>,
) -> CheckResult {
    for (i, v) in values.into_iter().enumerate() {
        if !v.is_finite() || *v < 0.0 {
            return Err(CheckFailure::new(
                field,
                format!("value {} at position {} must be finite and non-negative", v, i),
            ));
        }
    }
    Ok(())
}

pub(crate) fn check_len(field: &str, received: usize, expected: usize) -> CheckResult {
    if received != expected {
        return Err(CheckFailure::mismatch(
            format!("{} (length)", field),
            expected,
            received,
        ));
    }
    Ok(())
}

pub(crate) fn check_shape(
    field: &str,
    received: (usize, usize),
    expected: (usize, usize),
) -> CheckResult {
    if received != expected {
        return Err(CheckFailure::mismatch(
            format!("{} (shape)", field),
            expected,
            received,
        ));
    }
    Ok(())
}

pub(crate) fn check_unique<'a>(field: &str, labels: impl IntoIterator<Item = &'a str>) -> CheckResult {
    let mut seen = std::collections::HashSet::new();
    for label in labels {
        if !seen.insert(label) {
            return Err(CheckFailure::new(field, format!("duplicate label {:?}", label)));
        }
    }
    Ok(())
}

pub(crate) fn species_index(model: &ModelParameters, field: &str, label: &str) -> Result<usize, CheckFailure> {
    model
        .topology
        .node_index(SPECIES, label)
        .map_err(|_| CheckFailure::new(field, format!("unknown species {:?}", label)))
}

/// Producers mask of the model, failing if the food web is missing.
pub(crate) fn producers(model: &ModelParameters, field: &str) -> Result<ndarray::Array1<bool>, CheckFailure> {
    model
        .producers_mask()
        .ok_or_else(|| CheckFailure::new(field, "no food web in the model"))
}
