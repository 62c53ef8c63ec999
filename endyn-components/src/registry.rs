//! The component catalogue: relations between components and the properties they expose.

use crate::blueprints::{
    check_body_mass, check_classes, check_competition, check_hill_exponent, check_intensity,
    check_layer_links, check_links, check_nutrient_values, check_rates, check_temperature,
    classes_value, parse_classes, LinkKind, NutrientQuantity, RateKind, Support,
};
use crate::ids;
use endyn_core::errors::EndynResult;
use endyn_core::framework::{CheckFailure, ComponentSpec, Property, PropertyValue, Registry};
use endyn_core::params::{trophic_levels, InteractionKind, Layer, ModelParameters};
use endyn_core::FloatValue;
use ndarray::{Array1, Array2};
use std::sync::{Arc, OnceLock};

type Spec = ComponentSpec<ModelParameters>;

fn expect_scalar(field: &str, value: &PropertyValue) -> Result<FloatValue, CheckFailure> {
    value.as_scalar().ok_or_else(|| unexpected(field, "a number", value))
}

fn expect_vector<'a>(
    field: &str,
    value: &'a PropertyValue,
) -> Result<&'a Array1<FloatValue>, CheckFailure> {
    value.as_vector().ok_or_else(|| unexpected(field, "a vector", value))
}

fn expect_matrix<'a>(
    field: &str,
    value: &'a PropertyValue,
) -> Result<&'a Array2<FloatValue>, CheckFailure> {
    value.as_matrix().ok_or_else(|| unexpected(field, "a matrix", value))
}

fn expect_adjacency<'a>(
    field: &str,
    value: &'a PropertyValue,
) -> Result<&'a Array2<bool>, CheckFailure> {
    value
        .as_adjacency()
        .ok_or_else(|| unexpected(field, "an adjacency matrix", value))
}

fn unexpected(field: &str, expected: &str, value: &PropertyValue) -> CheckFailure {
    CheckFailure::new(
        field,
        format!("expected {}, received a {}", expected, value.kind()),
    )
}

fn layer(model: &ModelParameters, kind: InteractionKind) -> Option<&Layer> {
    model.network.as_ref()?.layer(kind)
}

fn layer_mut(model: &mut ModelParameters, kind: InteractionKind) -> Option<&mut Layer> {
    let n = model.richness();
    model.network.as_mut().map(|network| network.layer_mut(kind, n))
}

macro_rules! rate_spec {
    ($kind:expr $(, $alias:literal)*) => {{
        let spec = Spec::new($kind.component()).property(
            Property::read($kind.property(), |m: &ModelParameters| {
                $kind.value(m).cloned().map(PropertyValue::Vector)
            })
            $(.alias($alias))*
            .write(
                |m, v| check_rates($kind, m, expect_vector($kind.property(), v)?),
                |m, v| *$kind.slot(m) = v.into_vector(),
            ),
        );
        match $kind.support() {
            Support::AllSpecies => spec.requires(ids::SPECIES),
            Support::Producers | Support::Consumers => spec.requires(ids::FOODWEB),
        }
    }};
}

macro_rules! link_spec {
    ($kind:expr $(, $alias:literal)*) => {
        Spec::new($kind.component()).requires(ids::FOODWEB).property(
            Property::read($kind.property(), |m: &ModelParameters| {
                $kind.value(m).cloned().map(PropertyValue::Matrix)
            })
            $(.alias($alias))*
            .write(
                |m, v| check_links($kind, m, expect_matrix($kind.property(), v)?),
                |m, v| *$kind.slot(m) = v.into_matrix(),
            ),
        )
    };
}

macro_rules! nutrient_spec {
    ($quantity:expr) => {
        Spec::new($quantity.component()).requires(ids::NUTRIENTS).property(
            Property::read($quantity.property(), |m: &ModelParameters| $quantity.value(m))
                .write(
                    |m, v| check_nutrient_values($quantity, m, v),
                    |m, v| $quantity.write(m, v),
                ),
        )
    };
}

macro_rules! layer_spec {
    ($id:expr, $kind:expr, $links:literal, $intensity:literal, $form:literal) => {
        Spec::new($id)
            .requires(ids::FOODWEB)
            .property(
                Property::read($links, |m: &ModelParameters| {
                    layer(m, $kind).map(|l| PropertyValue::Adjacency(l.links.clone()))
                })
                .write(
                    |m, v| check_layer_links($kind, m, expect_adjacency($links, v)?),
                    |m, v| {
                        if let (PropertyValue::Adjacency(links), Some(layer)) = (v, layer_mut(m, $kind)) {
                            layer.links = links;
                        }
                    },
                ),
            )
            .property(
                Property::read($intensity, |m: &ModelParameters| {
                    layer(m, $kind).map(|l| PropertyValue::Scalar(l.intensity))
                })
                .write(
                    |_, v| check_intensity($intensity, expect_scalar($intensity, v)?),
                    |m, v| {
                        if let (Some(intensity), Some(layer)) = (v.as_scalar(), layer_mut(m, $kind)) {
                            layer.intensity = intensity;
                        }
                    },
                ),
            )
            .property(Property::read($form, |m: &ModelParameters| {
                layer(m, $kind).map(|l| PropertyValue::Text(l.functional_form.name().to_string()))
            }))
    };
}

fn species_specs() -> Vec<Spec> {
    vec![
        Spec::new(ids::SPECIES)
            .property(
                Property::read("richness", |m: &ModelParameters| Some(PropertyValue::Size(m.richness())))
                    .alias("S")
                    .alias("n_species"),
            )
            .property(
                Property::read("species_names", |m: &ModelParameters| {
                    Some(PropertyValue::Labels(m.species_names().to_vec()))
                })
                .alias("species"),
            ),
        Spec::new(ids::FOODWEB)
            .requires(ids::SPECIES)
            .property(
                Property::read("trophic_links", |m: &ModelParameters| {
                    m.trophic().cloned().map(PropertyValue::Adjacency)
                })
                .alias("A")
                .alias("foodweb"),
            )
            .property(Property::read("producers", |m: &ModelParameters| {
                m.producers_mask().map(PropertyValue::Mask)
            }))
            .property(Property::read("consumers", |m: &ModelParameters| {
                m.consumers_mask().map(PropertyValue::Mask)
            }))
            .property(Property::read("n_trophic_links", |m: &ModelParameters| {
                m.trophic()
                    .map(|a| PropertyValue::Size(a.iter().filter(|l| **l).count()))
            }))
            .property(Property::read("trophic_levels", |m: &ModelParameters| {
                m.trophic()
                    .and_then(|a| trophic_levels(a).ok())
                    .map(PropertyValue::Vector)
            })),
        Spec::new(ids::BODY_MASS).property(
            Property::read("body_mass", |m: &ModelParameters| m.body_mass.clone().map(PropertyValue::Vector))
                .alias("M")
                .write(
                    |m, v| check_body_mass(m, expect_vector("body_mass", v)?),
                    |m, v| m.body_mass = v.into_vector(),
                ),
        ),
        Spec::new(ids::METABOLIC_CLASS)
            .requires(ids::FOODWEB)
            .property(Property::read("metabolic_class", classes_value).write(
                |m, v| match v {
                    PropertyValue::Labels(names) => check_classes(m, &parse_classes(names)?),
                    other => Err(unexpected("metabolic_class", "class names", other)),
                },
                |m, v| {
                    if let PropertyValue::Labels(names) = v {
                        m.metabolic_class = parse_classes(&names).ok();
                    }
                },
            )),
    ]
}

fn rate_specs() -> Vec<Spec> {
    vec![
        rate_spec!(RateKind::GrowthRate, "r"),
        rate_spec!(RateKind::Metabolism, "x"),
        rate_spec!(RateKind::Mortality, "d", "natural_death_rate"),
        rate_spec!(RateKind::CarryingCapacity, "K"),
        rate_spec!(RateKind::MaxConsumption, "y"),
        rate_spec!(RateKind::HalfSaturationDensity, "B0"),
        rate_spec!(RateKind::IntraspecificInterference, "c"),
        rate_spec!(RateKind::ConsumptionRate, "alpha"),
        link_spec!(LinkKind::Efficiency, "e"),
        link_spec!(LinkKind::ConsumersPreferences, "w"),
        link_spec!(LinkKind::AttackRate, "a_r"),
        link_spec!(LinkKind::HandlingTime, "h_t"),
        Spec::new(ids::PRODUCERS_COMPETITION)
            .requires(ids::FOODWEB)
            .property(
                Property::read("producers_competition", |m: &ModelParameters| {
                    m.producers_competition.clone().map(PropertyValue::Matrix)
                })
                .write(
                    |m, v| check_competition(m, expect_matrix("producers_competition", v)?),
                    |m, v| m.producers_competition = v.into_matrix(),
                ),
            ),
        Spec::new(ids::HILL_EXPONENT).property(
            Property::read("hill_exponent", |m: &ModelParameters| m.hill_exponent.map(PropertyValue::Scalar))
                .alias("h")
                .write(
                    |_, v| check_hill_exponent(expect_scalar("hill_exponent", v)?),
                    |m, v| m.hill_exponent = v.as_scalar(),
                ),
        ),
    ]
}

fn model_specs() -> Vec<Spec> {
    const SINGLE_RESPONSE: &str = "a model uses a single functional response";
    const SINGLE_GROWTH: &str = "a model uses a single producer growth model";
    const REFUGES: &str = "refuges only act on attack rates of the classic response";
    vec![
        Spec::new(ids::BIOENERGETIC_RESPONSE)
            .requires(ids::FOODWEB)
            .conflicts(ids::CLASSIC_RESPONSE, SINGLE_RESPONSE)
            .conflicts(ids::LINEAR_RESPONSE, SINGLE_RESPONSE),
        Spec::new(ids::CLASSIC_RESPONSE)
            .requires(ids::FOODWEB)
            .requires(ids::BODY_MASS)
            .conflicts(ids::LINEAR_RESPONSE, SINGLE_RESPONSE),
        Spec::new(ids::LINEAR_RESPONSE).requires(ids::FOODWEB),
        Spec::new(ids::LOGISTIC_GROWTH)
            .requires(ids::FOODWEB)
            .conflicts(ids::NUTRIENT_INTAKE, SINGLE_GROWTH),
        Spec::new(ids::NUTRIENT_INTAKE)
            .requires(ids::FOODWEB)
            .requires(ids::NUTRIENTS),
        Spec::new(ids::NUTRIENTS)
            .property(Property::read("n_nutrients", |m: &ModelParameters| {
                Some(PropertyValue::Size(m.n_nutrients()))
            }))
            .property(Property::read("nutrients_names", |m: &ModelParameters| {
                m.nutrients
                    .as_ref()
                    .map(|n| PropertyValue::Labels(n.names.clone()))
            })),
        nutrient_spec!(NutrientQuantity::Turnover),
        nutrient_spec!(NutrientQuantity::Supply),
        nutrient_spec!(NutrientQuantity::Concentration).requires(ids::FOODWEB),
        nutrient_spec!(NutrientQuantity::HalfSaturation).requires(ids::FOODWEB),
        layer_spec!(
            ids::COMPETITION_LAYER,
            InteractionKind::Competition,
            "competition_links",
            "competition_intensity",
            "competition_functional_form"
        ),
        layer_spec!(
            ids::FACILITATION_LAYER,
            InteractionKind::Facilitation,
            "facilitation_links",
            "facilitation_intensity",
            "facilitation_functional_form"
        ),
        layer_spec!(
            ids::INTERFERENCE_LAYER,
            InteractionKind::Interference,
            "interference_links",
            "interference_intensity",
            "interference_functional_form"
        ),
        layer_spec!(
            ids::REFUGE_LAYER,
            InteractionKind::Refuge,
            "refuge_links",
            "refuge_intensity",
            "refuge_functional_form"
        )
        .conflicts(ids::BIOENERGETIC_RESPONSE, REFUGES)
        .conflicts(ids::LINEAR_RESPONSE, REFUGES),
        Spec::new(ids::TEMPERATURE).property(
            Property::read("temperature", |m: &ModelParameters| m.temperature.map(PropertyValue::Scalar))
                .alias("T")
                .write(
                    |_, v| check_temperature(expect_scalar("temperature", v)?),
                    |m, v| m.temperature = v.as_scalar(),
                ),
        ),
        Spec::new(ids::TEMPERATURE_RESPONSE).requires(ids::TEMPERATURE),
    ]
}

/// Build the catalogue from scratch.
pub fn build_registry() -> EndynResult<Registry<ModelParameters>> {
    species_specs()
        .into_iter()
        .chain(rate_specs())
        .chain(model_specs())
        .fold(Registry::builder(), |builder, spec| builder.component(spec))
        .build()
}

/// The catalogue shared by every model, built on first use.
pub fn registry() -> Arc<Registry<ModelParameters>> {
    static REGISTRY: OnceLock<Arc<Registry<ModelParameters>>> = OnceLock::new();
    REGISTRY
        .get_or_init(|| Arc::new(build_registry().expect("the component catalogue is consistent")))
        .clone()
}
