//! Functional responses.
//!
//! Each flavour brings the quantities it reads. Values given explicitly are embedded (they
//! fail if the quantity is already in the model) while the others are implied defaults,
//! only added when the model lacks them.

use super::{HillExponent, LinkKind, LinkRates, LinkSource, RateKind, RateSource, Rates};
use crate::args::Args;
use crate::ids;
use endyn_core::aliasing::AliasingSystem;
use endyn_core::errors::EndynResult;
use endyn_core::framework::{Blueprint, Brought, ComponentId, PropertyValue};
use endyn_core::params::{ModelParameters, ResponseKind};
use endyn_core::FloatValue;
use std::sync::OnceLock;

use super::rates::Allometry;

fn rates(kind: RateKind, given: &Option<RateSource>, default: Rates) -> Brought<ModelParameters> {
    match given {
        Some(source) => Brought::embedded(Rates::new(kind, source.clone())),
        None => Brought::implied(default),
    }
}

fn links(kind: LinkKind, given: &Option<LinkSource>, default: LinkRates) -> Brought<ModelParameters> {
    match given {
        Some(source) => Brought::embedded(LinkRates::new(kind, source.clone())),
        None => Brought::implied(default),
    }
}

fn hill(given: Option<FloatValue>, default: FloatValue) -> Brought<ModelParameters> {
    match given {
        Some(h) => Brought::embedded(HillExponent(h)),
        None => Brought::implied(HillExponent(default)),
    }
}

fn response_aliases() -> &'static AliasingSystem {
    static ALIASES: OnceLock<AliasingSystem> = OnceLock::new();
    ALIASES.get_or_init(|| {
        AliasingSystem::new(
            "functional response arguments",
            [
                ("efficiency", vec!["e"]),
                ("consumers_preferences", vec!["w", "preferences"]),
                ("hill_exponent", vec!["h"]),
                ("intraspecific_interference", vec!["c", "interference"]),
                ("max_consumption", vec!["y"]),
                ("half_saturation_density", vec!["B0"]),
                ("attack_rate", vec!["a_r", "ar"]),
                ("handling_time", vec!["h_t", "ht"]),
                ("consumption_rate", vec!["alpha"]),
            ],
        )
        .expect("functional response argument aliases are unambiguous")
    })
}

/// Bioenergetic response (Yodzis & Innes), reading efficiencies, maximum consumption rates,
/// half-saturation densities, preferences, the hill exponent and intraspecific interference.
/// Metabolic rates scale consumption and must be provided separately.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BioenergeticResponse {
    pub efficiency: Option<LinkSource>,
    pub max_consumption: Option<RateSource>,
    pub half_saturation_density: Option<RateSource>,
    pub consumers_preferences: Option<LinkSource>,
    pub hill_exponent: Option<FloatValue>,
    pub intraspecific_interference: Option<RateSource>,
}

impl BioenergeticResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from named arguments, e.g. `[("e", 0.5.into()), ("h", 1.0.into())]`.
    pub fn from_args<I, S>(args: I) -> EndynResult<Self>
    where
        I: IntoIterator<Item = (S, PropertyValue)>,
        S: AsRef<str>,
    {
        let mut args = Args::parse("BioenergeticResponse", response_aliases(), args)?;
        let response = Self {
            efficiency: args.take_links("efficiency")?,
            max_consumption: args.take_rates("max_consumption")?,
            half_saturation_density: args.take_rates("half_saturation_density")?,
            consumers_preferences: args.take_links("consumers_preferences")?,
            hill_exponent: args.take_scalar("hill_exponent")?,
            intraspecific_interference: args.take_rates("intraspecific_interference")?,
        };
        args.finish()?;
        Ok(response)
    }

    pub fn with_efficiency(mut self, source: LinkSource) -> Self {
        self.efficiency = Some(source);
        self
    }

    pub fn with_max_consumption(mut self, source: RateSource) -> Self {
        self.max_consumption = Some(source);
        self
    }

    pub fn with_half_saturation_density(mut self, source: RateSource) -> Self {
        self.half_saturation_density = Some(source);
        self
    }

    pub fn with_hill_exponent(mut self, h: FloatValue) -> Self {
        self.hill_exponent = Some(h);
        self
    }

    pub fn with_intraspecific_interference(mut self, source: RateSource) -> Self {
        self.intraspecific_interference = Some(source);
        self
    }
}

impl Blueprint<ModelParameters> for BioenergeticResponse {
    fn component(&self) -> ComponentId {
        ids::BIOENERGETIC_RESPONSE
    }

    fn name(&self) -> &'static str {
        "BioenergeticResponse"
    }

    fn brought(&self) -> Vec<Brought<ModelParameters>> {
        vec![
            links(
                LinkKind::Efficiency,
                &self.efficiency,
                LinkRates::efficiency_by_diet(),
            ),
            rates(
                RateKind::MaxConsumption,
                &self.max_consumption,
                Rates::allometric(RateKind::MaxConsumption, Allometry::MAX_CONSUMPTION),
            ),
            rates(
                RateKind::HalfSaturationDensity,
                &self.half_saturation_density,
                Rates::flat(RateKind::HalfSaturationDensity, 0.5),
            ),
            links(
                LinkKind::ConsumersPreferences,
                &self.consumers_preferences,
                LinkRates::homogeneous_preferences(),
            ),
            hill(self.hill_exponent, 2.0),
            rates(
                RateKind::IntraspecificInterference,
                &self.intraspecific_interference,
                Rates::flat(RateKind::IntraspecificInterference, 0.0),
            ),
        ]
    }

    fn expand(&self, model: &mut ModelParameters) {
        model.functional_response = Some(ResponseKind::Bioenergetic);
    }
}

/// Classic (Holling) response, reading attack rates, handling times, efficiencies,
/// preferences, the hill exponent, intraspecific interference and body masses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassicResponse {
    pub attack_rate: Option<LinkSource>,
    pub handling_time: Option<LinkSource>,
    pub efficiency: Option<LinkSource>,
    pub consumers_preferences: Option<LinkSource>,
    pub hill_exponent: Option<FloatValue>,
    pub intraspecific_interference: Option<RateSource>,
}

impl ClassicResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_args<I, S>(args: I) -> EndynResult<Self>
    where
        I: IntoIterator<Item = (S, PropertyValue)>,
        S: AsRef<str>,
    {
        let mut args = Args::parse("ClassicResponse", response_aliases(), args)?;
        let response = Self {
            attack_rate: args.take_links("attack_rate")?,
            handling_time: args.take_links("handling_time")?,
            efficiency: args.take_links("efficiency")?,
            consumers_preferences: args.take_links("consumers_preferences")?,
            hill_exponent: args.take_scalar("hill_exponent")?,
            intraspecific_interference: args.take_rates("intraspecific_interference")?,
        };
        args.finish()?;
        Ok(response)
    }

    pub fn with_attack_rate(mut self, source: LinkSource) -> Self {
        self.attack_rate = Some(source);
        self
    }

    pub fn with_handling_time(mut self, source: LinkSource) -> Self {
        self.handling_time = Some(source);
        self
    }

    pub fn with_efficiency(mut self, source: LinkSource) -> Self {
        self.efficiency = Some(source);
        self
    }

    pub fn with_hill_exponent(mut self, h: FloatValue) -> Self {
        self.hill_exponent = Some(h);
        self
    }

    pub fn with_intraspecific_interference(mut self, source: RateSource) -> Self {
        self.intraspecific_interference = Some(source);
        self
    }
}

impl Blueprint<ModelParameters> for ClassicResponse {
    fn component(&self) -> ComponentId {
        ids::CLASSIC_RESPONSE
    }

    fn name(&self) -> &'static str {
        "ClassicResponse"
    }

    fn brought(&self) -> Vec<Brought<ModelParameters>> {
        vec![
            links(
                LinkKind::AttackRate,
                &self.attack_rate,
                LinkRates::flat(LinkKind::AttackRate, 1.0),
            ),
            links(
                LinkKind::HandlingTime,
                &self.handling_time,
                LinkRates::flat(LinkKind::HandlingTime, 1.0),
            ),
            links(
                LinkKind::Efficiency,
                &self.efficiency,
                LinkRates::efficiency_by_diet(),
            ),
            links(
                LinkKind::ConsumersPreferences,
                &self.consumers_preferences,
                LinkRates::homogeneous_preferences(),
            ),
            hill(self.hill_exponent, 2.0),
            rates(
                RateKind::IntraspecificInterference,
                &self.intraspecific_interference,
                Rates::flat(RateKind::IntraspecificInterference, 0.0),
            ),
        ]
    }

    fn expand(&self, model: &mut ModelParameters) {
        model.functional_response = Some(ResponseKind::Classic);
    }
}

/// Linear response: consumption proportional to resource biomass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearResponse {
    pub consumption_rate: Option<RateSource>,
    pub efficiency: Option<LinkSource>,
    pub consumers_preferences: Option<LinkSource>,
}

impl LinearResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_args<I, S>(args: I) -> EndynResult<Self>
    where
        I: IntoIterator<Item = (S, PropertyValue)>,
        S: AsRef<str>,
    {
        let mut args = Args::parse("LinearResponse", response_aliases(), args)?;
        let response = Self {
            consumption_rate: args.take_rates("consumption_rate")?,
            efficiency: args.take_links("efficiency")?,
            consumers_preferences: args.take_links("consumers_preferences")?,
        };
        args.finish()?;
        Ok(response)
    }

    pub fn with_consumption_rate(mut self, source: RateSource) -> Self {
        self.consumption_rate = Some(source);
        self
    }
}

impl Blueprint<ModelParameters> for LinearResponse {
    fn component(&self) -> ComponentId {
        ids::LINEAR_RESPONSE
    }

    fn name(&self) -> &'static str {
        "LinearResponse"
    }

    fn brought(&self) -> Vec<Brought<ModelParameters>> {
        vec![
            rates(
                RateKind::ConsumptionRate,
                &self.consumption_rate,
                Rates::flat(RateKind::ConsumptionRate, 1.0),
            ),
            links(
                LinkKind::Efficiency,
                &self.efficiency,
                LinkRates::efficiency_by_diet(),
            ),
            links(
                LinkKind::ConsumersPreferences,
                &self.consumers_preferences,
                LinkRates::homogeneous_preferences(),
            ),
        ]
    }

    fn expand(&self, model: &mut ModelParameters) {
        model.functional_response = Some(ResponseKind::Linear);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprints::{Foodweb, MetabolicClasses};
    use crate::model::Model;
    use endyn_core::errors::EndynError;
    use endyn_core::params::MetabolicClass;
    use ndarray::array;

    fn pair() -> Model {
        let mut model = Model::new();
        model
            .add(Foodweb::matrix(array![[false, false], [true, false]]))
            .unwrap();
        model
            .add(MetabolicClasses::favor(MetabolicClass::Invertebrate))
            .unwrap();
        model
    }

    #[test]
    fn defaults_are_implied() {
        let mut model = pair();
        model.add(BioenergeticResponse::default()).unwrap();
        assert_eq!(model.parameters().functional_response, Some(ResponseKind::Bioenergetic));
        assert_eq!(model.blueprint_of(ids::EFFICIENCY), Some("LinkRates::Diet"));
        assert_eq!(model.matrix("e").unwrap()[[1, 0]], 0.45);
        assert_eq!(model.vector("y").unwrap(), array![0.0, 8.0]);
        assert_eq!(model.vector("B0").unwrap(), array![0.0, 0.5]);
        assert_eq!(model.get("h").unwrap().as_scalar(), Some(2.0));
    }

    #[test]
    fn implied_defaults_yield_to_existing_components() {
        let mut model = pair();
        model.add(HillExponent(1.0)).unwrap();
        model.add(BioenergeticResponse::default()).unwrap();
        assert_eq!(model.parameters().hill_exponent, Some(1.0));
    }

    #[test]
    fn explicit_values_are_embedded() {
        let mut model = pair();
        model.add(HillExponent(1.0)).unwrap();
        let err = model
            .add(BioenergeticResponse::new().with_hill_exponent(1.5))
            .unwrap_err();
        assert!(matches!(err, EndynError::ComponentAlreadyPresent { ref component, .. } if component == "HillExponent"));
        assert!(!model.has_component(ids::BIOENERGETIC_RESPONSE));
        assert!(!model.has_component(ids::EFFICIENCY));
    }

    #[test]
    fn flavours_conflict() {
        let mut model = pair();
        model.add(LinearResponse::default()).unwrap();
        let err = model.add(ClassicResponse::default()).unwrap_err();
        assert!(matches!(
            err,
            EndynError::ConflictingComponents { ref blueprint, ref other_blueprint, .. }
                if blueprint == "ClassicResponse" && other_blueprint == "LinearResponse"
        ));
        assert_eq!(model.parameters().functional_response, Some(ResponseKind::Linear));
    }

    #[test]
    fn classic_response_needs_body_mass() {
        let mut model = pair();
        let err = model.add(ClassicResponse::default()).unwrap_err();
        assert_eq!(
            err,
            EndynError::MissingRequiredComponent {
                blueprint: "ClassicResponse".to_string(),
                required: "BodyMass".to_string(),
            }
        );
    }

    #[test]
    fn named_arguments() {
        let response = ClassicResponse::from_args([
            ("a_r", PropertyValue::Scalar(2.0)),
            ("h", PropertyValue::Scalar(1.0)),
        ])
        .unwrap();
        assert_eq!(response.attack_rate, Some(LinkSource::Flat(2.0)));
        assert_eq!(response.hill_exponent, Some(1.0));
        assert_eq!(response.handling_time, None);

        let err = ClassicResponse::from_args([
            ("h", PropertyValue::Scalar(1.0)),
            ("hill_exponent", PropertyValue::Scalar(2.0)),
        ])
        .unwrap_err();
        assert!(matches!(err, EndynError::Argument { .. }));

        // Known to the aliasing system, but not read by this flavour.
        let err = LinearResponse::from_args([("y", PropertyValue::Scalar(4.0))]).unwrap_err();
        assert!(matches!(err, EndynError::Argument { .. }));
    }
}
