//! Producer growth models and the nutrient pool.

use super::{
    check_finite_non_negative, check_len, check_shape, check_unique, producers, CompetitionSource,
    ProducersCompetition, RateKind, RateSource, Rates,
};
use crate::args::Args;
use crate::ids;
use endyn_core::aliasing::AliasingSystem;
use endyn_core::errors::EndynResult;
use endyn_core::framework::{Blueprint, Brought, CheckFailure, CheckResult, ComponentId, PropertyValue};
use endyn_core::params::{GrowthKind, ModelParameters, Nutrients, NUTRIENTS};
use endyn_core::FloatValue;
use ndarray::{Array1, Array2};
use std::sync::OnceLock;

fn growth_aliases() -> &'static AliasingSystem {
    static ALIASES: OnceLock<AliasingSystem> = OnceLock::new();
    ALIASES.get_or_init(|| {
        AliasingSystem::new(
            "producer growth arguments",
            [
                ("carrying_capacity", vec!["K"]),
                ("producers_competition", vec!["competition"]),
                ("nutrients", vec!["n_nutrients", "l"]),
                ("turnover", vec!["nutrients_turnover", "D"]),
                ("supply", vec!["nutrients_supply", "S"]),
                ("concentration", vec!["nutrients_concentration"]),
                ("half_saturation", vec!["nutrients_half_saturation"]),
            ],
        )
        .expect("producer growth argument aliases are unambiguous")
    })
}

/// Logistic growth of producers, reading their carrying capacities and competition
/// coefficients. Growth rates must be provided separately.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogisticGrowth {
    pub carrying_capacity: Option<RateSource>,
    pub producers_competition: Option<CompetitionSource>,
}

impl LogisticGrowth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_args<I, S>(args: I) -> EndynResult<Self>
    where
        I: IntoIterator<Item = (S, PropertyValue)>,
        S: AsRef<str>,
    {
        let mut args = Args::parse("LogisticGrowth", growth_aliases(), args)?;
        let growth = Self {
            carrying_capacity: args.take_rates("carrying_capacity")?,
            producers_competition: args
                .take_matrix("producers_competition")?
                .map(CompetitionSource::Raw),
        };
        args.finish()?;
        Ok(growth)
    }

    pub fn with_carrying_capacity(mut self, source: RateSource) -> Self {
        self.carrying_capacity = Some(source);
        self
    }

    pub fn with_producers_competition(mut self, source: CompetitionSource) -> Self {
        self.producers_competition = Some(source);
        self
    }
}

impl Blueprint<ModelParameters> for LogisticGrowth {
    fn component(&self) -> ComponentId {
        ids::LOGISTIC_GROWTH
    }

    fn name(&self) -> &'static str {
        "LogisticGrowth"
    }

    fn brought(&self) -> Vec<Brought<ModelParameters>> {
        let capacity = match &self.carrying_capacity {
            Some(source) => Brought::embedded(Rates::new(RateKind::CarryingCapacity, source.clone())),
            None => Brought::implied(Rates::flat(RateKind::CarryingCapacity, 1.0)),
        };
        let competition = match &self.producers_competition {
            Some(source) => Brought::embedded(ProducersCompetition {
                source: source.clone(),
            }),
            None => Brought::implied(ProducersCompetition::diagonal(1.0)),
        };
        vec![capacity, competition]
    }

    fn expand(&self, model: &mut ModelParameters) {
        model.producer_growth = Some(GrowthKind::Logistic);
    }
}

/// The nutrient compartment.
#[derive(Debug, Clone, PartialEq)]
pub struct NutrientNodes {
    names: Vec<String>,
}

impl NutrientNodes {
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// `n` nutrients labelled `n1` to `nn`.
    pub fn count(n: usize) -> Self {
        Self::names((1..=n).map(|i| format!("n{}", i)))
    }
}

impl Blueprint<ModelParameters> for NutrientNodes {
    fn component(&self) -> ComponentId {
        ids::NUTRIENTS
    }

    fn name(&self) -> &'static str {
        "NutrientNodes"
    }

    fn early_check(&self) -> CheckResult {
        if self.names.is_empty() {
            return Err(CheckFailure::new("nutrients", "at least one nutrient is needed"));
        }
        check_unique("nutrients", self.names.iter().map(String::as_str))
    }

    fn late_check(&self, model: &ModelParameters) -> CheckResult {
        if model.topology.has_node_compartment(NUTRIENTS) {
            return Err(CheckFailure::new("nutrients", "nutrients are already defined"));
        }
        Ok(())
    }

    fn expand(&self, model: &mut ModelParameters) {
        model
            .topology
            .add_node_compartment(NUTRIENTS, &self.names)
            .expect("nutrient names checked before expansion");
        model.nutrients = Some(Nutrients {
            names: self.names.clone(),
            ..Nutrients::default()
        });
    }
}

/// A quantity of the nutrient pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NutrientQuantity {
    /// One value per nutrient.
    Turnover,
    /// One value per nutrient.
    Supply,
    /// One value per producer and nutrient.
    Concentration,
    /// One value per producer and nutrient.
    HalfSaturation,
}

impl NutrientQuantity {
    pub fn component(self) -> ComponentId {
        match self {
            NutrientQuantity::Turnover => ids::NUTRIENTS_TURNOVER,
            NutrientQuantity::Supply => ids::NUTRIENTS_SUPPLY,
            NutrientQuantity::Concentration => ids::NUTRIENTS_CONCENTRATION,
            NutrientQuantity::HalfSaturation => ids::NUTRIENTS_HALF_SATURATION,
        }
    }

    pub fn property(self) -> &'static str {
        match self {
            NutrientQuantity::Turnover => "nutrients_turnover",
            NutrientQuantity::Supply => "nutrients_supply",
            NutrientQuantity::Concentration => "nutrients_concentration",
            NutrientQuantity::HalfSaturation => "nutrients_half_saturation",
        }
    }

    fn per_producer(self) -> bool {
        matches!(
            self,
            NutrientQuantity::Concentration | NutrientQuantity::HalfSaturation
        )
    }

    pub fn value(self, model: &ModelParameters) -> Option<PropertyValue> {
        let nutrients = model.nutrients.as_ref()?;
        match self {
            NutrientQuantity::Turnover => nutrients.turnover.clone().map(Into::into),
            NutrientQuantity::Supply => nutrients.supply.clone().map(Into::into),
            NutrientQuantity::Concentration => nutrients.concentration.clone().map(Into::into),
            NutrientQuantity::HalfSaturation => nutrients.half_saturation.clone().map(Into::into),
        }
    }

    pub(crate) fn write(self, model: &mut ModelParameters, value: PropertyValue) {
        let Some(nutrients) = model.nutrients.as_mut() else {
            return;
        };
        match (self, value) {
            (NutrientQuantity::Turnover, PropertyValue::Vector(v)) => nutrients.turnover = Some(v),
            (NutrientQuantity::Supply, PropertyValue::Vector(v)) => nutrients.supply = Some(v),
            (NutrientQuantity::Concentration, PropertyValue::Matrix(m)) => {
                nutrients.concentration = Some(m)
            }
            (NutrientQuantity::HalfSaturation, PropertyValue::Matrix(m)) => {
                nutrients.half_saturation = Some(m)
            }
            _ => {}
        }
    }
}

/// Where the values of a nutrient quantity come from.
#[derive(Debug, Clone, PartialEq)]
pub enum NutrientSource {
    /// Same value for every nutrient, or for every producer and nutrient.
    Flat(FloatValue),
    PerNutrient(Array1<FloatValue>),
    /// `species × nutrients`, rows of consumers being zero.
    PerProducer(Array2<FloatValue>),
}

impl NutrientSource {
    fn from_value(value: PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Scalar(v) => Some(NutrientSource::Flat(v)),
            PropertyValue::Vector(v) => Some(NutrientSource::PerNutrient(v)),
            PropertyValue::Matrix(m) => Some(NutrientSource::PerProducer(m)),
            _ => None,
        }
    }
}

/// Validate a nutrient quantity against the model.
pub(crate) fn check_nutrient_values(
    quantity: NutrientQuantity,
    model: &ModelParameters,
    value: &PropertyValue,
) -> CheckResult {
    let field = quantity.property();
    let l = model.n_nutrients();
    match (quantity.per_producer(), value) {
        (false, PropertyValue::Vector(v)) => {
            check_len(field, v.len(), l)?;
            check_finite_non_negative(field, v)
        }
        (true, PropertyValue::Matrix(m)) => {
            let producers = producers(model, field)?;
            check_shape(field, m.dim(), (producers.len(), l))?;
            check_finite_non_negative(field, m)?;
            for ((i, _), v) in m.indexed_iter() {
                if !producers[i] && *v != 0.0 {
                    return Err(CheckFailure::new(
                        field,
                        format!("consumer {} must have zero values", i),
                    ));
                }
                if producers[i] && quantity == NutrientQuantity::HalfSaturation && *v == 0.0 {
                    return Err(CheckFailure::new(
                        field,
                        format!("producer {} must have positive half-saturation densities", i),
                    ));
                }
            }
            Ok(())
        }
        (_, other) => Err(CheckFailure::new(
            field,
            format!("unexpected {} value", other.kind()),
        )),
    }
}

/// A quantity of the nutrient pool.
#[derive(Debug, Clone, PartialEq)]
pub struct NutrientRates {
    pub quantity: NutrientQuantity,
    pub source: NutrientSource,
}

impl NutrientRates {
    pub fn new(quantity: NutrientQuantity, source: NutrientSource) -> Self {
        Self { quantity, source }
    }

    pub fn flat(quantity: NutrientQuantity, value: FloatValue) -> Self {
        Self::new(quantity, NutrientSource::Flat(value))
    }

    fn compute(&self, model: &ModelParameters) -> Result<PropertyValue, CheckFailure> {
        let field = self.quantity.property();
        let l = model.n_nutrients();
        match (&self.source, self.quantity.per_producer()) {
            (NutrientSource::Flat(v), false) => Ok(Array1::from_elem(l, *v).into()),
            (NutrientSource::Flat(v), true) => {
                let producers = producers(model, field)?;
                Ok(Array2::from_shape_fn((producers.len(), l), |(i, _)| {
                    if producers[i] {
                        *v
                    } else {
                        0.0
                    }
                })
                .into())
            }
            (NutrientSource::PerNutrient(v), false) => Ok(v.clone().into()),
            (NutrientSource::PerProducer(m), true) => Ok(m.clone().into()),
            (NutrientSource::PerNutrient(_), true) => Err(CheckFailure::new(
                field,
                "expected one value per producer and nutrient",
            )),
            (NutrientSource::PerProducer(_), false) => {
                Err(CheckFailure::new(field, "expected one value per nutrient"))
            }
        }
    }
}

impl Blueprint<ModelParameters> for NutrientRates {
    fn component(&self) -> ComponentId {
        self.quantity.component()
    }

    fn name(&self) -> &'static str {
        match self.source {
            NutrientSource::Flat(_) => "NutrientRates::Flat",
            NutrientSource::PerNutrient(_) => "NutrientRates::PerNutrient",
            NutrientSource::PerProducer(_) => "NutrientRates::PerProducer",
        }
    }

    fn early_check(&self) -> CheckResult {
        let field = self.quantity.property();
        match &self.source {
            NutrientSource::Flat(v) => check_finite_non_negative(field, [v]),
            NutrientSource::PerNutrient(v) => check_finite_non_negative(field, v),
            NutrientSource::PerProducer(m) => check_finite_non_negative(field, m),
        }
    }

    fn late_check(&self, model: &ModelParameters) -> CheckResult {
        check_nutrient_values(self.quantity, model, &self.compute(model)?)
    }

    fn expand(&self, model: &mut ModelParameters) {
        let value = self.compute(model).expect("late_check accepted this model");
        self.quantity.write(model, value);
    }
}

/// Producer growth limited by the most limiting nutrient, with nutrient dynamics
/// `dN_l = D_l (S_l - N_l) - Σ_i c_il G_i`.
///
/// Defaults to two nutrients with turnover 0.25, supply 4, and unit concentrations
/// and half-saturation densities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NutrientIntake {
    pub nutrients: Option<NutrientNodes>,
    pub turnover: Option<NutrientSource>,
    pub supply: Option<NutrientSource>,
    pub concentration: Option<NutrientSource>,
    pub half_saturation: Option<NutrientSource>,
}

impl NutrientIntake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_args<I, S>(args: I) -> EndynResult<Self>
    where
        I: IntoIterator<Item = (S, PropertyValue)>,
        S: AsRef<str>,
    {
        let mut args = Args::parse("NutrientIntake", growth_aliases(), args)?;
        let nutrients = match args.take("nutrients") {
            None => None,
            Some((_, PropertyValue::Size(n))) => Some(NutrientNodes::count(n)),
            Some((_, PropertyValue::Labels(names))) => Some(NutrientNodes::names(names)),
            Some((given, other)) => {
                return Err(args.mismatch(&given, "a count or names", &other));
            }
        };
        let mut source = |name: &str| -> EndynResult<Option<NutrientSource>> {
            match args.take(name) {
                None => Ok(None),
                Some((given, value)) => NutrientSource::from_value(value.clone())
                    .map(Some)
                    .ok_or_else(|| args.mismatch(&given, "a number, vector or matrix", &value)),
            }
        };
        let intake = Self {
            nutrients,
            turnover: source("turnover")?,
            supply: source("supply")?,
            concentration: source("concentration")?,
            half_saturation: source("half_saturation")?,
        };
        args.finish()?;
        Ok(intake)
    }

    pub fn with_nutrients(mut self, nutrients: NutrientNodes) -> Self {
        self.nutrients = Some(nutrients);
        self
    }

    pub fn with_turnover(mut self, source: NutrientSource) -> Self {
        self.turnover = Some(source);
        self
    }

    pub fn with_supply(mut self, source: NutrientSource) -> Self {
        self.supply = Some(source);
        self
    }

    pub fn with_concentration(mut self, source: NutrientSource) -> Self {
        self.concentration = Some(source);
        self
    }

    pub fn with_half_saturation(mut self, source: NutrientSource) -> Self {
        self.half_saturation = Some(source);
        self
    }
}

impl Blueprint<ModelParameters> for NutrientIntake {
    fn component(&self) -> ComponentId {
        ids::NUTRIENT_INTAKE
    }

    fn name(&self) -> &'static str {
        "NutrientIntake"
    }

    fn brought(&self) -> Vec<Brought<ModelParameters>> {
        let quantity = |quantity: NutrientQuantity, given: &Option<NutrientSource>, default| {
            match given {
                Some(source) => Brought::embedded(NutrientRates::new(quantity, source.clone())),
                None => Brought::implied(NutrientRates::flat(quantity, default)),
            }
        };
        let nodes = match &self.nutrients {
            Some(nodes) => Brought::embedded(nodes.clone()),
            None => Brought::implied(NutrientNodes::count(2)),
        };
        vec![
            nodes,
            quantity(NutrientQuantity::Turnover, &self.turnover, 0.25),
            quantity(NutrientQuantity::Supply, &self.supply, 4.0),
            quantity(NutrientQuantity::Concentration, &self.concentration, 1.0),
            quantity(NutrientQuantity::HalfSaturation, &self.half_saturation, 1.0),
        ]
    }

    fn expand(&self, model: &mut ModelParameters) {
        model.producer_growth = Some(GrowthKind::NutrientIntake);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprints::Foodweb;
    use crate::model::Model;
    use endyn_core::errors::EndynError;
    use ndarray::array;

    fn pair() -> Model {
        let mut model = Model::new();
        model
            .add(Foodweb::matrix(array![[false, false], [true, false]]))
            .unwrap();
        model
    }

    #[test]
    fn logistic_defaults() {
        let mut model = pair();
        model.add(LogisticGrowth::default()).unwrap();
        assert_eq!(model.parameters().producer_growth, Some(GrowthKind::Logistic));
        assert_eq!(model.vector("K").unwrap(), array![1.0, 0.0]);
        assert_eq!(
            model.matrix("producers_competition").unwrap(),
            array![[1.0, 0.0], [0.0, 0.0]]
        );
    }

    #[test]
    fn nutrient_intake_defaults() {
        let mut model = pair();
        model.add(NutrientIntake::default()).unwrap();
        let params = model.parameters();
        assert_eq!(params.producer_growth, Some(GrowthKind::NutrientIntake));
        assert_eq!(params.n_nutrients(), 2);
        let nutrients = params.nutrients.as_ref().unwrap();
        assert_eq!(nutrients.turnover, Some(array![0.25, 0.25]));
        assert_eq!(nutrients.supply, Some(array![4.0, 4.0]));
        assert_eq!(
            nutrients.concentration,
            Some(array![[1.0, 1.0], [0.0, 0.0]])
        );
        assert_eq!(
            model.get("n_nutrients").unwrap(),
            PropertyValue::Size(2)
        );
    }

    #[test]
    fn growth_models_conflict() {
        let mut model = pair();
        model.add(LogisticGrowth::default()).unwrap();
        assert!(matches!(
            model.add(NutrientIntake::default()),
            Err(EndynError::ConflictingComponents { .. })
        ));
        assert!(!model.has_component(ids::NUTRIENTS));
    }

    #[test]
    fn nutrient_arguments() {
        let intake = NutrientIntake::from_args([
            ("l", PropertyValue::Size(3)),
            ("S", PropertyValue::Vector(array![1.0, 2.0, 3.0])),
        ])
        .unwrap();
        let mut model = pair();
        model.add(intake).unwrap();
        assert_eq!(model.parameters().n_nutrients(), 3);
        assert_eq!(model.vector("nutrients_supply").unwrap(), array![1.0, 2.0, 3.0]);

        let mut model = pair();
        let intake = NutrientIntake::from_args([
            ("nutrients", PropertyValue::Size(2)),
            ("supply", PropertyValue::Vector(array![1.0, 2.0, 3.0])),
        ])
        .unwrap();
        assert!(matches!(model.add(intake), Err(EndynError::LateCheck { .. })));
        assert_eq!(model.n_components(), 2);

        assert!(matches!(
            NutrientIntake::from_args([("D", PropertyValue::Text("fast".to_string()))]),
            Err(EndynError::Argument { .. })
        ));
    }

    #[test]
    fn nutrient_writes_are_checked() {
        let mut model = pair();
        model.add(NutrientIntake::default()).unwrap();
        assert!(model
            .set("nutrients_half_saturation", array![[1.0, 0.0], [0.0, 0.0]])
            .is_err());
        assert!(model
            .set("nutrients_concentration", array![[1.0, 1.0], [1.0, 0.0]])
            .is_err());
        model
            .set("nutrients_concentration", array![[0.5, 2.0], [0.0, 0.0]])
            .unwrap();
        assert_eq!(
            model.matrix("nutrients_concentration").unwrap()[[0, 1]],
            2.0
        );
    }
}
