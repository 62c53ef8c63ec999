//! Per-link rates, producer competition and the hill exponent.

use super::{check_finite_non_negative, check_shape, producers, species_index};
use crate::ids;
use endyn_core::framework::{Blueprint, CheckFailure, CheckResult, ComponentId};
use endyn_core::params::ModelParameters;
use endyn_core::FloatValue;
use ndarray::Array2;

/// A rate attached to every trophic link, as a `species × species` matrix
/// that is zero wherever there is no link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    Efficiency,
    ConsumersPreferences,
    AttackRate,
    HandlingTime,
}

impl LinkKind {
    pub fn all() -> [LinkKind; 4] {
        [
            LinkKind::Efficiency,
            LinkKind::ConsumersPreferences,
            LinkKind::AttackRate,
            LinkKind::HandlingTime,
        ]
    }

    pub fn component(self) -> ComponentId {
        match self {
            LinkKind::Efficiency => ids::EFFICIENCY,
            LinkKind::ConsumersPreferences => ids::CONSUMERS_PREFERENCES,
            LinkKind::AttackRate => ids::ATTACK_RATE,
            LinkKind::HandlingTime => ids::HANDLING_TIME,
        }
    }

    pub fn property(self) -> &'static str {
        match self {
            LinkKind::Efficiency => "efficiency",
            LinkKind::ConsumersPreferences => "consumers_preferences",
            LinkKind::AttackRate => "attack_rate",
            LinkKind::HandlingTime => "handling_time",
        }
    }

    pub fn value(self, model: &ModelParameters) -> Option<&Array2<FloatValue>> {
        match self {
            LinkKind::Efficiency => model.efficiency.as_ref(),
            LinkKind::ConsumersPreferences => model.consumers_preferences.as_ref(),
            LinkKind::AttackRate => model.attack_rate.as_ref(),
            LinkKind::HandlingTime => model.handling_time.as_ref(),
        }
    }

    pub(crate) fn slot(self, model: &mut ModelParameters) -> &mut Option<Array2<FloatValue>> {
        match self {
            LinkKind::Efficiency => &mut model.efficiency,
            LinkKind::ConsumersPreferences => &mut model.consumers_preferences,
            LinkKind::AttackRate => &mut model.attack_rate,
            LinkKind::HandlingTime => &mut model.handling_time,
        }
    }
}

/// Validate a link matrix against the food web of the model.
pub(crate) fn check_links(
    kind: LinkKind,
    model: &ModelParameters,
    values: &Array2<FloatValue>,
) -> CheckResult {
    let field = kind.property();
    let trophic = model
        .trophic()
        .ok_or_else(|| CheckFailure::new(field, "no food web in the model"))?;
    check_shape(field, values.dim(), trophic.dim())?;
    check_finite_non_negative(field, values)?;
    let names = model.species_names();
    for ((i, j), v) in values.indexed_iter() {
        if !trophic[[i, j]] && *v != 0.0 {
            return Err(CheckFailure::new(
                field,
                format!(
                    "value {} for {:?} eating {:?} must be zero without a trophic link",
                    v, names[i], names[j]
                ),
            ));
        }
        if kind == LinkKind::Efficiency && *v > 1.0 {
            return Err(CheckFailure::new(
                field,
                format!("efficiency {} of {:?} eating {:?} exceeds 1", v, names[i], names[j]),
            ));
        }
    }
    Ok(())
}

/// Where the values of a link rate come from.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkSource {
    /// Same value on every trophic link.
    Flat(FloatValue),
    Raw(Array2<FloatValue>),
    /// `(consumer, resource, value)` entries, zero elsewhere.
    Map(Vec<(String, String, FloatValue)>),
    /// Efficiency depending on the diet: herbivory when the resource is a producer,
    /// carnivory otherwise.
    Diet {
        herbivory: FloatValue,
        carnivory: FloatValue,
    },
    /// Every consumer splits its preference equally among its resources.
    Homogeneous,
}

/// A per-link rate.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRates {
    pub kind: LinkKind,
    pub source: LinkSource,
}

impl LinkRates {
    pub fn new(kind: LinkKind, source: LinkSource) -> Self {
        Self { kind, source }
    }

    pub fn flat(kind: LinkKind, value: FloatValue) -> Self {
        Self::new(kind, LinkSource::Flat(value))
    }

    pub fn raw(kind: LinkKind, values: Array2<FloatValue>) -> Self {
        Self::new(kind, LinkSource::Raw(values))
    }

    pub fn map<I, C, R>(kind: LinkKind, values: I) -> Self
    where
        I: IntoIterator<Item = (C, R, FloatValue)>,
        C: Into<String>,
        R: Into<String>,
    {
        Self::new(
            kind,
            LinkSource::Map(
                values
                    .into_iter()
                    .map(|(c, r, v)| (c.into(), r.into(), v))
                    .collect(),
            ),
        )
    }

    /// Assimilation efficiency of 0.45 on producers and 0.85 on consumers.
    pub fn efficiency_by_diet() -> Self {
        Self::new(
            LinkKind::Efficiency,
            LinkSource::Diet {
                herbivory: 0.45,
                carnivory: 0.85,
            },
        )
    }

    pub fn homogeneous_preferences() -> Self {
        Self::new(LinkKind::ConsumersPreferences, LinkSource::Homogeneous)
    }

    fn compute(&self, model: &ModelParameters) -> Result<Array2<FloatValue>, CheckFailure> {
        let field = self.kind.property();
        let trophic = model
            .trophic()
            .ok_or_else(|| CheckFailure::new(field, "no food web in the model"))?;
        match &self.source {
            LinkSource::Flat(value) => Ok(trophic.mapv(|l| if l { *value } else { 0.0 })),
            LinkSource::Raw(values) => Ok(values.clone()),
            LinkSource::Map(values) => {
                let mut rates = Array2::zeros(trophic.dim());
                for (consumer, resource, value) in values {
                    let i = species_index(model, field, consumer)?;
                    let j = species_index(model, field, resource)?;
                    rates[[i, j]] = *value;
                }
                Ok(rates)
            }
            LinkSource::Diet {
                herbivory,
                carnivory,
            } => {
                let producers = producers(model, field)?;
                Ok(Array2::from_shape_fn(trophic.dim(), |(i, j)| {
                    match (trophic[[i, j]], producers[j]) {
                        (false, _) => 0.0,
                        (true, true) => *herbivory,
                        (true, false) => *carnivory,
                    }
                }))
            }
            LinkSource::Homogeneous => {
                let counts: Vec<usize> = trophic
                    .outer_iter()
                    .map(|row| row.iter().filter(|l| **l).count())
                    .collect();
                Ok(Array2::from_shape_fn(trophic.dim(), |(i, j)| {
                    if trophic[[i, j]] {
                        1.0 / counts[i] as FloatValue
                    } else {
                        0.0
                    }
                }))
            }
        }
    }
}

impl Blueprint<ModelParameters> for LinkRates {
    fn component(&self) -> ComponentId {
        self.kind.component()
    }

    fn name(&self) -> &'static str {
        match self.source {
            LinkSource::Flat(_) => "LinkRates::Flat",
            LinkSource::Raw(_) => "LinkRates::Raw",
            LinkSource::Map(_) => "LinkRates::Map",
            LinkSource::Diet { .. } => "LinkRates::Diet",
            LinkSource::Homogeneous => "LinkRates::Homogeneous",
        }
    }

    fn early_check(&self) -> CheckResult {
        let field = self.kind.property();
        match &self.source {
            LinkSource::Flat(value) => check_finite_non_negative(field, [value]),
            LinkSource::Raw(values) => check_finite_non_negative(field, values),
            LinkSource::Map(values) => {
                check_finite_non_negative(field, values.iter().map(|(_, _, v)| v))
            }
            LinkSource::Diet {
                herbivory,
                carnivory,
            } => {
                if self.kind != LinkKind::Efficiency {
                    return Err(CheckFailure::new(field, "only efficiencies depend on the diet"));
                }
                check_finite_non_negative(field, [herbivory, carnivory])
            }
            LinkSource::Homogeneous if self.kind != LinkKind::ConsumersPreferences => Err(
                CheckFailure::new(field, "only preferences can be homogeneous"),
            ),
            LinkSource::Homogeneous => Ok(()),
        }
    }

    fn late_check(&self, model: &ModelParameters) -> CheckResult {
        check_links(self.kind, model, &self.compute(model)?)
    }

    fn expand(&self, model: &mut ModelParameters) {
        let values = self.compute(model).expect("late_check accepted this model");
        *self.kind.slot(model) = Some(values);
    }
}

/// Competition coefficients `s_ij` of the logistic growth, between producers only.
#[derive(Debug, Clone, PartialEq)]
pub enum CompetitionSource {
    /// Producers only compete with themselves, with the given coefficient.
    Diagonal(FloatValue),
    Raw(Array2<FloatValue>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProducersCompetition {
    pub source: CompetitionSource,
}

impl ProducersCompetition {
    pub fn diagonal(value: FloatValue) -> Self {
        Self {
            source: CompetitionSource::Diagonal(value),
        }
    }

    pub fn raw(values: Array2<FloatValue>) -> Self {
        Self {
            source: CompetitionSource::Raw(values),
        }
    }

    fn compute(&self, model: &ModelParameters) -> Result<Array2<FloatValue>, CheckFailure> {
        let producers = producers(model, "producers_competition")?;
        let n = producers.len();
        match &self.source {
            CompetitionSource::Diagonal(value) => Ok(Array2::from_shape_fn((n, n), |(i, j)| {
                if i == j && producers[i] {
                    *value
                } else {
                    0.0
                }
            })),
            CompetitionSource::Raw(values) => Ok(values.clone()),
        }
    }
}

pub(crate) fn check_competition(model: &ModelParameters, values: &Array2<FloatValue>) -> CheckResult {
    let field = "producers_competition";
    let producers = producers(model, field)?;
    let n = producers.len();
    check_shape(field, values.dim(), (n, n))?;
    check_finite_non_negative(field, values)?;
    for ((i, j), v) in values.indexed_iter() {
        if *v != 0.0 && !(producers[i] && producers[j]) {
            return Err(CheckFailure::new(
                field,
                format!("only producers compete, received {} at ({}, {})", v, i, j),
            ));
        }
    }
    Ok(())
}

impl Blueprint<ModelParameters> for ProducersCompetition {
    fn component(&self) -> ComponentId {
        ids::PRODUCERS_COMPETITION
    }

    fn name(&self) -> &'static str {
        match self.source {
            CompetitionSource::Diagonal(_) => "ProducersCompetition::Diagonal",
            CompetitionSource::Raw(_) => "ProducersCompetition::Raw",
        }
    }

    fn early_check(&self) -> CheckResult {
        match &self.source {
            CompetitionSource::Diagonal(value) => {
                check_finite_non_negative("producers_competition", [value])
            }
            CompetitionSource::Raw(values) => {
                check_finite_non_negative("producers_competition", values)
            }
        }
    }

    fn late_check(&self, model: &ModelParameters) -> CheckResult {
        check_competition(model, &self.compute(model)?)
    }

    fn expand(&self, model: &mut ModelParameters) {
        let values = self.compute(model).expect("late_check accepted this model");
        model.producers_competition = Some(values);
    }
}

/// Exponent `h` of the functional response: 1 gives a type II response, 2 a type III.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HillExponent(pub FloatValue);

pub(crate) fn check_hill_exponent(h: FloatValue) -> CheckResult {
    if h.is_finite() && h > 0.0 {
        Ok(())
    } else {
        Err(CheckFailure::new(
            "hill_exponent",
            format!("{} must be positive", h),
        ))
    }
}

impl Blueprint<ModelParameters> for HillExponent {
    fn component(&self) -> ComponentId {
        ids::HILL_EXPONENT
    }

    fn name(&self) -> &'static str {
        "HillExponent"
    }

    fn early_check(&self) -> CheckResult {
        check_hill_exponent(self.0)
    }

    fn expand(&self, model: &mut ModelParameters) {
        model.hill_exponent = Some(self.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprints::Foodweb;
    use crate::model::Model;
    use endyn_core::errors::EndynError;
    use ndarray::array;

    /// Omnivore `c` eats consumer `b` and producer `a`; `b` eats `a`.
    fn omnivory() -> Model {
        let mut model = Model::new();
        model
            .add(Foodweb::from_lists([("c", vec!["b", "a"]), ("b", vec!["a"])]))
            .unwrap();
        model
    }

    #[test]
    fn efficiency_by_diet() {
        let mut model = omnivory();
        model.add(LinkRates::efficiency_by_diet()).unwrap();
        // Species are ordered c, b, a.
        assert_eq!(
            model.matrix("e").unwrap(),
            array![[0.0, 0.85, 0.45], [0.0, 0.0, 0.45], [0.0, 0.0, 0.0]]
        );
    }

    #[test]
    fn homogeneous_preferences() {
        let mut model = omnivory();
        model.add(LinkRates::homogeneous_preferences()).unwrap();
        assert_eq!(
            model.matrix("w").unwrap(),
            array![[0.0, 0.5, 0.5], [0.0, 0.0, 1.0], [0.0, 0.0, 0.0]]
        );
    }

    #[test]
    fn link_values_need_a_link() {
        let mut model = omnivory();
        assert!(matches!(
            model.add(LinkRates::map(LinkKind::AttackRate, [("a", "b", 1.0)])),
            Err(EndynError::LateCheck { .. })
        ));
        model
            .add(LinkRates::map(LinkKind::AttackRate, [("c", "a", 2.0)]))
            .unwrap();
        assert_eq!(model.matrix("attack_rate").unwrap()[[0, 2]], 2.0);
        assert!(matches!(
            model.add(LinkRates::new(LinkKind::HandlingTime, LinkSource::Homogeneous)),
            Err(EndynError::EarlyCheck { .. })
        ));
        assert!(model.add(LinkRates::flat(LinkKind::Efficiency, 1.5)).is_err());
    }

    #[test]
    fn producers_competition() {
        let mut model = omnivory();
        assert!(model
            .add(ProducersCompetition::raw(Array2::ones((3, 3))))
            .is_err());
        model.add(ProducersCompetition::diagonal(1.0)).unwrap();
        let competition = model.matrix("producers_competition").unwrap();
        assert_eq!(competition.sum(), 1.0);
        assert_eq!(competition[[2, 2]], 1.0);
    }

    #[test]
    fn hill_exponent() {
        let mut model = Model::new();
        assert!(model.add(HillExponent(-1.0)).is_err());
        model.add(HillExponent(2.0)).unwrap();
        assert_eq!(model.get("h").unwrap().as_scalar(), Some(2.0));
        assert!(model.set("hill_exponent", 0.0).is_err());
        model.set("hill_exponent", 1.0).unwrap();
        assert_eq!(model.parameters().hill_exponent, Some(1.0));
    }
}
