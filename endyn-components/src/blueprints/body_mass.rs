use super::{check_finite_non_negative, check_len, producers};
use crate::ids;
use endyn_core::framework::{Blueprint, CheckFailure, CheckResult, ComponentId, PropertyValue};
use endyn_core::params::{trophic_levels, MetabolicClass, ModelParameters};
use endyn_core::FloatValue;
use ndarray::Array1;

#[derive(Debug, Clone, PartialEq)]
enum MassSource {
    Raw(Array1<FloatValue>),
    Flat(FloatValue),
    /// `M_i = Z^(TL_i - 1)` from the trophic level `TL_i` of each species.
    FromZ(FloatValue),
}

/// Body mass of every species.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyMass {
    source: MassSource,
}

impl BodyMass {
    pub fn raw(values: impl Into<Array1<FloatValue>>) -> Self {
        Self {
            source: MassSource::Raw(values.into()),
        }
    }

    pub fn flat(value: FloatValue) -> Self {
        Self {
            source: MassSource::Flat(value),
        }
    }

    /// Masses growing geometrically with the trophic level, producers weighing one.
    pub fn from_z(z: FloatValue) -> Self {
        Self {
            source: MassSource::FromZ(z),
        }
    }

    fn compute(&self, model: &ModelParameters) -> Result<Array1<FloatValue>, CheckFailure> {
        let n = model.richness();
        match &self.source {
            MassSource::Raw(values) => Ok(values.clone()),
            MassSource::Flat(value) => Ok(Array1::from_elem(n, *value)),
            MassSource::FromZ(z) => {
                let trophic = model
                    .trophic()
                    .ok_or_else(|| CheckFailure::new("Z", "no food web in the model"))?;
                let levels = trophic_levels(trophic)
                    .map_err(|e| CheckFailure::new("Z", e.to_string()))?;
                Ok(levels.mapv(|tl| z.powf(tl - 1.0)))
            }
        }
    }
}

pub(crate) fn check_body_mass(model: &ModelParameters, values: &Array1<FloatValue>) -> CheckResult {
    check_len("body_mass", values.len(), model.richness())?;
    check_finite_non_negative("body_mass", values)?;
    if let Some(i) = values.iter().position(|m| *m == 0.0) {
        return Err(CheckFailure::new(
            "body_mass",
            format!("mass of species {} must be positive", i),
        ));
    }
    Ok(())
}

impl Blueprint<ModelParameters> for BodyMass {
    fn component(&self) -> ComponentId {
        ids::BODY_MASS
    }

    fn name(&self) -> &'static str {
        match self.source {
            MassSource::Raw(_) => "BodyMass::Raw",
            MassSource::Flat(_) => "BodyMass::Flat",
            MassSource::FromZ(_) => "BodyMass::FromZ",
        }
    }

    fn requires(&self) -> Vec<ComponentId> {
        match self.source {
            MassSource::FromZ(_) => vec![ids::FOODWEB],
            _ => vec![ids::SPECIES],
        }
    }

    fn early_check(&self) -> CheckResult {
        let positive = |field: &str, v: FloatValue| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(CheckFailure::new(field, format!("{} must be positive", v)))
            }
        };
        match &self.source {
            MassSource::Raw(values) => values.iter().try_for_each(|v| positive("body_mass", *v)),
            MassSource::Flat(value) => positive("body_mass", *value),
            MassSource::FromZ(z) => positive("Z", *z),
        }
    }

    fn late_check(&self, model: &ModelParameters) -> CheckResult {
        check_body_mass(model, &self.compute(model)?)
    }

    fn expand(&self, model: &mut ModelParameters) {
        let values = self.compute(model).expect("late_check accepted this model");
        model.body_mass = Some(values);
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ClassSource {
    Raw(Vec<String>),
    /// Every consumer gets the same class.
    Favor(MetabolicClass),
}

/// Metabolic class of every species. Producers must be of class
/// [`MetabolicClass::Producer`], and consumers of any other class.
#[derive(Debug, Clone, PartialEq)]
pub struct MetabolicClasses {
    source: ClassSource,
}

impl MetabolicClasses {
    /// Classes given under any of their names, e.g. `"inv"` or `"ectotherm vertebrate"`.
    pub fn raw<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            source: ClassSource::Raw(classes.into_iter().map(Into::into).collect()),
        }
    }

    pub fn favor(class: MetabolicClass) -> Self {
        Self {
            source: ClassSource::Favor(class),
        }
    }

    fn compute(&self, model: &ModelParameters) -> Result<Vec<MetabolicClass>, CheckFailure> {
        match &self.source {
            ClassSource::Raw(names) => parse_classes(names),
            ClassSource::Favor(class) => Ok(producers(model, "metabolic_class")?
                .iter()
                .map(|p| if *p { MetabolicClass::Producer } else { *class })
                .collect()),
        }
    }
}

pub(crate) fn parse_classes(names: &[String]) -> Result<Vec<MetabolicClass>, CheckFailure> {
    names
        .iter()
        .map(|name| {
            MetabolicClass::parse(name).map_err(|e| CheckFailure::new("metabolic_class", e.to_string()))
        })
        .collect()
}

pub(crate) fn check_classes(model: &ModelParameters, classes: &[MetabolicClass]) -> CheckResult {
    let producers = producers(model, "metabolic_class")?;
    check_len("metabolic_class", classes.len(), producers.len())?;
    for (i, (class, producer)) in classes.iter().zip(producers.iter()).enumerate() {
        if *producer != (*class == MetabolicClass::Producer) {
            let label = model.species_names().get(i).cloned().unwrap_or_default();
            return Err(CheckFailure::new(
                "metabolic_class",
                format!(
                    "species {:?} is {} but its class is {}",
                    label,
                    if *producer { "a producer" } else { "a consumer" },
                    class
                ),
            ));
        }
    }
    Ok(())
}

pub(crate) fn classes_value(model: &ModelParameters) -> Option<PropertyValue> {
    model.metabolic_class.as_ref().map(|classes| {
        PropertyValue::Labels(classes.iter().map(|c| c.name().to_string()).collect())
    })
}

impl Blueprint<ModelParameters> for MetabolicClasses {
    fn component(&self) -> ComponentId {
        ids::METABOLIC_CLASS
    }

    fn name(&self) -> &'static str {
        match self.source {
            ClassSource::Raw(_) => "MetabolicClass::Raw",
            ClassSource::Favor(_) => "MetabolicClass::Favor",
        }
    }

    fn early_check(&self) -> CheckResult {
        match &self.source {
            ClassSource::Raw(names) => parse_classes(names).map(|_| ()),
            ClassSource::Favor(MetabolicClass::Producer) => Err(CheckFailure::new(
                "metabolic_class",
                "consumers cannot be producers",
            )),
            ClassSource::Favor(_) => Ok(()),
        }
    }

    fn late_check(&self, model: &ModelParameters) -> CheckResult {
        check_classes(model, &self.compute(model)?)
    }

    fn expand(&self, model: &mut ModelParameters) {
        let values = self.compute(model).expect("late_check accepted this model");
        model.metabolic_class = Some(values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprints::Foodweb;
    use crate::model::Model;
    use endyn_core::errors::EndynError;
    use is_close::is_close;
    use ndarray::array;

    fn chain() -> Model {
        let mut model = Model::new();
        model
            .add(Foodweb::matrix(array![
                [false, false, false],
                [true, false, false],
                [false, true, false]
            ]))
            .unwrap();
        model
    }

    #[test]
    fn masses_from_trophic_levels() {
        let mut model = chain();
        model.add(BodyMass::from_z(10.0)).unwrap();
        let masses = model.vector("M").unwrap();
        assert!(is_close!(masses[0], 1.0));
        assert!(is_close!(masses[1], 10.0));
        assert!(is_close!(masses[2], 100.0));
    }

    #[test]
    fn allometric_mass_needs_a_foodweb() {
        let mut model = Model::new();
        let err = model.add(BodyMass::from_z(10.0)).unwrap_err();
        assert_eq!(
            err,
            EndynError::MissingRequiredComponent {
                blueprint: "BodyMass::FromZ".to_string(),
                required: "Foodweb".to_string(),
            }
        );
        assert_eq!(model.n_components(), 0);
    }

    #[test]
    fn body_mass_writes_are_checked() {
        let mut model = chain();
        model.add(BodyMass::raw(vec![1.0, 2.0, 3.0])).unwrap();
        assert!(matches!(
            model.set("body_mass", array![1.0, -2.0, 3.0]),
            Err(EndynError::Write { .. })
        ));
        assert!(model.set_at("M", 1, 0.0).is_err());
        assert_eq!(model.vector("body_mass").unwrap(), array![1.0, 2.0, 3.0]);
        model.set_at("M", 1, 5.0).unwrap();
        assert_eq!(model.vector("body_mass").unwrap(), array![1.0, 5.0, 3.0]);
    }

    #[test]
    fn metabolic_classes() {
        let mut model = chain();
        assert!(matches!(
            model.add(MetabolicClasses::raw(["inv", "p", "ecto"])),
            Err(EndynError::LateCheck { .. })
        ));
        assert!(matches!(
            model.add(MetabolicClasses::raw(["p", "mammal", "ecto"])),
            Err(EndynError::EarlyCheck { .. })
        ));
        model
            .add(MetabolicClasses::raw(["producer", "inv", "ectotherm vertebrate"]))
            .unwrap();
        assert_eq!(
            model.get("metabolic_class").unwrap(),
            PropertyValue::Labels(vec![
                "producer".to_string(),
                "invertebrate".to_string(),
                "ectotherm".to_string()
            ])
        );
    }

    #[test]
    fn favored_class() {
        let mut model = chain();
        model
            .add(MetabolicClasses::favor(MetabolicClass::Ectotherm))
            .unwrap();
        assert_eq!(
            model.parameters().metabolic_class.as_deref(),
            Some(
                &[
                    MetabolicClass::Producer,
                    MetabolicClass::Ectotherm,
                    MetabolicClass::Ectotherm
                ][..]
            )
        );
    }
}
