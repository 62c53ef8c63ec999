#![allow(dead_code)]

// ============================================================================
// A small aggregate used to exercise the framework without the biological
// catalogue: a number of patches, a mass per patch and two exclusive flavours.
// ============================================================================

use crate::framework::{
    Blueprint, Brought, CheckFailure, CheckResult, ComponentId, ComponentSpec, Property,
    PropertyValue, Registry, System,
};
use ndarray::Array1;
use std::sync::Arc;

pub(crate) const PATCHES: ComponentId = ComponentId::new("Patches");
pub(crate) const MASS: ComponentId = ComponentId::new("Mass");
pub(crate) const SWEET: ComponentId = ComponentId::new("Sweet");
pub(crate) const SOUR: ComponentId = ComponentId::new("Sour");

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Garden {
    pub patches: Option<usize>,
    pub mass: Option<Array1<f64>>,
    pub flavour: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub(crate) struct Patches(pub usize);

impl Blueprint<Garden> for Patches {
    fn component(&self) -> ComponentId {
        PATCHES
    }
    fn name(&self) -> &'static str {
        "Patches"
    }
    fn early_check(&self) -> CheckResult {
        if self.0 == 0 {
            return Err(CheckFailure::new("n", "at least one patch is needed"));
        }
        Ok(())
    }
    fn expand(&self, model: &mut Garden) {
        model.patches = Some(self.0);
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Mass {
    Raw(Vec<f64>),
    Flat(f64),
}

impl Blueprint<Garden> for Mass {
    fn component(&self) -> ComponentId {
        MASS
    }
    fn name(&self) -> &'static str {
        match self {
            Mass::Raw(_) => "Mass::Raw",
            Mass::Flat(_) => "Mass::Flat",
        }
    }
    fn brought(&self) -> Vec<Brought<Garden>> {
        match self {
            Mass::Raw(v) => vec![Brought::implied(Patches(v.len()))],
            Mass::Flat(_) => vec![Brought::cannot_imply(PATCHES)],
        }
    }
    fn early_check(&self) -> CheckResult {
        let values = match self {
            Mass::Raw(v) => v.clone(),
            Mass::Flat(x) => vec![*x],
        };
        check_non_negative(&values)
    }
    fn late_check(&self, model: &Garden) -> CheckResult {
        match (self, model.patches) {
            (Mass::Raw(v), Some(n)) if v.len() != n => {
                Err(CheckFailure::mismatch("mass", n, v.len()))
            }
            _ => Ok(()),
        }
    }
    fn expand(&self, model: &mut Garden) {
        let n = model.patches.unwrap_or_default();
        model.mass = Some(match self {
            Mass::Raw(v) => Array1::from(v.clone()),
            Mass::Flat(x) => Array1::from_elem(n, *x),
        });
    }
}

fn check_non_negative(values: &[f64]) -> CheckResult {
    match values.iter().position(|v| *v < 0.0) {
        Some(i) => Err(CheckFailure::new(
            "mass",
            format!("value {} at index {} is negative", values[i], i),
        )),
        None => Ok(()),
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Flavour {
    pub sweet: bool,
    pub mass: Option<Vec<f64>>,
}

impl Blueprint<Garden> for Flavour {
    fn component(&self) -> ComponentId {
        if self.sweet {
            SWEET
        } else {
            SOUR
        }
    }
    fn name(&self) -> &'static str {
        "Flavour"
    }
    fn brought(&self) -> Vec<Brought<Garden>> {
        match &self.mass {
            Some(m) => vec![Brought::embedded(Mass::Raw(m.clone()))],
            None => vec![],
        }
    }
    fn expand(&self, model: &mut Garden) {
        model.flavour = Some(if self.sweet { "sweet" } else { "sour" });
    }
}

pub(crate) fn registry() -> Arc<Registry<Garden>> {
    let registry = Registry::builder()
        .component(ComponentSpec::new(PATCHES).property(
            Property::read("n_patches", |g: &Garden| g.patches.map(PropertyValue::Size))
                .alias("n"),
        ))
        .component(
            ComponentSpec::new(MASS).requires(PATCHES).property(
                Property::read("mass", |g: &Garden| {
                    g.mass.clone().map(PropertyValue::Vector)
                })
                .alias("m")
                .write(
                    |g: &Garden, value: &PropertyValue| {
                        let v = value
                            .as_vector()
                            .ok_or_else(|| CheckFailure::new("mass", "expected a vector"))?;
                        if Some(v.len()) != g.patches {
                            return Err(CheckFailure::mismatch("mass", g.patches, v.len()));
                        }
                        check_non_negative(v.as_slice().unwrap_or_default())
                    },
                    |g: &mut Garden, value: PropertyValue| g.mass = value.into_vector(),
                ),
            ),
        )
        .component(ComponentSpec::new(SWEET).conflicts(SOUR, "a garden has a single flavour"))
        .component(
            ComponentSpec::new(SOUR).property(
                Property::read("flavour", |g: &Garden| g.flavour.map(PropertyValue::from))
                    .depends(MASS),
            ),
        )
        .build()
        .unwrap();
    Arc::new(registry)
}

pub(crate) fn garden() -> System<Garden> {
    System::new(Garden::default(), registry())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EndynError;

    #[test]
    fn implied_component_is_added() {
        let mut g = garden();
        g.add(Mass::Raw(vec![1.0, 2.0])).unwrap();
        assert!(g.has_component(PATCHES));
        assert_eq!(g.get("n").unwrap(), PropertyValue::Size(2));
        assert_eq!(g.blueprint_of(MASS), Some("Mass::Raw"));
        assert_eq!(g.blueprint_of(PATCHES), Some("Patches"));
        // Dependencies expand first.
        assert_eq!(g.components().collect::<Vec<_>>(), vec![PATCHES, MASS]);
    }

    #[test]
    fn explicit_blueprint_wins_over_implied_one() {
        let mut g = garden();
        let batch: Vec<Box<dyn Blueprint<Garden>>> =
            vec![Box::new(Mass::Raw(vec![1.0, 2.0])), Box::new(Patches(3))];
        let res = g.add_all(batch);
        // The explicit Patches(3) is used, so the late check on the mass fails.
        match res {
            Err(EndynError::LateCheck { field, message, .. }) => {
                assert_eq!(field, "mass");
                assert_eq!(message, "expected 3, received 2");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(g.n_components(), 0);
        assert_eq!(g.value(), &Garden::default());
    }

    #[test]
    fn missing_requirement() {
        let mut g = garden();
        let err = g.add(Mass::Flat(1.0)).unwrap_err();
        assert_eq!(
            err,
            EndynError::MissingImpliedComponent {
                blueprint: "Mass::Flat".to_string(),
                required: "Patches".to_string(),
                implied_by: "Mass::Flat".to_string(),
            }
        );
        assert_eq!(g.n_components(), 0);

        g.add(Patches(4)).unwrap();
        g.add(Mass::Flat(1.0)).unwrap();
        assert_eq!(
            g.get("mass").unwrap(),
            PropertyValue::Vector(Array1::from_elem(4, 1.0))
        );
    }

    #[test]
    fn conflicts_are_symmetric() {
        let mut g = garden();
        g.add(Flavour {
            sweet: true,
            mass: None,
        })
        .unwrap();
        // Declared on Sweet only, still detected when adding Sour.
        let err = g
            .add(Flavour {
                sweet: false,
                mass: None,
            })
            .unwrap_err();
        assert!(matches!(
            err,
            EndynError::ConflictingComponents { ref component, ref other, ref other_blueprint, .. }
                if component == "Sour" && other == "Sweet" && other_blueprint == "Flavour"
        ));
    }

    #[test]
    fn embedded_duplicates_are_rejected() {
        let mut g = garden();
        g.add(Mass::Raw(vec![1.0])).unwrap();
        let err = g
            .add(Flavour {
                sweet: true,
                mass: Some(vec![2.0]),
            })
            .unwrap_err();
        assert!(matches!(err, EndynError::ComponentAlreadyPresent { .. }));
        assert!(!g.has_component(SWEET));
    }

    #[test]
    fn failed_batch_leaves_model_unchanged() {
        let mut g = garden();
        g.add(Patches(2)).unwrap();
        let before = g.value().clone();

        let err = g
            .add(Flavour {
                sweet: true,
                mass: Some(vec![1.0, -1.0]),
            })
            .unwrap_err();
        assert!(matches!(err, EndynError::EarlyCheck { .. }));
        assert_eq!(g.value(), &before);
        assert_eq!(g.n_components(), 1);
    }

    #[test]
    fn properties_check_components_and_writes() {
        let mut g = garden();
        assert_eq!(
            g.get("m").unwrap_err(),
            EndynError::MissingComponent {
                property: "mass".to_string(),
                component: "Mass".to_string(),
            }
        );

        g.add(Flavour {
            sweet: false,
            mass: None,
        })
        .unwrap();
        // Readable only once the dependency is there too.
        assert!(matches!(
            g.get("flavour"),
            Err(EndynError::MissingComponent { ref component, .. }) if component == "Mass"
        ));
        g.add(Mass::Raw(vec![1.0, 1.0])).unwrap();
        assert_eq!(g.get("flavour").unwrap(), PropertyValue::from("sour"));

        assert!(matches!(g.set("mass", vec![1.0, -2.0].into()), Err(EndynError::Write { .. })));
        assert!(matches!(g.set_at("m", 0, -1.0), Err(EndynError::Write { .. })));
        assert!(matches!(g.set_at("m", 5, 1.0), Err(EndynError::Write { .. })));
        assert!(matches!(
            g.set("n_patches", PropertyValue::Size(3)),
            Err(EndynError::ReadOnlyProperty { .. })
        ));
        assert_eq!(
            g.get("mass").unwrap(),
            PropertyValue::Vector(Array1::from(vec![1.0, 1.0]))
        );

        g.set_at("m", 1, 3.0).unwrap();
        assert_eq!(
            g.get("mass").unwrap(),
            PropertyValue::Vector(Array1::from(vec![1.0, 3.0]))
        );
    }

    #[test]
    fn unknown_property() {
        let g = garden();
        assert!(matches!(
            g.get("colour"),
            Err(EndynError::UnknownReference { .. })
        ));
    }

    #[test]
    fn ambiguous_property_alias_rejected_by_registry() {
        let res = Registry::<Garden>::builder()
            .component(
                ComponentSpec::new(PATCHES)
                    .property(Property::read("n_patches", |_: &Garden| None).alias("n")),
            )
            .component(
                ComponentSpec::new(MASS).property(Property::read("mass", |_: &Garden| None).alias("n")),
            )
            .build();
        assert!(matches!(res, Err(EndynError::AmbiguousAlias { .. })));
    }

    #[test]
    fn display_lists_provenance() {
        let mut g = garden();
        g.add(Mass::Raw(vec![1.0])).unwrap();
        assert_eq!(
            g.to_string(),
            "Model with 2 components\n  - Patches (from Patches)\n  - Mass (from Mass::Raw)"
        );
    }
}
